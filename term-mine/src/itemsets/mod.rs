//! Frequent itemsets and association rules.
//!
//! Transactions are `(transaction_id, item_label)` pairs. [`ItemsetLattice`]
//! builds frequent itemsets level by level, [`SupportTable`] memoizes their
//! supports, and [`RuleGenerator`] turns each level into association rules.

pub mod lattice;
pub mod rules;
pub mod support;
pub mod transactions;

pub use lattice::{Itemset, ItemsetLattice, LatticeLevel};
pub use rules::{confidence, Rule, RuleGenerator};
pub use support::SupportTable;
pub use transactions::{ItemCatalog, ItemId, ItemLabel, TransactionSet};
