//! # Term Mine - Dependency and Association Rule Discovery
//!
//! Term Mine finds structure in tabular and transactional data with two
//! level-wise lattice searches:
//!
//! - **Functional dependencies**: `A, B -> C` holds when every pair of rows
//!   agreeing on `A, B` also agrees on `C`. Dependencies are tested by
//!   partition refinement and pruned through a determinant-size bound, a
//!   declared primary key, and inherited invalid results.
//! - **Frequent itemsets and association rules**: Apriori-style level
//!   generation over `(transaction_id, item_label)` pairs, followed by rules
//!   `X -> Y` filtered on support and confidence.
//!
//! ## Quick Start
//!
//! ```rust
//! use term_mine::prelude::*;
//! use term_mine::table::Value;
//!
//! # fn main() -> Result<()> {
//! let table = Table::from_values(
//!     "t",
//!     &["A", "B", "C"],
//!     vec![
//!         vec![Value::Int(1), Value::Int(2), Value::Int(5)],
//!         vec![Value::Int(1), Value::Int(2), Value::Int(5)],
//!         vec![Value::Int(2), Value::Int(3), Value::Int(5)],
//!     ],
//! )?;
//! let mut discoverer = FdDiscoverer::new(&table, &TableSpec::new("t"), &FdConfig::default())?;
//! let report = discoverer.discover(&mut Vec::new())?;
//! assert_eq!(report.valid, 5);
//!
//! let transactions = TransactionSet::from_pairs([
//!     ("t1", "x"), ("t1", "y"), ("t2", "x"), ("t2", "y"), ("t3", "x"), ("t3", "z"),
//! ]);
//! let mut lattice = ItemsetLattice::new(&transactions, &ItemsetConfig::default());
//! lattice.generate_all_levels()?;
//! assert_eq!(lattice.level_counts().get(&2), Some(&1));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **`table`**: values, rows, schemas and attribute sets
//! - **`fd`**: the partition engine and the dependency discoverer
//! - **`itemsets`**: transactions, the itemset lattice, memoized supports and rules
//! - **`sources`**: in-memory and DataFusion-backed row and transaction sources
//! - **`report`**: append-only report files and JSON summaries
//! - **`runner`**: multi-table and multi-level runs with failure isolation
//! - **`config`**: JSON configuration
//!
//! The engines are synchronous and work on data already in memory; only the
//! sources and runners are async.

pub mod config;
pub mod error;
pub mod fd;
pub mod itemsets;
pub mod logging;
pub mod prelude;
pub mod report;
pub mod runner;
pub mod security;
pub mod sources;
pub mod table;
