//! Prelude for commonly used types and traits in term-mine.

pub use crate::config::{
    EmptyTablePolicy, FdConfig, ItemsetConfig, MiningConfig, OutputConfig, RuleConfig,
    RuleThresholds, TableSpec, Threshold,
};
pub use crate::error::{ErrorContext, MineError, Result};
pub use crate::fd::{Classification, ClassificationSink, FdDiscoverer, PartitionEngine};
pub use crate::itemsets::{ItemsetLattice, Rule, RuleGenerator, TransactionSet};
pub use crate::logging::LogConfig;
pub use crate::runner::{DependencyRunner, MiningRunner};
pub use crate::sources::{RowSource, TransactionSource};
pub use crate::table::{Schema, Table};
