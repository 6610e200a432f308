//! Functional dependency discovery.
//!
//! [`PartitionEngine`] groups a table's rows into equivalence classes for an
//! attribute combination; a dependency `X -> a` holds when every class of
//! `X` carries a single value of `a`. [`FdDiscoverer`] walks the determinant
//! lattice up to a size bound, pruning determinants that contain the declared
//! key and candidates whose smaller determinant already failed.

pub mod discovery;
pub mod partition;

pub use discovery::{
    Candidate, Classification, ClassificationSink, Dependency, DiscoveryReport, FdDiscoverer,
    PruneReason,
};
pub use partition::{Partition, PartitionEngine};
