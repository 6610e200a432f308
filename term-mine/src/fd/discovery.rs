//! Level-wise functional dependency discovery for one table.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use tracing::{info, instrument, warn};

use super::partition::PartitionEngine;
use crate::config::{EmptyTablePolicy, FdConfig, TableSpec};
use crate::error::Result;
use crate::log_candidate;
use crate::logging::LogConfig;
use crate::table::{AttributeId, AttributeSet, Schema, Table};

/// A determinant set paired with one dependent attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Candidate {
    /// Determinant attributes.
    pub lhs: AttributeSet,
    /// Dependent attribute.
    pub rhs: AttributeId,
}

impl Candidate {
    /// Creates a candidate.
    pub fn new(lhs: AttributeSet, rhs: AttributeId) -> Self {
        Self { lhs, rhs }
    }
}

/// A dependency spelled with attribute names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// Determinant attribute names, in schema order.
    pub lhs: Vec<String>,
    /// Dependent attribute name.
    pub rhs: String,
}

impl Dependency {
    fn from_candidate(schema: &Schema, candidate: &Candidate) -> Self {
        Self {
            lhs: schema.names(&candidate.lhs),
            rhs: schema.name(candidate.rhs).to_string(),
        }
    }
}

/// Why a determinant or candidate was not tested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PruneReason {
    /// The determinant contains the declared key plus other attributes.
    TrivialKey,
    /// A strict subset of the determinant already failed for the same dependent.
    InheritedInvalid,
}

/// Outcome for one determinant or candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Classification {
    /// Tested and holds.
    Valid {
        /// The dependency
        dependency: Dependency,
    },
    /// Tested and fails.
    Invalid {
        /// The dependency
        dependency: Dependency,
    },
    /// Not tested.
    Pruned {
        /// Determinant attribute names
        lhs: Vec<String>,
        /// Dependent, absent when the whole determinant was pruned
        rhs: Option<String>,
        /// Why it was pruned
        reason: PruneReason,
    },
}

impl Classification {
    /// Returns true for [`Classification::Valid`].
    pub fn is_valid(&self) -> bool {
        matches!(self, Classification::Valid { .. })
    }

    /// The line written to the dependency reports.
    ///
    /// Valid dependencies read `a, b -> c`; everything else reads
    /// `a, b -> <reason>`.
    pub fn report_line(&self) -> String {
        match self {
            Classification::Valid { dependency } => {
                format!("{} -> {}", dependency.lhs.join(", "), dependency.rhs)
            }
            Classification::Invalid { dependency } => {
                format!("{} -> {} (invalid)", dependency.lhs.join(", "), dependency.rhs)
            }
            Classification::Pruned {
                lhs,
                reason: PruneReason::TrivialKey,
                ..
            } => format!("{} -> primary key is trivial", lhs.join(", ")),
            Classification::Pruned {
                lhs,
                rhs,
                reason: PruneReason::InheritedInvalid,
            } => format!(
                "{} -> {} (negative result)",
                lhs.join(", "),
                rhs.as_deref().unwrap_or_default()
            ),
        }
    }
}

/// Receives classifications as they are made.
///
/// Implementations persist results incrementally, so a run that stops early
/// still leaves every completed classification behind.
pub trait ClassificationSink {
    /// Called once before the first classification of a table.
    fn begin_table(&mut self, _table: &str) -> Result<()> {
        Ok(())
    }

    /// Records one classification.
    fn record(&mut self, classification: &Classification) -> Result<()>;
}

impl ClassificationSink for Vec<Classification> {
    fn record(&mut self, classification: &Classification) -> Result<()> {
        self.push(classification.clone());
        Ok(())
    }
}

/// Result of discovering dependencies on one table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryReport {
    /// Table name
    pub table: String,
    /// Rows examined
    pub rows: usize,
    /// True if the table was empty and skipped
    pub skipped_empty: bool,
    /// Number of valid dependencies
    pub valid: usize,
    /// Number of tested, failing dependencies
    pub invalid: usize,
    /// Number of determinants pruned for containing the key
    pub pruned_trivial: usize,
    /// Number of candidates pruned through an invalid subset
    pub pruned_inherited: usize,
    /// Every classification, in generation order
    pub classifications: Vec<Classification>,
}

impl DiscoveryReport {
    fn new(table: &str, rows: usize) -> Self {
        Self {
            table: table.to_string(),
            rows,
            ..Self::default()
        }
    }

    fn count(&mut self, classification: &Classification) {
        match classification {
            Classification::Valid { .. } => self.valid += 1,
            Classification::Invalid { .. } => self.invalid += 1,
            Classification::Pruned {
                reason: PruneReason::TrivialKey,
                ..
            } => self.pruned_trivial += 1,
            Classification::Pruned {
                reason: PruneReason::InheritedInvalid,
                ..
            } => self.pruned_inherited += 1,
        }
    }

    /// The valid dependencies.
    pub fn valid_dependencies(&self) -> impl Iterator<Item = &Dependency> {
        self.classifications.iter().filter_map(|c| match c {
            Classification::Valid { dependency } => Some(dependency),
            _ => None,
        })
    }
}

/// Discovers functional dependencies with determinants up to a size bound.
///
/// Each candidate moves through generated → pruned or tested → valid or
/// invalid. Invalid results are kept for the lifetime of the discoverer and
/// prune every larger determinant for the same dependent.
///
/// ```rust
/// use term_mine::config::{FdConfig, TableSpec};
/// use term_mine::fd::FdDiscoverer;
/// use term_mine::table::{Table, Value};
///
/// let table = Table::from_values(
///     "t",
///     &["A", "B", "C"],
///     vec![
///         vec![Value::Int(1), Value::Int(2), Value::Int(5)],
///         vec![Value::Int(1), Value::Int(2), Value::Int(5)],
///         vec![Value::Int(2), Value::Int(3), Value::Int(5)],
///     ],
/// ).unwrap();
///
/// let mut discoverer = FdDiscoverer::new(&table, &TableSpec::new("t"), &FdConfig::default()).unwrap();
/// let mut sink = Vec::new();
/// let report = discoverer.discover(&mut sink).unwrap();
/// assert!(report.valid_dependencies().any(|d| d.lhs == ["A"] && d.rhs == "B"));
/// ```
#[derive(Debug)]
pub struct FdDiscoverer<'a> {
    engine: PartitionEngine<'a>,
    primary_key: Option<AttributeId>,
    rhs_candidates: Vec<AttributeId>,
    max_lhs_size: usize,
    empty_table: EmptyTablePolicy,
    tested: HashSet<Candidate>,
    pruned: HashSet<Candidate>,
    trivial: HashSet<AttributeSet>,
    valid: BTreeSet<Candidate>,
    invalid: HashSet<Candidate>,
    log_config: LogConfig,
}

impl<'a> FdDiscoverer<'a> {
    /// Creates a discoverer for `table`.
    ///
    /// The key and excluded attributes named in `spec` must exist in the
    /// table's schema.
    pub fn new(table: &'a Table, spec: &TableSpec, config: &FdConfig) -> Result<Self> {
        let schema = table.schema();
        let primary_key = spec
            .primary_key
            .as_deref()
            .map(|key| schema.resolve(key))
            .transpose()?;
        let excluded = spec
            .excluded_rhs
            .iter()
            .map(|name| schema.resolve(name))
            .collect::<Result<HashSet<_>>>()?;
        let rhs_candidates = schema.ids().filter(|id| !excluded.contains(id)).collect();

        Ok(Self {
            engine: PartitionEngine::new(table),
            primary_key,
            rhs_candidates,
            max_lhs_size: config.max_lhs_size,
            empty_table: config.empty_table,
            tested: HashSet::new(),
            pruned: HashSet::new(),
            trivial: HashSet::new(),
            valid: BTreeSet::new(),
            invalid: HashSet::new(),
            log_config: LogConfig::default(),
        })
    }

    /// Sets the logging configuration.
    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    /// Every attribute subset of size `1..=max_size`, smallest first, each
    /// size in lexicographic schema order.
    pub fn generate_lhs_combinations(&self, max_size: usize) -> Vec<AttributeSet> {
        let ids: Vec<AttributeId> = self.engine.table().schema().ids().collect();
        let max_size = max_size.min(ids.len());
        (1..=max_size)
            .flat_map(|size| {
                ids.iter()
                    .copied()
                    .combinations(size)
                    .map(AttributeSet::from_ids)
            })
            .collect()
    }

    /// Attributes tested as dependents, in schema order.
    pub fn rhs_candidates(&self) -> &[AttributeId] {
        &self.rhs_candidates
    }

    /// Returns true if `lhs` holds the declared key and something else.
    pub fn is_trivial(&self, lhs: &AttributeSet) -> bool {
        self.primary_key
            .is_some_and(|key| lhs.len() > 1 && lhs.contains(key))
    }

    /// Returns true if a strict subset of `lhs` is recorded invalid for `rhs`.
    pub fn has_invalid_subset(&self, lhs: &AttributeSet, rhs: AttributeId) -> bool {
        lhs.strict_subsets()
            .any(|subset| self.invalid.contains(&Candidate::new(subset, rhs)))
    }

    /// Valid candidates found so far, in canonical order.
    pub fn valid_candidates(&self) -> impl Iterator<Item = &Candidate> {
        self.valid.iter()
    }

    /// Returns true if `candidate` was tested and failed.
    pub fn is_invalid(&self, candidate: &Candidate) -> bool {
        self.invalid.contains(candidate)
    }

    /// Runs discovery, streaming each classification into `sink`.
    ///
    /// Candidates classified by an earlier call are not emitted again, so a
    /// second call on the same discoverer reports nothing new.
    #[instrument(skip(self, sink), fields(table = %self.engine.table().schema().table()))]
    pub fn discover(&mut self, sink: &mut dyn ClassificationSink) -> Result<DiscoveryReport> {
        let table = self.engine.table();
        let schema = table.schema();
        let mut report = DiscoveryReport::new(schema.table(), table.num_rows());

        sink.begin_table(schema.table())?;

        if table.is_empty() && self.empty_table == EmptyTablePolicy::Skip {
            warn!(table = %schema.table(), "table has no rows, skipping dependency discovery");
            report.skipped_empty = true;
            return Ok(report);
        }

        info!(
            table = %schema.table(),
            rows = table.num_rows(),
            attributes = schema.len(),
            max_lhs_size = self.max_lhs_size,
            "starting dependency discovery"
        );

        self.engine.precompute_single_attribute_partitions()?;
        let rhs_candidates = self.rhs_candidates.clone();

        for lhs in self.generate_lhs_combinations(self.max_lhs_size) {
            if self.is_trivial(&lhs) {
                if !self.trivial.insert(lhs.clone()) {
                    continue;
                }
                let classification = Classification::Pruned {
                    lhs: schema.names(&lhs),
                    rhs: None,
                    reason: PruneReason::TrivialKey,
                };
                self.emit(classification, &mut report, sink)?;
                continue;
            }

            for &rhs in &rhs_candidates {
                if lhs.contains(rhs) {
                    continue;
                }

                let candidate = Candidate::new(lhs.clone(), rhs);
                if self.tested.contains(&candidate) || self.pruned.contains(&candidate) {
                    continue;
                }

                if self.has_invalid_subset(&lhs, rhs) {
                    self.pruned.insert(candidate);
                    let classification = Classification::Pruned {
                        lhs: schema.names(&lhs),
                        rhs: Some(schema.name(rhs).to_string()),
                        reason: PruneReason::InheritedInvalid,
                    };
                    self.emit(classification, &mut report, sink)?;
                    continue;
                }

                self.tested.insert(candidate.clone());
                let dependency = Dependency::from_candidate(schema, &candidate);
                let classification = if self.engine.check_dependency(&lhs, rhs)? {
                    self.valid.insert(candidate);
                    Classification::Valid { dependency }
                } else {
                    self.invalid.insert(candidate);
                    Classification::Invalid { dependency }
                };
                self.emit(classification, &mut report, sink)?;
            }
        }

        info!(
            table = %schema.table(),
            valid = report.valid,
            invalid = report.invalid,
            pruned_trivial = report.pruned_trivial,
            pruned_inherited = report.pruned_inherited,
            partitions = self.engine.cached_partitions(),
            "dependency discovery finished"
        );

        Ok(report)
    }

    fn emit(
        &self,
        classification: Classification,
        report: &mut DiscoveryReport,
        sink: &mut dyn ClassificationSink,
    ) -> Result<()> {
        log_candidate!(self.log_config, line = %classification.report_line(), "classified");
        sink.record(&classification)?;
        report.count(&classification);
        report.classifications.push(classification);
        Ok(())
    }
}
