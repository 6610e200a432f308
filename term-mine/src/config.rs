//! Run configuration.
//!
//! [`MiningConfig`] is deserialized from JSON with `serde`; every field has a
//! default, so a config file only needs to name what it changes:
//!
//! ```rust
//! use term_mine::config::{MiningConfig, Threshold};
//!
//! let config = MiningConfig::from_json_str(r#"{
//!     "fd": { "tables": [{ "name": "trip", "primary_key": "id" }] },
//!     "itemsets": { "min_support": { "count": 1000 } },
//!     "rules": {
//!         "min_confidence": 0.8,
//!         "min_support": { "fraction": 0.08 },
//!         "levels": { "4": { "min_confidence": 0.9, "min_support": { "fraction": 0.085 } } }
//!     }
//! }"#).unwrap();
//!
//! assert_eq!(config.fd.max_lhs_size, 2);
//! assert_eq!(config.itemsets.min_support, Threshold::Count(1000));
//! assert_eq!(config.rules.thresholds_for(4).min_confidence, 0.9);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{MineError, Result};
use crate::security::InputValidator;

/// A support threshold, either an absolute transaction count or a fraction
/// of all transactions.
///
/// Both forms are normalized to an absolute count with [`Threshold::min_count`]
/// before any comparison, so lattice and rule filtering always compare the
/// same unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Threshold {
    /// Minimum number of transactions.
    Count(u64),
    /// Minimum fraction of transactions, in `0.0..=1.0`.
    Fraction(f64),
}

impl Threshold {
    /// Resolves this threshold to a minimum transaction count out of `total`.
    pub fn min_count(&self, total: u64) -> u64 {
        match *self {
            Threshold::Count(count) => count,
            Threshold::Fraction(fraction) => {
                if total == 0 || fraction <= 0.0 {
                    return 0;
                }
                // Smallest count whose ratio to `total` reaches the fraction.
                // The product only seeds the search; the ratio decides.
                let meets = |count: u64| count as f64 / total as f64 >= fraction;
                let mut count = ((fraction * total as f64).ceil() as u64).min(total);
                while count > 0 && meets(count - 1) {
                    count -= 1;
                }
                while count < total && !meets(count) {
                    count += 1;
                }
                count
            }
        }
    }

    /// Returns true if `count` out of `total` transactions meets this threshold.
    pub fn is_met(&self, count: u64, total: u64) -> bool {
        count >= self.min_count(total)
    }

    fn validate(&self, name: &str) -> Result<()> {
        match *self {
            Threshold::Count(_) => Ok(()),
            Threshold::Fraction(fraction) => InputValidator::validate_fraction(fraction, name),
        }
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Threshold::Count(count) => write!(f, "{count} transactions"),
            Threshold::Fraction(fraction) => write!(f, "{:.2}% of transactions", fraction * 100.0),
        }
    }
}

/// What functional dependency discovery does with a table that has no rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyTablePolicy {
    /// Log a warning and classify nothing.
    #[default]
    Skip,
    /// Run discovery anyway; every candidate holds vacuously.
    Vacuous,
}

/// A table to run functional dependency discovery on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSpec {
    /// Table name as known to the row source.
    pub name: String,
    /// Declared key. Determinants containing it alongside other attributes are pruned as trivial.
    #[serde(default)]
    pub primary_key: Option<String>,
    /// Attributes never tested as a dependent.
    #[serde(default)]
    pub excluded_rhs: Vec<String>,
}

impl TableSpec {
    /// Creates a spec with no key and no exclusions.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: None,
            excluded_rhs: Vec::new(),
        }
    }

    /// Sets the declared primary key.
    pub fn with_primary_key(mut self, key: impl Into<String>) -> Self {
        self.primary_key = Some(key.into());
        self
    }

    /// Excludes an attribute from the dependent side.
    pub fn exclude_rhs(mut self, attribute: impl Into<String>) -> Self {
        self.excluded_rhs.push(attribute.into());
        self
    }
}

/// Functional dependency discovery settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FdConfig {
    /// Largest determinant size searched. Larger determinants are never discovered.
    pub max_lhs_size: usize,
    /// Rows requested per fetch.
    pub batch_size: usize,
    /// Upper bound on rows loaded per table; `None` loads every batch.
    pub max_rows: Option<usize>,
    /// Behaviour on tables without rows.
    pub empty_table: EmptyTablePolicy,
    /// Tables to process, in order.
    pub tables: Vec<TableSpec>,
}

impl Default for FdConfig {
    fn default() -> Self {
        Self {
            max_lhs_size: 2,
            batch_size: 1000,
            max_rows: None,
            empty_table: EmptyTablePolicy::Skip,
            tables: Vec::new(),
        }
    }
}

/// Frequent itemset settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemsetConfig {
    /// Minimum support for an itemset to be frequent.
    pub min_support: Threshold,
    /// Stop after this level even if it is non-empty.
    pub max_level: Option<usize>,
    /// Abort a level whose candidate count exceeds this.
    pub max_candidates: Option<usize>,
}

impl Default for ItemsetConfig {
    fn default() -> Self {
        Self {
            min_support: Threshold::Count(2),
            max_level: None,
            max_candidates: None,
        }
    }
}

impl ItemsetConfig {
    /// Rejects thresholds that would make every itemset frequent.
    pub fn validate(&self) -> Result<()> {
        match self.min_support {
            Threshold::Count(0) => {
                return Err(MineError::Configuration(
                    "itemsets.min_support count must be at least 1".to_string(),
                ))
            }
            Threshold::Fraction(fraction) if fraction <= 0.0 => {
                return Err(MineError::Configuration(
                    "itemsets.min_support fraction must be positive".to_string(),
                ))
            }
            threshold => threshold.validate("itemsets.min_support")?,
        }
        if self.max_level == Some(0) {
            return Err(MineError::Configuration(
                "itemsets.max_level must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Thresholds a rule must meet to be emitted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuleThresholds {
    /// Minimum support of the whole itemset behind the rule.
    pub min_support: Threshold,
    /// Minimum confidence, in `0.0..=1.0`.
    pub min_confidence: f64,
}

/// Association rule settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    /// Default minimum rule support.
    pub min_support: Threshold,
    /// Default minimum confidence.
    pub min_confidence: f64,
    /// Per-level overrides, keyed by itemset size.
    pub levels: BTreeMap<usize, RuleThresholds>,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            min_support: Threshold::Fraction(0.0),
            min_confidence: 0.8,
            levels: BTreeMap::new(),
        }
    }
}

impl RuleConfig {
    /// Checks the default thresholds and every per-level override.
    pub fn validate(&self) -> Result<()> {
        self.min_support.validate("rules.min_support")?;
        InputValidator::validate_fraction(self.min_confidence, "rules.min_confidence")?;
        for (level, thresholds) in &self.levels {
            if *level < 2 {
                return Err(MineError::Configuration(format!(
                    "rules.levels key {level} is invalid: rules need itemsets of size 2 or more"
                )));
            }
            thresholds.min_support.validate("rules.levels.min_support")?;
            InputValidator::validate_fraction(
                thresholds.min_confidence,
                "rules.levels.min_confidence",
            )?;
        }
        Ok(())
    }

    /// Returns the thresholds that apply to rules drawn from `level`.
    pub fn thresholds_for(&self, level: usize) -> RuleThresholds {
        self.levels.get(&level).copied().unwrap_or(RuleThresholds {
            min_support: self.min_support,
            min_confidence: self.min_confidence,
        })
    }
}

/// Where reports are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory holding every report file.
    pub dir: PathBuf,
    /// Pruned and invalid dependency report.
    pub pruned_file: String,
    /// Valid dependency report.
    pub valid_file: String,
    /// Prefix for per-level rule reports (`<prefix><k>.txt`).
    pub rules_prefix: String,
    /// Optional JSON summary written at the end of a run.
    pub summary_file: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            pruned_file: "pruned_dependencies.txt".to_string(),
            valid_file: "valid_dependencies.txt".to_string(),
            rules_prefix: "rules_".to_string(),
            summary_file: None,
        }
    }
}

impl OutputConfig {
    /// Creates an output config rooted at `dir` with default file names.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Self::default()
        }
    }

    /// Path of the pruned dependency report.
    pub fn pruned_path(&self) -> PathBuf {
        self.dir.join(&self.pruned_file)
    }

    /// Path of the valid dependency report.
    pub fn valid_path(&self) -> PathBuf {
        self.dir.join(&self.valid_file)
    }

    /// Path of the rule report for `level`.
    pub fn rules_path(&self, level: usize) -> PathBuf {
        self.dir.join(format!("{}{level}.txt", self.rules_prefix))
    }

    /// Path of the JSON summary, if one is configured.
    pub fn summary_path(&self) -> Option<PathBuf> {
        self.summary_file.as_ref().map(|name| self.dir.join(name))
    }
}

/// Top-level configuration for a mining run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiningConfig {
    /// Functional dependency discovery.
    pub fd: FdConfig,
    /// Frequent itemset generation.
    pub itemsets: ItemsetConfig,
    /// Association rule generation.
    pub rules: RuleConfig,
    /// Report destinations.
    pub output: OutputConfig,
}

impl MiningConfig {
    /// Parses and validates a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: MiningConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            MineError::Configuration(format!("Failed to read config '{}': {e}", path.display()))
        })?;
        Self::from_json_str(&json)
    }

    /// Checks every setting, failing on the first invalid one.
    pub fn validate(&self) -> Result<()> {
        if self.fd.max_lhs_size == 0 {
            return Err(MineError::Configuration(
                "fd.max_lhs_size must be at least 1".to_string(),
            ));
        }
        if self.fd.batch_size == 0 {
            return Err(MineError::Configuration(
                "fd.batch_size must be at least 1".to_string(),
            ));
        }
        for table in &self.fd.tables {
            if table.name.trim().is_empty() {
                return Err(MineError::Configuration(
                    "fd.tables entries need a name".to_string(),
                ));
            }
        }

        self.itemsets.validate()?;
        self.rules.validate()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MiningConfig::default();
        assert_eq!(config.fd.max_lhs_size, 2);
        assert_eq!(config.fd.batch_size, 1000);
        assert_eq!(config.fd.empty_table, EmptyTablePolicy::Skip);
        assert_eq!(config.itemsets.min_support, Threshold::Count(2));
        assert_eq!(config.rules.min_confidence, 0.8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_fraction_resolves_to_count() {
        assert_eq!(Threshold::Fraction(0.5).min_count(10), 5);
        assert_eq!(Threshold::Fraction(0.55).min_count(10), 6);
        assert_eq!(Threshold::Fraction(0.7).min_count(10), 7);
        assert_eq!(Threshold::Fraction(0.0).min_count(10), 0);
        assert_eq!(Threshold::Fraction(1.0).min_count(3), 3);
        assert_eq!(Threshold::Count(4).min_count(10), 4);
    }

    #[test]
    fn test_fraction_boundary_on_large_totals() {
        let total = 100_000_000;
        assert_eq!(Threshold::Fraction(0.271).min_count(total), 27_100_000);
        assert!(Threshold::Fraction(0.271).is_met(27_100_000, total));
        assert!(!Threshold::Fraction(0.271).is_met(27_099_999, total));

        for k in 1..1000u64 {
            let fraction = k as f64 / 1000.0;
            let exact = k * (total / 1000);
            assert_eq!(
                Threshold::Fraction(fraction).min_count(total),
                exact,
                "fraction {fraction}"
            );
        }
    }

    #[test]
    fn test_is_met_boundary() {
        let threshold = Threshold::Fraction(0.7);
        assert!(threshold.is_met(7, 10));
        assert!(!threshold.is_met(6, 10));
        assert!(Threshold::Count(2).is_met(2, 3));
        assert!(!Threshold::Count(2).is_met(1, 3));
    }

    #[test]
    fn test_level_overrides() {
        let mut rules = RuleConfig::default();
        rules.levels.insert(
            4,
            RuleThresholds {
                min_support: Threshold::Fraction(0.085),
                min_confidence: 0.9,
            },
        );
        assert_eq!(rules.thresholds_for(2).min_confidence, 0.8);
        assert_eq!(rules.thresholds_for(4).min_confidence, 0.9);
        assert_eq!(
            rules.thresholds_for(4).min_support,
            Threshold::Fraction(0.085)
        );
    }

    #[test]
    fn test_validation_failures() {
        let mut config = MiningConfig::default();
        config.fd.max_lhs_size = 0;
        assert!(config.validate().is_err());

        let mut config = MiningConfig::default();
        config.itemsets.min_support = Threshold::Count(0);
        assert!(config.validate().is_err());

        let mut config = MiningConfig::default();
        config.rules.min_confidence = 1.2;
        assert!(config.validate().is_err());

        let mut config = MiningConfig::default();
        config.rules.min_support = Threshold::Fraction(-0.1);
        assert!(config.validate().is_err());

        let err = MiningConfig::from_json_str(r#"{"rules": {"levels": {"1": {"min_support": {"count": 1}, "min_confidence": 0.5}}}}"#)
            .unwrap_err();
        assert!(matches!(err, MineError::Configuration(_)));
    }

    #[test]
    fn test_json_round_trip_of_table_specs() {
        let config = MiningConfig::from_json_str(
            r#"{"fd": {"max_lhs_size": 3, "empty_table": "vacuous",
                "tables": [{"name": "trip", "primary_key": "id", "excluded_rhs": ["mtatax"]}]}}"#,
        )
        .unwrap();
        assert_eq!(config.fd.max_lhs_size, 3);
        assert_eq!(config.fd.empty_table, EmptyTablePolicy::Vacuous);
        assert_eq!(
            config.fd.tables,
            vec![TableSpec::new("trip").with_primary_key("id").exclude_rhs("mtatax")]
        );
    }

    #[test]
    fn test_output_paths() {
        let output = OutputConfig::in_dir("/tmp/out");
        assert_eq!(output.pruned_path(), PathBuf::from("/tmp/out/pruned_dependencies.txt"));
        assert_eq!(output.rules_path(3), PathBuf::from("/tmp/out/rules_3.txt"));
        assert_eq!(output.summary_path(), None);
    }
}
