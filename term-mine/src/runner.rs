//! End-to-end runs: fetch, mine, and write reports.
//!
//! [`DependencyRunner`] discovers functional dependencies for every
//! configured table. [`MiningRunner`] builds the itemset lattice and writes
//! one rule report per level. Both isolate failures to the unit of work they
//! occur in: a table that cannot be fetched, or a level that is aborted,
//! is recorded in the summary while everything committed before it stays.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{error, info, instrument, warn};

use crate::config::{FdConfig, ItemsetConfig, MiningConfig, OutputConfig, RuleConfig, TableSpec};
use crate::error::{MineError, Result};
use crate::fd::{DiscoveryReport, FdDiscoverer};
use crate::itemsets::{ItemsetLattice, RuleGenerator, TransactionSet};
use crate::logging::LogConfig;
use crate::report::{write_json_summary, DependencyReportSink, RuleReportWriter};
use crate::sources::{load_table, RowSource, TransactionSource};

/// Start and end timestamps of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// When the run started
    pub start_time: Option<DateTime<Utc>>,
    /// When the run finished
    pub end_time: Option<DateTime<Utc>>,
}

impl RunMetadata {
    /// Records the start time.
    pub fn record_start(&mut self) {
        self.start_time = Some(Utc::now());
    }

    /// Records the end time.
    pub fn record_end(&mut self) {
        self.end_time = Some(Utc::now());
    }

    /// Elapsed time, once both ends are recorded.
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

/// A unit of work that failed without stopping the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitFailure {
    /// Table name or lattice level
    pub unit: String,
    /// Error message
    pub error: String,
}

/// Outcome of a [`DependencyRunner`] run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencyRunSummary {
    /// Run timestamps
    pub metadata: RunMetadata,
    /// One report per table that completed
    pub tables: Vec<DiscoveryReport>,
    /// Tables that failed
    pub failures: Vec<UnitFailure>,
    /// Pruned dependency report
    pub pruned_report: PathBuf,
    /// Valid dependency report
    pub valid_report: PathBuf,
}

impl DependencyRunSummary {
    /// Returns true if every table completed.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Valid dependencies across all tables.
    pub fn total_valid(&self) -> usize {
        self.tables.iter().map(|t| t.valid).sum()
    }

    /// The report for `table`, if it completed.
    pub fn table(&self, table: &str) -> Option<&DiscoveryReport> {
        self.tables.iter().find(|t| t.table == table)
    }
}

/// Runs dependency discovery over every table in an [`FdConfig`].
///
/// # Examples
///
/// ```rust,no_run
/// use term_mine::config::{MiningConfig, TableSpec};
/// use term_mine::runner::DependencyRunner;
/// use term_mine::sources::MemorySource;
/// use term_mine::table::{Table, Value};
///
/// # #[tokio::main]
/// # async fn main() -> term_mine::error::Result<()> {
/// let mut config = MiningConfig::default();
/// config.fd.tables.push(TableSpec::new("t"));
///
/// let source = MemorySource::new().with_table(
///     Table::from_values("t", &["a", "b"], vec![vec![Value::Int(1), Value::Int(2)]])?,
/// );
/// let summary = DependencyRunner::new(&config).run(&source).await?;
/// assert!(summary.is_success());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DependencyRunner {
    config: FdConfig,
    output: OutputConfig,
    log_config: LogConfig,
    continue_on_error: bool,
}

impl DependencyRunner {
    /// Creates a runner from the `fd` and `output` sections of `config`.
    pub fn new(config: &MiningConfig) -> Self {
        Self::from_parts(config.fd.clone(), config.output.clone())
    }

    /// Creates a runner from its two config sections.
    pub fn from_parts(config: FdConfig, output: OutputConfig) -> Self {
        Self {
            config,
            output,
            log_config: LogConfig::default(),
            continue_on_error: true,
        }
    }

    /// Sets the logging configuration.
    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    /// Sets whether a failing table stops the run.
    ///
    /// Default is true (continue with the next table). Configuration errors
    /// always stop the run.
    pub fn continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    /// Processes every configured table in order.
    #[instrument(skip(self, source), fields(tables = self.config.tables.len()))]
    pub async fn run(&self, source: &dyn RowSource) -> Result<DependencyRunSummary> {
        let mut summary = DependencyRunSummary::default();
        summary.metadata.record_start();
        info!(source = %source.description(), "starting dependency run");

        let mut sink = DependencyReportSink::create(&self.output)?;
        summary.pruned_report = sink.pruned_path().to_path_buf();
        summary.valid_report = sink.valid_path().to_path_buf();

        for spec in &self.config.tables {
            match self.run_table(source, spec, &mut sink).await {
                Ok(report) => summary.tables.push(report),
                Err(e) if e.is_unit_local() && self.continue_on_error => {
                    error!(table = %spec.name, error = %e, "table failed, continuing");
                    summary.failures.push(UnitFailure {
                        unit: spec.name.clone(),
                        error: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        summary.metadata.record_end();
        if let Some(path) = self.output.summary_path() {
            write_json_summary(path, &summary)?;
        }

        info!(
            tables = summary.tables.len(),
            failures = summary.failures.len(),
            valid = summary.total_valid(),
            duration_ms = ?summary.metadata.duration().map(|d| d.num_milliseconds()),
            "dependency run finished"
        );
        Ok(summary)
    }

    async fn run_table(
        &self,
        source: &dyn RowSource,
        spec: &TableSpec,
        sink: &mut DependencyReportSink,
    ) -> Result<DiscoveryReport> {
        let table = load_table(
            source,
            &spec.name,
            self.config.batch_size,
            self.config.max_rows,
        )
        .await?;

        let mut discoverer =
            FdDiscoverer::new(&table, spec, &self.config)?.with_log_config(self.log_config.clone());
        discoverer.discover(sink)
    }
}

/// Rules written for one lattice level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelSummary {
    /// Itemset size
    pub level: usize,
    /// Frequent itemsets at this level
    pub frequent_itemsets: usize,
    /// Rules passing both thresholds
    pub rules: usize,
    /// Minimum rule support, as a transaction count
    pub min_support: u64,
    /// Minimum rule confidence
    pub min_confidence: f64,
    /// Where the rules were written
    pub report: PathBuf,
}

/// Outcome of a [`MiningRunner`] run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MiningSummary {
    /// Run timestamps
    pub metadata: RunMetadata,
    /// Distinct transactions
    pub transactions: u64,
    /// Distinct items
    pub items: usize,
    /// Minimum itemset support, as a transaction count
    pub min_support: u64,
    /// Frequent itemsets per generated level
    pub level_counts: BTreeMap<usize, usize>,
    /// Rule output per level, from level 2 upward
    pub levels: Vec<LevelSummary>,
    /// The level that was aborted, if any
    pub aborted: Option<UnitFailure>,
}

impl MiningSummary {
    /// Rules across all levels.
    pub fn total_rules(&self) -> usize {
        self.levels.iter().map(|l| l.rules).sum()
    }
}

/// Builds the itemset lattice and writes the rules of every level.
#[derive(Debug, Clone)]
pub struct MiningRunner {
    itemsets: ItemsetConfig,
    rules: RuleConfig,
    output: OutputConfig,
    log_config: LogConfig,
}

impl MiningRunner {
    /// Creates a runner from the `itemsets`, `rules` and `output` sections of `config`.
    pub fn new(config: &MiningConfig) -> Self {
        Self {
            itemsets: config.itemsets.clone(),
            rules: config.rules.clone(),
            output: config.output.clone(),
            log_config: LogConfig::default(),
        }
    }

    /// Sets the logging configuration.
    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    /// Fetches the transactions from `source` and mines them.
    pub async fn run(&self, source: &dyn TransactionSource) -> Result<MiningSummary> {
        info!(source = %source.description(), "fetching transactions");
        let transactions = source.fetch_transactions().await?;
        self.mine(&transactions)
    }

    /// Mines transactions already in memory.
    ///
    /// The itemset and rule settings are validated first, so a zero itemset
    /// threshold fails with [`MineError::Configuration`] instead of
    /// enumerating every subset.
    #[instrument(skip(self, transactions), fields(transactions = transactions.num_transactions()))]
    pub fn mine(&self, transactions: &TransactionSet) -> Result<MiningSummary> {
        self.itemsets.validate()?;
        self.rules.validate()?;

        let mut summary = MiningSummary::default();
        summary.metadata.record_start();
        summary.transactions = transactions.num_transactions();
        summary.items = transactions.catalog().len();

        let mut lattice = ItemsetLattice::new(transactions, &self.itemsets);
        summary.min_support = lattice.min_support();
        match lattice.generate_all_levels() {
            Ok(_) => {}
            Err(MineError::LevelAborted { level, message }) => {
                warn!(level, %message, "level aborted, keeping earlier levels");
                summary.aborted = Some(UnitFailure {
                    unit: format!("level {level}"),
                    error: message,
                });
            }
            Err(e) => return Err(e),
        }
        summary.level_counts = lattice.level_counts();

        let catalog = transactions.catalog();
        let mut generator =
            RuleGenerator::from_lattice(&lattice).with_log_config(self.log_config.clone());

        for level in lattice.levels().iter().filter(|l| l.level() >= 2) {
            let thresholds = self.rules.thresholds_for(level.level());
            let rules = generator.generate_rules(level, &thresholds);

            let mut writer = RuleReportWriter::create(&self.output, level.level())?;
            writer.write_rules(&rules, catalog)?;
            info!(
                level = level.level(),
                itemsets = level.len(),
                rules = rules.len(),
                "rules written"
            );

            summary.levels.push(LevelSummary {
                level: level.level(),
                frequent_itemsets: level.len(),
                rules: writer.rules_written(),
                min_support: thresholds.min_support.min_count(summary.transactions),
                min_confidence: thresholds.min_confidence,
                report: writer.path().to_path_buf(),
            });
        }

        summary.metadata.record_end();
        if let Some(path) = self.output.summary_path() {
            write_json_summary(path, &summary)?;
        }

        info!(
            levels = summary.level_counts.len(),
            rules = summary.total_rules(),
            aborted = summary.aborted.is_some(),
            "mining run finished"
        );
        Ok(summary)
    }
}
