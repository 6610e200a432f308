//! Report files for discovered dependencies and rules.
//!
//! Every text report is opened once per run, truncated, and then appended to
//! one flushed line at a time. A run that stops part way leaves each file
//! holding every classification completed before the stop.
//!
//! # Examples
//!
//! ```rust,no_run
//! use term_mine::config::OutputConfig;
//! use term_mine::report::DependencyReportSink;
//!
//! let output = OutputConfig::in_dir("reports");
//! let sink = DependencyReportSink::create(&output).unwrap();
//! assert_eq!(sink.valid_lines(), 0);
//! ```

use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::OutputConfig;
use crate::error::Result;
use crate::fd::{Classification, ClassificationSink};
use crate::itemsets::{ItemCatalog, Rule};

/// Title line of the pruned dependency report.
pub const PRUNED_TITLE: &str = "Pruned Functional Dependencies";

/// Title line of the valid dependency report.
pub const VALID_TITLE: &str = "Valid Functional Dependencies";

/// Header opening a table's section in the dependency reports.
pub fn section_header(table: &str) -> String {
    format!("----------- Functional Dependencies for {table} -----------")
}

/// An append-only text report.
#[derive(Debug)]
pub struct ReportWriter {
    path: PathBuf,
    file: File,
    lines: usize,
}

impl ReportWriter {
    /// Creates (or truncates) the report at `path` and writes `title` if given.
    ///
    /// Missing parent directories are created.
    pub fn create(path: impl AsRef<Path>, title: Option<&str>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        let mut writer = Self {
            path,
            file,
            lines: 0,
        };
        if let Some(title) = title {
            writer.write_raw(title)?;
        }
        debug!(path = %writer.path.display(), "report opened");
        Ok(writer)
    }

    /// Appends one report line and flushes it.
    pub fn write_line(&mut self, line: &str) -> Result<()> {
        self.write_raw(line)?;
        self.lines += 1;
        Ok(())
    }

    /// Appends a section header. Headers are not counted as report lines.
    pub fn write_header(&mut self, header: &str) -> Result<()> {
        self.write_raw(header)
    }

    fn write_raw(&mut self, text: &str) -> Result<()> {
        writeln!(self.file, "{text}")?;
        self.file.flush()?;
        Ok(())
    }

    /// Where the report is written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Report lines written so far, excluding the title and headers.
    pub fn lines_written(&self) -> usize {
        self.lines
    }
}

/// Streams dependency classifications into the pruned and valid reports.
///
/// Valid dependencies go to the valid report; invalid and pruned ones go to
/// the pruned report. Both files get a section header per table.
#[derive(Debug)]
pub struct DependencyReportSink {
    pruned: ReportWriter,
    valid: ReportWriter,
}

impl DependencyReportSink {
    /// Truncates both reports named in `output` and writes their titles.
    pub fn create(output: &OutputConfig) -> Result<Self> {
        Ok(Self {
            pruned: ReportWriter::create(output.pruned_path(), Some(PRUNED_TITLE))?,
            valid: ReportWriter::create(output.valid_path(), Some(VALID_TITLE))?,
        })
    }

    /// Lines written to the pruned report.
    pub fn pruned_lines(&self) -> usize {
        self.pruned.lines_written()
    }

    /// Lines written to the valid report.
    pub fn valid_lines(&self) -> usize {
        self.valid.lines_written()
    }

    /// Path of the pruned report.
    pub fn pruned_path(&self) -> &Path {
        self.pruned.path()
    }

    /// Path of the valid report.
    pub fn valid_path(&self) -> &Path {
        self.valid.path()
    }
}

impl ClassificationSink for DependencyReportSink {
    fn begin_table(&mut self, table: &str) -> Result<()> {
        let header = section_header(table);
        self.pruned.write_header(&header)?;
        self.valid.write_header(&header)
    }

    fn record(&mut self, classification: &Classification) -> Result<()> {
        let line = classification.report_line();
        if classification.is_valid() {
            self.valid.write_line(&line)
        } else {
            self.pruned.write_line(&line)
        }
    }
}

/// Writes the rules of one lattice level, one `[a,b] -> [c]` line each.
#[derive(Debug)]
pub struct RuleReportWriter {
    level: usize,
    writer: ReportWriter,
}

impl RuleReportWriter {
    /// Truncates the rule report for `level`.
    pub fn create(output: &OutputConfig, level: usize) -> Result<Self> {
        Ok(Self {
            level,
            writer: ReportWriter::create(output.rules_path(level), None)?,
        })
    }

    /// The lattice level this report covers.
    pub fn level(&self) -> usize {
        self.level
    }

    /// Appends one rule.
    pub fn write_rule(&mut self, rule: &Rule, catalog: &ItemCatalog) -> Result<()> {
        self.writer.write_line(&rule.format(catalog))
    }

    /// Appends every rule in order.
    pub fn write_rules(&mut self, rules: &[Rule], catalog: &ItemCatalog) -> Result<()> {
        for rule in rules {
            self.write_rule(rule, catalog)?;
        }
        Ok(())
    }

    /// Rules written so far.
    pub fn rules_written(&self) -> usize {
        self.writer.lines_written()
    }

    /// Where the report is written.
    pub fn path(&self) -> &Path {
        self.writer.path()
    }
}

/// Serializes `summary` as pretty JSON into `path`, replacing any previous file.
pub fn write_json_summary<T: Serialize>(path: impl AsRef<Path>, summary: &T) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(path, json)?;
    debug!(path = %path.display(), "summary written");
    Ok(())
}
