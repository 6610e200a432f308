//! term-mine command line.
//!
//! Discovers functional dependencies in CSV tables, or mines association
//! rules from a CSV of `(transaction id, item label)` rows.

use clap::{Parser, Subcommand};
use datafusion::prelude::{CsvReadOptions, SessionConfig, SessionContext};
use std::path::{Path, PathBuf};
use std::process;
use term_mine::config::{MiningConfig, TableSpec};
use term_mine::error::{ErrorContext, MineError, Result};
use term_mine::logging::setup::{init_logging, LoggingConfig};
use term_mine::logging::LogConfig;
use term_mine::runner::{DependencyRunner, MiningRunner};
use term_mine::security::SqlSecurity;
use term_mine::sources::{DataFusionSource, DataFusionTransactionSource};

/// Table name the transaction CSV is registered under.
const TRANSACTIONS_TABLE: &str = "transactions";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Log every classified candidate and accepted rule
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Discover functional dependencies in one or more CSV tables
    Fds {
        /// JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Table to load, as NAME=PATH (repeatable)
        #[arg(long = "csv", value_parser = parse_table_csv, required = true)]
        tables: Vec<(String, PathBuf)>,

        /// Directory for the reports, overriding the configuration
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Mine frequent itemsets and association rules from a transaction CSV
    Rules {
        /// JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// CSV with one (transaction id, item label) pair per row
        #[arg(long)]
        csv: PathBuf,

        /// Column holding the transaction id
        #[arg(long, default_value = "tid")]
        tid_column: String,

        /// Column holding the item label
        #[arg(long, default_value = "item")]
        item_column: String,

        /// Directory for the reports, overriding the configuration
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

fn parse_table_csv(value: &str) -> std::result::Result<(String, PathBuf), String> {
    let (name, path) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=PATH, got '{value}'"))?;
    SqlSecurity::validate_identifier(name).map_err(|e| e.to_string())?;
    Ok((name.to_string(), PathBuf::from(path)))
}

fn load_config(path: Option<&Path>, output_dir: Option<PathBuf>) -> Result<MiningConfig> {
    let mut config = match path {
        Some(path) => MiningConfig::from_json_file(path)?,
        None => MiningConfig::default(),
    };
    if let Some(dir) = output_dir {
        config.output.dir = dir;
    }
    Ok(config)
}

/// Session whose scans run in a single partition, keeping each paged
/// query's sort a single stream.
fn session() -> SessionContext {
    SessionContext::new_with_config(SessionConfig::new().with_target_partitions(1))
}

async fn register_csv(ctx: &SessionContext, table: &str, path: &Path) -> Result<()> {
    let path_str = path
        .to_str()
        .ok_or_else(|| MineError::InvalidInput(format!("non UTF-8 path: {}", path.display())))?;
    ctx.register_csv(table, path_str, CsvReadOptions::new())
        .await
        .with_context(|| format!("Failed to register '{}' as {table}", path.display()))
}

async fn run(args: Args) -> Result<bool> {
    let log_config = if args.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };

    match args.command {
        Command::Fds {
            config,
            tables,
            output_dir,
        } => {
            let mut config = load_config(config.as_deref(), output_dir)?;
            let ctx = session();
            for (name, path) in &tables {
                register_csv(&ctx, name, path).await?;
            }
            if config.fd.tables.is_empty() {
                config.fd.tables = tables.iter().map(|(name, _)| TableSpec::new(name)).collect();
            }

            let source = DataFusionSource::new(ctx).with_log_config(log_config.clone());
            let summary = DependencyRunner::new(&config)
                .with_log_config(log_config)
                .run(&source)
                .await?;

            for report in &summary.tables {
                println!(
                    "{}: {} rows, {} valid, {} invalid, {} pruned",
                    report.table,
                    report.rows,
                    report.valid,
                    report.invalid,
                    report.pruned_trivial + report.pruned_inherited
                );
            }
            for failure in &summary.failures {
                eprintln!("{}: failed: {}", failure.unit, failure.error);
            }
            println!("valid dependencies: {}", summary.valid_report.display());
            println!("pruned dependencies: {}", summary.pruned_report.display());
            Ok(summary.is_success())
        }
        Command::Rules {
            config,
            csv,
            tid_column,
            item_column,
            output_dir,
        } => {
            let config = load_config(config.as_deref(), output_dir)?;
            let ctx = session();
            register_csv(&ctx, TRANSACTIONS_TABLE, &csv).await?;

            let source =
                DataFusionTransactionSource::new(ctx, TRANSACTIONS_TABLE, tid_column, item_column)
                    .with_log_config(log_config.clone());
            let summary = MiningRunner::new(&config)
                .with_log_config(log_config)
                .run(&source)
                .await?;

            println!(
                "{} transactions, {} items, min support {}",
                summary.transactions, summary.items, summary.min_support
            );
            for (level, count) in &summary.level_counts {
                println!("level {level}: {count} frequent itemsets");
            }
            for level in &summary.levels {
                println!(
                    "level {}: {} rules -> {}",
                    level.level,
                    level.rules,
                    level.report.display()
                );
            }
            if let Some(aborted) = &summary.aborted {
                eprintln!("{}: aborted: {}", aborted.unit, aborted.error);
            }
            Ok(summary.aborted.is_none())
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let logging = if args.verbose {
        LoggingConfig::development()
    } else {
        LoggingConfig::default()
    }
    .with_json_format(args.json_logs);
    if let Err(e) = init_logging(logging) {
        eprintln!("failed to initialize logging: {e}");
    }

    match run(args).await {
        Ok(true) => {}
        Ok(false) => process::exit(2),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}
