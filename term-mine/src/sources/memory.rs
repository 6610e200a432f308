//! In-memory tables and transactions.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{RowSource, TransactionSource};
use crate::error::{MineError, Result};
use crate::itemsets::TransactionSet;
use crate::table::{Row, Schema, Table};

/// Serves tables and transaction pairs held in memory.
///
/// Mostly useful for tests and for callers that already hold their data.
#[derive(Debug, Default)]
pub struct MemorySource {
    tables: BTreeMap<String, Table>,
    transactions: Vec<(String, String)>,
    fetches: AtomicUsize,
}

impl MemorySource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a table under its schema's table name.
    pub fn add_table(&mut self, table: Table) {
        self.tables.insert(table.schema().table().to_string(), table);
    }

    /// Builder form of [`MemorySource::add_table`].
    pub fn with_table(mut self, table: Table) -> Self {
        self.add_table(table);
        self
    }

    /// Appends `(transaction_id, item_label)` pairs.
    pub fn add_transactions<I, T, L>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (T, L)>,
        T: Into<String>,
        L: Into<String>,
    {
        self.transactions
            .extend(pairs.into_iter().map(|(tid, item)| (tid.into(), item.into())));
    }

    /// Builder form of [`MemorySource::add_transactions`].
    pub fn with_transactions<I, T, L>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (T, L)>,
        T: Into<String>,
        L: Into<String>,
    {
        self.add_transactions(pairs);
        self
    }

    /// Number of `fetch_batch` calls served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    fn table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| MineError::data_source("Memory", format!("unknown table '{name}'")))
    }
}

#[async_trait]
impl RowSource for MemorySource {
    async fn schema(&self, table: &str) -> Result<Schema> {
        Ok(self.table(table)?.schema().clone())
    }

    async fn fetch_batch(&self, table: &str, offset: usize, limit: usize) -> Result<Vec<Row>> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let rows = self.table(table)?.rows();
        let start = offset.min(rows.len());
        let end = offset.saturating_add(limit).min(rows.len());
        Ok(rows[start..end].to_vec())
    }

    fn description(&self) -> String {
        format!(
            "Memory source ({} tables, {} transaction pairs)",
            self.tables.len(),
            self.transactions.len()
        )
    }
}

#[async_trait]
impl TransactionSource for MemorySource {
    async fn fetch_transactions(&self) -> Result<TransactionSet> {
        Ok(TransactionSet::from_pairs(self.transactions.iter().cloned()))
    }

    fn description(&self) -> String {
        RowSource::description(self)
    }
}
