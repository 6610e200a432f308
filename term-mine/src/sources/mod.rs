//! Row and transaction sources for the mining engines.
//!
//! The engines work on data already materialized in memory. Sources are the
//! seam where that data is fetched: [`RowSource`] serves one table's rows in
//! bounded batches, [`TransactionSource`] serves `(transaction_id, item)`
//! pairs. Both are async so that SQL-backed sources can run their queries on
//! DataFusion without blocking.

use async_trait::async_trait;
use std::fmt::Debug;
use tracing::{debug, instrument};

use crate::error::{MineError, Result};
use crate::itemsets::TransactionSet;
use crate::table::{Row, Schema, Table};

mod memory;
mod session;

pub use memory::MemorySource;
pub use session::{DataFusionSource, DataFusionTransactionSource};

/// A source of relational rows, fetched one table and one batch at a time.
///
/// # Examples
///
/// ```rust
/// use term_mine::sources::{MemorySource, RowSource};
/// use term_mine::table::{Table, Value};
///
/// # #[tokio::main]
/// # async fn main() {
/// let mut source = MemorySource::new();
/// source.add_table(Table::from_values("t", &["a"], vec![vec![Value::Int(1)]]).unwrap());
/// let rows = source.fetch_batch("t", 0, 10).await.unwrap();
/// assert_eq!(rows.len(), 1);
/// # }
/// ```
#[async_trait]
pub trait RowSource: Debug + Send + Sync {
    /// Returns the attribute names of `table`.
    async fn schema(&self, table: &str) -> Result<Schema>;

    /// Fetches up to `limit` rows starting at row `offset`.
    ///
    /// An empty batch means the table is exhausted.
    async fn fetch_batch(&self, table: &str, offset: usize, limit: usize) -> Result<Vec<Row>>;

    /// Returns a human-readable description of this source.
    fn description(&self) -> String;
}

/// A source of transaction records.
#[async_trait]
pub trait TransactionSource: Debug + Send + Sync {
    /// Loads every `(transaction_id, item_label)` pair into a [`TransactionSet`].
    async fn fetch_transactions(&self) -> Result<TransactionSet>;

    /// Returns a human-readable description of this source.
    fn description(&self) -> String;
}

/// Loads one table from `source` in batches of `batch_size` rows.
///
/// Fetching stops at the first empty batch or once `max_rows` rows are held.
#[instrument(skip(source), fields(source = %source.description()))]
pub async fn load_table(
    source: &dyn RowSource,
    table: &str,
    batch_size: usize,
    max_rows: Option<usize>,
) -> Result<Table> {
    if batch_size == 0 {
        return Err(MineError::Configuration(
            "batch_size must be at least 1".to_string(),
        ));
    }

    let schema = source.schema(table).await?;
    let mut loaded = Table::empty(schema);
    let mut batches = 0usize;

    loop {
        let offset = loaded.num_rows();
        let limit = match max_rows {
            Some(max) if offset >= max => break,
            Some(max) => batch_size.min(max - offset),
            None => batch_size,
        };

        let batch = source.fetch_batch(table, offset, limit).await?;
        if batch.is_empty() {
            break;
        }
        batches += 1;
        debug!(table, offset, rows = batch.len(), "fetched batch");
        loaded.extend(batch)?;
    }

    debug!(table, rows = loaded.num_rows(), batches, "table loaded");
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Value;

    fn source(rows: i64) -> MemorySource {
        let values = (0..rows).map(|i| vec![Value::Int(i), Value::Int(i % 2)]).collect();
        let mut source = MemorySource::new();
        source.add_table(Table::from_values("t", &["a", "b"], values).unwrap());
        source
    }

    #[tokio::test]
    async fn test_load_table_in_batches() {
        let source = source(7);
        let table = load_table(&source, "t", 3, None).await.unwrap();
        assert_eq!(table.num_rows(), 7);
        // 3 + 3 + 1, then an empty batch.
        assert_eq!(source.fetch_count(), 4);
        assert_eq!(table.rows()[6], Row::new(vec![Value::Int(6), Value::Int(0)]));
    }

    #[tokio::test]
    async fn test_load_table_respects_max_rows() {
        let source = source(10);
        let table = load_table(&source, "t", 4, Some(6)).await.unwrap();
        assert_eq!(table.num_rows(), 6);
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_load_unknown_table_is_a_source_error() {
        let err = load_table(&source(1), "missing", 10, None).await.unwrap_err();
        assert!(matches!(err, MineError::DataSource { .. }));
        assert!(err.is_unit_local());
    }

    #[tokio::test]
    async fn test_zero_batch_size_is_rejected() {
        let err = load_table(&source(1), "t", 0, None).await.unwrap_err();
        assert!(matches!(err, MineError::Configuration(_)));
    }
}
