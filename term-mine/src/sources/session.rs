//! Sources backed by tables registered in a DataFusion `SessionContext`.

use arrow::array::{
    Array, BooleanArray, Float64Array, Int32Array, Int64Array, LargeStringArray, StringArray,
    StringViewArray,
};
use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use async_trait::async_trait;
use datafusion::prelude::SessionContext;
use std::fmt;
use tracing::instrument;

use super::{RowSource, TransactionSource};
use crate::error::{MineError, Result};
use crate::itemsets::TransactionSet;
use crate::log_data_op;
use crate::logging::{truncate_field, LogConfig};
use crate::security::SqlSecurity;
use crate::table::{Row, Schema, Value};

/// Serves rows of any table registered in a [`SessionContext`].
///
/// Each batch is one `SELECT ... ORDER BY ... LIMIT ... OFFSET ...` query.
/// Pages are ordered on every column so consecutive queries cut one total
/// order, whatever the session's partitioning; rows equal on every column
/// are interchangeable. Column names are validated and quoted; the table
/// name is validated and left unquoted so it resolves the same way it was
/// registered.
///
/// # Examples
///
/// ```rust,ignore
/// use datafusion::prelude::*;
/// use term_mine::sources::{DataFusionSource, RowSource};
///
/// # async fn example() -> term_mine::error::Result<()> {
/// let ctx = SessionContext::new();
/// ctx.register_csv("trip", "data/trip.csv", CsvReadOptions::new()).await?;
/// let source = DataFusionSource::new(ctx);
/// let rows = source.fetch_batch("trip", 0, 1000).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DataFusionSource {
    ctx: SessionContext,
    log_config: LogConfig,
}

impl fmt::Debug for DataFusionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataFusionSource")
            .field("session_id", &self.ctx.session_id())
            .finish()
    }
}

impl DataFusionSource {
    /// Creates a source over `ctx`.
    pub fn new(ctx: SessionContext) -> Self {
        Self {
            ctx,
            log_config: LogConfig::default(),
        }
    }

    /// Sets the logging configuration.
    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    /// The session this source queries.
    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    /// Builds the query for one batch of `schema`'s table, ordered on every
    /// column.
    pub fn batch_query(schema: &Schema, offset: usize, limit: usize) -> Result<String> {
        SqlSecurity::validate_identifier(schema.table())?;
        let columns = schema
            .ids()
            .map(|id| SqlSecurity::escape_identifier(schema.name(id)))
            .collect::<Result<Vec<_>>>()?;
        let columns = columns.join(", ");
        Ok(format!(
            "SELECT {columns} FROM {} ORDER BY {columns} LIMIT {limit} OFFSET {offset}",
            schema.table()
        ))
    }

    async fn run_query(&self, sql: &str) -> Result<Vec<RecordBatch>> {
        log_data_op!(
            self.log_config,
            sql = %truncate_field(sql, self.log_config.max_field_length),
            "executing query"
        );
        let batches = self.ctx.sql(sql).await?.collect().await?;
        Ok(batches)
    }
}

#[async_trait]
impl RowSource for DataFusionSource {
    async fn schema(&self, table: &str) -> Result<Schema> {
        SqlSecurity::validate_identifier(table)?;
        let provider = self.ctx.table_provider(table).await.map_err(|e| {
            MineError::data_source_with_source(
                "DataFusion",
                format!("table '{table}' is not registered"),
                Box::new(e),
            )
        })?;
        let arrow_schema = provider.schema();
        Schema::new(
            table,
            arrow_schema.fields().iter().map(|field| field.name().to_string()),
        )
    }

    #[instrument(skip(self))]
    async fn fetch_batch(&self, table: &str, offset: usize, limit: usize) -> Result<Vec<Row>> {
        let schema = self.schema(table).await?;
        let sql = Self::batch_query(&schema, offset, limit)?;
        let batches = self.run_query(&sql).await?;

        let mut rows = Vec::with_capacity(limit);
        for batch in &batches {
            if batch.num_columns() != schema.len() {
                return Err(MineError::data_source(
                    "DataFusion",
                    format!(
                        "query returned {} columns, table '{table}' has {}",
                        batch.num_columns(),
                        schema.len()
                    ),
                ));
            }
            rows.extend(batch_rows(batch)?);
        }
        Ok(rows)
    }

    fn description(&self) -> String {
        format!("DataFusion session {}", self.ctx.session_id())
    }
}

/// Serves transactions stored one `(transaction id, item label)` per row.
///
/// Rows with a null id or a null item are ignored.
#[derive(Clone)]
pub struct DataFusionTransactionSource {
    source: DataFusionSource,
    table: String,
    tid_column: String,
    item_column: String,
}

impl fmt::Debug for DataFusionTransactionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataFusionTransactionSource")
            .field("table", &self.table)
            .field("tid_column", &self.tid_column)
            .field("item_column", &self.item_column)
            .finish()
    }
}

impl DataFusionTransactionSource {
    /// Creates a transaction source over `table` in `ctx`.
    pub fn new(
        ctx: SessionContext,
        table: impl Into<String>,
        tid_column: impl Into<String>,
        item_column: impl Into<String>,
    ) -> Self {
        Self {
            source: DataFusionSource::new(ctx),
            table: table.into(),
            tid_column: tid_column.into(),
            item_column: item_column.into(),
        }
    }

    /// Sets the logging configuration.
    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.source = self.source.with_log_config(log_config);
        self
    }

    /// The query loading every pair.
    pub fn query(&self) -> Result<String> {
        SqlSecurity::validate_identifier(&self.table)?;
        Ok(format!(
            "SELECT {}, {} FROM {}",
            SqlSecurity::escape_identifier(&self.tid_column)?,
            SqlSecurity::escape_identifier(&self.item_column)?,
            self.table
        ))
    }
}

#[async_trait]
impl TransactionSource for DataFusionTransactionSource {
    #[instrument(skip(self), fields(table = %self.table))]
    async fn fetch_transactions(&self) -> Result<TransactionSet> {
        let sql = self.query()?;
        let batches = self.source.run_query(&sql).await?;

        let mut pairs = Vec::new();
        for batch in &batches {
            for row in batch_rows(batch)? {
                if let [tid, item] = row.values() {
                    if !tid.is_null() && !item.is_null() {
                        pairs.push((tid.to_string(), item.to_string()));
                    }
                }
            }
        }

        log_data_op!(
            self.source.log_config,
            table = %self.table,
            pairs = pairs.len(),
            "loaded transaction pairs"
        );
        Ok(TransactionSet::from_pairs(pairs))
    }

    fn description(&self) -> String {
        format!(
            "DataFusion transactions {}({}, {})",
            self.table, self.tid_column, self.item_column
        )
    }
}

/// Converts a record batch into rows, column order preserved.
fn batch_rows(batch: &RecordBatch) -> Result<Vec<Row>> {
    let columns = batch
        .columns()
        .iter()
        .map(|column| column_values(column.as_ref()))
        .collect::<Result<Vec<_>>>()?;

    let mut columns: Vec<_> = columns.into_iter().map(Vec::into_iter).collect();
    let rows = (0..batch.num_rows())
        .map(|_| {
            Row::new(
                columns
                    .iter_mut()
                    .map(|column| column.next().unwrap_or(Value::Null))
                    .collect(),
            )
        })
        .collect();
    Ok(rows)
}

fn column_values(array: &dyn Array) -> Result<Vec<Value>> {
    fn collect<F: Fn(usize) -> Value>(array: &dyn Array, value: F) -> Vec<Value> {
        (0..array.len())
            .map(|i| if array.is_null(i) { Value::Null } else { value(i) })
            .collect()
    }

    let any = array.as_any();
    if let Some(values) = any.downcast_ref::<Int64Array>() {
        return Ok(collect(array, |i| Value::Int(values.value(i))));
    }
    if let Some(values) = any.downcast_ref::<Int32Array>() {
        return Ok(collect(array, |i| Value::Int(i64::from(values.value(i)))));
    }
    if let Some(values) = any.downcast_ref::<Float64Array>() {
        return Ok(collect(array, |i| Value::Float(values.value(i))));
    }
    if let Some(values) = any.downcast_ref::<BooleanArray>() {
        return Ok(collect(array, |i| Value::Bool(values.value(i))));
    }
    if let Some(values) = any.downcast_ref::<StringArray>() {
        return Ok(collect(array, |i| Value::Text(values.value(i).to_string())));
    }
    if let Some(values) = any.downcast_ref::<LargeStringArray>() {
        return Ok(collect(array, |i| Value::Text(values.value(i).to_string())));
    }
    if let Some(values) = any.downcast_ref::<StringViewArray>() {
        return Ok(collect(array, |i| Value::Text(values.value(i).to_string())));
    }

    // Dates, decimals and the rest keep their display form.
    let formatter = ArrayFormatter::try_new(array, &FormatOptions::default())?;
    Ok(collect(array, |i| Value::Text(formatter.value(i).to_string())))
}
