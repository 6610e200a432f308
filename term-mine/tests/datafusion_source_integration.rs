//! Sources and runners over CSV files registered in a DataFusion session.

use datafusion::prelude::{CsvReadOptions, SessionConfig, SessionContext};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use term_mine::config::{MiningConfig, OutputConfig, TableSpec};
use term_mine::error::MineError;
use term_mine::runner::{DependencyRunner, MiningRunner};
use term_mine::sources::{
    load_table, DataFusionSource, DataFusionTransactionSource, RowSource, TransactionSource,
};
use term_mine::table::Value;

const TRIP_CSV: &str = "\
id,zone,borough,fare
1,A,X,10.5
2,A,X,12.0
3,B,X,10.5
4,C,Y,12.0
5,C,Y,12.0
";

const BASKETS_CSV: &str = "\
tid,item
1,fare:low
1,zone:A
2,fare:low
2,zone:A
3,fare:low
3,zone:B
4,fare:high
4,zone:A
";

async fn session_with(dir: &Path, tables: &[(&str, &str)]) -> SessionContext {
    register_all(SessionContext::new(), dir, tables).await
}

async fn register_all(ctx: SessionContext, dir: &Path, tables: &[(&str, &str)]) -> SessionContext {
    for (name, contents) in tables {
        let path = dir.join(format!("{name}.csv"));
        fs::write(&path, contents).unwrap();
        ctx.register_csv(*name, path.to_str().unwrap(), CsvReadOptions::new())
            .await
            .unwrap();
    }
    ctx
}

#[tokio::test]
async fn test_schema_and_batches_from_csv() {
    let dir = TempDir::new().unwrap();
    let ctx = session_with(dir.path(), &[("trip", TRIP_CSV)]).await;
    let source = DataFusionSource::new(ctx);

    let schema = source.schema("trip").await.unwrap();
    assert_eq!(schema.table(), "trip");
    assert_eq!(schema.len(), 4);
    assert_eq!(schema.name(schema.resolve("fare").unwrap()), "fare");

    let first = source.fetch_batch("trip", 0, 2).await.unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(
        first[0].values(),
        &[
            Value::Int(1),
            Value::from("A"),
            Value::from("X"),
            Value::Float(10.5)
        ]
    );

    let tail = source.fetch_batch("trip", 4, 2).await.unwrap();
    assert_eq!(tail.len(), 1);
    assert_eq!(tail[0].values()[0], Value::Int(5));

    assert!(source.fetch_batch("trip", 10, 2).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_load_table_in_batches() {
    let dir = TempDir::new().unwrap();
    let ctx = session_with(dir.path(), &[("trip", TRIP_CSV)]).await;
    let source = DataFusionSource::new(ctx);

    let table = load_table(&source, "trip", 2, None).await.unwrap();
    assert_eq!(table.num_rows(), 5);
    let id = table.schema().resolve("id").unwrap();
    let ids: Vec<&Value> = (0..table.num_rows()).map(|row| table.value(row, id)).collect();
    assert_eq!(
        ids,
        vec![
            &Value::Int(1),
            &Value::Int(2),
            &Value::Int(3),
            &Value::Int(4),
            &Value::Int(5)
        ]
    );

    let capped = load_table(&source, "trip", 2, Some(3)).await.unwrap();
    assert_eq!(capped.num_rows(), 3);
}

#[tokio::test]
async fn test_batches_cover_every_row_once_across_partitions() {
    let rows = 20_000;
    let mut csv = String::from("zone,id,fare\n");
    for i in 0..rows {
        csv.push_str(&format!("{},{},{}\n", i % 7, i, (i * 13) % 101));
    }

    let dir = TempDir::new().unwrap();
    let config = SessionConfig::new()
        .with_target_partitions(8)
        .with_repartition_file_scans(true)
        .with_repartition_file_min_size(1);
    let ctx = register_all(
        SessionContext::new_with_config(config),
        dir.path(),
        &[("big", csv.as_str())],
    )
    .await;
    let source = DataFusionSource::new(ctx);

    let table = load_table(&source, "big", 777, None).await.unwrap();
    assert_eq!(table.num_rows(), rows);

    let id = table.schema().resolve("id").unwrap();
    let ids: HashSet<&Value> = (0..table.num_rows()).map(|row| table.value(row, id)).collect();
    assert_eq!(ids.len(), rows);

    let zone = table.schema().resolve("zone").unwrap();
    let zones: Vec<&Value> = (0..table.num_rows()).map(|row| table.value(row, zone)).collect();
    assert_eq!(zones.first(), Some(&&Value::Int(0)));
    assert_eq!(zones.last(), Some(&&Value::Int(6)));
}

#[tokio::test]
async fn test_unregistered_and_unsafe_tables_are_rejected() {
    let dir = TempDir::new().unwrap();
    let ctx = session_with(dir.path(), &[("trip", TRIP_CSV)]).await;
    let source = DataFusionSource::new(ctx);

    let missing = source.schema("nowhere").await.unwrap_err();
    assert!(matches!(missing, MineError::DataSource { .. }));
    assert!(missing.is_unit_local());

    let unsafe_name = source.fetch_batch("trip; DROP TABLE trip", 0, 1).await;
    assert!(matches!(unsafe_name, Err(MineError::SecurityError(_))));
}

#[tokio::test]
async fn test_transactions_from_csv() {
    let dir = TempDir::new().unwrap();
    let ctx = session_with(dir.path(), &[("baskets", BASKETS_CSV)]).await;
    let source = DataFusionTransactionSource::new(ctx, "baskets", "tid", "item");

    assert_eq!(source.query().unwrap(), "SELECT \"tid\", \"item\" FROM baskets");

    let transactions = source.fetch_transactions().await.unwrap();
    assert_eq!(transactions.num_transactions(), 4);
    let catalog = transactions.catalog();
    assert_eq!(catalog.len(), 4);
    let zone_a = catalog.id("zone:A").unwrap();
    let fare_low = catalog.id("fare:low").unwrap();
    assert_eq!(transactions.item_support(zone_a), 3);
    assert_eq!(transactions.count_support(&[fare_low, zone_a]), 2);
}

#[tokio::test]
async fn test_runners_end_to_end_over_csv() {
    let dir = TempDir::new().unwrap();
    let ctx = session_with(dir.path(), &[("trip", TRIP_CSV), ("baskets", BASKETS_CSV)]).await;

    let mut config = MiningConfig {
        output: OutputConfig::in_dir(dir.path().join("reports")),
        ..MiningConfig::default()
    };
    config.fd.batch_size = 2;
    config.fd.tables = vec![TableSpec::new("trip").with_primary_key("id")];

    let summary = DependencyRunner::new(&config)
        .run(&DataFusionSource::new(ctx.clone()))
        .await
        .unwrap();
    assert!(summary.is_success());
    assert_eq!(summary.table("trip").unwrap().rows, 5);

    let valid = fs::read_to_string(&summary.valid_report).unwrap();
    assert!(valid.contains("id -> zone\n"));
    assert!(valid.contains("zone -> borough\n"));
    assert!(!valid.contains("borough -> zone\n"));

    let source = DataFusionTransactionSource::new(ctx, "baskets", "tid", "item");
    let mining = MiningRunner::new(&config).run(&source).await.unwrap();
    assert_eq!(mining.level_counts.get(&1), Some(&2));
    assert_eq!(mining.level_counts.get(&2), Some(&1));
    // {fare:low, zone:A} has support 2: fare:low -> zone:A at 2/3, zone:A -> fare:low at 2/3.
    assert_eq!(mining.total_rules(), 0);
    assert_eq!(
        fs::read_to_string(dir.path().join("reports").join("rules_2.txt")).unwrap(),
        ""
    );
}
