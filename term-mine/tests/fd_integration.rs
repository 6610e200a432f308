//! End-to-end functional dependency discovery on small in-memory tables.

use term_mine::config::{EmptyTablePolicy, FdConfig, TableSpec};
use term_mine::fd::{Classification, FdDiscoverer, PartitionEngine, PruneReason};
use term_mine::table::{Table, Value};

fn trip_table() -> Table {
    Table::from_values(
        "trip",
        &["id", "zone", "borough", "fare"],
        vec![
            vec![Value::Int(1), Value::from("A"), Value::from("X"), Value::Float(10.0)],
            vec![Value::Int(2), Value::from("A"), Value::from("X"), Value::Float(12.0)],
            vec![Value::Int(3), Value::from("B"), Value::from("X"), Value::Float(10.0)],
            vec![Value::Int(4), Value::from("C"), Value::from("Y"), Value::Float(12.0)],
        ],
    )
    .unwrap()
}

fn discover(table: &Table, spec: &TableSpec, config: &FdConfig) -> Vec<String> {
    let mut discoverer = FdDiscoverer::new(table, spec, config).unwrap();
    let report = discoverer.discover(&mut Vec::new()).unwrap();
    report
        .classifications
        .iter()
        .map(Classification::report_line)
        .collect()
}

#[test]
fn test_trip_table_with_primary_key() {
    let table = trip_table();
    let spec = TableSpec::new("trip").with_primary_key("id");
    let lines = discover(&table, &spec, &FdConfig::default());

    assert_eq!(
        lines,
        vec![
            "id -> zone",
            "id -> borough",
            "id -> fare",
            "zone -> id (invalid)",
            "zone -> borough",
            "zone -> fare (invalid)",
            "borough -> id (invalid)",
            "borough -> zone (invalid)",
            "borough -> fare (invalid)",
            "fare -> id (invalid)",
            "fare -> zone (invalid)",
            "fare -> borough (invalid)",
            "id, zone -> primary key is trivial",
            "id, borough -> primary key is trivial",
            "id, fare -> primary key is trivial",
            "zone, borough -> id (negative result)",
            "zone, borough -> fare (negative result)",
            "zone, fare -> id (negative result)",
            "zone, fare -> borough (negative result)",
            "borough, fare -> id (negative result)",
            "borough, fare -> zone (negative result)",
        ]
    );
}

#[test]
fn test_composite_determinant_is_pruned_by_invalid_subset() {
    let table = Table::from_values(
        "t",
        &["a", "b", "c"],
        vec![
            vec![Value::Int(1), Value::Int(1), Value::Int(1)],
            vec![Value::Int(1), Value::Int(2), Value::Int(2)],
            vec![Value::Int(2), Value::Int(1), Value::Int(3)],
        ],
    )
    .unwrap();
    let config = FdConfig {
        max_lhs_size: 3,
        ..FdConfig::default()
    };

    // {a, b} determines c on these rows, but a -> c fails first.
    let mut engine = PartitionEngine::new(&table);
    let schema = table.schema();
    assert!(engine
        .check_dependency(&schema.resolve_set(&["a", "b"]).unwrap(), schema.resolve("c").unwrap())
        .unwrap());

    let lines = discover(&table, &TableSpec::new("t"), &config);
    assert_eq!(
        lines,
        vec![
            "a -> b (invalid)",
            "a -> c (invalid)",
            "b -> a (invalid)",
            "b -> c (invalid)",
            "c -> a",
            "c -> b",
            "a, b -> c (negative result)",
            "a, c -> b (negative result)",
            "b, c -> a (negative result)",
        ]
    );
}

#[test]
fn test_composite_determinant_is_found_when_subsets_hold() {
    // a and b each determine c; the pair is tested and holds.
    let table = Table::from_values(
        "t",
        &["a", "b", "c"],
        vec![
            vec![Value::Int(1), Value::Int(1), Value::Int(7)],
            vec![Value::Int(1), Value::Int(1), Value::Int(7)],
            vec![Value::Int(2), Value::Int(3), Value::Int(8)],
            vec![Value::Int(3), Value::Int(3), Value::Int(8)],
        ],
    )
    .unwrap();

    let lines = discover(&table, &TableSpec::new("t"), &FdConfig::default());
    assert!(lines.contains(&"a -> c".to_string()));
    assert!(lines.contains(&"b -> c".to_string()));
    assert!(lines.contains(&"a, b -> c".to_string()));
}

#[test]
fn test_lhs_size_bound_limits_search() {
    let table = trip_table();
    let config = FdConfig {
        max_lhs_size: 1,
        ..FdConfig::default()
    };
    let lines = discover(&table, &TableSpec::new("trip"), &config);
    assert_eq!(lines.len(), 12);
    assert!(lines.iter().all(|line| !line.contains(", ")));
}

#[test]
fn test_nulls_group_together() {
    let table = Table::from_values(
        "t",
        &["x", "y", "z"],
        vec![
            vec![Value::Null, Value::Int(5), Value::Int(5)],
            vec![Value::Null, Value::Int(5), Value::Int(6)],
            vec![Value::Int(1), Value::Int(6), Value::Int(6)],
        ],
    )
    .unwrap();

    let mut engine = PartitionEngine::new(&table);
    let schema = table.schema();
    let x = schema.resolve_set(&["x"]).unwrap();
    assert_eq!(engine.compute_partition(&x).unwrap().num_blocks(), 2);
    assert!(engine
        .check_dependency(&x, schema.resolve("y").unwrap())
        .unwrap());
    assert!(!engine
        .check_dependency(&x, schema.resolve("z").unwrap())
        .unwrap());
}

#[test]
fn test_valid_dependencies_hold_on_every_row_pair() {
    let table = trip_table();
    let spec = TableSpec::new("trip");
    let config = FdConfig {
        max_lhs_size: 3,
        ..FdConfig::default()
    };
    let mut discoverer = FdDiscoverer::new(&table, &spec, &config).unwrap();
    let report = discoverer.discover(&mut Vec::new()).unwrap();
    let schema = table.schema();

    for dependency in report.valid_dependencies() {
        let lhs = schema.resolve_set(&dependency.lhs).unwrap();
        let rhs = schema.resolve(&dependency.rhs).unwrap();
        for i in 0..table.num_rows() {
            for j in 0..table.num_rows() {
                let agree = lhs
                    .ids()
                    .iter()
                    .all(|a| table.value(i, *a) == table.value(j, *a));
                if agree {
                    assert_eq!(
                        table.value(i, rhs),
                        table.value(j, rhs),
                        "{:?} -> {} broken by rows {i} and {j}",
                        dependency.lhs,
                        dependency.rhs
                    );
                }
            }
        }
    }
}

#[test]
fn test_trivial_key_is_pruned_once_per_determinant() {
    let table = trip_table();
    let spec = TableSpec::new("trip").with_primary_key("id");
    let mut discoverer = FdDiscoverer::new(&table, &spec, &FdConfig::default()).unwrap();
    let report = discoverer.discover(&mut Vec::new()).unwrap();

    let trivial: Vec<&Classification> = report
        .classifications
        .iter()
        .filter(|c| {
            matches!(
                c,
                Classification::Pruned {
                    reason: PruneReason::TrivialKey,
                    rhs: None,
                    ..
                }
            )
        })
        .collect();
    assert_eq!(trivial.len(), 3);
    assert_eq!(report.pruned_trivial, 3);
}

#[test]
fn test_vacuous_empty_table() {
    let table = Table::from_values("t", &["a", "b"], vec![]).unwrap();
    let config = FdConfig {
        empty_table: EmptyTablePolicy::Vacuous,
        ..FdConfig::default()
    };
    let lines = discover(&table, &TableSpec::new("t"), &config);
    assert_eq!(lines, vec!["a -> b", "b -> a"]);
}
