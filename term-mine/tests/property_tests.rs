//! Property-based tests for partitions, dependency discovery and Apriori.
//!
//! Each property compares an engine result against a brute-force answer
//! computed directly from the generated rows or transactions.

use itertools::Itertools;
use proptest::prelude::*;
use std::collections::BTreeSet;
use term_mine::config::{FdConfig, ItemsetConfig, RuleThresholds, TableSpec, Threshold};
use term_mine::fd::{Classification, FdDiscoverer, PartitionEngine, PruneReason};
use term_mine::itemsets::{confidence, ItemId, ItemsetLattice, RuleGenerator, TransactionSet};
use term_mine::table::{AttributeId, AttributeSet, Table, Value};

const COLUMNS: [&str; 4] = ["a", "b", "c", "d"];

fn rows_strategy() -> impl Strategy<Value = Vec<Vec<Option<i64>>>> {
    prop::collection::vec(
        prop::collection::vec(prop::option::weighted(0.9, 0i64..3), COLUMNS.len()),
        0..10,
    )
}

fn build_table(rows: &[Vec<Option<i64>>]) -> Table {
    let values = rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|v| v.map_or(Value::Null, Value::Int))
                .collect()
        })
        .collect();
    Table::from_values("t", &COLUMNS, values).unwrap()
}

fn holds(table: &Table, lhs: &[AttributeId], rhs: AttributeId) -> bool {
    (0..table.num_rows()).all(|i| {
        (0..table.num_rows()).all(|j| {
            let agree = lhs.iter().all(|a| table.value(i, *a) == table.value(j, *a));
            !agree || table.value(i, rhs) == table.value(j, rhs)
        })
    })
}

/// Rows `(a, b, c)` where `b` is a function of `a`.
fn dependent_rows_strategy() -> impl Strategy<Value = (Vec<(i64, i64)>, [i64; 3])> {
    (
        prop::collection::vec((0i64..3, 0i64..3), 4..12),
        [0i64..3, 0i64..3, 0i64..3],
    )
}

fn transactions_strategy() -> impl Strategy<Value = Vec<BTreeSet<u8>>> {
    prop::collection::vec(prop::collection::btree_set(0u8..6, 1..5), 1..12)
}

fn build_transactions(baskets: &[BTreeSet<u8>]) -> TransactionSet {
    TransactionSet::from_pairs(baskets.iter().enumerate().flat_map(|(tid, items)| {
        items
            .iter()
            .map(move |item| (format!("t{tid}"), format!("i{item}")))
    }))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_partition_refinement_property(rows in rows_strategy()) {
        let table = build_table(&rows);
        let schema = table.schema();
        let ids: Vec<AttributeId> = schema.ids().collect();
        let mut engine = PartitionEngine::new(&table);

        for size in 1..ids.len() {
            for subset in ids.iter().copied().combinations(size) {
                let smaller = AttributeSet::from_ids(subset.clone());
                let coarse = engine.compute_partition(&smaller).unwrap().clone();
                prop_assert_eq!(coarse.num_rows(), table.num_rows());

                for extra in ids.iter().copied().filter(|id| !subset.contains(id)) {
                    let larger = AttributeSet::from_ids(subset.iter().copied().chain([extra]));
                    let fine = engine.compute_partition(&larger).unwrap().clone();
                    prop_assert!(fine.refines(&coarse));
                    prop_assert!(fine.num_blocks() >= coarse.num_blocks());
                }
            }
        }
    }

    #[test]
    fn test_tested_candidates_match_brute_force(rows in rows_strategy()) {
        let table = build_table(&rows);
        let schema = table.schema();
        let config = FdConfig { max_lhs_size: 3, ..FdConfig::default() };
        let mut discoverer = FdDiscoverer::new(&table, &TableSpec::new("t"), &config).unwrap();
        let report = discoverer.discover(&mut Vec::new()).unwrap();

        for classification in &report.classifications {
            let (dependency, expected) = match classification {
                Classification::Valid { dependency } => (dependency, true),
                Classification::Invalid { dependency } => (dependency, false),
                Classification::Pruned { .. } => continue,
            };
            let lhs = schema.resolve_set(&dependency.lhs).unwrap();
            let rhs = schema.resolve(&dependency.rhs).unwrap();
            prop_assert_eq!(
                holds(&table, lhs.ids(), rhs),
                expected,
                "{:?} -> {}",
                &dependency.lhs,
                &dependency.rhs
            );
        }
    }

    #[test]
    fn test_inherited_pruning_has_invalid_subset(rows in rows_strategy()) {
        let table = build_table(&rows);
        let config = FdConfig { max_lhs_size: 3, ..FdConfig::default() };
        let mut discoverer = FdDiscoverer::new(&table, &TableSpec::new("t"), &config).unwrap();
        let report = discoverer.discover(&mut Vec::new()).unwrap();

        let invalid: Vec<(BTreeSet<&str>, &str)> = report
            .classifications
            .iter()
            .filter_map(|c| match c {
                Classification::Invalid { dependency } => Some((
                    dependency.lhs.iter().map(String::as_str).collect(),
                    dependency.rhs.as_str(),
                )),
                _ => None,
            })
            .collect();

        let mut seen = BTreeSet::new();
        for classification in &report.classifications {
            if let Classification::Valid { dependency } = classification {
                let lhs: BTreeSet<&str> = dependency.lhs.iter().map(String::as_str).collect();
                prop_assert!(!invalid.iter().any(|(sub, sub_rhs)|
                    *sub_rhs == dependency.rhs.as_str() && sub.is_subset(&lhs)
                ));
            }
            if let Classification::Pruned {
                lhs,
                rhs: Some(rhs),
                reason: PruneReason::InheritedInvalid,
            } = classification
            {
                let lhs: BTreeSet<&str> = lhs.iter().map(String::as_str).collect();
                prop_assert!(!lhs.contains(rhs.as_str()));
                prop_assert!(invalid.iter().any(|(sub, sub_rhs)|
                    *sub_rhs == rhs.as_str() && sub.len() < lhs.len() && sub.is_subset(&lhs)
                ));
            }
            let line = classification.report_line();
            prop_assert!(seen.insert(line.clone()), "duplicate line {}", line);
        }
    }

    #[test]
    fn test_frequent_itemsets_are_complete_and_closed(
        baskets in transactions_strategy(),
        min_support in 1u64..4,
    ) {
        let transactions = build_transactions(&baskets);
        let config = ItemsetConfig {
            min_support: Threshold::Count(min_support),
            ..ItemsetConfig::default()
        };
        let mut lattice = ItemsetLattice::new(&transactions, &config);
        lattice.generate_all_levels().unwrap();

        for level in lattice.levels() {
            prop_assert!(!level.is_empty());
            for itemset in level.itemsets() {
                prop_assert_eq!(itemset.len(), level.level());
                prop_assert!(itemset.support() >= min_support);
                if level.level() > 1 {
                    let previous = lattice.level(level.level() - 1).unwrap();
                    for subset in itemset.items().iter().copied().combinations(level.level() - 1) {
                        prop_assert!(previous.support_of(&subset).is_some());
                    }
                }
            }
        }

        let ids: Vec<ItemId> = transactions.catalog().ids().collect();
        for size in 1..=3 {
            for items in ids.iter().copied().combinations(size) {
                let frequent = transactions.count_support(&items) >= min_support;
                let found = lattice
                    .level(size)
                    .and_then(|level| level.support_of(&items))
                    .is_some();
                prop_assert_eq!(frequent, found, "itemset {:?}", items);
            }
        }
    }

    #[test]
    fn test_rule_confidence_property(
        baskets in transactions_strategy(),
        min_confidence in 0.0f64..=1.0,
    ) {
        let transactions = build_transactions(&baskets);
        let mut lattice = ItemsetLattice::new(&transactions, &ItemsetConfig::default());
        lattice.generate_all_levels().unwrap();
        let thresholds = RuleThresholds {
            min_support: Threshold::Fraction(0.0),
            min_confidence,
        };

        let mut generator = RuleGenerator::from_lattice(&lattice);
        for level in lattice.levels().iter().filter(|l| l.level() >= 2) {
            for rule in generator.generate_rules(level, &thresholds) {
                prop_assert!((0.0..=1.0).contains(&rule.confidence()));
                prop_assert!(rule.confidence() >= min_confidence);

                let union: Vec<ItemId> = rule
                    .antecedent()
                    .iter()
                    .chain(rule.consequent())
                    .copied()
                    .sorted()
                    .collect();
                let expected = confidence(
                    transactions.count_support(&union),
                    transactions.count_support(rule.antecedent()),
                );
                prop_assert!((rule.confidence() - expected).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_single_value_perturbation_breaks_dependency(
        (pairs, mapping) in dependent_rows_strategy(),
        pick in any::<prop::sample::Index>()
    ) {
        let rows: Vec<Vec<Value>> = pairs
            .iter()
            .map(|&(a, c)| vec![Value::Int(a), Value::Int(mapping[a as usize]), Value::Int(c)])
            .collect();
        let table = Table::from_values("t", &["a", "b", "c"], rows.clone()).unwrap();
        let schema = table.schema();
        let lhs = schema.resolve_set(&["a"]).unwrap();
        let rhs = schema.resolve("b").unwrap();
        prop_assert!(PartitionEngine::new(&table).check_dependency(&lhs, rhs).unwrap());

        // Four rows over three values of `a` always leave a block of two or more.
        let shared: Vec<usize> = (0..pairs.len())
            .filter(|&i| pairs.iter().filter(|(a, _)| *a == pairs[i].0).count() > 1)
            .collect();
        prop_assert!(!shared.is_empty());
        let row = shared[pick.index(shared.len())];

        let mut perturbed = rows;
        perturbed[row][1] = Value::Int(mapping[pairs[row].0 as usize] + 10);
        let table = Table::from_values("t", &["a", "b", "c"], perturbed).unwrap();
        prop_assert!(!PartitionEngine::new(&table).check_dependency(&lhs, rhs).unwrap());
        prop_assert!(!holds(&table, lhs.ids(), rhs));
    }
}
