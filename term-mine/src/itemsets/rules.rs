//! Association rules drawn from frequent itemsets.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::lattice::{ItemsetLattice, LatticeLevel};
use super::support::SupportTable;
use super::transactions::{ItemCatalog, ItemId, TransactionSet};
use crate::config::RuleThresholds;
use crate::log_candidate;
use crate::logging::LogConfig;

/// `support(X ∪ Y) / support(X)`, or 0 when `X` never occurs.
pub fn confidence(support_union: u64, support_antecedent: u64) -> f64 {
    if support_antecedent == 0 {
        0.0
    } else {
        support_union as f64 / support_antecedent as f64
    }
}

/// An association rule `antecedent -> consequent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    antecedent: Vec<ItemId>,
    consequent: Vec<ItemId>,
    support: u64,
    support_fraction: f64,
    confidence: f64,
}

impl Rule {
    /// Left-hand items, canonical order.
    pub fn antecedent(&self) -> &[ItemId] {
        &self.antecedent
    }

    /// Right-hand items, canonical order.
    pub fn consequent(&self) -> &[ItemId] {
        &self.consequent
    }

    /// Transactions containing both sides.
    pub fn support(&self) -> u64 {
        self.support
    }

    /// [`Rule::support`] as a fraction of all transactions.
    pub fn support_fraction(&self) -> f64 {
        self.support_fraction
    }

    /// Estimated probability of the consequent given the antecedent.
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// The rule as written in rule reports: `[a,b] -> [c]`.
    pub fn format(&self, catalog: &ItemCatalog) -> String {
        format!(
            "[{}] -> [{}]",
            catalog.labels(&self.antecedent).join(","),
            catalog.labels(&self.consequent).join(",")
        )
    }
}

/// Splits frequent itemsets into rules and filters them by support and
/// confidence.
///
/// Supports come from a [`SupportTable`] seeded with the lattice levels;
/// anything the lattice did not keep is counted once and memoized.
///
/// ```rust
/// use term_mine::config::{ItemsetConfig, RuleThresholds, Threshold};
/// use term_mine::itemsets::{ItemsetLattice, RuleGenerator, TransactionSet};
///
/// let transactions = TransactionSet::from_pairs([
///     ("t1", "x"), ("t1", "y"), ("t2", "x"), ("t2", "y"), ("t3", "x"), ("t3", "z"),
/// ]);
/// let mut lattice = ItemsetLattice::new(&transactions, &ItemsetConfig::default());
/// lattice.generate_all_levels().unwrap();
///
/// let mut rules = RuleGenerator::from_lattice(&lattice);
/// let thresholds = RuleThresholds { min_support: Threshold::Count(2), min_confidence: 0.6 };
/// let found = rules.generate_rules(lattice.level(2).unwrap(), &thresholds);
/// let lines: Vec<String> = found.iter().map(|r| r.format(transactions.catalog())).collect();
/// assert_eq!(lines, vec!["[x] -> [y]", "[y] -> [x]"]);
/// ```
#[derive(Debug)]
pub struct RuleGenerator<'a> {
    transactions: &'a TransactionSet,
    supports: SupportTable,
    log_config: LogConfig,
}

impl<'a> RuleGenerator<'a> {
    /// Creates a generator over `transactions` using `supports` as its cache.
    pub fn new(transactions: &'a TransactionSet, supports: SupportTable) -> Self {
        Self {
            transactions,
            supports,
            log_config: LogConfig::default(),
        }
    }

    /// Creates a generator whose cache is seeded with every lattice level.
    pub fn from_lattice(lattice: &ItemsetLattice<'a>) -> Self {
        Self::new(lattice.transactions(), SupportTable::from_lattice(lattice))
    }

    /// Sets the logging configuration.
    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    /// The support cache.
    pub fn supports(&self) -> &SupportTable {
        &self.supports
    }

    /// Support of a canonical item list.
    pub fn support(&mut self, items: &[ItemId]) -> u64 {
        self.supports.support(items, self.transactions)
    }

    /// Confidence of `antecedent -> consequent` and the support of their union.
    pub fn confidence(&mut self, antecedent: &[ItemId], consequent: &[ItemId]) -> (f64, u64) {
        let mut union: Vec<ItemId> = antecedent.iter().chain(consequent).copied().collect();
        union.sort_unstable();
        union.dedup();
        let support_union = self.support(&union);
        let support_antecedent = self.support(antecedent);
        (confidence(support_union, support_antecedent), support_union)
    }

    /// Every rule from `level` meeting `thresholds`.
    ///
    /// Antecedents are enumerated per itemset from size 1 upward in
    /// lexicographic order; the consequent is the rest of the itemset.
    #[instrument(skip(self, level), fields(level = level.level()))]
    pub fn generate_rules(&mut self, level: &LatticeLevel, thresholds: &RuleThresholds) -> Vec<Rule> {
        let total = self.transactions.num_transactions();
        let min_support = thresholds.min_support.min_count(total);
        let mut rules = Vec::new();

        for itemset in level.itemsets() {
            let items = itemset.items();
            for size in 1..items.len() {
                for antecedent in items.iter().copied().combinations(size) {
                    let consequent: Vec<ItemId> = items
                        .iter()
                        .copied()
                        .filter(|item| antecedent.binary_search(item).is_err())
                        .collect();

                    let (confidence, support) = self.confidence(&antecedent, &consequent);
                    if confidence < thresholds.min_confidence || support < min_support {
                        continue;
                    }

                    let rule = Rule {
                        antecedent,
                        consequent,
                        support,
                        support_fraction: if total == 0 {
                            0.0
                        } else {
                            support as f64 / total as f64
                        },
                        confidence,
                    };
                    log_candidate!(
                        self.log_config,
                        rule = %rule.format(self.transactions.catalog()),
                        confidence,
                        support,
                        "rule accepted"
                    );
                    rules.push(rule);
                }
            }
        }

        debug!(
            rules = rules.len(),
            min_support,
            min_confidence = thresholds.min_confidence,
            cached_supports = self.supports.len(),
            "rules generated"
        );
        rules
    }
}
