//! Memoized itemset supports, indexed by itemset size.

use std::collections::{BTreeMap, HashMap};

use super::lattice::{ItemsetLattice, LatticeLevel};
use super::transactions::{ItemId, TransactionSet};

/// Support counts keyed first by itemset size, then by canonical item list.
///
/// Seeded from lattice levels; anything missing is counted against the
/// transaction set on first use and remembered.
#[derive(Debug, Clone, Default)]
pub struct SupportTable {
    by_size: BTreeMap<usize, HashMap<Vec<ItemId>, u64>>,
    hits: u64,
    misses: u64,
}

impl SupportTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table seeded with every level of `lattice`.
    pub fn from_lattice(lattice: &ItemsetLattice<'_>) -> Self {
        let mut table = Self::new();
        for level in lattice.levels() {
            table.seed_level(level);
        }
        table
    }

    /// Adds every itemset of `level`.
    pub fn seed_level(&mut self, level: &LatticeLevel) {
        let entries = self.by_size.entry(level.level()).or_default();
        for itemset in level.itemsets() {
            entries.insert(itemset.items().to_vec(), itemset.support());
        }
    }

    /// Stored support of `items`, which must be in canonical order.
    pub fn get(&self, items: &[ItemId]) -> Option<u64> {
        self.by_size.get(&items.len())?.get(items).copied()
    }

    /// Stores a support count.
    pub fn insert(&mut self, items: Vec<ItemId>, support: u64) {
        self.by_size
            .entry(items.len())
            .or_default()
            .insert(items, support);
    }

    /// Support of `items`, counting and memoizing it on a miss.
    pub fn support(&mut self, items: &[ItemId], transactions: &TransactionSet) -> u64 {
        if let Some(support) = self.get(items) {
            self.hits += 1;
            return support;
        }
        self.misses += 1;
        let support = transactions.count_support(items);
        self.insert(items.to_vec(), support);
        support
    }

    /// Total number of stored supports.
    pub fn len(&self) -> usize {
        self.by_size.values().map(HashMap::len).sum()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored entries per itemset size.
    pub fn size_counts(&self) -> BTreeMap<usize, usize> {
        self.by_size.iter().map(|(k, v)| (*k, v.len())).collect()
    }

    /// Lookups answered from the table.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Lookups that required counting.
    pub fn misses(&self) -> u64 {
        self.misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ItemsetConfig, Threshold};

    #[test]
    fn test_seeded_from_lattice_and_memoizes_misses() {
        let transactions = TransactionSet::from_pairs([
            ("t1", "x"),
            ("t1", "y"),
            ("t2", "x"),
            ("t2", "y"),
            ("t3", "x"),
            ("t3", "z"),
        ]);
        let config = ItemsetConfig {
            min_support: Threshold::Count(2),
            ..ItemsetConfig::default()
        };
        let mut lattice = ItemsetLattice::new(&transactions, &config);
        lattice.generate_all_levels().unwrap();

        let mut table = SupportTable::from_lattice(&lattice);
        assert_eq!(table.size_counts(), BTreeMap::from([(1, 2), (2, 1)]));

        let catalog = transactions.catalog();
        let x = catalog.resolve(&["x"]).unwrap();
        assert_eq!(table.support(&x, &transactions), 3);
        assert_eq!((table.hits(), table.misses()), (1, 0));

        // z is infrequent, so it is counted on demand and then remembered.
        let z = catalog.resolve(&["z"]).unwrap();
        assert_eq!(table.get(&z), None);
        assert_eq!(table.support(&z, &transactions), 1);
        assert_eq!(table.get(&z), Some(1));
        assert_eq!((table.hits(), table.misses()), (1, 1));
        assert_eq!(table.len(), 4);
    }
}
