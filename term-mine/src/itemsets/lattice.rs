//! Level-wise frequent itemset generation.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, instrument};

use super::transactions::{ItemId, TransactionSet};
use crate::config::ItemsetConfig;
use crate::error::{MineError, Result};

/// A canonical (ascending) set of items with its support count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Itemset {
    items: Vec<ItemId>,
    support: u64,
}

impl Itemset {
    /// Creates an itemset. `items` must already be ascending.
    pub fn new(items: Vec<ItemId>, support: u64) -> Self {
        debug_assert!(items.windows(2).all(|w| w[0] < w[1]));
        Self { items, support }
    }

    /// Member items in canonical order.
    pub fn items(&self) -> &[ItemId] {
        &self.items
    }

    /// Number of transactions containing every member.
    pub fn support(&self) -> u64 {
        self.support
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true for the empty itemset.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// All frequent itemsets of one size, in lexicographic order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatticeLevel {
    level: usize,
    itemsets: Vec<Itemset>,
}

impl LatticeLevel {
    fn new(level: usize, mut itemsets: Vec<Itemset>) -> Self {
        itemsets.sort_unstable_by(|a, b| a.items.cmp(&b.items));
        Self { level, itemsets }
    }

    /// Itemset size of this level.
    pub fn level(&self) -> usize {
        self.level
    }

    /// The frequent itemsets.
    pub fn itemsets(&self) -> &[Itemset] {
        &self.itemsets
    }

    /// Number of frequent itemsets.
    pub fn len(&self) -> usize {
        self.itemsets.len()
    }

    /// Returns true if the level has no itemsets.
    pub fn is_empty(&self) -> bool {
        self.itemsets.is_empty()
    }

    /// Support of `items` if it is frequent at this level.
    pub fn support_of(&self, items: &[ItemId]) -> Option<u64> {
        self.itemsets
            .binary_search_by(|entry| entry.items.as_slice().cmp(items))
            .ok()
            .map(|idx| self.itemsets[idx].support)
    }
}

/// Builds frequent itemset levels L1, L2, ... over one transaction set.
///
/// Level k candidates come from joining level k-1 itemsets that share
/// their first k-2 items, taking the pair in ascending order of their last
/// item, and are kept only if every (k-1)-subset was frequent. Generation
/// stops at the first level with no frequent itemsets.
///
/// ```rust
/// use term_mine::config::{ItemsetConfig, Threshold};
/// use term_mine::itemsets::{ItemsetLattice, TransactionSet};
///
/// let transactions = TransactionSet::from_pairs([
///     ("t1", "x"), ("t1", "y"), ("t2", "x"), ("t2", "y"), ("t3", "x"), ("t3", "z"),
/// ]);
/// let config = ItemsetConfig { min_support: Threshold::Count(2), ..Default::default() };
/// let mut lattice = ItemsetLattice::new(&transactions, &config);
/// assert_eq!(lattice.generate_all_levels().unwrap(), 2);
/// assert_eq!(lattice.level_counts().get(&2), Some(&1));
/// ```
#[derive(Debug)]
pub struct ItemsetLattice<'a> {
    transactions: &'a TransactionSet,
    min_support: u64,
    max_level: Option<usize>,
    max_candidates: Option<usize>,
    levels: Vec<LatticeLevel>,
}

impl<'a> ItemsetLattice<'a> {
    /// Creates an empty lattice. Fractional thresholds are resolved against
    /// the number of transactions.
    pub fn new(transactions: &'a TransactionSet, config: &ItemsetConfig) -> Self {
        Self {
            transactions,
            min_support: config
                .min_support
                .min_count(transactions.num_transactions()),
            max_level: config.max_level,
            max_candidates: config.max_candidates,
            levels: Vec::new(),
        }
    }

    /// The transactions being mined.
    pub fn transactions(&self) -> &'a TransactionSet {
        self.transactions
    }

    /// Absolute minimum support.
    pub fn min_support(&self) -> u64 {
        self.min_support
    }

    /// Levels generated so far; index 0 holds L1.
    pub fn levels(&self) -> &[LatticeLevel] {
        &self.levels
    }

    /// The level of size `k`, if it was generated.
    pub fn level(&self, k: usize) -> Option<&LatticeLevel> {
        k.checked_sub(1).and_then(|idx| self.levels.get(idx))
    }

    /// Number of generated (non-empty) levels.
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Frequent itemset count per generated level.
    pub fn level_counts(&self) -> BTreeMap<usize, usize> {
        self.levels.iter().map(|l| (l.level, l.len())).collect()
    }

    /// Generates L1: single items meeting the minimum support.
    ///
    /// Returns false if no item is frequent. A threshold resolving to zero
    /// transactions is a configuration error.
    #[instrument(skip(self), fields(min_support = self.min_support))]
    pub fn generate_l1(&mut self) -> Result<bool> {
        if !self.levels.is_empty() {
            return Err(MineError::InvalidInput(
                "level 1 has already been generated".to_string(),
            ));
        }
        if self.min_support == 0 && self.transactions.num_transactions() > 0 {
            return Err(MineError::Configuration(
                "itemset minimum support resolves to 0, every subset would be frequent"
                    .to_string(),
            ));
        }

        let itemsets: Vec<Itemset> = self
            .transactions
            .catalog()
            .ids()
            .filter_map(|item| {
                let support = self.transactions.item_support(item);
                (support >= self.min_support).then(|| Itemset::new(vec![item], support))
            })
            .collect();

        Ok(self.commit(1, itemsets))
    }

    /// Generates level `k` from level `k - 1`.
    ///
    /// Returns false if the level has no frequent itemsets, in which case
    /// nothing is recorded. A candidate-limit overflow aborts the level with
    /// [`MineError::LevelAborted`] and leaves earlier levels intact.
    #[instrument(skip(self), fields(min_support = self.min_support))]
    pub fn generate_next_level(&mut self, k: usize) -> Result<bool> {
        if k < 2 || k != self.levels.len() + 1 {
            return Err(MineError::InvalidInput(format!(
                "cannot generate level {k} after {} levels",
                self.levels.len()
            )));
        }

        let previous = &self.levels[k - 2];
        let candidates = Self::generate_candidates(previous);
        debug!(level = k, candidates = candidates.len(), "generated candidates");

        if let Some(limit) = self.max_candidates {
            if candidates.len() > limit {
                return Err(MineError::level_aborted(
                    k,
                    format!("{} candidates exceed the limit of {limit}", candidates.len()),
                ));
            }
        }

        let itemsets: Vec<Itemset> = candidates
            .into_iter()
            .filter_map(|items| {
                let support = self.transactions.count_support(&items);
                (support >= self.min_support).then(|| Itemset::new(items, support))
            })
            .collect();

        Ok(self.commit(k, itemsets))
    }

    /// Generates levels until one comes out empty or `max_level` is reached.
    ///
    /// Returns the number of generated levels.
    pub fn generate_all_levels(&mut self) -> Result<usize> {
        if self.levels.is_empty() && !self.generate_l1()? {
            info!("no frequent items, lattice is empty");
            return Ok(0);
        }

        loop {
            let next = self.levels.len() + 1;
            if self.max_level.is_some_and(|max| next > max) {
                break;
            }
            if !self.generate_next_level(next)? {
                break;
            }
        }

        info!(levels = self.levels.len(), counts = ?self.level_counts(), "lattice complete");
        Ok(self.levels.len())
    }

    /// Joins level k-1 itemsets into level k candidates.
    ///
    /// Two itemsets join when they agree on all but their last item and the
    /// first one's last item is smaller. A joined candidate is dropped if any
    /// of its (k-1)-subsets is missing from `previous`.
    pub fn generate_candidates(previous: &LatticeLevel) -> Vec<Vec<ItemId>> {
        let frequent: HashSet<&[ItemId]> =
            previous.itemsets.iter().map(|s| s.items.as_slice()).collect();
        let itemsets = &previous.itemsets;
        let mut candidates = Vec::new();

        for (i, p) in itemsets.iter().enumerate() {
            let Some((p_last, p_prefix)) = p.items.split_last() else {
                continue;
            };
            for q in &itemsets[i + 1..] {
                let Some((q_last, q_prefix)) = q.items.split_last() else {
                    continue;
                };
                // Itemsets are sorted, so a different prefix ends the group.
                if p_prefix != q_prefix {
                    break;
                }
                if p_last >= q_last {
                    continue;
                }

                let mut candidate = p.items.clone();
                candidate.push(*q_last);
                if all_subsets_frequent(&candidate, &frequent) {
                    candidates.push(candidate);
                }
            }
        }

        candidates
    }

    fn commit(&mut self, k: usize, itemsets: Vec<Itemset>) -> bool {
        if itemsets.is_empty() {
            debug!(level = k, "no frequent itemsets, stopping");
            return false;
        }
        debug!(level = k, frequent = itemsets.len(), "level committed");
        self.levels.push(LatticeLevel::new(k, itemsets));
        true
    }
}

/// Checks the subsets obtained by dropping one of the first k-2 items; the
/// two remaining subsets are the join parents.
fn all_subsets_frequent(candidate: &[ItemId], frequent: &HashSet<&[ItemId]>) -> bool {
    let k = candidate.len();
    let mut subset = Vec::with_capacity(k - 1);
    (0..k.saturating_sub(2)).all(|skip| {
        subset.clear();
        subset.extend(
            candidate
                .iter()
                .enumerate()
                .filter(|(idx, _)| *idx != skip)
                .map(|(_, item)| *item),
        );
        frequent.contains(subset.as_slice())
    })
}
