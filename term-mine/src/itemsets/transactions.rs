//! Transaction data: item interning and co-occurrence counting.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::error::{MineError, Result};

/// Identifier of an item inside one [`TransactionSet`].
///
/// Ids are assigned in ascending label order, so comparing ids is the
/// canonical item ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(u32);

impl ItemId {
    /// Position of the item in its catalog.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A `column:value` (or `column:bin`) item label split into its parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemLabel {
    /// Source column
    pub column: String,
    /// Value or bin name
    pub value: String,
}

impl ItemLabel {
    /// Splits a label at its first `:`.
    pub fn parse(label: &str) -> Result<Self> {
        let (column, value) = label.split_once(':').ok_or_else(|| {
            MineError::InvalidInput(format!("item label '{label}' is not of the form column:value"))
        })?;
        Ok(Self {
            column: column.to_string(),
            value: value.to_string(),
        })
    }
}

impl fmt::Display for ItemLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.column, self.value)
    }
}

/// Sorted, de-duplicated item labels and their ids.
#[derive(Debug, Clone, Default)]
pub struct ItemCatalog {
    labels: Vec<String>,
    index: HashMap<String, ItemId>,
}

impl ItemCatalog {
    fn from_labels(labels: BTreeSet<String>) -> Self {
        let labels: Vec<String> = labels.into_iter().collect();
        let index = labels
            .iter()
            .enumerate()
            .map(|(idx, label)| (label.clone(), ItemId(idx as u32)))
            .collect();
        Self { labels, index }
    }

    /// Number of distinct items.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns true if there are no items.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Every item id in canonical order.
    pub fn ids(&self) -> impl Iterator<Item = ItemId> {
        (0..self.labels.len() as u32).map(ItemId)
    }

    /// Looks up an item by label.
    pub fn id(&self, label: &str) -> Option<ItemId> {
        self.index.get(label).copied()
    }

    /// Resolves labels into a canonical (ascending) id list.
    pub fn resolve<S: AsRef<str>>(&self, labels: &[S]) -> Result<Vec<ItemId>> {
        let mut ids = labels
            .iter()
            .map(|label| {
                self.id(label.as_ref())
                    .ok_or_else(|| MineError::ItemNotFound(label.as_ref().to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    /// Label of an item.
    ///
    /// # Panics
    ///
    /// Panics if `id` did not come from this catalog.
    pub fn label(&self, id: ItemId) -> &str {
        &self.labels[id.index()]
    }

    /// Labels of several items, in the given order.
    pub fn labels(&self, ids: &[ItemId]) -> Vec<String> {
        ids.iter().map(|id| self.label(*id).to_string()).collect()
    }
}

/// Transactions held as one sorted transaction-index list per item.
///
/// The support of an itemset is the number of distinct transactions in
/// which every member item occurs; it is computed by intersecting the
/// members' lists.
#[derive(Debug, Clone, Default)]
pub struct TransactionSet {
    catalog: ItemCatalog,
    transaction_ids: Vec<String>,
    tid_lists: Vec<Vec<u32>>,
}

impl TransactionSet {
    /// Builds a transaction set from `(transaction_id, item_label)` pairs.
    ///
    /// Repeated pairs count once.
    ///
    /// ```rust
    /// use term_mine::itemsets::TransactionSet;
    ///
    /// let transactions = TransactionSet::from_pairs([
    ///     ("t1", "x"), ("t1", "y"), ("t2", "x"), ("t2", "y"), ("t3", "x"), ("t3", "z"),
    /// ]);
    /// let xy = transactions.catalog().resolve(&["y", "x"]).unwrap();
    /// assert_eq!(transactions.num_transactions(), 3);
    /// assert_eq!(transactions.count_support(&xy), 2);
    /// ```
    pub fn from_pairs<I, T, L>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (T, L)>,
        T: Into<String>,
        L: Into<String>,
    {
        let pairs: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(tid, label)| (tid.into(), label.into()))
            .collect();

        let labels: BTreeSet<String> = pairs.iter().map(|(_, label)| label.clone()).collect();
        let catalog = ItemCatalog::from_labels(labels);

        let mut transaction_ids = Vec::new();
        let mut tid_index: HashMap<String, u32> = HashMap::new();
        let mut tid_lists = vec![Vec::new(); catalog.len()];

        for (tid, label) in pairs {
            let next = transaction_ids.len() as u32;
            let tid_idx = *tid_index.entry(tid.clone()).or_insert_with(|| {
                transaction_ids.push(tid);
                next
            });
            if let Some(item) = catalog.id(&label) {
                tid_lists[item.index()].push(tid_idx);
            }
        }

        for list in &mut tid_lists {
            list.sort_unstable();
            list.dedup();
        }

        Self {
            catalog,
            transaction_ids,
            tid_lists,
        }
    }

    /// The item catalog.
    pub fn catalog(&self) -> &ItemCatalog {
        &self.catalog
    }

    /// Number of distinct transaction ids.
    pub fn num_transactions(&self) -> u64 {
        self.transaction_ids.len() as u64
    }

    /// Transaction ids in first-seen order.
    pub fn transaction_ids(&self) -> &[String] {
        &self.transaction_ids
    }

    /// Number of transactions containing `item`.
    pub fn item_support(&self, item: ItemId) -> u64 {
        self.tid_lists
            .get(item.index())
            .map_or(0, |list| list.len() as u64)
    }

    /// Number of transactions containing every item of `items`.
    ///
    /// The empty itemset occurs in every transaction.
    pub fn count_support(&self, items: &[ItemId]) -> u64 {
        let mut lists: Vec<&[u32]> = Vec::with_capacity(items.len());
        for item in items {
            match self.tid_lists.get(item.index()) {
                Some(list) => lists.push(list),
                None => return 0,
            }
        }
        let Some((shortest_pos, _)) = lists.iter().enumerate().min_by_key(|(_, l)| l.len()) else {
            return self.num_transactions();
        };
        let shortest = lists.swap_remove(shortest_pos);
        shortest
            .iter()
            .filter(|&&tid| lists.iter().all(|list| list.binary_search(&tid).is_ok()))
            .count() as u64
    }
}
