//! Row partitions over attribute combinations.

use std::collections::HashMap;
use tracing::trace;

use crate::error::{MineError, Result};
use crate::table::{AttributeId, AttributeSet, Table, Value};

/// Equivalence classes of row indices that agree on every attribute of a set.
///
/// Blocks are non-empty, hold ascending row indices and are ordered by their
/// first row, so two partitions over the same data compare equal regardless
/// of how they were built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    attributes: AttributeSet,
    blocks: Vec<Vec<usize>>,
}

impl Partition {
    /// The attributes this partition groups by.
    pub fn attributes(&self) -> &AttributeSet {
        &self.attributes
    }

    /// The equivalence classes.
    pub fn blocks(&self) -> &[Vec<usize>] {
        &self.blocks
    }

    /// Number of equivalence classes.
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Number of rows covered.
    pub fn num_rows(&self) -> usize {
        self.blocks.iter().map(Vec::len).sum()
    }

    /// The projected attribute values shared by every row of `block`.
    pub fn projected_key<'t>(&self, table: &'t Table, block: usize) -> Option<Vec<&'t Value>> {
        let first = *self.blocks.get(block)?.first()?;
        Some(
            self.attributes
                .ids()
                .iter()
                .map(|id| table.value(first, *id))
                .collect(),
        )
    }

    /// Returns true if every block of `self` lies inside one block of `coarser`.
    pub fn refines(&self, coarser: &Partition) -> bool {
        let mut owner: HashMap<usize, usize> = HashMap::with_capacity(coarser.num_rows());
        for (idx, block) in coarser.blocks.iter().enumerate() {
            for row in block {
                owner.insert(*row, idx);
            }
        }
        self.blocks.iter().all(|block| {
            let target = owner.get(&block[0]);
            target.is_some() && block.iter().all(|row| owner.get(row) == target)
        })
    }
}

/// Computes and memoizes partitions for one loaded table.
///
/// A partition over `{a1, .., ak}` is built by refining the cached partition
/// over `{a1, .., ak-1}` with the values of `ak`, so each new combination
/// costs one pass over the rows and the refinement order between subsets and
/// supersets holds by construction.
#[derive(Debug)]
pub struct PartitionEngine<'a> {
    table: &'a Table,
    cache: HashMap<AttributeSet, Partition>,
}

impl<'a> PartitionEngine<'a> {
    /// Creates an engine with an empty cache.
    pub fn new(table: &'a Table) -> Self {
        Self {
            table,
            cache: HashMap::new(),
        }
    }

    /// The table being partitioned.
    pub fn table(&self) -> &'a Table {
        self.table
    }

    /// Number of memoized partitions.
    pub fn cached_partitions(&self) -> usize {
        self.cache.len()
    }

    /// Warms the cache with every single-attribute partition.
    pub fn precompute_single_attribute_partitions(&mut self) -> Result<()> {
        let ids: Vec<AttributeId> = self.table.schema().ids().collect();
        for id in ids {
            self.compute_partition(&AttributeSet::single(id))?;
        }
        Ok(())
    }

    /// Returns the partition of the table's rows induced by `attributes`.
    pub fn compute_partition(&mut self, attributes: &AttributeSet) -> Result<&Partition> {
        if attributes.is_empty() {
            return Err(MineError::InvalidInput(
                "cannot partition on an empty attribute set".to_string(),
            ));
        }
        for id in attributes.ids() {
            self.check_attribute(*id)?;
        }

        if !self.cache.contains_key(attributes) {
            let blocks = self.build_blocks(attributes)?;
            trace!(
                table = %self.table.schema().table(),
                attributes = %self.table.schema().display_set(attributes),
                blocks = blocks.len(),
                "computed partition"
            );
            self.cache.insert(
                attributes.clone(),
                Partition {
                    attributes: attributes.clone(),
                    blocks,
                },
            );
        }

        self.cache
            .get(attributes)
            .ok_or_else(|| MineError::Internal("partition missing after insert".to_string()))
    }

    /// Tests whether `lhs` functionally determines `rhs`.
    ///
    /// Every block of the `lhs` partition must carry a single `rhs` value.
    /// A table without rows has no blocks, so every dependency holds
    /// vacuously; callers that want different semantics for empty tables
    /// must check for them first.
    pub fn check_dependency(&mut self, lhs: &AttributeSet, rhs: AttributeId) -> Result<bool> {
        self.check_attribute(rhs)?;
        let table = self.table;
        let partition = self.compute_partition(lhs)?;
        for block in partition.blocks() {
            let expected = table.value(block[0], rhs);
            if block[1..].iter().any(|row| table.value(*row, rhs) != expected) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn check_attribute(&self, id: AttributeId) -> Result<()> {
        if id.index() >= self.table.schema().len() {
            return Err(MineError::InvalidInput(format!(
                "attribute index {} out of range for table '{}'",
                id.index(),
                self.table.schema().table()
            )));
        }
        Ok(())
    }

    fn build_blocks(&mut self, attributes: &AttributeSet) -> Result<Vec<Vec<usize>>> {
        let table = self.table;
        let (prefix, last) = attributes
            .split_last()
            .ok_or_else(|| MineError::Internal("empty attribute set".to_string()))?;

        if prefix.is_empty() {
            let all_rows: Vec<usize> = (0..table.num_rows()).collect();
            let mut blocks = Vec::new();
            split_block(table, &all_rows, last, &mut blocks);
            return Ok(blocks);
        }

        let parent = self.compute_partition(&prefix)?;
        let mut blocks = Vec::with_capacity(parent.num_blocks());
        for block in parent.blocks() {
            split_block(table, block, last, &mut blocks);
        }
        blocks.sort_unstable_by_key(|block| block[0]);
        Ok(blocks)
    }
}

/// Splits `rows` by the value of `attribute`, appending the pieces to `out`
/// in order of first occurrence.
fn split_block(table: &Table, rows: &[usize], attribute: AttributeId, out: &mut Vec<Vec<usize>>) {
    let mut slots: HashMap<&Value, usize> = HashMap::new();
    for &row in rows {
        let value = table.value(row, attribute);
        let slot = *slots.entry(value).or_insert_with(|| {
            out.push(Vec::new());
            out.len() - 1
        });
        out[slot].push(row);
    }
}
