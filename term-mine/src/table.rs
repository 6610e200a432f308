//! In-memory relational data: values, rows, schemas and attribute sets.
//!
//! Rows are addressed by their 0-based position in the loaded table and
//! attributes by [`AttributeId`]s resolved once through the [`Schema`], so
//! engines never index into rows with raw column positions.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{MineError, Result};

/// A single attribute value.
///
/// Values compare by content. `Null` equals `Null`, so rows with missing
/// values still group together when partitioning. Floats compare by bit
/// pattern after folding `-0.0` into `0.0` and every NaN into one NaN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// Missing value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// Text value.
    Text(String),
}

impl Value {
    fn float_key(value: f64) -> u64 {
        if value.is_nan() {
            f64::NAN.to_bits()
        } else if value == 0.0 {
            0.0f64.to_bits()
        } else {
            value.to_bits()
        }
    }

    /// Returns true for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => Self::float_key(*a) == Self::float_key(*b),
            (Value::Text(a), Value::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(f) => Self::float_key(*f).hash(state),
            Value::Text(s) => s.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Position of an attribute within a [`Schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttributeId(usize);

impl AttributeId {
    /// Returns the column position.
    pub fn index(self) -> usize {
        self.0
    }
}

/// A canonical, duplicate-free set of attributes ordered by schema position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct AttributeSet(Vec<AttributeId>);

impl AttributeSet {
    /// Builds a set from ids in any order.
    pub fn from_ids(ids: impl IntoIterator<Item = AttributeId>) -> Self {
        let mut ids: Vec<AttributeId> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        Self(ids)
    }

    /// A set holding a single attribute.
    pub fn single(id: AttributeId) -> Self {
        Self(vec![id])
    }

    /// Attribute ids in canonical order.
    pub fn ids(&self) -> &[AttributeId] {
        &self.0
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the set has no attributes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true if `id` is a member.
    pub fn contains(&self, id: AttributeId) -> bool {
        self.0.binary_search(&id).is_ok()
    }

    /// Returns true if every member of `self` is in `other`.
    pub fn is_subset_of(&self, other: &AttributeSet) -> bool {
        self.0.iter().all(|id| other.contains(*id))
    }

    /// Splits off the last attribute, returning the remaining prefix.
    pub fn split_last(&self) -> Option<(AttributeSet, AttributeId)> {
        let (last, prefix) = self.0.split_last()?;
        Some((AttributeSet(prefix.to_vec()), *last))
    }

    /// Non-empty strict subsets, smallest first, in lexicographic order within a size.
    pub fn strict_subsets(&self) -> impl Iterator<Item = AttributeSet> + '_ {
        (1..self.len()).flat_map(move |size| {
            self.0
                .iter()
                .copied()
                .combinations(size)
                .map(AttributeSet)
        })
    }
}

/// Named attributes of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    table: String,
    attributes: Vec<String>,
    lookup: HashMap<String, AttributeId>,
}

impl Schema {
    /// Creates a schema. Attribute names must be unique.
    pub fn new<S: Into<String>>(
        table: impl Into<String>,
        attributes: impl IntoIterator<Item = S>,
    ) -> Result<Self> {
        let table = table.into();
        let attributes: Vec<String> = attributes.into_iter().map(Into::into).collect();
        let mut lookup = HashMap::with_capacity(attributes.len());
        for (idx, name) in attributes.iter().enumerate() {
            if lookup.insert(name.clone(), AttributeId(idx)).is_some() {
                return Err(MineError::InvalidInput(format!(
                    "duplicate attribute '{name}' in table '{table}'"
                )));
            }
        }
        Ok(Self {
            table,
            attributes,
            lookup,
        })
    }

    /// Table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Returns true if the schema has no attributes.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// All attribute ids in schema order.
    pub fn ids(&self) -> impl Iterator<Item = AttributeId> {
        (0..self.attributes.len()).map(AttributeId)
    }

    /// Resolves an attribute name. Unknown names are an error, never skipped.
    pub fn resolve(&self, name: &str) -> Result<AttributeId> {
        self.lookup
            .get(name)
            .copied()
            .ok_or_else(|| MineError::attribute_not_found(&self.table, name))
    }

    /// Resolves several names into a canonical set.
    pub fn resolve_set<S: AsRef<str>>(&self, names: &[S]) -> Result<AttributeSet> {
        let ids = names
            .iter()
            .map(|name| self.resolve(name.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(AttributeSet::from_ids(ids))
    }

    /// Name of an attribute.
    ///
    /// # Panics
    ///
    /// Panics if `id` did not come from this schema.
    pub fn name(&self, id: AttributeId) -> &str {
        &self.attributes[id.0]
    }

    /// Names of a set's members, in canonical order.
    pub fn names(&self, set: &AttributeSet) -> Vec<String> {
        set.ids().iter().map(|id| self.name(*id).to_string()).collect()
    }

    /// Names joined with `", "`, as written in the reports.
    pub fn display_set(&self, set: &AttributeSet) -> String {
        set.ids().iter().map(|id| self.name(*id)).join(", ")
    }
}

/// One tuple of attribute values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Row(Vec<Value>);

impl Row {
    /// Wraps values given in schema order.
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// Value of one attribute.
    pub fn get(&self, id: AttributeId) -> &Value {
        &self.0[id.0]
    }

    /// Every value, in schema order.
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the row has no values.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

/// A schema plus the rows loaded for the current unit of work.
#[derive(Debug, Clone)]
pub struct Table {
    schema: Schema,
    rows: Vec<Row>,
}

impl Table {
    /// Creates an empty table.
    pub fn empty(schema: Schema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    /// Creates a table, checking each row's arity against the schema.
    pub fn new(schema: Schema, rows: Vec<Row>) -> Result<Self> {
        let mut table = Self::empty(schema);
        table.extend(rows)?;
        Ok(table)
    }

    /// Convenience constructor from names and raw values.
    ///
    /// ```rust
    /// use term_mine::table::{Table, Value};
    ///
    /// let table = Table::from_values(
    ///     "trip",
    ///     &["a", "b"],
    ///     vec![vec![Value::from(1), Value::from("x")]],
    /// ).unwrap();
    /// assert_eq!(table.num_rows(), 1);
    /// ```
    pub fn from_values(
        table: impl Into<String>,
        attributes: &[&str],
        rows: Vec<Vec<Value>>,
    ) -> Result<Self> {
        let schema = Schema::new(table, attributes.iter().copied())?;
        Self::new(schema, rows.into_iter().map(Row::new).collect())
    }

    /// Appends a batch of rows. Row indices of existing rows do not change.
    pub fn extend(&mut self, rows: impl IntoIterator<Item = Row>) -> Result<()> {
        for row in rows {
            if row.len() != self.schema.len() {
                return Err(MineError::InvalidInput(format!(
                    "row {} of table '{}' has {} values, schema has {} attributes",
                    self.rows.len(),
                    self.schema.table(),
                    row.len(),
                    self.schema.len()
                )));
            }
            self.rows.push(row);
        }
        Ok(())
    }

    /// The table's schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Number of loaded rows.
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if no rows are loaded.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All loaded rows.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Value of `attribute` in row `row_idx`.
    pub fn value(&self, row_idx: usize, attribute: AttributeId) -> &Value {
        self.rows[row_idx].get(attribute)
    }
}
