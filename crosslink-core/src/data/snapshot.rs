//! Dataset snapshots.
//!
//! A snapshot is an ordered sequence of rows. Once produced it is never
//! changed in place: projections such as adding the selection column or
//! dropping filtered rows build a new snapshot.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use super::value::Value;
use crate::key::RowKey;

/// One row, mapping column name to value in column order.
pub type Row = IndexMap<String, Value>;

/// An immutable table of rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Snapshot {
    /// Build a snapshot from rows. Columns are taken in first-seen order.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let mut columns: IndexSet<String> = IndexSet::new();
        for row in &rows {
            for name in row.keys() {
                if !columns.contains(name) {
                    columns.insert(name.clone());
                }
            }
        }
        Self {
            columns: columns.into_iter().collect(),
            rows,
        }
    }

    /// Build a snapshot from a column list and row-major values.
    ///
    /// Rows shorter than the column list are padded with nulls; extra values
    /// are dropped.
    pub fn from_records<C, R>(columns: &[C], records: Vec<R>) -> Self
    where
        C: AsRef<str>,
        R: IntoIterator<Item = Value>,
    {
        let columns: Vec<String> = columns.iter().map(|c| c.as_ref().to_string()).collect();
        let rows = records
            .into_iter()
            .map(|record| {
                let mut values = record.into_iter();
                columns
                    .iter()
                    .map(|name| (name.clone(), values.next().unwrap_or(Value::Null)))
                    .collect()
            })
            .collect();
        Self { columns, rows }
    }

    /// Wrap in an `Arc` for sharing with readers.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Value at `row` in `column`, if both exist.
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    /// Iterate one column top to bottom. Missing cells read as `None`.
    pub fn column<'a>(&'a self, name: &'a str) -> impl Iterator<Item = Option<&'a Value>> + 'a {
        self.rows.iter().map(move |row| row.get(name))
    }

    /// A new snapshot with `name` appended (or replaced) holding `values`.
    ///
    /// `values` must have one entry per row; missing entries become null.
    pub fn with_column(&self, name: &str, values: Vec<Value>) -> Snapshot {
        let mut columns = self.columns.clone();
        if !columns.iter().any(|c| c == name) {
            columns.push(name.to_string());
        }
        let mut values = values.into_iter();
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut row = row.clone();
                row.insert(name.to_string(), values.next().unwrap_or(Value::Null));
                row
            })
            .collect();
        Snapshot { columns, rows }
    }

    /// A new snapshot holding only the rows for which `keep` returns true.
    pub fn retain_rows<F>(&self, mut keep: F) -> Snapshot
    where
        F: FnMut(usize, &Row) -> bool,
    {
        let rows = self
            .rows
            .iter()
            .enumerate()
            .filter(|(i, row)| keep(*i, row))
            .map(|(_, row)| row.clone())
            .collect();
        Snapshot {
            columns: self.columns.clone(),
            rows,
        }
    }
}

/// A snapshot paired with the key of every row.
///
/// Keys are in row order; position `i` in `keys` belongs to row `i`.
#[derive(Debug, Clone)]
pub struct KeyedSnapshot {
    snapshot: Arc<Snapshot>,
    keys: IndexSet<RowKey>,
}

impl KeyedSnapshot {
    pub(crate) fn new(snapshot: Arc<Snapshot>, keys: IndexSet<RowKey>) -> Self {
        debug_assert_eq!(snapshot.len(), keys.len());
        Self { snapshot, keys }
    }

    pub fn snapshot(&self) -> &Arc<Snapshot> {
        &self.snapshot
    }

    pub fn keys(&self) -> &IndexSet<RowKey> {
        &self.keys
    }

    /// Row index of `key`, if present in this snapshot.
    pub fn position(&self, key: &RowKey) -> Option<usize> {
        self.keys.get_index_of(key)
    }

    pub fn row(&self, key: &RowKey) -> Option<&Row> {
        self.position(key).and_then(|i| self.snapshot.rows().get(i))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
