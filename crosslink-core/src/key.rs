//! Row Identity
//!
//! Every row of a shared dataset carries a key that identifies the same
//! logical row across snapshots. Selection and filter state are sets of keys,
//! so a row keeps its selection when the producer regenerates the data, even
//! if it moves.
//!
//! # Key Policy
//!
//! 1. An explicit [`KeyRule`] given when the dataset is built: one or more
//!    key columns, or an expression evaluated against each snapshot.
//!
//! 2. The row position, only when the rows are known never to be reordered,
//!    added, or removed ([`RowStability::Stable`]).
//!
//! 3. Otherwise construction fails with [`Error::AmbiguousKey`]. Positional
//!    keys under a changing producer would silently move a selection onto
//!    whatever row lands at the old index.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::data::{Snapshot, Value};
use crate::error::{Error, Result};

/// Separator between the parts of a composite key.
const COMPOSITE_SEPARATOR: char = '\u{1f}';

/// Stable identifier for one logical row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowKey(String);

impl RowKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RowKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RowKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Whether a data source can change row order or membership between snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowStability {
    /// Row `i` is always the same logical row.
    Stable,
    /// Rows may be reordered, added, or removed.
    #[default]
    Unstable,
}

/// Computes the keys of a whole snapshot, one per row, in row order.
pub type KeyFn = Arc<dyn Fn(&Snapshot) -> Vec<RowKey> + Send + Sync>;

/// How keys are derived from a snapshot.
#[derive(Clone)]
pub enum KeyRule {
    /// Key is the value of one column, or the joined values of several.
    Columns(SmallVec<[String; 2]>),
    /// Key is computed by a pure function of the snapshot.
    Expression(KeyFn),
    /// Key is the row index.
    Positional,
}

impl KeyRule {
    /// Key on a single column.
    pub fn column(name: impl Into<String>) -> Self {
        KeyRule::Columns(SmallVec::from_elem(name.into(), 1))
    }

    /// Key on several columns together.
    pub fn columns<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        KeyRule::Columns(names.into_iter().map(Into::into).collect())
    }

    /// Key computed by `f` against each snapshot.
    pub fn expression<F>(f: F) -> Self
    where
        F: Fn(&Snapshot) -> Vec<RowKey> + Send + Sync + 'static,
    {
        KeyRule::Expression(Arc::new(f))
    }
}

impl fmt::Debug for KeyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyRule::Columns(names) => f.debug_tuple("Columns").field(names).finish(),
            KeyRule::Expression(_) => f.write_str("Expression(..)"),
            KeyRule::Positional => f.write_str("Positional"),
        }
    }
}

/// The key rule bound to one shared dataset.
///
/// The same resolver is used for every snapshot the dataset ever sees, so
/// key derivation is consistent across regenerations.
#[derive(Debug, Clone)]
pub struct KeyResolver {
    rule: KeyRule,
}

impl KeyResolver {
    /// Pick the key rule for a data source.
    ///
    /// `group` only labels the error.
    pub fn bind(rule: Option<KeyRule>, stability: RowStability, group: &str) -> Result<Self> {
        let rule = match (rule, stability) {
            (Some(KeyRule::Positional), RowStability::Unstable) | (None, RowStability::Unstable) => {
                return Err(Error::AmbiguousKey {
                    group: group.to_string(),
                });
            }
            (Some(rule), _) => rule,
            (None, RowStability::Stable) => KeyRule::Positional,
        };
        Ok(Self { rule })
    }

    pub fn rule(&self) -> &KeyRule {
        &self.rule
    }

    /// Produce the keys of every row in `snapshot`.
    ///
    /// Fails on duplicate keys, null key cells, and missing key columns.
    pub fn resolve(&self, snapshot: &Snapshot) -> Result<IndexSet<RowKey>> {
        let keys: Vec<RowKey> = match &self.rule {
            KeyRule::Positional => (0..snapshot.len()).map(|i| RowKey(i.to_string())).collect(),
            KeyRule::Expression(f) => {
                let keys = f(snapshot);
                if keys.len() != snapshot.len() {
                    return Err(Error::KeyCount {
                        expected: snapshot.len(),
                        actual: keys.len(),
                    });
                }
                keys
            }
            KeyRule::Columns(names) => column_keys(snapshot, names)?,
        };

        let mut unique = IndexSet::with_capacity(keys.len());
        for (row, key) in keys.into_iter().enumerate() {
            if let Some(first) = unique.get_index_of(&key) {
                return Err(Error::DuplicateKey {
                    key,
                    first,
                    second: row,
                });
            }
            unique.insert(key);
        }
        Ok(unique)
    }
}

fn column_keys(snapshot: &Snapshot, names: &[String]) -> Result<Vec<RowKey>> {
    if let Some(missing) = names.iter().find(|n| !snapshot.has_column(n)) {
        return Err(Error::MissingKeyColumn {
            column: missing.clone(),
        });
    }

    // Keys are rendered as text, so `1` and `"1"` would collide; each key
    // column must keep the type of its first cell.
    let mut kinds: SmallVec<[&'static str; 2]> = SmallVec::new();
    let mut keys = Vec::with_capacity(snapshot.len());
    for (i, row) in snapshot.rows().iter().enumerate() {
        let mut key = String::new();
        for (part, name) in names.iter().enumerate() {
            let value = match row.get(name) {
                None | Some(Value::Null) => {
                    return Err(Error::NullKey {
                        row: i,
                        column: name.clone(),
                    });
                }
                Some(value) => value,
            };
            let invalid = |reason: String| Error::InvalidKeyCell {
                row: i,
                column: name.clone(),
                reason,
            };

            match kinds.get(part) {
                None => kinds.push(value.kind()),
                Some(kind) if *kind != value.kind() => {
                    return Err(invalid(format!("expected {kind}, found {}", value.kind())));
                }
                Some(_) => {}
            }

            let text = value.to_string();
            if text.contains(COMPOSITE_SEPARATOR) {
                return Err(invalid("contains the key separator U+001F".to_string()));
            }
            if part > 0 {
                key.push(COMPOSITE_SEPARATOR);
            }
            key.push_str(&text);
        }
        keys.push(RowKey(key));
    }
    Ok(keys)
}
