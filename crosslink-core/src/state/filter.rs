//! Filter state.
//!
//! Each widget that filters registers a source and contributes its own set
//! of visible keys. The effective visible set is the intersection of every
//! restricting source. Removing one source never touches the others.

use indexmap::{IndexMap, IndexSet};

use crate::bridge::Origin;
use crate::key::RowKey;

/// Per-source filter contributions for one link group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    /// `None` means the source is registered but not restricting.
    sources: IndexMap<Origin, Option<IndexSet<RowKey>>>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a filter source. Returns `false` if it was already registered.
    pub fn register_source(&mut self, source: Origin) -> bool {
        if self.sources.contains_key(&source) {
            return false;
        }
        self.sources.insert(source, None);
        true
    }

    /// Remove a source and its contribution.
    ///
    /// Returns `true` when the source was restricting rows, i.e. when the
    /// effective visible set may have changed.
    pub fn unregister_source(&mut self, source: Origin) -> bool {
        matches!(self.sources.shift_remove(&source), Some(Some(_)))
    }

    /// Set the visible keys of `source`, registering it if needed.
    pub fn set<I>(&mut self, source: Origin, keys: I)
    where
        I: IntoIterator<Item = RowKey>,
    {
        self.sources.insert(source, Some(keys.into_iter().collect()));
    }

    /// Stop `source` from restricting rows. It stays registered.
    pub fn clear(&mut self, source: Origin) {
        self.sources.insert(source, None);
    }

    /// Flip whether `key` is visible according to `source`.
    ///
    /// A source that was not restricting starts restricting to just `key`.
    pub fn toggle(&mut self, source: Origin, key: RowKey) {
        let entry = self.sources.entry(source).or_insert(None);
        match entry {
            Some(keys) => {
                if !keys.shift_remove(&key) {
                    keys.insert(key);
                }
            }
            None => *entry = Some(IndexSet::from([key])),
        }
    }

    /// Apply a wire value: `None` clears the source, `Some` replaces it.
    pub fn apply(&mut self, source: Origin, keys: Option<Vec<RowKey>>) {
        match keys {
            Some(keys) => self.set(source, keys),
            None => self.clear(source),
        }
    }

    /// Contribution of one source, if it is registered and restricting.
    pub fn get(&self, source: Origin) -> Option<&IndexSet<RowKey>> {
        self.sources.get(&source).and_then(Option::as_ref)
    }

    pub fn is_registered(&self, source: Origin) -> bool {
        self.sources.contains_key(&source)
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// The effective visible set, or `None` when every row is visible.
    pub fn visible(&self) -> Option<IndexSet<RowKey>> {
        let mut restricting = self.sources.values().flatten();
        let first = restricting.next()?;
        let mut visible = first.clone();
        for keys in restricting {
            visible.retain(|k| keys.contains(k));
        }
        Some(visible)
    }

    /// Whether `key` passes every restricting source.
    pub fn is_visible(&self, key: &RowKey) -> bool {
        self.sources.values().flatten().all(|keys| keys.contains(key))
    }
}
