//! Selection (brushing) state.

use indexmap::IndexSet;

use crate::data::Value;
use crate::key::RowKey;

/// Tri-state selection marker for one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMark {
    /// Row key is in an active selection.
    Selected,
    /// A selection is active and this row is not part of it.
    Unselected,
    /// No selection is active.
    Indeterminate,
}

impl SelectionMark {
    /// Cell value used in the augmented snapshot: `true`, `false`, or null.
    pub fn to_value(self) -> Value {
        match self {
            SelectionMark::Selected => Value::Bool(true),
            SelectionMark::Unselected => Value::Bool(false),
            SelectionMark::Indeterminate => Value::Null,
        }
    }
}

/// The currently selected row keys of a link group.
///
/// `active == false` means nothing is brushed and every row is
/// indeterminate. An active selection with no keys excludes every row.
/// Keys that are not present in the current snapshot are kept; they simply
/// match nothing until a snapshot containing them arrives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    keys: IndexSet<RowKey>,
    active: bool,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the selection with `keys` and mark it active.
    pub fn set<I>(&mut self, keys: I)
    where
        I: IntoIterator<Item = RowKey>,
    {
        self.keys = keys.into_iter().collect();
        self.active = true;
    }

    /// Drop every key and deactivate.
    pub fn clear(&mut self) {
        self.keys.clear();
        self.active = false;
    }

    /// Add `key` if absent, remove it if present.
    ///
    /// Toggling on an inactive selection starts a new one. Toggling off the
    /// last key clears the selection.
    pub fn toggle(&mut self, key: RowKey) {
        if !self.active {
            self.set([key]);
            return;
        }
        if !self.keys.shift_remove(&key) {
            self.keys.insert(key);
        } else if self.keys.is_empty() {
            self.active = false;
        }
    }

    /// Apply a wire value: `None` clears, `Some` replaces.
    pub fn apply(&mut self, keys: Option<Vec<RowKey>>) {
        match keys {
            Some(keys) => self.set(keys),
            None => self.clear(),
        }
    }

    /// The selected keys and whether the selection is active.
    pub fn get(&self) -> (&IndexSet<RowKey>, bool) {
        (&self.keys, self.active)
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn contains(&self, key: &RowKey) -> bool {
        self.active && self.keys.contains(key)
    }

    /// Marker for the row with `key`.
    pub fn mark(&self, key: &RowKey) -> SelectionMark {
        match (self.active, self.keys.contains(key)) {
            (false, _) => SelectionMark::Indeterminate,
            (true, true) => SelectionMark::Selected,
            (true, false) => SelectionMark::Unselected,
        }
    }

    /// Keys as a wire value: `None` when inactive.
    pub fn to_wire(&self) -> Option<Vec<RowKey>> {
        self.active.then(|| self.keys.iter().cloned().collect())
    }
}
