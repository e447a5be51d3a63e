//! Shared Datasets
//!
//! A `SharedDataset` is what every consumer of a link group reads from. It
//! holds either one fixed snapshot or a producer capability, plus the key
//! resolver bound at construction.
//!
//! Reads are projections: the current snapshot joined by key against the
//! group's selection or filter. Joins are O(rows); the producer is pulled
//! but not recomputed, and keys are only re-resolved when the producer hands
//! out a different snapshot.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::snapshot::{KeyedSnapshot, Snapshot};
use crate::error::Result;
use crate::group::LinkGroup;
use crate::key::{KeyResolver, KeyRule, RowStability};
use crate::reactive::{ObserverId, SnapshotProducer};
use crate::state::SelectionMark;

/// Where a dataset's snapshots come from.
#[derive(Clone)]
pub enum DataSource {
    /// One snapshot for the lifetime of the dataset.
    Static(Arc<Snapshot>),
    /// A fresh snapshot on every pull.
    Producer(Arc<dyn SnapshotProducer>),
}

impl DataSource {
    pub fn producer<P: SnapshotProducer + 'static>(producer: P) -> Self {
        DataSource::Producer(Arc::new(producer))
    }

    fn stability(&self) -> RowStability {
        match self {
            DataSource::Static(_) => RowStability::Stable,
            DataSource::Producer(p) => p.stability(),
        }
    }

    fn pull(&self) -> Arc<Snapshot> {
        match self {
            DataSource::Static(snapshot) => Arc::clone(snapshot),
            DataSource::Producer(p) => p.pull(),
        }
    }
}

impl From<Snapshot> for DataSource {
    fn from(snapshot: Snapshot) -> Self {
        DataSource::Static(Arc::new(snapshot))
    }
}

impl fmt::Debug for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Static(s) => f.debug_tuple("Static").field(&s.len()).finish(),
            DataSource::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

/// A dataset bound to a link group.
pub struct SharedDataset {
    source: DataSource,
    resolver: KeyResolver,
    group: Arc<LinkGroup>,
    last_valid: Mutex<Option<Arc<KeyedSnapshot>>>,
}

impl SharedDataset {
    /// Bind `source` to `group`.
    ///
    /// Fails with `AmbiguousKey` when the source is a producer that may
    /// reorder or resize its rows and no explicit key rule is given.
    pub fn new(source: DataSource, rule: Option<KeyRule>, group: Arc<LinkGroup>) -> Result<Self> {
        let resolver = KeyResolver::bind(rule, source.stability(), group.name())?;
        tracing::debug!(group = %group.name(), rule = ?resolver.rule(), "shared dataset created");
        Ok(Self {
            source,
            resolver,
            group,
            last_valid: Mutex::new(None),
        })
    }

    pub fn group(&self) -> &Arc<LinkGroup> {
        &self.group
    }

    pub fn resolver(&self) -> &KeyResolver {
        &self.resolver
    }

    pub fn is_producer_backed(&self) -> bool {
        matches!(self.source, DataSource::Producer(_))
    }

    /// The current snapshot with its keys.
    ///
    /// Inside a running observer, a producer-backed read registers a
    /// dependency so the observer re-runs when the producer changes. A key
    /// failure aborts this read only; [`SharedDataset::last_valid`] keeps
    /// returning the previous good snapshot.
    pub fn read(&self) -> Result<Arc<KeyedSnapshot>> {
        let snapshot = self.source.pull();

        if let Some(cached) = self.last_valid.lock().as_ref() {
            if Arc::ptr_eq(cached.snapshot(), &snapshot) {
                return Ok(Arc::clone(cached));
            }
        }

        let keys = self.resolver.resolve(&snapshot).map_err(|err| {
            tracing::warn!(group = %self.group.name(), error = %err, "snapshot rejected");
            err
        })?;
        let keyed = Arc::new(KeyedSnapshot::new(snapshot, keys));
        *self.last_valid.lock() = Some(Arc::clone(&keyed));
        Ok(keyed)
    }

    /// The most recent snapshot that resolved cleanly, if any.
    pub fn last_valid(&self) -> Option<Arc<KeyedSnapshot>> {
        self.last_valid.lock().clone()
    }

    /// Selection marker for every row of the current snapshot, in row order.
    pub fn selection_marks(&self) -> Result<Vec<SelectionMark>> {
        let keyed = self.read()?;
        Ok(self
            .group
            .with_state(|selection, _| keyed.keys().iter().map(|k| selection.mark(k)).collect()))
    }

    /// The current snapshot with a tri-state selection column appended.
    ///
    /// The column holds `true` for selected rows, `false` for unselected rows
    /// of an active selection, and null for every row otherwise. A data
    /// column with the same name is replaced, with a warning.
    pub fn read_with_selection(&self) -> Result<Snapshot> {
        let keyed = self.read()?;
        let values = self.group.with_state(|selection, _| {
            keyed
                .keys()
                .iter()
                .map(|k| selection.mark(k).to_value())
                .collect()
        });
        let column = &self.group.config().selection_column;
        if keyed.snapshot().has_column(column) {
            tracing::warn!(
                group = %self.group.name(),
                column = %column,
                "data column replaced by the selection column"
            );
        }
        Ok(keyed.snapshot().with_column(column, values))
    }

    /// The current snapshot restricted to visible rows.
    pub fn read_with_filter(&self) -> Result<Snapshot> {
        let keyed = self.read()?;
        let Some(visible) = self.group.visible() else {
            return Ok(keyed.snapshot().as_ref().clone());
        };
        let keys = keyed.keys();
        Ok(keyed
            .snapshot()
            .retain_rows(|i, _| keys.get_index(i).is_some_and(|k| visible.contains(k))))
    }

    /// Call `on_invalidate` whenever the producer has a new snapshot.
    ///
    /// Static datasets never change, so this is a no-op for them.
    pub fn subscribe<F>(&self, id: ObserverId, on_invalidate: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        if let DataSource::Producer(p) = &self.source {
            p.subscribe(id, Box::new(on_invalidate));
        }
    }

    pub fn unsubscribe(&self, id: ObserverId) {
        if let DataSource::Producer(p) = &self.source {
            p.unsubscribe(id);
        }
    }
}

impl fmt::Debug for SharedDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedDataset")
            .field("group", &self.group.name())
            .field("source", &self.source)
            .field("rule", self.resolver.rule())
            .finish()
    }
}
