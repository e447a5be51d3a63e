//! Reactive Sources
//!
//! A `ReactiveSource` is a versioned value cell standing in for a reactive
//! expression of the host runtime. It provides the two primitives the
//! linking layer consumes:
//!
//! - `current_value()`: read the latest value and, inside a running
//!   observer, register that observer as dependent.
//! - `on_invalidate(id, callback)`: run `callback` whenever the value changes.
//!
//! Shared datasets never hold a produced value; they hold a
//! [`SnapshotProducer`] and pull from it on every read.

use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};

use super::context::{ObserverId, ReactiveContext, SourceId, Trigger, Untrack};
use crate::data::Snapshot;
use crate::key::RowStability;

/// A reactive value holder.
pub struct ReactiveSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    id: SourceId,
    value: Arc<RwLock<T>>,
    version: Arc<AtomicU64>,
    listeners: Arc<Mutex<IndexMap<ObserverId, Trigger>>>,
}

impl<T> ReactiveSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(value: T) -> Self {
        Self {
            id: SourceId::new(),
            value: Arc::new(RwLock::new(value)),
            version: Arc::new(AtomicU64::new(0)),
            listeners: Arc::new(Mutex::new(IndexMap::new())),
        }
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    /// Number of times the value has been replaced.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Read the value, registering the running observer as a dependent.
    pub fn current_value(&self) -> T {
        if let Some((observer, trigger)) = ReactiveContext::current() {
            let listeners = Arc::downgrade(&self.listeners);
            let untrack: Untrack = Arc::new(move |observer| {
                if let Some(listeners) = listeners.upgrade() {
                    listeners.lock().shift_remove(&observer);
                }
            });
            ReactiveContext::track(self.id, untrack);
            self.listeners.lock().entry(observer).or_insert(trigger);
        }
        self.value.read().clone()
    }

    /// Read the value without registering a dependency.
    pub fn get_untracked(&self) -> T {
        self.value.read().clone()
    }

    /// Replace the value and invalidate every listener.
    pub fn set(&self, value: T) {
        *self.value.write() = value;
        self.version.fetch_add(1, Ordering::SeqCst);

        // Listeners may read this source again; call them without the lock.
        let listeners: Vec<Trigger> = self.listeners.lock().values().cloned().collect();
        tracing::trace!(listeners = listeners.len(), "reactive source invalidated");
        for notify in listeners {
            notify();
        }
    }

    /// Update the value from the current one.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let next = f(&self.value.read());
        self.set(next);
    }

    /// Register `callback` to run on every change.
    pub fn on_invalidate<F>(&self, id: ObserverId, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.listeners.lock().insert(id, Arc::new(callback));
    }

    pub fn remove_listener(&self, id: ObserverId) {
        self.listeners.lock().shift_remove(&id);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl<T> Clone for ReactiveSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            value: Arc::clone(&self.value),
            version: Arc::clone(&self.version),
            listeners: Arc::clone(&self.listeners),
        }
    }
}

impl<T> Debug for ReactiveSource<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveSource")
            .field("id", &self.id)
            .field("version", &self.version())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Capability to pull fresh snapshots from a changing source.
pub trait SnapshotProducer: Send + Sync {
    /// The latest snapshot. Inside a running observer this registers a
    /// dependency on the producer.
    fn pull(&self) -> Arc<Snapshot>;

    /// Call `on_invalidate` whenever a new snapshot is available.
    fn subscribe(&self, id: ObserverId, on_invalidate: Box<dyn Fn() + Send + Sync>);

    fn unsubscribe(&self, id: ObserverId);

    /// Whether successive snapshots keep row order and membership.
    fn stability(&self) -> RowStability {
        RowStability::Unstable
    }
}

impl SnapshotProducer for ReactiveSource<Arc<Snapshot>> {
    fn pull(&self) -> Arc<Snapshot> {
        self.current_value()
    }

    fn subscribe(&self, id: ObserverId, on_invalidate: Box<dyn Fn() + Send + Sync>) {
        self.on_invalidate(id, on_invalidate);
    }

    fn unsubscribe(&self, id: ObserverId) {
        self.remove_listener(id);
    }
}

/// A producer whose rows never move, appear, or disappear between pulls.
///
/// Wrapping a producer in `StableRows` is an assertion by the caller; it is
/// what allows positional keys on producer-backed data.
#[derive(Debug, Clone)]
pub struct StableRows<P>(pub P);

impl<P: SnapshotProducer> SnapshotProducer for StableRows<P> {
    fn pull(&self) -> Arc<Snapshot> {
        self.0.pull()
    }

    fn subscribe(&self, id: ObserverId, on_invalidate: Box<dyn Fn() + Send + Sync>) {
        self.0.subscribe(id, on_invalidate);
    }

    fn unsubscribe(&self, id: ObserverId) {
        self.0.unsubscribe(id);
    }

    fn stability(&self) -> RowStability {
        RowStability::Stable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Observer;
    use std::sync::atomic::AtomicI64;

    #[test]
    fn get_set_and_version() {
        let source = ReactiveSource::new(1);
        assert_eq!(source.get_untracked(), 1);
        source.set(2);
        source.update(|v| v * 10);
        assert_eq!(source.get_untracked(), 20);
        assert_eq!(source.version(), 2);
    }

    #[test]
    fn explicit_invalidation_callbacks() {
        let source = ReactiveSource::new(0);
        let seen = Arc::new(AtomicI64::new(0));
        let seen_clone = Arc::clone(&seen);
        let id = ObserverId::new();
        source.on_invalidate(id, move || {
            seen_clone.fetch_add(1, Ordering::SeqCst);
        });

        source.set(1);
        source.set(2);
        assert_eq!(seen.load(Ordering::SeqCst), 2);

        source.remove_listener(id);
        source.set(3);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn reading_inside_observer_registers_dependency() {
        let source = ReactiveSource::new(5_i64);
        let last = Arc::new(AtomicI64::new(-1));

        let observer = {
            let source = source.clone();
            let last = Arc::clone(&last);
            Observer::new(move || last.store(source.current_value(), Ordering::SeqCst))
        };
        assert_eq!(last.load(Ordering::SeqCst), 5);
        assert_eq!(observer.source_count(), 1);
        assert_eq!(source.listener_count(), 1);

        source.set(8);
        assert_eq!(last.load(Ordering::SeqCst), 8);
        assert_eq!(observer.run_count(), 2);
        // Re-running does not register a second listener.
        assert_eq!(source.listener_count(), 1);
    }

    #[test]
    fn disposed_observer_ignores_invalidation() {
        let source = ReactiveSource::new(0);
        let observer = {
            let source = source.clone();
            Observer::new(move || {
                source.current_value();
            })
        };
        observer.dispose();
        source.set(1);
        assert_eq!(observer.run_count(), 1);
    }

    #[test]
    fn disposed_and_dropped_observers_release_listeners() {
        let source = ReactiveSource::new(0);
        for _ in 0..100 {
            let observer = {
                let source = source.clone();
                Observer::new(move || {
                    source.current_value();
                })
            };
            observer.dispose();
        }
        assert_eq!(source.listener_count(), 0);

        for _ in 0..10 {
            let source = source.clone();
            drop(Observer::new(move || {
                source.current_value();
            }));
        }
        assert_eq!(source.listener_count(), 0);
    }

    #[test]
    fn rerun_releases_sources_no_longer_read() {
        let switch = ReactiveSource::new(true);
        let left = ReactiveSource::new(1_i64);
        let right = ReactiveSource::new(2_i64);

        let _observer = {
            let (switch, left, right) = (switch.clone(), left.clone(), right.clone());
            Observer::new(move || {
                if switch.current_value() {
                    left.current_value();
                } else {
                    right.current_value();
                }
            })
        };
        assert_eq!((left.listener_count(), right.listener_count()), (1, 0));

        switch.set(false);
        assert_eq!((left.listener_count(), right.listener_count()), (0, 1));
        assert_eq!(switch.listener_count(), 1);
    }

    #[test]
    fn stable_rows_reports_stability() {
        let source = ReactiveSource::new(Snapshot::default().shared());
        assert_eq!(source.stability(), RowStability::Unstable);
        assert_eq!(StableRows(source).stability(), RowStability::Stable);
    }
}
