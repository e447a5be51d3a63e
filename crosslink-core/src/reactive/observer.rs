//! Observer Implementation
//!
//! An Observer is a server-side computation that re-runs when something it
//! depends on changes: a producer it read from, or the selection or filter
//! of a link group it watches.
//!
//! # Lifecycle
//!
//! 1. `Observer::new` runs the body once to pick up its sources.
//! 2. A source invalidation, or a due notification from a link group, calls
//!    `execute` again. Each run re-tracks sources from scratch.
//! 3. After `dispose`, the observer never runs again and its listeners are
//!    removed from every source. Dropping the last handle does the same.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::context::{ObserverId, ReactiveContext, SourceId, Trigger, Untrack};

struct ObserverInner {
    id: ObserverId,
    body: Box<dyn Fn() + Send + Sync>,
    sources: Mutex<HashMap<SourceId, Untrack>>,
    disposed: AtomicBool,
    running: AtomicBool,
    run_count: AtomicUsize,
}

impl ObserverInner {
    fn untrack_all(&self) {
        let sources: Vec<Untrack> = self.sources.lock().drain().map(|(_, u)| u).collect();
        for untrack in sources {
            untrack(self.id);
        }
    }
}

impl Drop for ObserverInner {
    fn drop(&mut self) {
        for (_, untrack) in self.sources.get_mut().drain() {
            untrack(self.id);
        }
    }
}

/// Clears the running flag even if the body panics.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn run(inner: &Arc<ObserverInner>) {
    if inner.disposed.load(Ordering::SeqCst) {
        return;
    }
    // A source set from inside the body would re-enter; skip that run.
    if inner.running.swap(true, Ordering::SeqCst) {
        return;
    }
    let _running = RunningGuard(&inner.running);

    let weak: Weak<ObserverInner> = Arc::downgrade(inner);
    let trigger: Trigger = Arc::new(move || {
        if let Some(inner) = weak.upgrade() {
            run(&inner);
        }
    });

    let tracked: HashMap<SourceId, Untrack> = {
        let _ctx = ReactiveContext::enter(inner.id, trigger);
        (inner.body)();
        ReactiveContext::take_tracked().into_iter().collect()
    };

    // Sources read last time but not this time no longer re-run us.
    let dropped: Vec<Untrack> = {
        let mut sources = inner.sources.lock();
        let previous = std::mem::replace(&mut *sources, tracked);
        previous
            .into_iter()
            .filter(|(id, _)| !sources.contains_key(id))
            .map(|(_, untrack)| untrack)
            .collect()
    };
    for untrack in dropped {
        untrack(inner.id);
    }

    inner.run_count.fetch_add(1, Ordering::SeqCst);
    if inner.disposed.load(Ordering::SeqCst) {
        inner.untrack_all();
    }
}

/// A re-runnable side-effecting computation.
#[derive(Clone)]
pub struct Observer {
    inner: Arc<ObserverInner>,
}

impl Observer {
    /// Create an observer and run it once.
    pub fn new<F>(body: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let observer = Self::new_lazy(body);
        observer.execute();
        observer
    }

    /// Create an observer without running it.
    pub fn new_lazy<F>(body: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(ObserverInner {
                id: ObserverId::new(),
                body: Box::new(body),
                sources: Mutex::new(HashMap::new()),
                disposed: AtomicBool::new(false),
                running: AtomicBool::new(false),
                run_count: AtomicUsize::new(0),
            }),
        }
    }

    pub fn id(&self) -> ObserverId {
        self.inner.id
    }

    /// Run the body now, re-tracking sources.
    pub fn execute(&self) {
        run(&self.inner);
    }

    /// Stop running and detach from every source.
    pub fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::SeqCst);
        self.inner.untrack_all();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Number of distinct sources read during the last run.
    pub fn source_count(&self) -> usize {
        self.inner.sources.lock().len()
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("id", &self.id())
            .field("run_count", &self.run_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    fn counter() -> (Arc<AtomicI32>, impl Fn() + Send + Sync + 'static) {
        let count = Arc::new(AtomicI32::new(0));
        let clone = Arc::clone(&count);
        (count, move || {
            clone.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn runs_on_creation() {
        let (count, body) = counter();
        let observer = Observer::new(body);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(observer.run_count(), 1);
    }

    #[test]
    fn lazy_waits_for_execute() {
        let (count, body) = counter();
        let observer = Observer::new_lazy(body);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        observer.execute();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn disposed_observer_stays_quiet() {
        let (count, body) = counter();
        let observer = Observer::new(body);
        observer.dispose();
        observer.execute();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(observer.is_disposed());
    }

    #[test]
    fn panicking_body_can_run_again() {
        let fail = Arc::new(AtomicBool::new(true));
        let (count, bump) = counter();
        let observer = {
            let fail = Arc::clone(&fail);
            Observer::new_lazy(move || {
                bump();
                if fail.load(Ordering::SeqCst) {
                    panic!("body failed");
                }
            })
        };

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| observer.execute()));
        assert!(result.is_err());
        assert!(!ReactiveContext::is_active());

        fail.store(false, Ordering::SeqCst);
        observer.execute();
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(observer.run_count(), 1);
    }

    #[test]
    fn clones_share_state() {
        let first = Observer::new(|| {});
        let second = first.clone();
        first.execute();
        assert_eq!(second.run_count(), 2);
        assert_eq!(first.id(), second.id());
    }
}
