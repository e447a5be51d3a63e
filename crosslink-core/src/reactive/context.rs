//! Observer Context
//!
//! Tracks which observer is currently running so that reading a reactive
//! source inside it registers a dependency, the way a host runtime's
//! `currentValue` does.
//!
//! # Implementation
//!
//! A thread-local stack holds one entry per running observer. Entering pushes
//! an entry with the observer's invalidation trigger; the returned guard pops
//! it. Nested observer runs see only their own entry.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Callback that re-runs an observer after one of its sources changed.
pub type Trigger = Arc<dyn Fn() + Send + Sync>;

/// Removes an observer's listener from the source that handed it out.
pub type Untrack = Arc<dyn Fn(ObserverId) + Send + Sync>;

/// Unique identifier for an observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

impl ObserverId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ObserverId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifier of a reactive source, recorded as a dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(u64);

impl SourceId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SourceId {
    fn default() -> Self {
        Self::new()
    }
}

thread_local! {
    static RUNNING: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

struct Frame {
    observer: ObserverId,
    trigger: Trigger,
    sources: Vec<(SourceId, Untrack)>,
}

/// Guard for a running observer. Dropping it leaves the context.
pub struct ReactiveContext {
    observer: ObserverId,
}

impl ReactiveContext {
    /// Mark `observer` as running until the guard is dropped.
    pub fn enter(observer: ObserverId, trigger: Trigger) -> Self {
        RUNNING.with(|stack| {
            stack.borrow_mut().push(Frame {
                observer,
                trigger,
                sources: Vec::new(),
            });
        });
        Self { observer }
    }

    pub fn is_active() -> bool {
        RUNNING.with(|stack| !stack.borrow().is_empty())
    }

    /// The running observer and its trigger, if any.
    pub fn current() -> Option<(ObserverId, Trigger)> {
        RUNNING.with(|stack| {
            stack
                .borrow()
                .last()
                .map(|frame| (frame.observer, Arc::clone(&frame.trigger)))
        })
    }

    /// Record that the running observer read `source`. `untrack` undoes the
    /// registration once the observer stops depending on it.
    pub fn track(source: SourceId, untrack: Untrack) {
        RUNNING.with(|stack| {
            if let Some(frame) = stack.borrow_mut().last_mut() {
                if !frame.sources.iter().any(|(id, _)| *id == source) {
                    frame.sources.push((source, untrack));
                }
            }
        });
    }

    /// Sources read so far by the running observer.
    pub fn tracked_sources() -> Vec<SourceId> {
        RUNNING.with(|stack| {
            stack
                .borrow()
                .last()
                .map(|frame| frame.sources.iter().map(|(id, _)| *id).collect())
                .unwrap_or_default()
        })
    }

    /// Take the running observer's sources with their untrack handles.
    pub(crate) fn take_tracked() -> Vec<(SourceId, Untrack)> {
        RUNNING.with(|stack| {
            stack
                .borrow_mut()
                .last_mut()
                .map(|frame| std::mem::take(&mut frame.sources))
                .unwrap_or_default()
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        RUNNING.with(|stack| {
            let popped = stack.borrow_mut().pop();
            if let Some(frame) = popped {
                debug_assert_eq!(frame.observer, self.observer, "observer context mismatch");
            }
        });
    }
}
