//! Host Reactive Seam
//!
//! The linking layer does not schedule recomputation itself; it consumes a
//! reactive runtime through two primitives and re-runs observers through a
//! third:
//!
//! - `current_value`: read a reactive value, registering a dependency when
//!   called from inside a running observer.
//! - `on_invalidate`: get called back when a reactive value changes.
//! - `Observer::execute`: re-run a server-side computation.
//!
//! This module ships a small implementation of those primitives so the core
//! can be driven on its own and in tests.
//!
//! # Implementation Notes
//!
//! Dependencies are tracked through a thread-local stack of running
//! observers. Reading a [`ReactiveSource`] while an observer is on the stack
//! stores the observer's trigger in the source; `set` calls every stored
//! trigger, which re-runs the observer. An observer removes its trigger from
//! every source it no longer reads, and from all of them when it is disposed
//! or dropped.

mod context;
mod observer;
mod source;

pub use context::{ObserverId, ReactiveContext, SourceId, Trigger, Untrack};
pub use observer::Observer;
pub use source::{ReactiveSource, SnapshotProducer, StableRows};
