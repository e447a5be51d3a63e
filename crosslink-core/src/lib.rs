//! Crosslink Core
//!
//! Bidirectional data linking for interactive sessions. Several views of one
//! dataset (tables, charts, maps, server-side code) share a selection and a
//! filter through a named link group, and every participant sees every other
//! participant's changes.
//!
//! - Stable row identity through a [`KeyResolver`](key::KeyResolver)
//! - Shared selection and multi-source filter state per [`LinkGroup`]
//! - Debounced, origin-tagged, sequence-ordered change delivery
//! - A wire protocol and [`SyncBridge`] for remote widgets
//! - A thin observer runtime that re-runs server code on change
//!
//! # Architecture
//!
//! - `key`: row identity and key rules
//! - `data`: snapshots and the shared dataset consumers read through
//! - `state`: selection and filter values
//! - `group`: link groups, consumers, and the delivery queues
//! - `bridge`: wire messages, debouncing, and the client bridge
//! - `reactive`: observers and invalidating sources
//! - `session`: the explicit owner of a client's groups
//!
//! # Example
//!
//! ```rust,ignore
//! use crosslink_core::{KeyRule, Session, Snapshot, Value};
//!
//! let session = Session::default();
//! let cars = Snapshot::from_records(
//!     &["id", "mpg"],
//!     vec![
//!         vec![Value::from("a"), Value::from(21)],
//!         vec![Value::from("b"), Value::from(33)],
//!     ],
//! );
//! let data = session.shared_dataset("cars", cars.into(), Some(KeyRule::column("id")))?;
//!
//! data.group().server_set_selection(Some(vec!["b".into()]));
//! let marked = data.read_with_selection()?;
//! // selected_ = [false, true]
//! ```

pub mod bridge;
pub mod config;
pub mod data;
pub mod error;
pub mod group;
pub mod key;
pub mod reactive;
pub mod session;
pub mod state;

#[cfg(feature = "python")]
mod python;

pub use bridge::{ChannelConsumer, InboundSender, SyncBridge, WireFormat};
pub use config::LinkConfig;
pub use data::{DataSource, SharedDataset, Snapshot, Value};
pub use error::{Error, Result};
pub use group::{Consumer, Discard, LinkGroup, MutationOutcome};
pub use key::{KeyRule, RowKey};
pub use session::Session;

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// Python module definition.
///
/// Registers the session class used by the Python front end.
#[cfg(feature = "python")]
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<python::PyLinkSession>()?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    Ok(())
}
