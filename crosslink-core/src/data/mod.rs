//! Dataset Model
//!
//! Rows, immutable snapshots, and the shared dataset that consumers read
//! through.

mod shared;
mod snapshot;
mod value;

pub use shared::{DataSource, SharedDataset};
pub use snapshot::{KeyedSnapshot, Row, Snapshot};
pub use value::Value;
