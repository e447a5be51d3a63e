//! Error types for crosslink.
//!
//! Protocol outcomes that are expected during normal operation (a stale
//! sequence number, a mutation from a widget that has already been torn down)
//! are not errors. They are reported as [`crate::group::MutationOutcome`]
//! values and logged.

use crate::key::RowKey;

/// Result type alias for crosslink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving keys, reading shared data, or
/// encoding wire messages.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A producer-backed dataset was constructed without a key rule that is
    /// stable across snapshots.
    #[error(
        "dataset in group '{group}' is producer-backed but has no explicit key rule; \
         positional keys are only valid when row order and membership never change"
    )]
    AmbiguousKey {
        /// The link group the dataset was being bound to.
        group: String,
    },

    /// Two rows in one snapshot resolved to the same key.
    #[error("duplicate row key '{key}' at rows {first} and {second}")]
    DuplicateKey {
        /// The key shared by both rows.
        key: RowKey,
        /// Index of the first row carrying the key.
        first: usize,
        /// Index of the second row carrying the key.
        second: usize,
    },

    /// A key column named by the key rule is absent from a row.
    #[error("key column '{column}' not found in snapshot")]
    MissingKeyColumn {
        /// The missing column.
        column: String,
    },

    /// A key column holds a null value.
    #[error("row {row} has a null value in key column '{column}'")]
    NullKey {
        /// Index of the offending row.
        row: usize,
        /// The key column.
        column: String,
    },

    /// A key cell that cannot identify a row unambiguously: its type differs
    /// from the column's first key cell, or it contains the composite key
    /// separator.
    #[error("row {row} has an unusable value in key column '{column}': {reason}")]
    InvalidKeyCell {
        /// Index of the offending row.
        row: usize,
        /// The key column.
        column: String,
        /// What is wrong with the cell.
        reason: String,
    },

    /// A key expression produced the wrong number of keys.
    #[error("key expression produced {actual} keys for a snapshot of {expected} rows")]
    KeyCount {
        /// Number of rows in the snapshot.
        expected: usize,
        /// Number of keys produced.
        actual: usize,
    },

    /// The session owning the requested state has ended.
    #[error("session has been closed")]
    SessionClosed,

    /// A wire `sourceId` that is neither the server origin nor a handle id.
    #[error("invalid source id '{value}'")]
    InvalidOrigin {
        /// The raw value received.
        value: String,
    },

    /// JSON encoding or decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// MessagePack encoding failed.
    #[error("MessagePack encode error: {0}")]
    MsgpackEncode(#[from] rmp_serde::encode::Error),

    /// MessagePack decoding failed.
    #[error("MessagePack decode error: {0}")]
    MsgpackDecode(#[from] rmp_serde::decode::Error),

    /// Invalid configuration.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },
}
