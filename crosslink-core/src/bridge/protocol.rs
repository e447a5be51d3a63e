//! Wire Protocol
//!
//! Messages exchanged between client widgets and the server-side state.
//!
//! A mutation carries `{groupId, kind, sourceId, sequence, keys}`. A
//! notification carries the same fields plus `active` for selection
//! messages. Unknown fields are ignored on decode so newer peers can add
//! fields without breaking older ones.
//!
//! `keys` is nullable. On a selection message `null` means "no selection"
//! and `[]` means "an active selection of nothing". On a filter message
//! `null` means the source no longer restricts rows.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::key::RowKey;

/// The reserved `sourceId` for mutations made by the server.
pub const SERVER_ORIGIN: &str = "server";

/// Identifies one attached consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerHandle(u64);

impl ConsumerHandle {
    /// Allocate a handle unique within the process.
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Rebuild a handle from its wire id.
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConsumerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a mutation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Origin {
    /// The reactive server side.
    Server,
    /// An attached consumer.
    Consumer(ConsumerHandle),
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Server => f.write_str(SERVER_ORIGIN),
            Origin::Consumer(handle) => write!(f, "{handle}"),
        }
    }
}

impl From<ConsumerHandle> for Origin {
    fn from(handle: ConsumerHandle) -> Self {
        Origin::Consumer(handle)
    }
}

impl From<Origin> for String {
    fn from(origin: Origin) -> Self {
        origin.to_string()
    }
}

impl TryFrom<String> for Origin {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        if value == SERVER_ORIGIN {
            return Ok(Origin::Server);
        }
        value
            .parse::<u64>()
            .map(|id| Origin::Consumer(ConsumerHandle(id)))
            .map_err(|_| Error::InvalidOrigin { value })
    }
}

/// Which piece of shared state a message is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Selection,
    Filter,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Selection => f.write_str("selection"),
            ChangeKind::Filter => f.write_str("filter"),
        }
    }
}

/// A request to change selection or filter state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationMessage {
    pub group_id: String,
    pub kind: ChangeKind,
    pub source_id: Origin,
    pub sequence: u64,
    #[serde(default)]
    pub keys: Option<Vec<RowKey>>,
}

/// A state change pushed out to a consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationMessage {
    pub group_id: String,
    pub kind: ChangeKind,
    pub source_id: Origin,
    pub sequence: u64,
    #[serde(default)]
    pub keys: Option<Vec<RowKey>>,
    /// Present on selection notifications only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

/// Encoding used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireFormat {
    #[default]
    Json,
    /// MessagePack with named fields, so unknown fields can be skipped.
    MessagePack,
}

impl WireFormat {
    pub fn encode<T: Serialize>(&self, message: &T) -> Result<Vec<u8>> {
        match self {
            WireFormat::Json => Ok(serde_json::to_vec(message)?),
            WireFormat::MessagePack => Ok(rmp_serde::to_vec_named(message)?),
        }
    }

    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        match self {
            WireFormat::Json => Ok(serde_json::from_slice(bytes)?),
            WireFormat::MessagePack => Ok(rmp_serde::from_slice(bytes)?),
        }
    }
}
