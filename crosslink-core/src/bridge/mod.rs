//! Sync Bridge
//!
//! The bridge moves state changes between client widgets and the server
//! side of a session through two explicit queues:
//!
//! - Inbound: decoded [`MutationMessage`]s from clients, applied in receipt
//!   order by [`SyncBridge::pump`] or by the async [`SyncBridge::run`] loop.
//! - Outbound: the debounced per-group delivery queues, drained by
//!   [`SyncBridge::flush`]. Remote widgets receive their notifications
//!   through a [`ChannelConsumer`].
//!
//! Nothing is delivered from inside a mutation. Consumers that react to a
//! notification by mutating again only enqueue work, so there are no
//! re-entrant callback cycles, and origin tagging keeps writes from echoing
//! back to their author.

pub mod debounce;
mod protocol;
mod remote;

pub use protocol::{
    ChangeKind, ConsumerHandle, MutationMessage, NotificationMessage, Origin, WireFormat,
    SERVER_ORIGIN,
};
pub use remote::{drain_encoded, ChannelConsumer};

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::group::{Discard, MutationOutcome};
use crate::session::Session;

/// Cloneable handle for feeding client messages into a bridge.
#[derive(Debug, Clone)]
pub struct InboundSender {
    tx: mpsc::UnboundedSender<MutationMessage>,
    format: WireFormat,
}

impl InboundSender {
    pub fn send(&self, message: MutationMessage) -> Result<()> {
        self.tx.send(message).map_err(|_| Error::SessionClosed)
    }

    /// Decode a raw frame and enqueue it.
    pub fn send_bytes(&self, frame: &[u8]) -> Result<()> {
        let message = self.format.decode(frame)?;
        self.send(message)
    }
}

/// Routes client mutations into a session and delivers due notifications.
pub struct SyncBridge {
    session: Arc<Session>,
    format: WireFormat,
    inbound_tx: mpsc::UnboundedSender<MutationMessage>,
    inbound_rx: mpsc::UnboundedReceiver<MutationMessage>,
}

impl SyncBridge {
    pub fn new(session: Arc<Session>, format: WireFormat) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Self {
            session,
            format,
            inbound_tx,
            inbound_rx,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn sender(&self) -> InboundSender {
        InboundSender {
            tx: self.inbound_tx.clone(),
            format: self.format,
        }
    }

    /// Apply one client message to its group.
    ///
    /// The group is created if the message is its first reference.
    pub fn apply_inbound(&self, message: MutationMessage, now: Instant) -> MutationOutcome {
        match self.session.group(&message.group_id) {
            Ok(group) => group.apply_message(message, now),
            Err(err) => {
                tracing::warn!(group = %message.group_id, error = %err, "inbound mutation dropped");
                MutationOutcome::Discarded(Discard::GroupClosed)
            }
        }
    }

    /// Apply every queued client message, in receipt order.
    pub fn pump(&mut self, now: Instant) -> Vec<MutationOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(message) = self.inbound_rx.try_recv() {
            outcomes.push(self.apply_inbound(message, now));
        }
        outcomes
    }

    /// Deliver every notification and observer run due at `now`.
    pub fn flush(&self, now: Instant) -> usize {
        self.session.flush(now)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.session.next_deadline()
    }

    /// Drive the bridge until `shutdown` resolves or the session closes.
    ///
    /// Inbound messages are applied as they arrive; pending deliveries fire
    /// at their debounce deadlines. Groups wake the loop when they queue new
    /// work.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let wake = self.session.wake();
        tracing::debug!("sync bridge running");

        while !self.session.is_closed() {
            let deadline = self.next_deadline();
            tokio::select! {
                _ = &mut shutdown => break,
                message = self.inbound_rx.recv() => {
                    // The bridge holds a sender, so the channel never closes.
                    if let Some(message) = message {
                        self.apply_inbound(message, Instant::now());
                    }
                }
                _ = wake.notified() => {}
                _ = wait_until(deadline) => {}
            }
            self.flush(Instant::now());
        }

        tracing::debug!("sync bridge stopped");
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LinkConfig;
    use crate::key::RowKey;
    use std::time::Duration;

    fn message(group: &str, origin: Origin, sequence: u64, keys: &[&str]) -> MutationMessage {
        MutationMessage {
            group_id: group.into(),
            kind: ChangeKind::Selection,
            source_id: origin,
            sequence,
            keys: Some(keys.iter().map(|k| RowKey::from(*k)).collect()),
        }
    }

    #[test]
    fn pump_applies_in_receipt_order() {
        let session = Arc::new(Session::new(LinkConfig::default()));
        let mut bridge = SyncBridge::new(session.clone(), WireFormat::Json);
        let sender = bridge.sender();

        sender.send(message("g", Origin::Server, 2, &["new"])).unwrap();
        sender.send(message("g", Origin::Server, 1, &["old"])).unwrap();

        let outcomes = bridge.pump(Instant::now());
        assert!(outcomes[0].is_applied());
        assert!(!outcomes[1].is_applied());

        let selection = session.group("g").unwrap().selection();
        assert!(selection.contains(&RowKey::from("new")));
    }

    #[test]
    fn send_bytes_decodes_frames() {
        let session = Arc::new(Session::default());
        let mut bridge = SyncBridge::new(session.clone(), WireFormat::MessagePack);
        let frame = WireFormat::MessagePack
            .encode(&message("g", Origin::Server, 1, &["a"]))
            .unwrap();

        bridge.sender().send_bytes(&frame).unwrap();
        assert_eq!(bridge.pump(Instant::now()).len(), 1);
        assert!(bridge.sender().send_bytes(b"\xc1").is_err());
    }

    #[test]
    fn closed_session_discards_inbound() {
        let session = Arc::new(Session::default());
        let bridge = SyncBridge::new(session.clone(), WireFormat::Json);
        session.close();
        let outcome = bridge.apply_inbound(message("g", Origin::Server, 1, &["a"]), Instant::now());
        assert_eq!(outcome, MutationOutcome::Discarded(Discard::GroupClosed));
    }

    #[test]
    fn next_deadline_tracks_pending_work() {
        let session = Arc::new(Session::default());
        let bridge = SyncBridge::new(session.clone(), WireFormat::Json);
        assert!(bridge.next_deadline().is_none());

        let (consumer, _rx) = ChannelConsumer::new();
        let group = session.group("g").unwrap();
        group.attach(Arc::new(consumer));
        group.server_set_selection(None);

        assert!(bridge.next_deadline().is_some());
        assert_eq!(bridge.flush(Instant::now() + Duration::from_millis(1)), 1);
        assert!(bridge.next_deadline().is_none());
    }
}
