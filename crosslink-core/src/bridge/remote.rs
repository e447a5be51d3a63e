//! Channel-backed consumers for remote widgets.

use tokio::sync::mpsc;

use super::protocol::{NotificationMessage, WireFormat};
use crate::error::Result;
use crate::group::Consumer;

/// A consumer that queues every notification for a transport to send.
///
/// The receiving half is the outbound queue of one client connection.
#[derive(Debug, Clone)]
pub struct ChannelConsumer {
    tx: mpsc::UnboundedSender<NotificationMessage>,
}

impl ChannelConsumer {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<NotificationMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Whether the transport side is still listening.
    pub fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }
}

impl Consumer for ChannelConsumer {
    fn notify(&self, message: &NotificationMessage) {
        if self.tx.send(message.clone()).is_err() {
            tracing::debug!(
                group = %message.group_id,
                sequence = message.sequence,
                "notification dropped, transport closed"
            );
        }
    }
}

/// Encode every queued notification, oldest first.
pub fn drain_encoded(
    rx: &mut mpsc::UnboundedReceiver<NotificationMessage>,
    format: WireFormat,
) -> Result<Vec<Vec<u8>>> {
    let mut frames = Vec::new();
    while let Ok(message) = rx.try_recv() {
        frames.push(format.encode(&message)?);
    }
    Ok(frames)
}
