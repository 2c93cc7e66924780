//! The active agent connection

use crate::pending::PendingReplies;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

/// A frame queued for the transport writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// JSON text frame.
    Text(String),
    /// Close the underlying socket.
    Close,
}

#[derive(Debug, Error)]
#[error("agent channel is closed")]
pub struct ChannelClosed;

/// One authenticated agent channel.
///
/// At most one live instance is held by the [`ConnectionRegistry`] at any
/// time. The transport layer owns the socket; this handle owns the outbound
/// frame queue and the pending-reply table scoped to this connection.
///
/// [`ConnectionRegistry`]: crate::registry::ConnectionRegistry
pub struct AgentConnection {
    id: Uuid,
    outbound: mpsc::UnboundedSender<OutboundFrame>,
    closed: AtomicBool,
    pending: PendingReplies,
}

impl AgentConnection {
    /// Create a connection handle plus the receiver its transport writer
    /// task must drain.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<OutboundFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Arc::new(Self {
            id: Uuid::new_v4(),
            outbound: tx,
            closed: AtomicBool::new(false),
            pending: PendingReplies::new(),
        });
        (conn, rx)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Pending-reply table for requests in flight on this connection.
    pub fn pending(&self) -> &PendingReplies {
        &self.pending
    }

    /// Queue a text frame for the agent.
    pub fn send_text(&self, frame: String) -> Result<(), ChannelClosed> {
        if self.is_closed() {
            return Err(ChannelClosed);
        }
        self.outbound
            .send(OutboundFrame::Text(frame))
            .map_err(|_| ChannelClosed)
    }

    /// Force-close the connection: queue a socket close and fail every
    /// request still pending on it. Safe to call more than once; only the
    /// first call has any effect.
    pub fn force_close(&self) {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        tracing::debug!(connection_id = %self.id, "Closing agent connection");

        // Writer task may already be gone; nothing left to signal then.
        let _ = self.outbound.send(OutboundFrame::Close);
        self.pending.fail_all();
    }
}
