//! Pending-reply table
//!
//! Maps outstanding correlation ids to the waiters expecting their replies.
//! Each table is scoped to one agent connection; when that connection goes
//! away the whole table is failed at once.

use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::oneshot;
use tunnel_proto::{CorrelationId, ResponseEnvelope};

/// Correlation id → waiter mapping for one connection.
///
/// A waiter resolves exactly once: with the matching reply, or with a
/// closed-channel failure when the sender side is dropped (`fail_all`), or
/// not at all here when the relay times out and removes its own entry.
pub struct PendingReplies {
    inner: Mutex<HashMap<CorrelationId, oneshot::Sender<ResponseEnvelope>>>,
}

impl PendingReplies {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Register a waiter for `id`. The receiver completes with the reply,
    /// or errors once the sender is dropped (connection closed/evicted).
    pub fn register(&self, id: CorrelationId) -> oneshot::Receiver<ResponseEnvelope> {
        let (tx, rx) = oneshot::channel();
        self.inner.lock().unwrap().insert(id, tx);
        rx
    }

    /// Deliver a reply to the waiter with the matching id.
    ///
    /// Returns false when no such waiter exists (already resolved, timed
    /// out, or the agent invented an id); the reply is dropped in that case.
    pub fn resolve(&self, envelope: ResponseEnvelope) -> bool {
        let sender = self.inner.lock().unwrap().remove(&envelope.correlation_id);
        match sender {
            Some(tx) => tx.send(envelope).is_ok(),
            None => false,
        }
    }

    /// Remove a waiter without resolving it (timeout path). A reply that
    /// arrives later finds no entry and is dropped.
    pub fn forget(&self, id: CorrelationId) {
        self.inner.lock().unwrap().remove(&id);
    }

    /// Fail every outstanding waiter by dropping its sender. Receivers
    /// observe a closed channel. Already-resolved entries are gone from the
    /// map, so they are unaffected.
    pub fn fail_all(&self) {
        let drained: Vec<_> = self.inner.lock().unwrap().drain().collect();
        if !drained.is_empty() {
            tracing::debug!(count = drained.len(), "Failing pending requests");
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }
}

impl Default for PendingReplies {
    fn default() -> Self {
        Self::new()
    }
}
