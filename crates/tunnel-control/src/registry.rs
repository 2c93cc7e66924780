//! Connection registry
//!
//! Owns the single slot holding zero or one authenticated agent connection.
//! Install always succeeds and returns whatever it evicted; callers send the
//! hijack notice and force-close the evicted connection themselves.

use crate::connection::AgentConnection;
use std::sync::{Arc, Mutex};

/// The single-slot registry for the authoritative agent connection.
pub struct ConnectionRegistry {
    slot: Mutex<Option<Arc<AgentConnection>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Snapshot of the currently active connection, if any.
    pub fn current(&self) -> Option<Arc<AgentConnection>> {
        self.slot.lock().unwrap().clone()
    }

    /// Atomically make `conn` the active connection, returning the evicted
    /// one when the slot was occupied.
    pub fn install(&self, conn: Arc<AgentConnection>) -> Option<Arc<AgentConnection>> {
        let evicted = self.slot.lock().unwrap().replace(conn.clone());

        match evicted {
            Some(ref old) => {
                tracing::info!(
                    connection_id = %conn.id(),
                    evicted_id = %old.id(),
                    "Installed agent connection, evicting previous one"
                );
            }
            None => {
                tracing::info!(connection_id = %conn.id(), "Installed agent connection");
            }
        }

        evicted
    }

    /// Remove `conn` from the slot only if it is still the current one.
    ///
    /// Guards against a stale close handler racing a newer install: clearing
    /// on behalf of an evicted connection must not remove its replacement.
    /// Returns true when the slot was actually cleared.
    pub fn clear(&self, conn: &Arc<AgentConnection>) -> bool {
        let mut slot = self.slot.lock().unwrap();
        match slot.as_ref() {
            Some(current) if current.id() == conn.id() => {
                *slot = None;
                tracing::info!(connection_id = %conn.id(), "Cleared agent connection");
                true
            }
            _ => false,
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_empty() {
        let registry = ConnectionRegistry::new();
        assert!(registry.current().is_none());
    }

    #[test]
    fn test_install_into_empty_slot() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = AgentConnection::new();

        assert!(registry.install(conn.clone()).is_none());
        assert_eq!(registry.current().unwrap().id(), conn.id());
    }

    #[test]
    fn test_install_evicts_previous() {
        let registry = ConnectionRegistry::new();
        let (first, _rx1) = AgentConnection::new();
        let (second, _rx2) = AgentConnection::new();

        registry.install(first.clone());
        let evicted = registry.install(second.clone()).unwrap();

        assert_eq!(evicted.id(), first.id());
        assert_eq!(registry.current().unwrap().id(), second.id());
    }

    #[test]
    fn test_clear_removes_current() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = AgentConnection::new();

        registry.install(conn.clone());
        assert!(registry.clear(&conn));
        assert!(registry.current().is_none());
    }

    #[test]
    fn test_stale_clear_keeps_replacement() {
        let registry = ConnectionRegistry::new();
        let (old, _rx1) = AgentConnection::new();
        let (new, _rx2) = AgentConnection::new();

        registry.install(old.clone());
        registry.install(new.clone());

        // The evicted connection's close handler fires late
        assert!(!registry.clear(&old));
        assert_eq!(registry.current().unwrap().id(), new.id());
    }

    #[test]
    fn test_clear_on_empty_slot() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = AgentConnection::new();
        assert!(!registry.clear(&conn));
    }
}
