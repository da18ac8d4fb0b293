//! Connection gate: liveness check in front of every send
//!
//! Holds the one live fabric connection. State changes arrive as
//! `ConnectionEvent`s; the gate never registers listeners of its own.
//! Install/clear take the write lock and the liveness check runs under the
//! read lock, so a send can never observe a handle halfway through being
//! cleared.

use crate::transport::abstraction::{ConnectionEvent, ConnectionState, FabricConnection};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Default)]
pub struct ConnectionGate {
    connection: RwLock<Option<Arc<dyn FabricConnection>>>,
}

impl ConnectionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one connection state notification
    pub fn handle_event(&self, event: ConnectionEvent) {
        let mut slot = self.connection.write();
        if event.state == ConnectionState::Connected {
            if slot.replace(event.connection).is_some() {
                debug!("Replacing previously installed fabric connection");
            }
            info!("Fabric connection installed");
        } else if slot.take().is_some() {
            info!("Fabric connection cleared ({})", event.state);
        } else {
            warn!(
                "Fabric connection already cleared, ignoring {} notification",
                event.state
            );
        }
    }

    /// Consume notifications until every sender is dropped
    pub async fn run(&self, mut events: mpsc::Receiver<ConnectionEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event);
        }
        debug!("Connection event stream closed");
    }

    /// Installed and still connected right now
    pub fn is_usable(&self) -> bool {
        self.connection
            .read()
            .as_ref()
            .map(|c| c.is_connected())
            .unwrap_or(false)
    }

    /// Handle for a single operation; do not keep it across operations
    pub fn current_handle(&self) -> Option<Arc<dyn FabricConnection>> {
        self.connection.read().clone()
    }

    /// Handle only if it passes the liveness check, taken under one lock
    pub(crate) fn usable_handle(&self) -> Option<Arc<dyn FabricConnection>> {
        self.connection
            .read()
            .as_ref()
            .filter(|c| c.is_connected())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::transport::signaling::Envelope;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct StubConnection {
        connected: AtomicBool,
    }

    impl StubConnection {
        fn new(connected: bool) -> Arc<Self> {
            Arc::new(Self {
                connected: AtomicBool::new(connected),
            })
        }
    }

    #[async_trait]
    impl FabricConnection for StubConnection {
        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        async fn send(&self, _envelope: Envelope) -> Result<(), TransportError> {
            Ok(())
        }
    }

    #[test]
    fn test_starts_unusable() {
        let gate = ConnectionGate::new();
        assert!(!gate.is_usable());
        assert!(gate.current_handle().is_none());
    }

    #[test]
    fn test_connected_event_installs_handle() {
        let gate = ConnectionGate::new();
        gate.handle_event(ConnectionEvent::new(
            StubConnection::new(true),
            ConnectionState::Connected,
        ));

        assert!(gate.is_usable());
        assert!(gate.current_handle().is_some());
    }

    #[test]
    fn test_other_states_clear_handle() {
        for state in [
            ConnectionState::Connecting,
            ConnectionState::Disconnecting,
            ConnectionState::NotConnected,
            ConnectionState::Error,
        ] {
            let gate = ConnectionGate::new();
            let conn = StubConnection::new(true);
            gate.handle_event(ConnectionEvent::new(conn.clone(), ConnectionState::Connected));
            gate.handle_event(ConnectionEvent::new(conn, state));

            assert!(!gate.is_usable(), "state {} should clear the gate", state);
        }
    }

    #[test]
    fn test_clearing_twice_is_harmless() {
        let gate = ConnectionGate::new();
        let conn = StubConnection::new(true);
        gate.handle_event(ConnectionEvent::new(conn.clone(), ConnectionState::NotConnected));
        gate.handle_event(ConnectionEvent::new(conn, ConnectionState::NotConnected));
        assert!(!gate.is_usable());
    }

    #[test]
    fn test_stale_handle_is_not_usable() {
        let gate = ConnectionGate::new();
        let conn = StubConnection::new(true);
        gate.handle_event(ConnectionEvent::new(conn.clone(), ConnectionState::Connected));
        assert!(gate.is_usable());

        // dropped underneath us, no notification yet
        conn.connected.store(false, Ordering::SeqCst);
        assert!(!gate.is_usable());
        assert!(gate.usable_handle().is_none());
        assert!(gate.current_handle().is_some());
    }

    #[test]
    fn test_new_connection_replaces_old() {
        let gate = ConnectionGate::new();
        let old = StubConnection::new(true);
        let new = StubConnection::new(true);
        gate.handle_event(ConnectionEvent::new(old.clone(), ConnectionState::Connected));
        gate.handle_event(ConnectionEvent::new(new, ConnectionState::Connected));

        old.connected.store(false, Ordering::SeqCst);
        assert!(gate.is_usable());
    }

    #[tokio::test]
    async fn test_run_consumes_events() {
        let gate = ConnectionGate::new();
        let (tx, rx) = mpsc::channel(4);
        let conn = StubConnection::new(true);

        tx.send(ConnectionEvent::new(conn.clone(), ConnectionState::Connected))
            .await
            .unwrap();
        drop(tx);
        gate.run(rx).await;
        assert!(gate.is_usable());

        let (tx, rx) = mpsc::channel(4);
        tx.send(ConnectionEvent::new(conn, ConnectionState::Disconnecting))
            .await
            .unwrap();
        drop(tx);
        gate.run(rx).await;
        assert!(!gate.is_usable());
    }
}
