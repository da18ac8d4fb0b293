//! Transport abstraction layer
//!
//! Contracts for the two physical paths a transfer can take:
//! - the fabric connection, which doubles as the signaling channel
//! - the opportunistic direct data channel between two peers
//!
//! Implementations live outside the core (or in `loopback` for tests).

use crate::error::TransportError;
use crate::peer::PeerId;
use crate::transfer::TransferDescriptor;
use crate::transport::signaling::Envelope;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[cfg(test)]
use mockall::automock;

/// State reported by the fabric for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnecting,
    NotConnected,
    Error,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Disconnecting => write!(f, "Disconnecting"),
            ConnectionState::NotConnected => write!(f, "NotConnected"),
            ConnectionState::Error => write!(f, "Error"),
        }
    }
}

/// Live handle to the signaling fabric
///
/// The handle can go stale between state notifications, so `is_connected`
/// must answer from the underlying connection, not from a cached flag.
#[async_trait]
pub trait FabricConnection: Send + Sync {
    fn is_connected(&self) -> bool;

    async fn send(&self, envelope: Envelope) -> Result<(), TransportError>;
}

/// Connection state notification pushed by the fabric
#[derive(Clone)]
pub struct ConnectionEvent {
    pub connection: Arc<dyn FabricConnection>,
    pub state: ConnectionState,
}

impl ConnectionEvent {
    pub fn new(connection: Arc<dyn FabricConnection>, state: ConnectionState) -> Self {
        Self { connection, state }
    }
}

impl fmt::Debug for ConnectionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionEvent")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Direct peer-to-peer data channel
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DirectDataChannel: Send + Sync {
    /// Send one payload; the recipient is named in the descriptor
    async fn send(
        &self,
        descriptor: &TransferDescriptor,
        payload: &[u8],
    ) -> Result<(), TransportError>;

    /// Whether a true peer-to-peer stream to `peer` is currently available
    fn is_peer_capable(&self, peer: &PeerId) -> bool;

    /// Make future transfers to `peer` prefer the slower, more reliable mode
    fn prefer_fallback_mode(&self, peer: &PeerId);
}

/// Source of user-list confirmations for one handshake
#[async_trait]
pub trait ConfirmationCollector: Send + Sync {
    /// Next confirming peer, or `None` if nothing arrived within `timeout`
    async fn next_result(&self, timeout: Duration) -> Option<PeerId>;

    /// Stop collecting and release the underlying filter
    fn cancel(&self);
}
