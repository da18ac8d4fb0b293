// Error taxonomy for the delivery layer
//
// `TransportError` describes one failed attempt on one channel. It never
// crosses the public API on its own: the retry loop either recovers from it
// or wraps the last one in `DeliveryError::RetriesExhausted`.

use crate::peer::PeerId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of a single transport attempt
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum TransportError {
    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Connection lost: {0}")]
    Disconnected(String),

    #[error("Message of {size} bytes exceeds the channel limit of {limit} bytes")]
    Oversize { size: usize, limit: usize },

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Peer unreachable: {0}")]
    PeerUnreachable(String),
}

/// Terminal outcome of a delivery operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("Not connected to the signaling fabric")]
    NotConnected,

    #[error("No session running")]
    NoActiveSession,

    #[error("Recipient {0} is offline")]
    RecipientOffline(PeerId),

    #[error("Recipient {0} is no longer part of the session")]
    NotParticipant(PeerId),

    #[error("Transport failure: {0}")]
    TransportFailure(#[from] TransportError),

    #[error("Delivery failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: TransportError },

    #[error("Payload of {size} bytes exceeds the signaling limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Invalid transfer descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Timed out waiting for confirmations from {} peer(s)", missing.len())]
    ConfirmationTimeout { missing: Vec<PeerId> },
}

impl DeliveryError {
    /// Whether the retry loop may recover from this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, DeliveryError::TransportFailure(_))
    }
}
