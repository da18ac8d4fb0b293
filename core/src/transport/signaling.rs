// Signaling channel: envelope framing and the serialized packet writer
//
// Every write to the fabric connection goes through `SignalingSender`. It is
// the only code that touches the live handle. Writes are serialized by an
// async mutex held for the whole write.

use crate::error::{DeliveryError, TransportError};
use crate::peer::{PeerId, SessionId};
use crate::session::{PeerPresence, SessionParticipants};
use crate::transfer::{TransferDescriptor, PROTOCOL_VERSION};
use crate::transport::gate::ConnectionGate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Hard per-message ceiling of the signaling channel (encoded envelope)
pub const MAX_ENVELOPE_SIZE: usize = 64 * 1024;

/// Envelope bytes kept free for addressing and descriptor fields when
/// sizing inline payloads
pub const ENVELOPE_HEADER_RESERVE: usize = 1024;

/// Body of a signaling message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Packet {
    /// A session transfer carried inline
    Transfer {
        descriptor: TransferDescriptor,
        payload: Vec<u8>,
    },
    /// The sender has left the session
    Leave { session_id: SessionId },
    /// Ask a peer to send back the participant list
    UserListRequest { session_id: SessionId },
    /// Confirms that a participant list was applied
    UserListReceived { session_id: SessionId },
}

impl Packet {
    pub fn name(&self) -> &'static str {
        match self {
            Packet::Transfer { .. } => "transfer",
            Packet::Leave { .. } => "leave",
            Packet::UserListRequest { .. } => "user-list-request",
            Packet::UserListReceived { .. } => "user-list-received",
        }
    }
}

/// Addressed signaling message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub to: PeerId,
    pub from: Option<PeerId>,
    /// Protocol version stamp, set by `send_raw_packet` on request
    pub version_tag: Option<String>,
    pub packet: Packet,
}

impl Envelope {
    pub fn new(to: PeerId, packet: Packet) -> Self {
        Self {
            to,
            from: None,
            version_tag: None,
            packet,
        }
    }

    pub fn from_peer(mut self, from: PeerId) -> Self {
        self.from = Some(from);
        self
    }

    pub fn is_stamped(&self) -> bool {
        self.version_tag.as_deref() == Some(PROTOCOL_VERSION)
    }

    /// Size of the encoded envelope in bytes
    pub fn encoded_len(&self) -> Result<usize, TransportError> {
        bincode::serialized_size(self)
            .map(|n| n as usize)
            .map_err(|e| TransportError::Codec(e.to_string()))
    }

    /// Serialize, refusing anything over the channel ceiling
    pub fn encode(&self) -> Result<Vec<u8>, TransportError> {
        let bytes = bincode::serialize(self).map_err(|e| TransportError::Codec(e.to_string()))?;

        if bytes.len() > MAX_ENVELOPE_SIZE {
            return Err(TransportError::Oversize {
                size: bytes.len(),
                limit: MAX_ENVELOPE_SIZE,
            });
        }

        Ok(bytes)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, TransportError> {
        if bytes.len() > MAX_ENVELOPE_SIZE {
            return Err(TransportError::Oversize {
                size: bytes.len(),
                limit: MAX_ENVELOPE_SIZE,
            });
        }

        bincode::deserialize(bytes).map_err(|e| TransportError::Codec(e.to_string()))
    }
}

/// Serialized writer over the gated fabric connection
pub struct SignalingSender {
    gate: Arc<ConnectionGate>,
    write_lock: Mutex<()>,
}

impl SignalingSender {
    pub fn new(gate: Arc<ConnectionGate>) -> Self {
        Self {
            gate,
            write_lock: Mutex::new(()),
        }
    }

    pub fn gate(&self) -> &Arc<ConnectionGate> {
        &self.gate
    }

    /// Write one envelope to the fabric
    pub async fn send_raw_packet(
        &self,
        mut envelope: Envelope,
        stamp_version: bool,
    ) -> Result<(), DeliveryError> {
        if stamp_version {
            envelope.version_tag = Some(PROTOCOL_VERSION.to_string());
        }

        let _guard = self.write_lock.lock().await;

        let connection = self.gate.usable_handle().ok_or(DeliveryError::NotConnected)?;

        let size = envelope.encoded_len()?;
        if size > MAX_ENVELOPE_SIZE {
            return Err(DeliveryError::PayloadTooLarge {
                size,
                limit: MAX_ENVELOPE_SIZE,
            });
        }

        debug!(
            "Sending {} packet to {} ({} bytes)",
            envelope.packet.name(),
            envelope.to.prefix(),
            size
        );

        connection.send(envelope).await.map_err(|e| {
            warn!("Could not send packet: {}", e);
            DeliveryError::TransportFailure(e)
        })
    }

    /// Send to a session participant after checking it is still reachable
    ///
    /// An offline participant is dropped from the session and reported as
    /// `RecipientOffline`; the caller must not retry.
    pub async fn send_to_participant(
        &self,
        session: &dyn SessionParticipants,
        peer: &PeerId,
        packet: Packet,
    ) -> Result<(), DeliveryError> {
        if !session.is_participant(peer) {
            warn!(
                "Could not send message to {}: no longer part of the session",
                peer.prefix()
            );
            return Err(DeliveryError::NotParticipant(peer.clone()));
        }

        if session.connection_state(peer) == PeerPresence::Offline {
            info!("Removing {} from the session: participant is offline", peer.prefix());
            session.drop_participant(peer);
            return Err(DeliveryError::RecipientOffline(peer.clone()));
        }

        let envelope = Envelope::new(peer.clone(), packet).from_peer(session.local_peer());
        self.send_raw_packet(envelope, true).await
    }

    /// Send to any peer, session member or not
    pub async fn send_message_to_peer(
        &self,
        peer: &PeerId,
        packet: Packet,
    ) -> Result<(), DeliveryError> {
        self.send_raw_packet(Envelope::new(peer.clone(), packet), true)
            .await
    }
}
