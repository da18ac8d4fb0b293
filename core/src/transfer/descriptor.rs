//! Transfer descriptor: metadata for one addressed transfer
//!
//! A descriptor is fixed when created. The retry loop re-sends the same value
//! on every attempt; only the transport changes.

use crate::peer::{PeerId, SessionId};
use crate::session::SessionParticipants;
use serde::{Deserialize, Serialize};

/// Wire version tag attached to every descriptor and stamped envelope
pub const PROTOCOL_VERSION: &str = "tandem/1.2";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransferDescriptor {
    sender: PeerId,
    recipient: PeerId,
    kind: String,
    namespace: String,
    protocol_version: String,
    session_id: SessionId,
    compressed: bool,
}

impl TransferDescriptor {
    pub fn new(
        sender: PeerId,
        recipient: PeerId,
        kind: impl Into<String>,
        namespace: impl Into<String>,
        session_id: SessionId,
    ) -> Self {
        Self {
            sender,
            recipient,
            kind: kind.into(),
            namespace: namespace.into(),
            protocol_version: PROTOCOL_VERSION.to_string(),
            session_id,
            compressed: false,
        }
    }

    /// Descriptor addressed from the local participant of `session`
    pub fn for_session(
        session: &dyn SessionParticipants,
        recipient: PeerId,
        kind: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self::new(
            session.local_peer(),
            recipient,
            kind,
            namespace,
            session.session_id(),
        )
    }

    /// Copy with the compression flag decided
    pub fn with_compression(&self, compressed: bool) -> Self {
        Self {
            compressed,
            ..self.clone()
        }
    }

    pub fn sender(&self) -> &PeerId {
        &self.sender
    }

    pub fn recipient(&self) -> &PeerId {
        &self.recipient
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn protocol_version(&self) -> &str {
        &self.protocol_version
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }
}
