//! Session membership contracts
//!
//! Membership and presence belong to the session layer. The delivery
//! layer asks who is in the session and whether a peer is reachable, and
//! reports peers it found offline.

use crate::peer::{PeerId, SessionId};
use parking_lot::RwLock;
use std::sync::Arc;

/// Presence of a participant as last reported by the fabric
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerPresence {
    Online,
    Offline,
}

/// View of a running session
pub trait SessionParticipants: Send + Sync {
    fn session_id(&self) -> SessionId;

    fn local_peer(&self) -> PeerId;

    /// The host, whether or not it is still connected
    fn host(&self) -> PeerId;

    /// Every participant except the local one
    fn remote_peers(&self) -> Vec<PeerId>;

    fn is_participant(&self, peer: &PeerId) -> bool;

    fn connection_state(&self, peer: &PeerId) -> PeerPresence;

    /// Remove a participant that was found offline
    fn drop_participant(&self, peer: &PeerId);

    fn is_local_host(&self) -> bool {
        self.local_peer() == self.host()
    }
}

/// Source of the currently running session, if any
pub trait SessionObserver: Send + Sync {
    fn current_session(&self) -> Option<Arc<dyn SessionParticipants>>;
}

/// Settable holder for the running session
#[derive(Default)]
pub struct SessionSlot {
    current: RwLock<Option<Arc<dyn SessionParticipants>>>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self, session: Arc<dyn SessionParticipants>) {
        *self.current.write() = Some(session);
    }

    pub fn end(&self) {
        self.current.write().take();
    }
}

impl SessionObserver for SessionSlot {
    fn current_session(&self) -> Option<Arc<dyn SessionParticipants>> {
        self.current.read().clone()
    }
}
