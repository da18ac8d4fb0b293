//! Transfer mode registry: per-recipient transport preference
//!
//! Tracks, per peer, whether a direct stream is available and whether the
//! peer has been switched to the mediated fallback mode. The switch is
//! one-way: once a peer prefers fallback it never goes back.
//! Every update runs under a single write lock so concurrent senders cannot
//! lose an escalation and make the peer flap between modes.

use crate::peer::PeerId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info};

/// How bytes reach a peer over the direct data channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferMode {
    /// True peer-to-peer stream
    Direct,
    /// In-band stream relayed by the fabric; slower, more reliable
    Mediated,
}

impl TransferMode {
    pub fn is_p2p(&self) -> bool {
        matches!(self, TransferMode::Direct)
    }
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferMode::Direct => write!(f, "Direct"),
            TransferMode::Mediated => write!(f, "Mediated"),
        }
    }
}

/// Mode state for one peer
#[derive(Debug)]
struct PeerModeState {
    /// Whether a direct stream could be established at all
    direct_available: bool,
    /// Sticky fallback preference
    prefers_fallback: bool,
}

impl PeerModeState {
    fn new(direct_available: bool) -> Self {
        Self {
            direct_available,
            prefers_fallback: false,
        }
    }

    fn mode(&self) -> TransferMode {
        if self.direct_available && !self.prefers_fallback {
            TransferMode::Direct
        } else {
            TransferMode::Mediated
        }
    }
}

#[derive(Default)]
pub struct TransferModeRegistry {
    states: RwLock<HashMap<PeerId, PeerModeState>>,
}

impl TransferModeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record whether a direct stream to `peer` is available
    pub fn set_direct_available(&self, peer: &PeerId, available: bool) {
        let mut states = self.states.write();
        states
            .entry(peer.clone())
            .or_insert_with(|| PeerModeState::new(available))
            .direct_available = available;
        debug!("Direct stream to {} available: {}", peer.prefix(), available);
    }

    /// Current mode; unknown peers are `Mediated`
    pub fn mode(&self, peer: &PeerId) -> TransferMode {
        self.states
            .read()
            .get(peer)
            .map(|s| s.mode())
            .unwrap_or(TransferMode::Mediated)
    }

    pub fn is_p2p(&self, peer: &PeerId) -> bool {
        self.mode(peer).is_p2p()
    }

    pub fn prefers_fallback(&self, peer: &PeerId) -> bool {
        self.states
            .read()
            .get(peer)
            .map(|s| s.prefers_fallback)
            .unwrap_or(false)
    }

    /// Switch `peer` to fallback mode; returns true if this call set the flag
    pub fn prefer_fallback(&self, peer: &PeerId) -> bool {
        let mut states = self.states.write();
        let state = states
            .entry(peer.clone())
            .or_insert_with(|| PeerModeState::new(false));

        if state.prefers_fallback {
            return false;
        }

        state.prefers_fallback = true;
        info!("Fallback mode enabled for {}", peer.prefix());
        true
    }
}
