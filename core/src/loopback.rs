//! Loopback fabric: in-memory collaborators
//!
//! Implementations of every transport and session contract that run inside
//! one process. They record what they were asked to do, with timestamps
//! from `tokio::time::Instant` so tests under a paused clock can check
//! delays. Failures can be scripted per channel. The CLI simulator uses
//! them too.

use crate::error::TransportError;
use crate::peer::{PeerId, SessionId};
use crate::session::{PeerPresence, SessionParticipants};
use crate::transfer::{compress, decompress, TransferDescriptor};
use crate::transport::abstraction::{ConfirmationCollector, DirectDataChannel, FabricConnection};
use crate::transport::mode::{TransferMode, TransferModeRegistry};
use crate::transport::signaling::Envelope;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

// ============================================================================
// FAILURE SCRIPTING
// ============================================================================

/// When a loopback channel should fail a send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePlan {
    Never,
    Always,
    /// Fail the next `n` sends, then succeed
    First(u32),
}

impl FailurePlan {
    /// Consume one send; true if it must fail
    fn next_fails(&mut self) -> bool {
        match self {
            FailurePlan::Never => false,
            FailurePlan::Always => true,
            FailurePlan::First(0) => {
                *self = FailurePlan::Never;
                false
            }
            FailurePlan::First(n) => {
                *n -= 1;
                true
            }
        }
    }
}

// ============================================================================
// SIGNALING CONNECTION
// ============================================================================

/// An envelope the loopback connection accepted
#[derive(Debug, Clone)]
pub struct SentEnvelope {
    pub envelope: Envelope,
    pub encoded_len: usize,
    pub at: Instant,
}

pub struct LoopbackConnection {
    connected: AtomicBool,
    plan: Mutex<FailurePlan>,
    sent: Mutex<Vec<SentEnvelope>>,
}

impl LoopbackConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            connected: AtomicBool::new(true),
            plan: Mutex::new(FailurePlan::Never),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn set_failure_plan(&self, plan: FailurePlan) {
        *self.plan.lock() = plan;
    }

    pub fn sent(&self) -> Vec<SentEnvelope> {
        self.sent.lock().clone()
    }

    pub fn sent_to(&self, peer: &PeerId) -> Vec<SentEnvelope> {
        self.sent
            .lock()
            .iter()
            .filter(|s| &s.envelope.to == peer)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl FabricConnection for LoopbackConnection {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send(&self, envelope: Envelope) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Disconnected("loopback offline".to_string()));
        }

        // the wire form enforces the per-message ceiling
        let bytes = envelope.encode()?;

        if self.plan.lock().next_fails() {
            return Err(TransportError::SendFailed("scripted signaling failure".to_string()));
        }

        debug!("Loopback signaling accepted {} bytes for {}", bytes.len(), envelope.to);
        self.sent.lock().push(SentEnvelope {
            envelope,
            encoded_len: bytes.len(),
            at: Instant::now(),
        });
        Ok(())
    }
}

// ============================================================================
// DIRECT CHANNEL
// ============================================================================

/// One call to `LoopbackDirectChannel::send`
#[derive(Debug, Clone)]
pub struct DirectAttempt {
    pub descriptor: TransferDescriptor,
    /// Payload as the receiver reconstructed it
    pub payload: Vec<u8>,
    /// Bytes that crossed the link
    pub wire_len: usize,
    pub mode: TransferMode,
    pub delivered: bool,
    pub at: Instant,
}

pub struct LoopbackDirectChannel {
    modes: TransferModeRegistry,
    plan: Mutex<FailurePlan>,
    attempts: Mutex<Vec<DirectAttempt>>,
    fallback_requests: AtomicUsize,
}

impl LoopbackDirectChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            modes: TransferModeRegistry::new(),
            plan: Mutex::new(FailurePlan::Never),
            attempts: Mutex::new(Vec::new()),
            fallback_requests: AtomicUsize::new(0),
        })
    }

    /// Make a direct stream to `peer` available
    pub fn connect_peer(&self, peer: &PeerId) {
        self.modes.set_direct_available(peer, true);
    }

    pub fn modes(&self) -> &TransferModeRegistry {
        &self.modes
    }

    pub fn set_failure_plan(&self, plan: FailurePlan) {
        *self.plan.lock() = plan;
    }

    pub fn attempts(&self) -> Vec<DirectAttempt> {
        self.attempts.lock().clone()
    }

    pub fn fallback_requests(&self) -> usize {
        self.fallback_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DirectDataChannel for LoopbackDirectChannel {
    async fn send(
        &self,
        descriptor: &TransferDescriptor,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        let wire = if descriptor.is_compressed() {
            compress(payload)
        } else {
            payload.to_vec()
        };
        let fails = self.plan.lock().next_fails();

        let received = if descriptor.is_compressed() {
            decompress(&wire)?
        } else {
            wire.clone()
        };

        self.attempts.lock().push(DirectAttempt {
            descriptor: descriptor.clone(),
            payload: received,
            wire_len: wire.len(),
            mode: self.modes.mode(descriptor.recipient()),
            delivered: !fails,
            at: Instant::now(),
        });

        if fails {
            return Err(TransportError::PeerUnreachable(
                descriptor.recipient().to_string(),
            ));
        }
        Ok(())
    }

    fn is_peer_capable(&self, peer: &PeerId) -> bool {
        self.modes.is_p2p(peer)
    }

    fn prefer_fallback_mode(&self, peer: &PeerId) {
        self.fallback_requests.fetch_add(1, Ordering::SeqCst);
        self.modes.prefer_fallback(peer);
    }
}

// ============================================================================
// SESSION
// ============================================================================

pub struct LoopbackSession {
    id: SessionId,
    local: PeerId,
    host: PeerId,
    participants: RwLock<Vec<(PeerId, PeerPresence)>>,
    dropped: Mutex<Vec<PeerId>>,
}

impl LoopbackSession {
    /// Session containing the local peer and the host
    pub fn new(id: SessionId, local: PeerId, host: PeerId) -> Arc<Self> {
        let mut participants = vec![(local.clone(), PeerPresence::Online)];
        if host != local {
            participants.push((host.clone(), PeerPresence::Online));
        }

        Arc::new(Self {
            id,
            local,
            host,
            participants: RwLock::new(participants),
            dropped: Mutex::new(Vec::new()),
        })
    }

    pub fn add_participant(&self, peer: PeerId) {
        let mut participants = self.participants.write();
        if !participants.iter().any(|(p, _)| *p == peer) {
            participants.push((peer, PeerPresence::Online));
        }
    }

    /// Remove a participant without recording it as dropped
    pub fn remove_participant(&self, peer: &PeerId) {
        self.participants.write().retain(|(p, _)| p != peer);
    }

    pub fn set_presence(&self, peer: &PeerId, presence: PeerPresence) {
        if let Some(entry) = self.participants.write().iter_mut().find(|(p, _)| p == peer) {
            entry.1 = presence;
        }
    }

    /// Participants removed through `drop_participant`
    pub fn dropped(&self) -> Vec<PeerId> {
        self.dropped.lock().clone()
    }
}

impl SessionParticipants for LoopbackSession {
    fn session_id(&self) -> SessionId {
        self.id.clone()
    }

    fn local_peer(&self) -> PeerId {
        self.local.clone()
    }

    fn host(&self) -> PeerId {
        self.host.clone()
    }

    fn remote_peers(&self) -> Vec<PeerId> {
        self.participants
            .read()
            .iter()
            .filter(|(p, _)| *p != self.local)
            .map(|(p, _)| p.clone())
            .collect()
    }

    fn is_participant(&self, peer: &PeerId) -> bool {
        self.participants.read().iter().any(|(p, _)| p == peer)
    }

    fn connection_state(&self, peer: &PeerId) -> PeerPresence {
        self.participants
            .read()
            .iter()
            .find(|(p, _)| p == peer)
            .map(|(_, presence)| *presence)
            .unwrap_or(PeerPresence::Offline)
    }

    fn drop_participant(&self, peer: &PeerId) {
        self.remove_participant(peer);
        self.dropped.lock().push(peer.clone());
    }
}

// ============================================================================
// CONFIRMATION COLLECTOR
// ============================================================================

pub struct LoopbackCollector {
    tx: mpsc::UnboundedSender<PeerId>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<PeerId>>,
    cancelled: AtomicBool,
}

impl LoopbackCollector {
    pub fn new() -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            tx,
            rx: tokio::sync::Mutex::new(rx),
            cancelled: AtomicBool::new(false),
        })
    }

    /// Deliver a confirmation from `peer`
    pub fn confirm(&self, peer: PeerId) {
        if !self.is_cancelled() {
            let _ = self.tx.send(peer);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfirmationCollector for LoopbackCollector {
    async fn next_result(&self, timeout: Duration) -> Option<PeerId> {
        if self.is_cancelled() {
            return None;
        }
        let mut rx = self.rx.lock().await;
        tokio::time::timeout(timeout, rx.recv()).await.ok().flatten()
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}
