//! Delivery orchestrator: reliable send of one session transfer
//!
//! Runs the `machine` transitions on the caller's task: direct channel
//! first, signaling channel for small payloads, bounded retries, and a
//! one-way switch to fallback mode halfway through the budget.

use crate::config::DeliveryConfig;
use crate::delivery::machine::{transition, DeliveryEvent, DeliveryState, RetryPolicy};
use crate::error::{DeliveryError, TransportError};
use crate::peer::PeerId;
use crate::session::{SessionObserver, SessionParticipants};
use crate::transfer::{CompressionPolicy, TransferDescriptor};
use crate::transport::abstraction::DirectDataChannel;
use crate::transport::gate::ConnectionGate;
use crate::transport::signaling::{Packet, SignalingSender};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct DeliveryOrchestrator {
    config: DeliveryConfig,
    compression: CompressionPolicy,
    signaling: SignalingSender,
    direct: Arc<dyn DirectDataChannel>,
    sessions: Arc<dyn SessionObserver>,
}

impl DeliveryOrchestrator {
    pub fn new(
        config: DeliveryConfig,
        gate: Arc<ConnectionGate>,
        direct: Arc<dyn DirectDataChannel>,
        sessions: Arc<dyn SessionObserver>,
    ) -> Self {
        Self {
            compression: CompressionPolicy::new(config.compress_threshold),
            config,
            signaling: SignalingSender::new(gate),
            direct,
            sessions,
        }
    }

    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    pub fn gate(&self) -> &Arc<ConnectionGate> {
        self.signaling.gate()
    }

    pub fn signaling(&self) -> &SignalingSender {
        &self.signaling
    }

    pub(crate) fn active_session(&self) -> Result<Arc<dyn SessionParticipants>, DeliveryError> {
        self.sessions
            .current_session()
            .ok_or(DeliveryError::NoActiveSession)
    }

    /// Deliver `payload` to a session participant
    ///
    /// Transient transport failures are retried up to `max_retries` times;
    /// only the terminal outcome is returned.
    pub async fn send_to_session_peer(
        &self,
        recipient: &PeerId,
        descriptor: &TransferDescriptor,
        payload: &[u8],
    ) -> Result<(), DeliveryError> {
        let session = self.active_session()?;
        check_descriptor(session.as_ref(), recipient, descriptor)?;

        // decided once by the policy; every attempt below re-sends this exact value
        let descriptor =
            descriptor.with_compression(self.compression.should_compress(payload.len()));

        let policy = RetryPolicy::new(
            self.config.max_retries,
            self.config.allow_signaling_fallback && payload.len() < self.config.max_inline_size,
        );

        let mut state = DeliveryState::ConnectionCheck;
        let mut retry = 0;
        let mut last_error: Option<TransportError> = None;
        let mut refusal: Option<DeliveryError> = None;

        loop {
            let event = match state {
                DeliveryState::ConnectionCheck => {
                    let usable = self.gate().is_usable();
                    DeliveryEvent::ConnectionChecked {
                        usable,
                        direct_capable: usable && self.direct.is_peer_capable(recipient),
                    }
                }
                DeliveryState::AttemptDirect => {
                    debug!(
                        "Sending {} bytes to {} over the direct channel (attempt {})",
                        payload.len(),
                        recipient.prefix(),
                        retry + 1
                    );
                    match self.direct.send(&descriptor, payload).await {
                        Ok(()) => DeliveryEvent::DirectSent,
                        Err(e) => {
                            error!(
                                "Could not send transfer to {} through a direct connection ({} bytes): {}",
                                recipient.prefix(),
                                payload.len(),
                                e
                            );
                            last_error = Some(e);
                            DeliveryEvent::DirectFailed
                        }
                    }
                }
                DeliveryState::AttemptSignaling {
                    after_direct_failure,
                } => {
                    if after_direct_failure {
                        warn!(
                            "Falling back to the signaling channel for {}",
                            recipient.prefix()
                        );
                    }
                    match self
                        .send_inline(session.as_ref(), recipient, &descriptor, payload)
                        .await
                    {
                        Ok(()) => DeliveryEvent::SignalingSent,
                        Err(e) if e.is_retryable() => {
                            last_error = Some(into_transport_error(e));
                            DeliveryEvent::SignalingFailed
                        }
                        Err(e) => {
                            warn!(
                                "Signaling send to {} cannot succeed: {}",
                                recipient.prefix(),
                                e
                            );
                            refusal = Some(e);
                            DeliveryEvent::SignalingRefused
                        }
                    }
                }
                DeliveryState::Escalate => {
                    info!("Enabling fallback mode for recipient {}", recipient.prefix());
                    self.direct.prefer_fallback_mode(recipient);
                    DeliveryEvent::Escalated
                }
                DeliveryState::Done => return Ok(()),
                DeliveryState::Disconnected => return Err(DeliveryError::NotConnected),
                DeliveryState::Refused => {
                    return Err(refusal.unwrap_or_else(|| DeliveryError::NotParticipant(recipient.clone())))
                }
                DeliveryState::Exhausted => {
                    return Err(DeliveryError::RetriesExhausted {
                        attempts: retry + 1,
                        last: last_error.unwrap_or_else(|| {
                            TransportError::SendFailed("no attempt recorded".to_string())
                        }),
                    })
                }
            };

            let step = transition(state, event, retry, &policy);
            if step.retry != retry {
                info!("Transfer retry #{} to {}", step.retry, recipient.prefix());
            }
            state = step.state;
            retry = step.retry;
        }
    }

    /// Carry a transfer inside one signaling message
    async fn send_inline(
        &self,
        session: &dyn SessionParticipants,
        recipient: &PeerId,
        descriptor: &TransferDescriptor,
        payload: &[u8],
    ) -> Result<(), DeliveryError> {
        // hard ceiling: larger payloads must never reach the signaling channel
        if payload.len() >= self.config.max_inline_size {
            return Err(DeliveryError::PayloadTooLarge {
                size: payload.len(),
                limit: self.config.max_inline_size,
            });
        }

        let packet = Packet::Transfer {
            descriptor: descriptor.clone(),
            payload: payload.to_vec(),
        };
        self.signaling
            .send_to_participant(session, recipient, packet)
            .await
    }

    /// Plain signaling send to any peer
    pub async fn send_message_to_peer(
        &self,
        peer: &PeerId,
        packet: Packet,
    ) -> Result<(), DeliveryError> {
        self.signaling.send_message_to_peer(peer, packet).await
    }

    /// Ask `peer` for the current participant list
    pub async fn send_user_list_request(&self, peer: &PeerId) -> Result<(), DeliveryError> {
        let session = self.active_session()?;
        self.send_message_to_peer(
            peer,
            Packet::UserListRequest {
                session_id: session.session_id(),
            },
        )
        .await
    }

    /// Low-level signaling write; see `SignalingSender::send_raw_packet`
    pub async fn send_raw_packet(
        &self,
        envelope: crate::transport::signaling::Envelope,
        stamp_version: bool,
    ) -> Result<(), DeliveryError> {
        self.signaling.send_raw_packet(envelope, stamp_version).await
    }
}

fn check_descriptor(
    session: &dyn SessionParticipants,
    recipient: &PeerId,
    descriptor: &TransferDescriptor,
) -> Result<(), DeliveryError> {
    if descriptor.recipient() != recipient {
        return Err(DeliveryError::InvalidDescriptor(format!(
            "addressed to {} but sent to {}",
            descriptor.recipient(),
            recipient
        )));
    }

    if descriptor.session_id().is_empty() || *descriptor.session_id() != session.session_id() {
        return Err(DeliveryError::InvalidDescriptor(format!(
            "session {:?} is not the running session",
            descriptor.session_id().as_str()
        )));
    }

    Ok(())
}

fn into_transport_error(err: DeliveryError) -> TransportError {
    match err {
        DeliveryError::TransportFailure(e) => e,
        other => TransportError::SendFailed(other.to_string()),
    }
}
