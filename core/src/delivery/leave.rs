//! Leave-session broadcast
//!
//! Remote participants hear about our departure in parallel. The host hears
//! last: its acknowledgment starts session teardown, so every other
//! notification is dispatched first and a fixed quiescence delay passes
//! before the host is told. The delay is a best-effort heuristic; it does
//! not wait for the other peers to confirm.

use crate::delivery::orchestrator::DeliveryOrchestrator;
use crate::error::DeliveryError;
use crate::peer::PeerId;
use crate::transport::signaling::Packet;
use futures::future::join_all;
use tracing::{debug, info, warn};

/// Per-peer outcome of a leave broadcast
#[derive(Debug, Default)]
pub struct LeaveReport {
    pub notified: Vec<PeerId>,
    pub failed: Vec<(PeerId, DeliveryError)>,
    /// Whether the host was notified in the delayed final step
    pub host_notified: bool,
}

impl LeaveReport {
    fn record(&mut self, peer: PeerId, result: Result<(), DeliveryError>) {
        match result {
            Ok(()) => self.notified.push(peer),
            Err(e) => {
                warn!("Could not send leave notification to {}: {}", peer.prefix(), e);
                self.failed.push((peer, e));
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

impl DeliveryOrchestrator {
    /// Tell every remote participant that the local side left the session
    pub async fn send_leave_notifications(&self) -> Result<LeaveReport, DeliveryError> {
        let session = self.active_session()?;
        if !self.gate().is_usable() {
            return Err(DeliveryError::NotConnected);
        }

        let packet = Packet::Leave {
            session_id: session.session_id(),
        };
        let host = session.host();
        let mut remote = session.remote_peers();
        let host_present = remote.contains(&host);
        remote.retain(|peer| *peer != host);

        debug!(
            "Sending leave notifications to {} participant(s), host present: {}",
            remote.len(),
            host_present
        );

        let session_ref = session.as_ref();
        let sends = remote.into_iter().map(|peer| {
            let packet = packet.clone();
            async move {
                let result = self
                    .signaling()
                    .send_to_participant(session_ref, &peer, packet)
                    .await;
                (peer, result)
            }
        });

        let mut report = LeaveReport::default();
        for (peer, result) in join_all(sends).await {
            report.record(peer, result);
        }

        if !session.is_local_host() && host_present {
            tokio::time::sleep(self.config().leave_quiescence()).await;

            info!("Notifying host {} of leave", host.prefix());
            let result = self
                .signaling()
                .send_to_participant(session_ref, &host, packet)
                .await;
            report.host_notified = result.is_ok();
            report.record(host, result);
        }

        Ok(report)
    }
}
