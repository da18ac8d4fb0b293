//! User-list confirmation wait
//!
//! Blocks until every expected peer has confirmed the participant list.
//! Polls the collector in short slices so cancellation and the overall
//! timeout are noticed within one poll interval.

use crate::delivery::orchestrator::DeliveryOrchestrator;
use crate::error::DeliveryError;
use crate::peer::PeerId;
use crate::transport::abstraction::ConfirmationCollector;
use std::collections::HashSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Cancels the collector however the wait ends
struct CollectorGuard<'a>(&'a dyn ConfirmationCollector);

impl Drop for CollectorGuard<'_> {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

impl DeliveryOrchestrator {
    pub async fn receive_user_list_confirmation(
        &self,
        collector: &dyn ConfirmationCollector,
        expected: &[PeerId],
        cancel: &CancellationToken,
    ) -> Result<(), DeliveryError> {
        let _guard = CollectorGuard(collector);

        if !self.gate().is_usable() {
            return Err(DeliveryError::NotConnected);
        }

        let poll = self.config().confirmation_poll();
        let deadline = Instant::now() + self.config().confirmation_timeout();
        let mut pending: HashSet<PeerId> = expected.iter().cloned().collect();

        while !pending.is_empty() {
            if cancel.is_cancelled() {
                return Err(DeliveryError::Cancelled);
            }

            if Instant::now() >= deadline {
                let mut missing: Vec<PeerId> = pending.into_iter().collect();
                missing.sort();
                return Err(DeliveryError::ConfirmationTimeout { missing });
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DeliveryError::Cancelled),
                result = collector.next_result(poll) => result,
            };

            let Some(peer) = result else { continue };

            if pending.remove(&peer) {
                debug!("User list confirmation from {}", peer.prefix());
            } else {
                warn!("User list confirmation from unknown peer {}", peer.prefix());
            }
        }

        Ok(())
    }
}
