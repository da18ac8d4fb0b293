// Integration test: user-list handshake and confirmation wait

use std::sync::Arc;
use std::time::Duration;
use tandem_core::loopback::{LoopbackCollector, LoopbackConnection, LoopbackDirectChannel, LoopbackSession};
use tandem_core::{
    ConnectionEvent, ConnectionGate, ConnectionState, DeliveryConfig, DeliveryError,
    DeliveryOrchestrator, Packet, PeerId, SessionId, SessionSlot,
};
use tokio_util::sync::CancellationToken;

fn peer(name: &str) -> PeerId {
    PeerId::new(format!("{}@example.org", name))
}

fn orchestrator(config: DeliveryConfig) -> (Arc<DeliveryOrchestrator>, Arc<LoopbackConnection>) {
    let gate = Arc::new(ConnectionGate::new());
    let connection = LoopbackConnection::new();
    gate.handle_event(ConnectionEvent::new(
        connection.clone(),
        ConnectionState::Connected,
    ));

    let session = LoopbackSession::new(SessionId::new("handshake"), peer("host"), peer("host"));
    for name in ["bob", "carol"] {
        session.add_participant(peer(name));
    }
    let slot = Arc::new(SessionSlot::new());
    slot.start(session);

    let orchestrator = DeliveryOrchestrator::new(config, gate, LoopbackDirectChannel::new(), slot);
    (Arc::new(orchestrator), connection)
}

#[tokio::test(start_paused = true)]
async fn test_all_confirmations_received() {
    let (orch, _) = orchestrator(DeliveryConfig::default());
    let collector = LoopbackCollector::new();
    let expected = vec![peer("bob"), peer("carol")];

    let confirmer = collector.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(250)).await;
        confirmer.confirm(peer("carol"));
        tokio::time::sleep(Duration::from_millis(250)).await;
        confirmer.confirm(peer("bob"));
    });

    let result = orch
        .receive_user_list_confirmation(collector.as_ref(), &expected, &CancellationToken::new())
        .await;

    assert_eq!(result, Ok(()));
    assert!(collector.is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn test_unknown_confirmation_ignored() {
    let (orch, _) = orchestrator(DeliveryConfig::default());
    let collector = LoopbackCollector::new();

    collector.confirm(peer("mallory"));
    collector.confirm(peer("bob"));

    let result = orch
        .receive_user_list_confirmation(collector.as_ref(), &[peer("bob")], &CancellationToken::new())
        .await;

    assert_eq!(result, Ok(()));
}

#[tokio::test(start_paused = true)]
async fn test_empty_expected_set_returns_immediately() {
    let (orch, _) = orchestrator(DeliveryConfig::default());
    let collector = LoopbackCollector::new();

    let result = orch
        .receive_user_list_confirmation(collector.as_ref(), &[], &CancellationToken::new())
        .await;

    assert_eq!(result, Ok(()));
    assert!(collector.is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_observed_within_one_poll() {
    let config = DeliveryConfig::default();
    let poll = config.confirmation_poll();
    let (orch, _) = orchestrator(config);
    let collector = LoopbackCollector::new();
    let cancel = CancellationToken::new();

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1_050)).await;
        canceller.cancel();
    });

    let started = tokio::time::Instant::now();
    let result = orch
        .receive_user_list_confirmation(collector.as_ref(), &[peer("bob")], &cancel)
        .await;

    assert_eq!(result, Err(DeliveryError::Cancelled));
    assert!(started.elapsed() <= Duration::from_millis(1_050) + poll);
    assert!(collector.is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn test_timeout_lists_missing_peers() {
    let config = DeliveryConfig {
        confirmation_timeout_ms: 1_000,
        ..DeliveryConfig::default()
    };
    let (orch, _) = orchestrator(config);
    let collector = LoopbackCollector::new();
    collector.confirm(peer("bob"));

    let expected = vec![peer("dave"), peer("bob"), peer("carol")];
    let result = orch
        .receive_user_list_confirmation(collector.as_ref(), &expected, &CancellationToken::new())
        .await;

    assert_eq!(
        result,
        Err(DeliveryError::ConfirmationTimeout {
            missing: vec![peer("carol"), peer("dave")],
        })
    );
    assert!(collector.is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn test_wait_requires_connection() {
    let (orch, connection) = orchestrator(DeliveryConfig::default());
    connection.set_connected(false);
    let collector = LoopbackCollector::new();

    let result = orch
        .receive_user_list_confirmation(collector.as_ref(), &[peer("bob")], &CancellationToken::new())
        .await;

    assert_eq!(result, Err(DeliveryError::NotConnected));
    assert!(collector.is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn test_request_then_confirm_round() {
    let (orch, connection) = orchestrator(DeliveryConfig::default());
    let collector = LoopbackCollector::new();

    for name in ["bob", "carol"] {
        orch.send_user_list_request(&peer(name)).await.unwrap();
    }
    let requested: Vec<PeerId> = connection
        .sent()
        .iter()
        .filter(|s| matches!(s.envelope.packet, Packet::UserListRequest { .. }))
        .map(|s| s.envelope.to.clone())
        .collect();
    assert_eq!(requested, vec![peer("bob"), peer("carol")]);

    for peer in &requested {
        collector.confirm(peer.clone());
    }

    let result = orch
        .receive_user_list_confirmation(collector.as_ref(), &requested, &CancellationToken::new())
        .await;
    assert_eq!(result, Ok(()));
}
