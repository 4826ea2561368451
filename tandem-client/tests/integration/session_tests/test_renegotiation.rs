use parking_lot::Mutex;
use std::sync::Arc;
use tandem_client::PeerSession;
use tandem_core::error::SessionError;
use tandem_core::model::{ConnectionId, NegotiationState};

use crate::integration::{init_tracing, initialized_session};
use crate::utils::{MockMediaTrack, wait_until};

type Delivered = Arc<Mutex<Vec<(String, ConnectionId)>>>;

fn capture_candidates(session: &PeerSession) -> Delivered {
    let delivered: Delivered = Arc::new(Mutex::new(Vec::new()));
    let sink = delivered.clone();
    session.on_ice_candidate(move |candidate, connection_id| {
        sink.lock().push((candidate.candidate, connection_id));
    });
    delivered
}

#[tokio::test]
async fn test_candidates_buffered_during_round_are_flushed_in_order() {
    init_tracing();
    let (session, transport) = initialized_session(&[MockMediaTrack::audio("mic")]).await;
    let delivered = capture_candidates(&session);

    let round = session
        .handle_renegotiation()
        .await
        .expect("renegotiation failed");
    assert_eq!(session.negotiation_state().await, NegotiationState::Renegotiating);
    assert_eq!(session.connection_id().await, Some(round.connection_id.clone()));

    transport.emit_candidate("candidate:a").await;
    transport.emit_candidate("candidate:b").await;
    assert!(
        wait_until(2000, || async { session.pending_candidate_count().await == 2 }).await,
        "candidates were not buffered"
    );
    assert!(delivered.lock().is_empty());

    assert_eq!(session.complete_renegotiation().await, 2);

    let delivered = delivered.lock().clone();
    assert_eq!(
        delivered,
        vec![
            ("candidate:a".to_owned(), round.connection_id.clone()),
            ("candidate:b".to_owned(), round.connection_id.clone()),
        ]
    );
    assert_eq!(session.pending_candidate_count().await, 0);
    assert_eq!(session.negotiation_state().await, NegotiationState::Stable);
}

#[tokio::test]
async fn test_overlapping_renegotiation_is_rejected() {
    init_tracing();
    let (session, transport) = initialized_session(&[]).await;

    session
        .handle_renegotiation()
        .await
        .expect("first round failed");
    let err = session.handle_renegotiation().await.unwrap_err();

    assert!(matches!(err, SessionError::RenegotiationInProgress));
    assert_eq!(transport.local_descriptions().len(), 1);
}

#[tokio::test]
async fn test_complete_with_empty_buffer_is_a_no_op() {
    init_tracing();
    let (session, _transport) = initialized_session(&[]).await;
    let delivered = capture_candidates(&session);

    assert_eq!(session.complete_renegotiation().await, 0);
    session
        .handle_renegotiation()
        .await
        .expect("renegotiation failed");
    assert_eq!(session.complete_renegotiation().await, 0);

    assert!(delivered.lock().is_empty());
    assert_eq!(session.negotiation_state().await, NegotiationState::Stable);
}

#[tokio::test]
async fn test_candidate_after_round_is_delivered_immediately() {
    init_tracing();
    let (session, transport) = initialized_session(&[]).await;
    let delivered = capture_candidates(&session);

    session
        .handle_renegotiation()
        .await
        .expect("renegotiation failed");
    session.complete_renegotiation().await;

    transport.emit_candidate("candidate:late").await;
    assert!(
        wait_until(2000, || async { delivered.lock().len() == 1 }).await,
        "late candidate was not delivered"
    );
    assert_eq!(session.pending_candidate_count().await, 0);
}

#[tokio::test]
async fn test_failed_offer_ends_the_round() {
    init_tracing();
    let (session, transport) = initialized_session(&[]).await;
    transport.fail_offers(true);

    let err = session.handle_renegotiation().await.unwrap_err();
    assert!(matches!(err, SessionError::Negotiation(_)));
    assert_eq!(session.negotiation_state().await, NegotiationState::Stable);

    transport.fail_offers(false);
    session
        .handle_renegotiation()
        .await
        .expect("round after failure should start");
}

#[tokio::test]
async fn test_each_offer_opens_a_new_connection_id() {
    init_tracing();
    let (session, _transport) = initialized_session(&[]).await;
    let initial = session.connection_id().await.expect("no connection id");

    let first = session.create_offer().await.expect("offer failed");
    let second = session.create_offer().await.expect("offer failed");

    assert_ne!(first.connection_id, initial);
    assert_ne!(first.connection_id, second.connection_id);
    assert_eq!(session.connection_id().await, Some(second.connection_id));
}
