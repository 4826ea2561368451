use reqwest::StatusCode;
use tandem_core::model::SignalingMessage;

use crate::integration::{init_tracing, offer_from};
use crate::utils::TestServer;

#[tokio::test]
async fn test_signals_are_filtered_by_cursor() {
    init_tracing();
    let server = TestServer::start().await;
    let client = reqwest::Client::new();
    let room = server.hub.create(Some("alice"));
    let signals_url = server.url(&format!("/rooms/{}/signals", room.room_id));

    for timestamp in [100, 200, 300] {
        let response = client
            .post(&signals_url)
            .json(&offer_from("alice", &room.room_id, timestamp))
            .send()
            .await
            .expect("publish request failed");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    let newer: Vec<SignalingMessage> = client
        .get(format!("{signals_url}?since=100"))
        .send()
        .await
        .expect("poll request failed")
        .json()
        .await
        .expect("invalid poll response");

    let timestamps: Vec<i64> = newer.iter().map(|m| m.timestamp).collect();
    assert_eq!(timestamps, vec![200, 300]);
}

#[tokio::test]
async fn test_publish_requires_membership() {
    init_tracing();
    let server = TestServer::start().await;
    let room = server.hub.create(Some("alice"));

    let response = reqwest::Client::new()
        .post(server.url(&format!("/rooms/{}/signals", room.room_id)))
        .json(&offer_from("mallory", &room.room_id, 1))
        .send()
        .await
        .expect("publish request failed");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_publish_rejects_signal_for_another_room() {
    init_tracing();
    let server = TestServer::start().await;
    let room = server.hub.create(Some("alice"));
    let other = server.hub.create(Some("alice"));

    let response = reqwest::Client::new()
        .post(server.url(&format!("/rooms/{}/signals", room.room_id)))
        .json(&offer_from("alice", &other.room_id, 1))
        .send()
        .await
        .expect("publish request failed");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(server.hub.signals_since(&room.room_id, 0).unwrap().is_empty());
}

#[tokio::test]
async fn test_poll_unknown_room_is_not_found() {
    init_tracing();
    let server = TestServer::start().await;

    let response = reqwest::Client::new()
        .get(server.url("/rooms/missing/signals?since=0"))
        .send()
        .await
        .expect("poll request failed");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
