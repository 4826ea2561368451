use reqwest::StatusCode;
use serde_json::json;
use tandem_core::model::RoomAssignment;

use crate::integration::init_tracing;
use crate::utils::TestServer;

#[tokio::test]
async fn test_create_and_join_room() {
    init_tracing();
    let server = TestServer::start().await;
    let client = reqwest::Client::new();

    let created: RoomAssignment = client
        .post(server.url("/rooms"))
        .json(&json!({ "userId": "alice" }))
        .send()
        .await
        .expect("create request failed")
        .json()
        .await
        .expect("invalid create response");
    assert_eq!(created.user_id, "alice");

    let joined: RoomAssignment = client
        .post(server.url(&format!("/rooms/{}/join", created.room_id)))
        .json(&json!({}))
        .send()
        .await
        .expect("join request failed")
        .json()
        .await
        .expect("invalid join response");
    assert_eq!(joined.room_id, created.room_id);
    assert!(!joined.user_id.is_empty());
    assert_ne!(joined.user_id, "alice");

    let members = server.hub.members(&created.room_id).expect("room missing");
    assert_eq!(members.len(), 2);
}

#[tokio::test]
async fn test_join_unknown_room_is_not_found() {
    init_tracing();
    let server = TestServer::start().await;

    let response = reqwest::Client::new()
        .post(server.url("/rooms/nope/join"))
        .json(&json!({ "userId": "bob" }))
        .send()
        .await
        .expect("join request failed");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_leave_closes_room_after_last_member() {
    init_tracing();
    let server = TestServer::start().await;
    let client = reqwest::Client::new();
    let room = server.hub.create(Some("alice"));

    let response = client
        .post(server.url(&format!("/rooms/{}/leave", room.room_id)))
        .json(&json!({ "userId": "alice" }))
        .send()
        .await
        .expect("leave request failed");

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(server.hub.room_count(), 0);
}
