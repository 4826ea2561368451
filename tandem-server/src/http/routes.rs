use crate::{ApiError, SignalHub};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use tandem_core::model::{MembershipRequest, RoomAssignment, SignalQuery, SignalingMessage};
use tokio::net::TcpListener;

pub fn router(hub: SignalHub) -> Router {
    Router::new()
        .route("/rooms", post(create_room))
        .route("/rooms/{room_id}/join", post(join_room))
        .route("/rooms/{room_id}/leave", post(leave_room))
        .route(
            "/rooms/{room_id}/signals",
            post(publish_signal).get(list_signals),
        )
        .with_state(hub)
}

/// Serve the signal store routes on an already bound listener.
pub async fn serve_on(listener: TcpListener, hub: SignalHub) -> std::io::Result<()> {
    axum::serve(listener, router(hub)).await
}

async fn create_room(
    State(hub): State<SignalHub>,
    Json(request): Json<MembershipRequest>,
) -> Json<RoomAssignment> {
    Json(hub.create(request.user_id.as_deref()))
}

async fn join_room(
    State(hub): State<SignalHub>,
    Path(room_id): Path<String>,
    Json(request): Json<MembershipRequest>,
) -> Result<Json<RoomAssignment>, ApiError> {
    Ok(Json(hub.join(&room_id, request.user_id.as_deref())?))
}

async fn leave_room(
    State(hub): State<SignalHub>,
    Path(room_id): Path<String>,
    Json(request): Json<MembershipRequest>,
) -> Result<StatusCode, ApiError> {
    if let Some(user_id) = request.user_id {
        hub.leave(&room_id, &user_id)?;
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn publish_signal(
    State(hub): State<SignalHub>,
    Path(room_id): Path<String>,
    Json(message): Json<SignalingMessage>,
) -> Result<StatusCode, ApiError> {
    hub.publish(&room_id, message)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_signals(
    State(hub): State<SignalHub>,
    Path(room_id): Path<String>,
    Query(query): Query<SignalQuery>,
) -> Result<Json<Vec<SignalingMessage>>, ApiError> {
    Ok(Json(hub.signals_since(&room_id, query.since)?))
}
