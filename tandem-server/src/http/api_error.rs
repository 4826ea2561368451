use crate::HubError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::warn;

/// Hub failure rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub HubError);

impl From<HubError> for ApiError {
    fn from(err: HubError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            HubError::RoomNotFound(_) => StatusCode::NOT_FOUND,
            HubError::NotAMember { .. } => StatusCode::FORBIDDEN,
            HubError::RoomMismatch { .. } => StatusCode::BAD_REQUEST,
        };
        warn!("Request rejected: {}", self.0);
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
