use serde::{Deserialize, Serialize};

/// Room membership granted by the signal store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomAssignment {
    pub room_id: String,
    pub user_id: String,
}

/// Body of the create/join/leave calls. A missing user id asks the store to assign one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Query for signals newer than a cursor.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SignalQuery {
    #[serde(default)]
    pub since: i64,
}
