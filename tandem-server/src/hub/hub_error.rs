use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HubError {
    #[error("room {0} not found")]
    RoomNotFound(String),
    #[error("{user_id} is not a member of room {room_id}")]
    NotAMember { room_id: String, user_id: String },
    #[error("signal for room {message_room} posted to room {room_id}")]
    RoomMismatch {
        room_id: String,
        message_room: String,
    },
}
