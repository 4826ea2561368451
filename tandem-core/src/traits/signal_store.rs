use crate::model::{RoomAssignment, SignalingMessage};
use anyhow::Result;
use async_trait::async_trait;

/// Out-of-band store the signaling bridge polls.
///
/// Implementations hold messages transiently; readers move a timestamp cursor
/// forward and only ever ask for what is newer.
#[async_trait]
pub trait SignalStore: Send + Sync {
    async fn send_signal(&self, room_id: &str, message: &SignalingMessage) -> Result<()>;

    /// Messages of `room_id` whose timestamp is strictly greater than `since`.
    async fn get_signals(&self, room_id: &str, since: i64) -> Result<Vec<SignalingMessage>>;

    async fn create_room(&self, user_id: Option<&str>) -> Result<RoomAssignment>;

    async fn join_room(&self, room_id: &str, user_id: Option<&str>) -> Result<RoomAssignment>;

    async fn leave_room(&self, room_id: &str, user_id: &str) -> Result<()>;
}
