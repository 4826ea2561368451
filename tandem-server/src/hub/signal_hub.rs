use crate::HubError;
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tandem_core::model::{RoomAssignment, SignalingMessage};
use tandem_core::traits::SignalStore;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Default)]
struct RoomLog {
    members: HashSet<String>,
    messages: Vec<(Instant, SignalingMessage)>,
}

impl RoomLog {
    fn prune(&mut self, retention: Duration) {
        let before = self.messages.len();
        self.messages
            .retain(|(published, _)| published.elapsed() <= retention);
        let pruned = before - self.messages.len();
        if pruned > 0 {
            debug!("Pruned {} expired signals", pruned);
        }
    }
}

/// In-memory rooms and their recent signals.
///
/// Signals are transient: each one is readable for the retention window only.
/// A room disappears when its last member leaves.
#[derive(Clone)]
pub struct SignalHub {
    rooms: Arc<DashMap<String, RoomLog>>,
    retention: Duration,
}

impl SignalHub {
    pub fn new(retention: Duration) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            retention,
        }
    }

    pub fn create(&self, user_id: Option<&str>) -> RoomAssignment {
        let room_id = Uuid::new_v4().to_string();
        let user_id = identity_or_new(user_id);

        let mut log = RoomLog::default();
        log.members.insert(user_id.clone());
        self.rooms.insert(room_id.clone(), log);

        info!("Creating new room: {}", room_id);
        RoomAssignment { room_id, user_id }
    }

    pub fn join(&self, room_id: &str, user_id: Option<&str>) -> Result<RoomAssignment, HubError> {
        let mut room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| HubError::RoomNotFound(room_id.to_owned()))?;
        let user_id = identity_or_new(user_id);
        room.members.insert(user_id.clone());
        info!("User {} joined room {} ({} members)", user_id, room_id, room.members.len());

        Ok(RoomAssignment {
            room_id: room_id.to_owned(),
            user_id,
        })
    }

    pub fn leave(&self, room_id: &str, user_id: &str) -> Result<(), HubError> {
        let now_empty = {
            let mut room = self
                .rooms
                .get_mut(room_id)
                .ok_or_else(|| HubError::RoomNotFound(room_id.to_owned()))?;
            if !room.members.remove(user_id) {
                return Err(HubError::NotAMember {
                    room_id: room_id.to_owned(),
                    user_id: user_id.to_owned(),
                });
            }
            info!("User {} left room {}", user_id, room_id);
            room.members.is_empty()
        };

        if now_empty {
            self.rooms
                .remove_if(room_id, |_, room| room.members.is_empty());
            info!("Room {} closed", room_id);
        }
        Ok(())
    }

    /// Store a signal for the room. Only members may publish, and only to the room the signal names.
    pub fn publish(&self, room_id: &str, message: SignalingMessage) -> Result<(), HubError> {
        if message.room_id != room_id {
            return Err(HubError::RoomMismatch {
                room_id: room_id.to_owned(),
                message_room: message.room_id,
            });
        }
        let mut room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| HubError::RoomNotFound(room_id.to_owned()))?;
        if !room.members.contains(&message.sender) {
            return Err(HubError::NotAMember {
                room_id: room_id.to_owned(),
                user_id: message.sender,
            });
        }

        room.prune(self.retention);
        debug!(
            "Signal {} from {} in room {}",
            message.signal_type, message.sender, room_id
        );
        room.messages.push((Instant::now(), message));
        Ok(())
    }

    /// Retained signals with a timestamp strictly greater than `since`, oldest first.
    pub fn signals_since(
        &self,
        room_id: &str,
        since: i64,
    ) -> Result<Vec<SignalingMessage>, HubError> {
        let mut room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| HubError::RoomNotFound(room_id.to_owned()))?;
        room.prune(self.retention);

        let mut messages: Vec<SignalingMessage> = room
            .messages
            .iter()
            .filter(|(_, message)| message.timestamp > since)
            .map(|(_, message)| message.clone())
            .collect();
        messages.sort_by_key(|message| message.timestamp);
        Ok(messages)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn members(&self, room_id: &str) -> Option<Vec<String>> {
        self.rooms.get(room_id).map(|room| {
            let mut members: Vec<String> = room.members.iter().cloned().collect();
            members.sort();
            members
        })
    }
}

fn identity_or_new(user_id: Option<&str>) -> String {
    user_id
        .filter(|id| !id.trim().is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// In-process store: lets a bridge talk to a hub without HTTP in between.
#[async_trait]
impl SignalStore for SignalHub {
    async fn send_signal(&self, room_id: &str, message: &SignalingMessage) -> Result<()> {
        Ok(self.publish(room_id, message.clone())?)
    }

    async fn get_signals(&self, room_id: &str, since: i64) -> Result<Vec<SignalingMessage>> {
        Ok(self.signals_since(room_id, since)?)
    }

    async fn create_room(&self, user_id: Option<&str>) -> Result<RoomAssignment> {
        Ok(self.create(user_id))
    }

    async fn join_room(&self, room_id: &str, user_id: Option<&str>) -> Result<RoomAssignment> {
        Ok(self.join(room_id, user_id)?)
    }

    async fn leave_room(&self, room_id: &str, user_id: &str) -> Result<()> {
        Ok(self.leave(room_id, user_id)?)
    }
}
