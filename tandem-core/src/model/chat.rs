use crate::utils::now_millis;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Frame sent over a chat data channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayload {
    pub id: String,
    pub sender: String,
    pub content: String,
    pub timestamp: i64,
}

/// Entry of the local chat log. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub sender: String,
    pub content: String,
    pub timestamp: i64,
    pub is_local: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_peer: Option<String>,
}

impl ChatMessage {
    /// A message authored on this side.
    pub fn local(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender: sender.into(),
            content: content.into(),
            timestamp: now_millis(),
            is_local: true,
            origin_peer: None,
        }
    }

    /// A message that arrived on the channel of `origin_peer`.
    pub fn received(payload: ChatPayload, origin_peer: impl Into<String>) -> Self {
        Self {
            id: payload.id,
            sender: payload.sender,
            content: payload.content,
            timestamp: payload.timestamp,
            is_local: false,
            origin_peer: Some(origin_peer.into()),
        }
    }

    pub fn to_payload(&self) -> ChatPayload {
        ChatPayload {
            id: self.id.clone(),
            sender: self.sender.clone(),
            content: self.content.clone(),
            timestamp: self.timestamp,
        }
    }
}
