use serde::{Deserialize, Serialize};

/// Lifecycle of a bidirectional data channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadyState {
    Connecting,
    Open,
    Closed,
}

impl ReadyState {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

impl Default for ReadyState {
    fn default() -> Self {
        Self::Closed
    }
}
