use thiserror::Error;

/// Failures of the peer session core.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not initialized")]
    NotInitialized,
    #[error("session already initialized")]
    AlreadyInitialized,
    #[error("a renegotiation round is already in flight")]
    RenegotiationInProgress,
    #[error("no sender bound to track {0}")]
    UnknownTrack(String),
    #[error("stream {0} carries no video track")]
    MissingVideoTrack(String),
    #[error("negotiation failed: {0}")]
    Negotiation(String),
    #[error("peer transport error: {0}")]
    Transport(String),
}

impl SessionError {
    pub(crate) fn describe(err: &anyhow::Error) -> String {
        format!("{err:#}")
    }

    pub fn negotiation(err: anyhow::Error) -> Self {
        Self::Negotiation(Self::describe(&err))
    }

    pub fn transport(err: anyhow::Error) -> Self {
        Self::Transport(Self::describe(&err))
    }
}

/// Failures of the signaling bridge.
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("not in a room")]
    NotInRoom,
    #[error("room id must not be empty")]
    InvalidRoom,
    #[error("{context}: {message}")]
    Transport { context: String, message: String },
    #[error("failed to encode signal payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SignalError {
    /// Wrap a signal store failure with what the bridge was doing at the time.
    pub fn transport(context: impl Into<String>, err: anyhow::Error) -> Self {
        Self::Transport {
            context: context.into(),
            message: format!("{err:#}"),
        }
    }
}

/// Failures of a data channel manager.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel is not open")]
    NotOpen,
    #[error("timed out waiting for the channel to open")]
    Timeout,
    #[error("no channel source to create a channel from")]
    NoChannelSource,
    #[error("send failed: {0}")]
    Send(String),
}
