use crate::transport::{ChannelHandle, MediaTrack, TransportEvent};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tandem_core::config::SessionConfig;
use tandem_core::model::{IceCandidate, SessionDescription};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Opaque binding of one outgoing track to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SenderHandle(pub Uuid);

impl SenderHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SenderHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// The connection object a session negotiates over.
///
/// Event sources (candidates, negotiation-needed, remote tracks, inbound
/// channels) are delivered through the channel handed to [`TransportFactory::create`].
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn attach_track(&self, track: Arc<dyn MediaTrack>) -> Result<SenderHandle>;

    async fn detach_track(&self, sender: SenderHandle) -> Result<()>;

    /// Swap the track carried by `sender` without renegotiating.
    async fn replace_track(&self, sender: SenderHandle, track: Arc<dyn MediaTrack>) -> Result<()>;

    async fn create_offer(&self) -> Result<SessionDescription>;

    async fn create_answer(&self) -> Result<SessionDescription>;

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()>;

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()>;

    async fn add_remote_candidate(&self, candidate: IceCandidate) -> Result<()>;

    async fn create_channel(&self, label: &str) -> Result<Arc<dyn ChannelHandle>>;

    async fn close(&self) -> Result<()>;
}

/// Builds a fresh transport for each session initialization.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn create(
        &self,
        config: &SessionConfig,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Arc<dyn PeerTransport>>;
}
