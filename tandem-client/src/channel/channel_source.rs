use crate::transport::ChannelHandle;
use async_trait::async_trait;
use std::sync::Arc;
use tandem_core::error::SessionError;

/// Whatever can create an outbound data channel to the peer.
#[async_trait]
pub trait ChannelSource: Send + Sync {
    async fn open_channel(&self, label: &str) -> Result<Arc<dyn ChannelHandle>, SessionError>;
}
