use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use tandem_core::model::ReadyState;

pub type ChannelEventFn = Box<dyn Fn() + Send + Sync>;
pub type ChannelErrorFn = Box<dyn Fn(String) + Send + Sync>;
pub type ChannelMessageFn = Box<dyn Fn(Bytes) + Send + Sync>;

/// One bidirectional message channel, either created locally or accepted from the peer.
///
/// Each `on_*` setter replaces the previously installed observer.
#[async_trait]
pub trait ChannelHandle: Send + Sync {
    fn label(&self) -> String;

    fn ready_state(&self) -> ReadyState;

    async fn send(&self, frame: Bytes) -> Result<()>;

    async fn close(&self) -> Result<()>;

    fn on_open(&self, f: ChannelEventFn);

    fn on_close(&self, f: ChannelEventFn);

    fn on_error(&self, f: ChannelErrorFn);

    fn on_message(&self, f: ChannelMessageFn);
}
