use crate::transport::{ChannelErrorFn, ChannelEventFn, ChannelHandle, ChannelMessageFn};
use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tandem_core::model::ReadyState;
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;

/// [`ChannelHandle`] over a webrtc data channel.
pub struct RtcChannelHandle {
    channel: Arc<RTCDataChannel>,
}

impl RtcChannelHandle {
    pub fn new(channel: Arc<RTCDataChannel>) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl ChannelHandle for RtcChannelHandle {
    fn label(&self) -> String {
        self.channel.label().to_owned()
    }

    fn ready_state(&self) -> ReadyState {
        match self.channel.ready_state() {
            RTCDataChannelState::Open => ReadyState::Open,
            RTCDataChannelState::Closing | RTCDataChannelState::Closed => ReadyState::Closed,
            _ => ReadyState::Connecting,
        }
    }

    async fn send(&self, frame: Bytes) -> Result<()> {
        self.channel
            .send(&frame)
            .await
            .with_context(|| format!("Failed to send on channel '{}'", self.channel.label()))?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.channel.close().await?;
        Ok(())
    }

    fn on_open(&self, f: ChannelEventFn) {
        self.channel.on_open(Box::new(move || {
            f();
            Box::pin(async {})
        }));
    }

    fn on_close(&self, f: ChannelEventFn) {
        self.channel.on_close(Box::new(move || {
            f();
            Box::pin(async {})
        }));
    }

    fn on_error(&self, f: ChannelErrorFn) {
        self.channel.on_error(Box::new(move |err: webrtc::Error| {
            f(err.to_string());
            Box::pin(async {})
        }));
    }

    fn on_message(&self, f: ChannelMessageFn) {
        self.channel
            .on_message(Box::new(move |msg: DataChannelMessage| {
                f(msg.data);
                Box::pin(async {})
            }));
    }
}
