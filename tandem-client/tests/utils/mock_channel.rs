use anyhow::{Result, anyhow};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tandem_client::{
    ChannelErrorFn, ChannelEventFn, ChannelHandle, ChannelMessageFn, ChannelSource,
};
use tandem_core::error::SessionError;
use tandem_core::model::ReadyState;

type EventSlot = Mutex<Option<Arc<dyn Fn() + Send + Sync>>>;

/// Data channel whose lifecycle is driven by the test.
pub struct MockChannelHandle {
    label: String,
    state: Mutex<ReadyState>,
    sent: Mutex<Vec<String>>,
    fail_sends: AtomicBool,
    on_open: EventSlot,
    on_close: EventSlot,
    on_message: Mutex<Option<Arc<dyn Fn(Bytes) + Send + Sync>>>,
}

impl MockChannelHandle {
    pub fn new(label: &str) -> Arc<Self> {
        Self::with_state(label, ReadyState::Connecting)
    }

    pub fn with_state(label: &str, state: ReadyState) -> Arc<Self> {
        Arc::new(Self {
            label: label.to_owned(),
            state: Mutex::new(state),
            sent: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
            on_open: Mutex::new(None),
            on_close: Mutex::new(None),
            on_message: Mutex::new(None),
        })
    }

    /// Transition to Open and fire the open observer.
    pub fn open(&self) {
        *self.state.lock() = ReadyState::Open;
        let observer = self.on_open.lock().clone();
        if let Some(observer) = observer {
            observer();
        }
    }

    /// Transition to Closed as if the peer hung up.
    pub fn close_remote(&self) {
        *self.state.lock() = ReadyState::Closed;
        let observer = self.on_close.lock().clone();
        if let Some(observer) = observer {
            observer();
        }
    }

    /// Deliver an inbound text frame.
    pub fn receive(&self, text: &str) {
        let observer = self.on_message.lock().clone();
        if let Some(observer) = observer {
            observer(Bytes::from(text.to_owned()));
        }
    }

    pub fn fail_sends(&self) {
        self.fail_sends.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl ChannelHandle for MockChannelHandle {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn ready_state(&self) -> ReadyState {
        *self.state.lock()
    }

    async fn send(&self, frame: Bytes) -> Result<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(anyhow!("mock send failure"));
        }
        if !self.ready_state().is_open() {
            return Err(anyhow!("mock channel not open"));
        }
        let text = String::from_utf8(frame.to_vec())?;
        self.sent.lock().push(text);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        *self.state.lock() = ReadyState::Closed;
        Ok(())
    }

    fn on_open(&self, f: ChannelEventFn) {
        *self.on_open.lock() = Some(Arc::from(f));
    }

    fn on_close(&self, f: ChannelEventFn) {
        *self.on_close.lock() = Some(Arc::from(f));
    }

    fn on_error(&self, _f: ChannelErrorFn) {}

    fn on_message(&self, f: ChannelMessageFn) {
        *self.on_message.lock() = Some(Arc::from(f));
    }
}

/// Channel source that hands out mock channels.
pub struct MockChannelSource {
    open_immediately: bool,
    fail: bool,
    delay: Duration,
    opened: AtomicUsize,
    channels: Mutex<Vec<Arc<MockChannelHandle>>>,
}

impl MockChannelSource {
    /// Channels come back already open.
    pub fn open() -> Arc<Self> {
        Self::build(true, false, Duration::ZERO)
    }

    /// Channels come back connecting; the test opens them.
    pub fn connecting() -> Arc<Self> {
        Self::build(false, false, Duration::ZERO)
    }

    pub fn failing() -> Arc<Self> {
        Self::build(false, true, Duration::ZERO)
    }

    /// Open channels after `delay`, to keep an initialization in flight.
    pub fn slow(delay: Duration) -> Arc<Self> {
        Self::build(true, false, delay)
    }

    fn build(open_immediately: bool, fail: bool, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            open_immediately,
            fail,
            delay,
            opened: AtomicUsize::new(0),
            channels: Mutex::new(Vec::new()),
        })
    }

    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn last_channel(&self) -> Option<Arc<MockChannelHandle>> {
        self.channels.lock().last().cloned()
    }
}

#[async_trait]
impl ChannelSource for MockChannelSource {
    async fn open_channel(&self, label: &str) -> Result<Arc<dyn ChannelHandle>, SessionError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(SessionError::Transport("mock channel source failure".into()));
        }
        let state = if self.open_immediately {
            ReadyState::Open
        } else {
            ReadyState::Connecting
        };
        let channel = MockChannelHandle::with_state(label, state);
        self.channels.lock().push(channel.clone());
        Ok(channel)
    }
}
