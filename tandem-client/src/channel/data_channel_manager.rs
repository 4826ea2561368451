use crate::channel::{ChannelSource, ObserverList, SubscriptionId};
use crate::transport::ChannelHandle;
use bytes::Bytes;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tandem_core::config::ChannelConfig;
use tandem_core::error::ChannelError;
use tandem_core::model::ReadyState;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

type PendingInit = Shared<BoxFuture<'static, bool>>;

struct ManagerInner {
    peer_key: String,
    config: ChannelConfig,
    source: Option<Arc<dyn ChannelSource>>,
    channel: Mutex<Option<Arc<dyn ChannelHandle>>>,
    /// Bumped on every attach; observers of a replaced channel see a stale value.
    generation: AtomicU64,
    ready_tx: watch::Sender<ReadyState>,
    message_observers: ObserverList<str>,
    state_observers: ObserverList<ReadyState>,
    pending_init: Mutex<Option<PendingInit>>,
}

/// Lifecycle of the one message channel to one peer.
#[derive(Clone)]
pub struct DataChannelManager {
    inner: Arc<ManagerInner>,
}

impl DataChannelManager {
    /// `source` is only needed on the initiating side.
    pub fn new(
        peer_key: impl Into<String>,
        source: Option<Arc<dyn ChannelSource>>,
        config: ChannelConfig,
    ) -> Self {
        let (ready_tx, _) = watch::channel(ReadyState::Closed);
        let message_observers = ObserverList::new("channel message observer");
        let state_observers =
            ObserverList::sharing_ids_with("channel state observer", &message_observers);
        Self {
            inner: Arc::new(ManagerInner {
                peer_key: peer_key.into(),
                config,
                source,
                channel: Mutex::new(None),
                generation: AtomicU64::new(0),
                ready_tx,
                message_observers,
                state_observers,
                pending_init: Mutex::new(None),
            }),
        }
    }

    /// Establish the channel and wait, bounded by the open timeout, until it is open.
    ///
    /// The initiator creates the channel; the responder waits for one to arrive
    /// through [`DataChannelManager::handle_new_data_channel`]. Calls made while an
    /// attempt is running share its outcome.
    pub async fn initialize(&self, is_initiator: bool) -> bool {
        let attempt = {
            let mut pending = self.inner.pending_init.lock();
            match pending.as_ref() {
                Some(attempt) => {
                    debug!("Joining in-flight channel setup for {}", self.inner.peer_key);
                    attempt.clone()
                }
                None => {
                    let inner = self.inner.clone();
                    let attempt = async move { inner.establish(is_initiator).await }
                        .boxed()
                        .shared();
                    *pending = Some(attempt.clone());
                    attempt
                }
            }
        };

        let opened = attempt.clone().await;

        let mut pending = self.inner.pending_init.lock();
        if pending.as_ref().is_some_and(|p| p.ptr_eq(&attempt)) {
            *pending = None;
        }
        opened
    }

    /// Adopt a channel delivered by the remote side, replacing any previous one.
    pub fn handle_new_data_channel(&self, handle: Arc<dyn ChannelHandle>) {
        info!(
            "Accepting data channel '{}' for {}",
            handle.label(),
            self.inner.peer_key
        );
        self.inner.attach(handle);
    }

    /// Send one text frame. False unless the channel is open and the send went through.
    pub async fn send(&self, message: &str) -> bool {
        match self.try_send(message).await {
            Ok(()) => true,
            Err(ChannelError::NotOpen) => {
                debug!("Dropping message for {}: channel not open", self.inner.peer_key);
                false
            }
            Err(e) => {
                warn!("Send to {} failed: {}", self.inner.peer_key, e);
                false
            }
        }
    }

    async fn try_send(&self, message: &str) -> Result<(), ChannelError> {
        let handle = self
            .inner
            .channel
            .lock()
            .clone()
            .filter(|handle| handle.ready_state().is_open())
            .ok_or(ChannelError::NotOpen)?;
        handle
            .send(Bytes::from(message.to_owned()))
            .await
            .map_err(|e| ChannelError::Send(format!("{e:#}")))
    }

    pub fn on_message<F>(&self, f: F) -> SubscriptionId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.inner.message_observers.subscribe(f)
    }

    pub fn on_ready_state_change<F>(&self, f: F) -> SubscriptionId
    where
        F: Fn(&ReadyState) + Send + Sync + 'static,
    {
        self.inner.state_observers.subscribe(f)
    }

    /// Drop a subscription from either observer list.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.message_observers.unsubscribe(id) || self.inner.state_observers.unsubscribe(id)
    }

    pub fn ready_state(&self) -> ReadyState {
        *self.inner.ready_tx.borrow()
    }

    pub fn peer_key(&self) -> &str {
        &self.inner.peer_key
    }

    pub fn has_channel(&self) -> bool {
        self.inner.channel.lock().is_some()
    }

    pub async fn close(&self) {
        let handle = self.inner.channel.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.close().await {
                warn!("Failed to close channel for {}: {:#}", self.inner.peer_key, e);
            }
        }
        self.inner.set_ready_state(ReadyState::Closed);
        debug!("Channel manager for {} closed", self.inner.peer_key);
    }
}

impl ManagerInner {
    async fn establish(self: Arc<Self>, is_initiator: bool) -> bool {
        if is_initiator && self.channel.lock().is_none() {
            let Some(source) = self.source.clone() else {
                error!("{} for {}", ChannelError::NoChannelSource, self.peer_key);
                return false;
            };
            match source.open_channel(&self.config.label).await {
                Ok(handle) => self.attach(handle),
                Err(e) => {
                    error!("Failed to create channel for {}: {}", self.peer_key, e);
                    return false;
                }
            }
        } else if !is_initiator {
            debug!("Waiting for inbound channel from {}", self.peer_key);
        }

        let mut ready_rx = self.ready_tx.subscribe();
        let opened = tokio::time::timeout(
            self.config.open_timeout,
            ready_rx.wait_for(|state| state.is_open()),
        )
        .await
        .map(|result| result.is_ok());

        match opened {
            Ok(true) => {
                info!("Data channel to {} is open", self.peer_key);
                true
            }
            Ok(false) => false,
            Err(_) => {
                warn!("{} ({})", ChannelError::Timeout, self.peer_key);
                false
            }
        }
    }

    fn attach(self: &Arc<Self>, handle: Arc<dyn ChannelHandle>) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let weak = Arc::downgrade(self);
        handle.on_open(Box::new({
            let weak = weak.clone();
            move || {
                if let Some(inner) = weak.upgrade() {
                    inner.set_ready_state_from(generation, ReadyState::Open);
                }
            }
        }));
        handle.on_close(Box::new({
            let weak = weak.clone();
            move || {
                if let Some(inner) = weak.upgrade() {
                    inner.set_ready_state_from(generation, ReadyState::Closed);
                }
            }
        }));
        handle.on_error(Box::new({
            let peer_key = self.peer_key.clone();
            move |err| warn!("Data channel error on {}: {}", peer_key, err)
        }));
        handle.on_message(Box::new(move |frame| {
            if let Some(inner) = weak.upgrade() {
                inner.deliver(frame);
            }
        }));

        let current = handle.ready_state();
        let previous = self.channel.lock().replace(handle);
        self.set_ready_state(current);

        if let Some(previous) = previous {
            debug!("Replacing channel '{}' for {}", previous.label(), self.peer_key);
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    let peer_key = self.peer_key.clone();
                    runtime.spawn(async move {
                        if let Err(e) = previous.close().await {
                            debug!("Replaced channel for {} did not close: {:#}", peer_key, e);
                        }
                    });
                }
                Err(_) => debug!("No runtime to close replaced channel for {}", self.peer_key),
            }
        }
    }

    /// Apply a state change reported by the channel attached as `generation`.
    fn set_ready_state_from(&self, generation: u64, state: ReadyState) {
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("Ignoring {:?} from a replaced channel of {}", state, self.peer_key);
            return;
        }
        self.set_ready_state(state);
    }

    fn deliver(&self, frame: Bytes) {
        match std::str::from_utf8(&frame) {
            Ok(text) => {
                self.message_observers.notify(text);
            }
            Err(e) => warn!("Dropping non-text frame from {}: {}", self.peer_key, e),
        }
    }

    fn set_ready_state(&self, state: ReadyState) {
        let changed = self.ready_tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
        if changed {
            debug!("Channel to {} is now {:?}", self.peer_key, state);
            self.state_observers.notify(&state);
        }
    }
}
