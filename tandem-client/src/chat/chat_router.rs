use crate::channel::{ChannelSource, DataChannelManager, ObserverList, SubscriptionId};
use crate::transport::ChannelHandle;
use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tandem_core::config::ChannelConfig;
use tandem_core::model::{ChatMessage, ChatPayload};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Registry key of the first established session when only one peer is present.
pub const PRIMARY_PEER: &str = "primary";

struct RouterInner {
    local_name: String,
    config: ChannelConfig,
    managers: DashMap<String, DataChannelManager>,
    log: Mutex<Vec<ChatMessage>>,
    observers: ObserverList<ChatMessage>,
    ready_tx: watch::Sender<bool>,
}

/// Text chat fanned out over one data channel per peer, merged into one local log.
#[derive(Clone)]
pub struct ChatRouter {
    inner: Arc<RouterInner>,
}

#[derive(Clone)]
pub(crate) struct WeakChatRouter(Weak<RouterInner>);

impl WeakChatRouter {
    pub(crate) fn upgrade(&self) -> Option<ChatRouter> {
        self.0.upgrade().map(|inner| ChatRouter { inner })
    }
}

impl ChatRouter {
    pub(crate) fn downgrade(&self) -> WeakChatRouter {
        WeakChatRouter(Arc::downgrade(&self.inner))
    }

    /// `local_name` is stamped as the sender of outgoing messages.
    pub fn new(local_name: impl Into<String>, config: ChannelConfig) -> Self {
        let (ready_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(RouterInner {
                local_name: local_name.into(),
                config,
                managers: DashMap::new(),
                log: Mutex::new(Vec::new()),
                observers: ObserverList::new("chat message observer"),
                ready_tx,
            }),
        }
    }

    /// Register a peer, returning its manager. An already registered peer keeps its manager.
    pub fn add_peer(
        &self,
        peer_key: &str,
        source: Option<Arc<dyn ChannelSource>>,
    ) -> DataChannelManager {
        if let Some(existing) = self.manager(peer_key) {
            return existing;
        }

        let manager = DataChannelManager::new(peer_key, source, self.inner.config.clone());
        let weak = Arc::downgrade(&self.inner);
        manager.on_message({
            let weak = weak.clone();
            let peer_key = peer_key.to_owned();
            move |text: &str| {
                if let Some(inner) = weak.upgrade() {
                    inner.receive(&peer_key, text);
                }
            }
        });
        manager.on_ready_state_change(move |_| refresh(&weak));

        let manager = self
            .inner
            .managers
            .entry(peer_key.to_owned())
            .or_insert(manager)
            .clone();
        debug!("Registered chat peer {}", peer_key);
        manager
    }

    pub fn manager(&self, peer_key: &str) -> Option<DataChannelManager> {
        self.inner
            .managers
            .get(peer_key)
            .map(|manager| manager.clone())
    }

    /// Initialize every registered manager. Succeeds if at least one channel opens.
    pub async fn initialize(&self, is_initiator: bool) -> bool {
        let managers = self.snapshot();
        if managers.is_empty() {
            warn!("Chat initialization with no registered peers");
            return false;
        }

        let outcomes = join_all(
            managers
                .iter()
                .map(|(_, manager)| manager.initialize(is_initiator)),
        )
        .await;

        for ((peer_key, _), opened) in managers.iter().zip(&outcomes) {
            if !opened {
                warn!("Chat channel to {} did not open", peer_key);
            }
        }
        let opened = outcomes.iter().filter(|opened| **opened).count();
        info!("Chat initialized: {}/{} channels open", opened, managers.len());
        opened > 0
    }

    /// Route a channel delivered for `peer_key`, creating the manager on first sight.
    pub fn handle_new_data_channel(&self, handle: Arc<dyn ChannelHandle>, peer_key: &str) {
        let manager = self.add_peer(peer_key, None);
        if manager.has_channel() {
            debug!("Routing new channel into existing manager for {}", peer_key);
        }
        manager.handle_new_data_channel(handle);
    }

    /// Broadcast to every open channel.
    ///
    /// The message is logged and returned only if at least one peer received it.
    pub async fn send_message(&self, content: &str) -> Option<ChatMessage> {
        let message = ChatMessage::local(&self.inner.local_name, content);
        let frame = match serde_json::to_string(&message.to_payload()) {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to encode chat message: {}", e);
                return None;
            }
        };

        let open: Vec<_> = self
            .snapshot()
            .into_iter()
            .filter(|(_, manager)| manager.ready_state().is_open())
            .collect();
        let outcomes = join_all(open.iter().map(|(_, manager)| manager.send(&frame))).await;
        let delivered = outcomes.iter().filter(|sent| **sent).count();
        if delivered == 0 {
            warn!("Chat message not delivered to any peer");
            return None;
        }

        debug!("Chat message {} delivered to {} peers", message.id, delivered);
        self.inner.append(message.clone());
        Some(message)
    }

    /// True while any registered channel is open.
    pub fn is_ready(&self) -> bool {
        self.inner.any_open()
    }

    /// Wait until some channel opens. On timeout, returns the readiness at that moment.
    pub async fn wait_for_ready(&self, timeout: Duration) -> bool {
        if self.is_ready() {
            return true;
        }
        let mut ready_rx = self.inner.ready_tx.subscribe();
        let reached = tokio::time::timeout(timeout, ready_rx.wait_for(|ready| *ready))
            .await
            .map(|result| result.is_ok())
            .unwrap_or(false);
        reached || self.is_ready()
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.inner.log.lock().clone()
    }

    pub fn on_message<F>(&self, f: F) -> SubscriptionId
    where
        F: Fn(&ChatMessage) + Send + Sync + 'static,
    {
        self.inner.observers.subscribe(f)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.observers.unsubscribe(id)
    }

    pub fn peer_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .inner
            .managers
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        keys
    }

    pub async fn remove_peer(&self, peer_key: &str) -> bool {
        let Some((_, manager)) = self.inner.managers.remove(peer_key) else {
            return false;
        };
        manager.close().await;
        self.inner.refresh_ready();
        info!("Removed chat peer {}", peer_key);
        true
    }

    /// Close every channel and empty the registry. The message log is kept.
    pub async fn close(&self) {
        let managers = self.snapshot();
        self.inner.managers.clear();
        join_all(managers.iter().map(|(_, manager)| manager.close())).await;
        self.inner.refresh_ready();
        info!("Chat router closed {} channels", managers.len());
    }

    fn snapshot(&self) -> Vec<(String, DataChannelManager)> {
        self.inner
            .managers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

fn refresh(inner: &Weak<RouterInner>) {
    if let Some(inner) = inner.upgrade() {
        inner.refresh_ready();
    }
}

impl RouterInner {
    fn any_open(&self) -> bool {
        self.managers
            .iter()
            .any(|entry| entry.value().ready_state().is_open())
    }

    fn refresh_ready(&self) {
        let ready = self.any_open();
        self.ready_tx.send_if_modified(|current| {
            if *current == ready {
                return false;
            }
            *current = ready;
            true
        });
    }

    fn receive(&self, peer_key: &str, text: &str) {
        match serde_json::from_str::<ChatPayload>(text) {
            Ok(payload) => self.append(ChatMessage::received(payload, peer_key)),
            Err(e) => warn!("Ignoring malformed chat frame from {}: {}", peer_key, e),
        }
    }

    fn append(&self, message: ChatMessage) {
        self.log.lock().push(message.clone());
        self.observers.notify(&message);
    }
}
