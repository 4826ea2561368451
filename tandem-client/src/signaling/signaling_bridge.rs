use crate::fault::panic_message;
use dashmap::DashMap;
use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicI64, Ordering};
use tandem_core::config::BridgeConfig;
use tandem_core::error::SignalError;
use tandem_core::model::{ConnectionId, RoomAssignment, SignalType, SignalingMessage};
use tandem_core::traits::SignalStore;
use tandem_core::utils::now_millis;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

pub type SignalHandler =
    Arc<dyn Fn(SignalingMessage) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Overrides for an outgoing signal.
///
/// `room_id` and `sender` let a final message go out after local room state was cleared.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub receiver: Option<String>,
    pub room_id: Option<String>,
    pub sender: Option<String>,
    pub connection_id: Option<ConnectionId>,
}

impl SendOptions {
    pub fn to(mut self, receiver: impl Into<String>) -> Self {
        self.receiver = Some(receiver.into());
        self
    }

    pub fn in_room(mut self, room_id: impl Into<String>) -> Self {
        self.room_id = Some(room_id.into());
        self
    }

    pub fn as_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    pub fn with_connection_id(mut self, connection_id: ConnectionId) -> Self {
        self.connection_id = Some(connection_id);
        self
    }
}

#[derive(Debug, Clone, Default)]
struct RoomState {
    room_id: Option<String>,
    user_id: Option<String>,
}

struct BridgeInner {
    store: Arc<dyn SignalStore>,
    config: BridgeConfig,
    room: RwLock<RoomState>,
    cursor: AtomicI64,
    handlers: DashMap<SignalType, SignalHandler>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

/// Room membership plus a polling loop over a [`SignalStore`].
///
/// Each signal type has at most one handler. Messages sent by the local
/// identity, or addressed to someone else, are never dispatched.
#[derive(Clone)]
pub struct SignalingBridge {
    inner: Arc<BridgeInner>,
}

#[derive(Clone)]
pub(crate) struct WeakSignalingBridge(Weak<BridgeInner>);

impl WeakSignalingBridge {
    pub(crate) fn upgrade(&self) -> Option<SignalingBridge> {
        self.0.upgrade().map(|inner| SignalingBridge { inner })
    }
}

impl SignalingBridge {
    pub(crate) fn downgrade(&self) -> WeakSignalingBridge {
        WeakSignalingBridge(Arc::downgrade(&self.inner))
    }

    pub fn new(store: Arc<dyn SignalStore>, config: BridgeConfig) -> Self {
        Self {
            inner: Arc::new(BridgeInner {
                store,
                config,
                room: RwLock::new(RoomState::default()),
                cursor: AtomicI64::new(0),
                handlers: DashMap::new(),
                poller: Mutex::new(None),
            }),
        }
    }

    pub async fn create_room(&self) -> Result<RoomAssignment, SignalError> {
        let assignment = self
            .inner
            .store
            .create_room(self.inner.config.identity.as_deref())
            .await
            .map_err(|e| SignalError::transport("failed to create room", e))?;
        self.enter(assignment)
    }

    pub async fn join_room(&self, room_id: &str) -> Result<RoomAssignment, SignalError> {
        if room_id.trim().is_empty() {
            return Err(SignalError::InvalidRoom);
        }
        let assignment = self
            .inner
            .store
            .join_room(room_id, self.inner.config.identity.as_deref())
            .await
            .map_err(|e| SignalError::transport(format!("failed to join room {room_id}"), e))?;
        self.enter(assignment)
    }

    fn enter(&self, assignment: RoomAssignment) -> Result<RoomAssignment, SignalError> {
        if assignment.room_id.trim().is_empty() {
            return Err(SignalError::InvalidRoom);
        }

        self.stop_polling();
        *self.inner.room.write() = RoomState {
            room_id: Some(assignment.room_id.clone()),
            user_id: Some(assignment.user_id.clone()),
        };
        self.inner.cursor.store(0, Ordering::SeqCst);
        self.start_polling();
        info!(
            "Joined room {} as {}",
            assignment.room_id, assignment.user_id
        );
        Ok(assignment)
    }

    pub async fn send_message<T: Serialize>(
        &self,
        signal_type: SignalType,
        data: T,
    ) -> Result<(), SignalError> {
        self.send_message_with(signal_type, data, SendOptions::default())
            .await
    }

    /// Stamp and send a signal. Fails with `NotInRoom` unless a room and sender are known.
    pub async fn send_message_with<T: Serialize>(
        &self,
        signal_type: SignalType,
        data: T,
        options: SendOptions,
    ) -> Result<(), SignalError> {
        let data = serde_json::to_value(data)?;
        let (room_id, sender) = {
            let room = self.inner.room.read();
            (
                options.room_id.or_else(|| room.room_id.clone()),
                options.sender.or_else(|| room.user_id.clone()),
            )
        };
        let (Some(room_id), Some(sender)) = (room_id, sender) else {
            return Err(SignalError::NotInRoom);
        };

        let message = SignalingMessage {
            signal_type: signal_type.clone(),
            sender,
            receiver: options.receiver,
            room_id,
            data,
            timestamp: now_millis(),
            connection_id: options.connection_id,
        };
        self.inner
            .store
            .send_signal(&message.room_id, &message)
            .await
            .map_err(|e| SignalError::transport(format!("failed to send {signal_type}"), e))?;
        debug!("Sent {} to room {}", signal_type, message.room_id);
        Ok(())
    }

    /// Install the handler for `signal_type`, replacing any previous one.
    pub fn on<F, Fut>(&self, signal_type: SignalType, handler: F)
    where
        F: Fn(SignalingMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let handler: SignalHandler = Arc::new(move |message| handler(message).boxed());
        if self.inner.handlers.insert(signal_type.clone(), handler).is_some() {
            debug!("Replaced handler for {}", signal_type);
        }
    }

    pub fn off(&self, signal_type: SignalType) -> bool {
        self.inner.handlers.remove(&signal_type).is_some()
    }

    /// One polling round: fetch what is newer than the cursor and dispatch it.
    ///
    /// Safe to run concurrently with itself. Returns how many messages reached a handler.
    pub async fn poll_messages(&self) -> Result<usize, SignalError> {
        let (room_id, user_id) = {
            let room = self.inner.room.read();
            let room_id = room.room_id.clone().ok_or(SignalError::NotInRoom)?;
            (room_id, room.user_id.clone().unwrap_or_default())
        };

        let since = self.inner.cursor.load(Ordering::SeqCst);
        let batch = self
            .inner
            .store
            .get_signals(&room_id, since)
            .await
            .map_err(|e| SignalError::transport(format!("failed to poll room {room_id}"), e))?;
        if batch.is_empty() {
            return Ok(0);
        }

        if self.inner.room.read().room_id.as_deref() != Some(room_id.as_str()) {
            debug!("Room changed during poll, dropping {} messages", batch.len());
            return Ok(0);
        }

        // Batch-level advance: the cursor only ever moves to the newest timestamp seen.
        if let Some(newest) = batch.iter().map(|message| message.timestamp).max() {
            self.inner.cursor.fetch_max(newest, Ordering::SeqCst);
        }

        let mut dispatched = 0;
        for message in batch {
            if message.sender == user_id || !message.is_addressed_to(&user_id) {
                continue;
            }
            let handler = self
                .inner
                .handlers
                .get(&message.signal_type)
                .map(|handler| handler.value().clone());
            let Some(handler) = handler else {
                debug!("No handler for {} from {}", message.signal_type, message.sender);
                continue;
            };
            dispatched += 1;
            dispatch(handler, message).await;
        }
        Ok(dispatched)
    }

    /// Leave the current room. Local state ends up empty whatever the store says.
    pub async fn leave_room(&self) {
        self.stop_polling();

        let previous = std::mem::take(&mut *self.inner.room.write());
        self.inner.cursor.store(0, Ordering::SeqCst);

        if let RoomState {
            room_id: Some(room_id),
            user_id: Some(user_id),
        } = previous
        {
            if self.inner.config.send_leave_notice {
                let options = SendOptions::default()
                    .in_room(room_id.clone())
                    .as_sender(user_id.clone());
                if let Err(e) = self
                    .send_message_with(SignalType::Leave, serde_json::json!({}), options)
                    .await
                {
                    debug!("Leave notice not delivered: {}", e);
                }
            }
            if let Err(e) = self.inner.store.leave_room(&room_id, &user_id).await {
                warn!("Failed to leave room {}: {:#}", room_id, e);
            }
            info!("Left room {}", room_id);
        }

        self.inner.handlers.clear();
    }

    fn start_polling(&self) {
        let weak = self.downgrade();
        let period = self.inner.config.poll_interval;
        let poller = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(bridge) = weak.upgrade() else {
                    break;
                };
                // Each tick polls on its own task so a slow request never delays the timer.
                tokio::spawn(async move {
                    if let Err(e) = bridge.poll_messages().await {
                        warn!("Signal poll failed: {}", e);
                    }
                });
            }
            debug!("Polling loop finished");
        });
        *self.inner.poller.lock() = Some(poller);
    }

    fn stop_polling(&self) {
        if let Some(poller) = self.inner.poller.lock().take() {
            poller.abort();
            debug!("Polling stopped");
        }
    }

    pub fn room_id(&self) -> Option<String> {
        self.inner.room.read().room_id.clone()
    }

    pub fn user_id(&self) -> Option<String> {
        self.inner.room.read().user_id.clone()
    }

    pub fn cursor(&self) -> i64 {
        self.inner.cursor.load(Ordering::SeqCst)
    }

    pub fn is_polling(&self) -> bool {
        self.inner
            .poller
            .lock()
            .as_ref()
            .is_some_and(|poller| !poller.is_finished())
    }
}

async fn dispatch(handler: SignalHandler, message: SignalingMessage) {
    let signal_type = message.signal_type.clone();
    let outcome = AssertUnwindSafe(async move { handler(message).await })
        .catch_unwind()
        .await;
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Handler for {} failed: {:#}", signal_type, e),
        Err(panic) => error!(
            "Handler fault in {} handler: {}",
            signal_type,
            panic_message(&panic)
        ),
    }
}
