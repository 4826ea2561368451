use crate::channel::ChannelSource;
use crate::fault::isolate;
use crate::session::SessionCallbacks;
use crate::transport::{
    ChannelHandle, MediaStream, MediaTrack, PeerTransport, RemoteTrack, RtcTransportFactory,
    SenderHandle, TransportEvent, TransportFactory, TransportState,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tandem_core::config::SessionConfig;
use tandem_core::error::SessionError;
use tandem_core::model::{
    ConnectionId, IceCandidate, NegotiationState, SenderKind, SessionDescription, TrackKind,
};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const EVENT_BUFFER: usize = 256;

/// Remote media grouped by the stream id the peer announced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStream {
    pub id: String,
    pub tracks: Vec<RemoteTrack>,
}

impl RemoteStream {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_owned(),
            tracks: Vec::new(),
        }
    }
}

/// Offer produced by this side together with the round it opens.
#[derive(Debug, Clone)]
pub struct LocalOffer {
    pub offer: SessionDescription,
    pub connection_id: ConnectionId,
}

/// Answer to a remote offer, tagged with the peer's round.
#[derive(Debug, Clone)]
pub struct LocalAnswer {
    pub answer: SessionDescription,
    pub connection_id: ConnectionId,
}

struct SenderEntry {
    handle: SenderHandle,
    kind: SenderKind,
    track: Arc<dyn MediaTrack>,
}

#[derive(Default)]
struct SessionState {
    transport: Option<Arc<dyn PeerTransport>>,
    connection_id: Option<ConnectionId>,
    negotiation: NegotiationState,
    senders: HashMap<String, SenderEntry>,
    remote_streams: HashMap<String, RemoteStream>,
    pending_candidates: Vec<(IceCandidate, ConnectionId)>,
    screen_share: Option<String>,
    event_pump: Option<JoinHandle<()>>,
}

impl SessionState {
    fn transport(&self) -> Result<Arc<dyn PeerTransport>, SessionError> {
        self.transport.clone().ok_or(SessionError::NotInitialized)
    }
}

struct SessionInner {
    config: SessionConfig,
    factory: Arc<dyn TransportFactory>,
    callbacks: SessionCallbacks,
    state: Mutex<SessionState>,
}

/// One point-to-point media and data session with a single remote peer.
///
/// Holds at most one renegotiation round in flight. Local candidates observed
/// during a round are buffered and released by [`PeerSession::complete_renegotiation`].
#[derive(Clone)]
pub struct PeerSession {
    inner: Arc<SessionInner>,
}

/// Non-owning reference used by wiring that the session itself keeps alive.
#[derive(Clone)]
pub(crate) struct WeakPeerSession(Weak<SessionInner>);

impl WeakPeerSession {
    pub(crate) fn upgrade(&self) -> Option<PeerSession> {
        self.0.upgrade().map(|inner| PeerSession { inner })
    }
}

impl PeerSession {
    pub fn new(config: SessionConfig) -> Self {
        Self::with_factory(config, Arc::new(RtcTransportFactory))
    }

    pub fn with_factory(config: SessionConfig, factory: Arc<dyn TransportFactory>) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                config,
                factory,
                callbacks: SessionCallbacks::default(),
                state: Mutex::new(SessionState::default()),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakPeerSession {
        WeakPeerSession(Arc::downgrade(&self.inner))
    }

    pub async fn initialize(&self, local_tracks: &[Arc<dyn MediaTrack>]) -> Result<(), SessionError> {
        let mut state = self.inner.state.lock().await;
        if state.transport.is_some() {
            return Err(SessionError::AlreadyInitialized);
        }

        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let transport = self
            .inner
            .factory
            .create(&self.inner.config, event_tx)
            .await
            .map_err(SessionError::transport)?;

        for track in local_tracks {
            match transport.attach_track(track.clone()).await {
                Ok(handle) => {
                    state.senders.insert(
                        track.id(),
                        SenderEntry {
                            handle,
                            kind: track.kind().into(),
                            track: track.clone(),
                        },
                    );
                }
                Err(e) => {
                    state.senders.clear();
                    if let Err(close_err) = transport.close().await {
                        warn!("Failed to close transport after attach error: {:#}", close_err);
                    }
                    return Err(SessionError::transport(e));
                }
            }
        }

        let connection_id = ConnectionId::new();
        info!(
            "Session initialized with {} local tracks, connection {}",
            state.senders.len(),
            connection_id
        );
        state.connection_id = Some(connection_id);
        state.negotiation = NegotiationState::Stable;
        state.event_pump = Some(spawn_event_pump(Arc::downgrade(&self.inner), event_rx));
        state.transport = Some(transport);
        Ok(())
    }

    /// Attach a track to the live session. Does not start a negotiation round.
    pub async fn add_track(
        &self,
        track: Arc<dyn MediaTrack>,
        stream: &MediaStream,
        kind: SenderKind,
    ) -> Result<String, SessionError> {
        let mut state = self.inner.state.lock().await;
        let transport = state.transport()?;
        let track_id = track.id();
        if state.senders.contains_key(&track_id) {
            debug!("Track {} already attached", track_id);
            return Ok(track_id);
        }

        let handle = transport
            .attach_track(track.clone())
            .await
            .map_err(SessionError::transport)?;
        debug!("Attached {:?} track {} from stream {}", kind, track_id, stream.id);
        state
            .senders
            .insert(track_id.clone(), SenderEntry { handle, kind, track });
        Ok(track_id)
    }

    /// Detach the sender bound to `track_id`. Returns false if there is none.
    pub async fn remove_track(&self, track_id: &str) -> Result<bool, SessionError> {
        let mut state = self.inner.state.lock().await;
        let transport = state.transport()?;
        let Some(handle) = state.senders.get(track_id).map(|entry| entry.handle) else {
            debug!("No sender for track {}", track_id);
            return Ok(false);
        };

        transport
            .detach_track(handle)
            .await
            .map_err(SessionError::transport)?;
        state.senders.remove(track_id);
        if state.screen_share.as_deref() == Some(track_id) {
            state.screen_share = None;
        }
        debug!("Detached track {}", track_id);
        Ok(true)
    }

    /// Substitute the track carried by an existing sender and re-key it to the new track id.
    pub async fn replace_track(
        &self,
        old_track_id: &str,
        new_track: Arc<dyn MediaTrack>,
    ) -> Result<(), SessionError> {
        let mut state = self.inner.state.lock().await;
        let transport = state.transport()?;
        let Some(handle) = state.senders.get(old_track_id).map(|entry| entry.handle) else {
            return Err(SessionError::UnknownTrack(old_track_id.to_owned()));
        };

        transport
            .replace_track(handle, new_track.clone())
            .await
            .map_err(SessionError::transport)?;

        let new_track_id = new_track.id();
        if let Some(mut entry) = state.senders.remove(old_track_id) {
            entry.track = new_track;
            state.senders.insert(new_track_id.clone(), entry);
        }
        if state.screen_share.as_deref() == Some(old_track_id) {
            state.screen_share = Some(new_track_id.clone());
        }
        debug!("Replaced track {} with {}", old_track_id, new_track_id);
        Ok(())
    }

    /// Flip every local track of `kind` together.
    ///
    /// All of them end up enabled unless at least one was enabled before.
    /// Returns the resulting state, or `None` when no track of that kind is attached.
    pub async fn toggle_track(&self, kind: TrackKind) -> Option<bool> {
        let state = self.inner.state.lock().await;
        let tracks: Vec<_> = state
            .senders
            .values()
            .filter(|entry| entry.track.kind() == kind)
            .map(|entry| entry.track.clone())
            .collect();
        if tracks.is_empty() {
            return None;
        }

        let enabled = !tracks.iter().any(|track| track.is_enabled());
        for track in &tracks {
            track.set_enabled(enabled);
        }
        debug!("Toggled {} {:?} tracks to enabled={}", tracks.len(), kind, enabled);
        Some(enabled)
    }

    /// Attach the first video track of `stream` as the screen-share sender.
    ///
    /// A previous screen-share sender is detached first.
    pub async fn add_screen_share_track(&self, stream: &MediaStream) -> Result<String, SessionError> {
        let Some(track) = stream.video_tracks().next().cloned() else {
            return Err(SessionError::MissingVideoTrack(stream.id.clone()));
        };

        let mut state = self.inner.state.lock().await;
        let transport = state.transport()?;
        if let Some(previous) = state.screen_share.take() {
            if let Some(entry) = state.senders.remove(&previous) {
                warn!("Replacing active screen share {}", previous);
                transport
                    .detach_track(entry.handle)
                    .await
                    .map_err(SessionError::transport)?;
            }
        }

        let track_id = track.id();
        let handle = transport
            .attach_track(track.clone())
            .await
            .map_err(SessionError::transport)?;
        state.senders.insert(
            track_id.clone(),
            SenderEntry {
                handle,
                kind: SenderKind::Screen,
                track,
            },
        );
        state.screen_share = Some(track_id.clone());
        info!("Screen share started with track {}", track_id);
        Ok(track_id)
    }

    pub async fn remove_screen_share_track(&self) -> Result<bool, SessionError> {
        let track_id = {
            let state = self.inner.state.lock().await;
            state.transport()?;
            match state.screen_share.clone() {
                Some(id) => id,
                None => return Ok(false),
            }
        };
        let removed = self.remove_track(&track_id).await?;
        if removed {
            info!("Screen share stopped");
        }
        Ok(removed)
    }

    /// Open a renegotiation round: produce and apply a fresh offer under a new connection id.
    pub async fn handle_renegotiation(&self) -> Result<LocalOffer, SessionError> {
        let transport = {
            let mut state = self.inner.state.lock().await;
            let transport = state.transport()?;
            if state.negotiation == NegotiationState::Renegotiating {
                warn!("Renegotiation requested while a round is in flight");
                return Err(SessionError::RenegotiationInProgress);
            }
            state.negotiation = NegotiationState::Renegotiating;
            transport
        };

        info!("Starting renegotiation round");
        match self.produce_offer(&transport).await {
            Ok(offer) => Ok(offer),
            Err(e) => {
                warn!("Renegotiation offer failed: {}", e);
                self.complete_renegotiation().await;
                Err(e)
            }
        }
    }

    /// Release buffered candidates in arrival order and return to `Stable`.
    ///
    /// Returns how many candidates were delivered.
    pub async fn complete_renegotiation(&self) -> usize {
        let mut state = self.inner.state.lock().await;
        let flushed = std::mem::take(&mut state.pending_candidates);
        state.negotiation = NegotiationState::Stable;
        if flushed.is_empty() {
            debug!("Renegotiation completed with no buffered candidates");
            return 0;
        }

        let count = flushed.len();
        let callback = self.inner.callbacks.ice_candidate.get();
        for (candidate, buffered_round) in flushed {
            let round = state.connection_id.clone().unwrap_or(buffered_round);
            if let Some(callback) = &callback {
                isolate("ice candidate callback", || callback(candidate, round));
            }
        }
        info!("Renegotiation completed, flushed {} candidates", count);
        count
    }

    pub async fn create_offer(&self) -> Result<LocalOffer, SessionError> {
        let transport = self.inner.state.lock().await.transport()?;
        self.produce_offer(&transport).await
    }

    async fn produce_offer(
        &self,
        transport: &Arc<dyn PeerTransport>,
    ) -> Result<LocalOffer, SessionError> {
        let offer = transport
            .create_offer()
            .await
            .map_err(SessionError::negotiation)?;

        let connection_id = ConnectionId::new();
        {
            let mut state = self.inner.state.lock().await;
            if state.transport.is_none() {
                return Err(SessionError::NotInitialized);
            }
            state.connection_id = Some(connection_id.clone());
        }

        transport
            .set_local_description(offer.clone())
            .await
            .map_err(SessionError::negotiation)?;
        debug!("Local offer applied for connection {}", connection_id);
        Ok(LocalOffer {
            offer,
            connection_id,
        })
    }

    /// Apply a remote offer, adopting the peer's connection id, and answer it.
    pub async fn process_offer(
        &self,
        offer: SessionDescription,
        connection_id: ConnectionId,
    ) -> Result<LocalAnswer, SessionError> {
        let transport = {
            let mut state = self.inner.state.lock().await;
            let transport = state.transport()?;
            state.connection_id = Some(connection_id.clone());
            transport
        };

        transport
            .set_remote_description(offer)
            .await
            .map_err(SessionError::negotiation)?;
        let answer = transport
            .create_answer()
            .await
            .map_err(SessionError::negotiation)?;
        transport
            .set_local_description(answer.clone())
            .await
            .map_err(SessionError::negotiation)?;
        debug!("Answered remote offer for connection {}", connection_id);
        Ok(LocalAnswer {
            answer,
            connection_id,
        })
    }

    pub async fn process_answer(
        &self,
        answer: SessionDescription,
        connection_id: Option<ConnectionId>,
    ) -> Result<(), SessionError> {
        let transport = self.correlated_transport("answer", connection_id.as_ref()).await?;
        transport
            .set_remote_description(answer)
            .await
            .map_err(SessionError::negotiation)
    }

    pub async fn add_ice_candidate(
        &self,
        candidate: IceCandidate,
        connection_id: Option<ConnectionId>,
    ) -> Result<(), SessionError> {
        let transport = self
            .correlated_transport("ice candidate", connection_id.as_ref())
            .await?;
        transport
            .add_remote_candidate(candidate)
            .await
            .map_err(SessionError::negotiation)
    }

    /// Correlation is advisory: a mismatched round is logged, never rejected.
    async fn correlated_transport(
        &self,
        what: &str,
        supplied: Option<&ConnectionId>,
    ) -> Result<Arc<dyn PeerTransport>, SessionError> {
        let state = self.inner.state.lock().await;
        let transport = state.transport()?;
        if let (Some(supplied), Some(current)) = (supplied, state.connection_id.as_ref()) {
            if supplied != current {
                warn!(
                    "Applying {} for connection {} while current connection is {}",
                    what, supplied, current
                );
            }
        }
        Ok(transport)
    }

    pub async fn create_data_channel(
        &self,
        label: &str,
    ) -> Result<Arc<dyn ChannelHandle>, SessionError> {
        let transport = self.inner.state.lock().await.transport()?;
        transport
            .create_channel(label)
            .await
            .map_err(SessionError::transport)
    }

    /// Tear the session down. Safe to call repeatedly.
    pub async fn close(&self) {
        let closed = std::mem::take(&mut *self.inner.state.lock().await);
        if let Some(pump) = closed.event_pump {
            pump.abort();
        }
        if let Some(transport) = closed.transport {
            if let Err(e) = transport.close().await {
                warn!("Failed to close peer transport: {:#}", e);
            }
        }
        let stopped = closed.senders.len();
        for entry in closed.senders.into_values() {
            entry.track.stop();
        }
        if !closed.pending_candidates.is_empty() {
            debug!("Discarded {} pending candidates", closed.pending_candidates.len());
        }
        info!("Session closed, stopped {} local tracks", stopped);
    }

    pub fn on_ice_candidate<F>(&self, f: F)
    where
        F: Fn(IceCandidate, ConnectionId) + Send + Sync + 'static,
    {
        self.inner.callbacks.ice_candidate.set(Arc::new(f));
    }

    pub fn on_negotiation_needed<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.callbacks.negotiation_needed.set(Arc::new(f));
    }

    pub fn on_remote_stream<F>(&self, f: F)
    where
        F: Fn(RemoteStream) + Send + Sync + 'static,
    {
        self.inner.callbacks.remote_stream.set(Arc::new(f));
    }

    pub fn on_data_channel<F>(&self, f: F)
    where
        F: Fn(Arc<dyn ChannelHandle>) + Send + Sync + 'static,
    {
        self.inner.callbacks.data_channel.set(Arc::new(f));
    }

    pub fn on_connection_state_change<F>(&self, f: F)
    where
        F: Fn(TransportState) + Send + Sync + 'static,
    {
        self.inner.callbacks.connection_state.set(Arc::new(f));
    }

    pub async fn is_initialized(&self) -> bool {
        self.inner.state.lock().await.transport.is_some()
    }

    pub async fn connection_id(&self) -> Option<ConnectionId> {
        self.inner.state.lock().await.connection_id.clone()
    }

    pub async fn negotiation_state(&self) -> NegotiationState {
        self.inner.state.lock().await.negotiation
    }

    pub async fn sender_count(&self) -> usize {
        self.inner.state.lock().await.senders.len()
    }

    pub async fn sender_kind(&self, track_id: &str) -> Option<SenderKind> {
        self.inner
            .state
            .lock()
            .await
            .senders
            .get(track_id)
            .map(|entry| entry.kind)
    }

    pub async fn pending_candidate_count(&self) -> usize {
        self.inner.state.lock().await.pending_candidates.len()
    }

    pub async fn screen_share_track_id(&self) -> Option<String> {
        self.inner.state.lock().await.screen_share.clone()
    }

    pub async fn remote_streams(&self) -> HashMap<String, RemoteStream> {
        self.inner.state.lock().await.remote_streams.clone()
    }
}

#[async_trait]
impl ChannelSource for PeerSession {
    async fn open_channel(&self, label: &str) -> Result<Arc<dyn ChannelHandle>, SessionError> {
        self.create_data_channel(label).await
    }
}

fn spawn_event_pump(
    inner: Weak<SessionInner>,
    mut events: mpsc::Receiver<TransportEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let Some(inner) = inner.upgrade() else {
                break;
            };
            inner.handle_transport_event(event).await;
        }
        debug!("Transport event pump finished");
    })
}

impl SessionInner {
    async fn handle_transport_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::CandidateDiscovered(candidate) => {
                self.handle_local_candidate(candidate).await;
            }
            TransportEvent::NegotiationNeeded => {
                debug!("Transport reports negotiation needed");
                if let Some(callback) = self.callbacks.negotiation_needed.get() {
                    isolate("negotiation needed callback", || callback());
                }
            }
            TransportEvent::RemoteTrackAdded(track) => {
                let stream = {
                    let mut state = self.state.lock().await;
                    if state.transport.is_none() {
                        return;
                    }
                    let stream = state
                        .remote_streams
                        .entry(track.stream_id.clone())
                        .or_insert_with(|| RemoteStream::new(&track.stream_id));
                    if !stream.tracks.contains(&track) {
                        stream.tracks.push(track);
                    }
                    stream.clone()
                };
                info!("Remote stream {} now has {} tracks", stream.id, stream.tracks.len());
                if let Some(callback) = self.callbacks.remote_stream.get() {
                    isolate("remote stream callback", || callback(stream));
                }
            }
            TransportEvent::InboundChannelOpened(handle) => {
                info!("Inbound data channel '{}'", handle.label());
                match self.callbacks.data_channel.get() {
                    Some(callback) => {
                        isolate("data channel callback", || callback(handle));
                    }
                    None => warn!("No data channel callback, dropping '{}'", handle.label()),
                }
            }
            TransportEvent::StateChanged(transport_state) => {
                info!("Transport state changed to {:?}", transport_state);
                if let Some(callback) = self.callbacks.connection_state.get() {
                    isolate("connection state callback", || callback(transport_state));
                }
            }
        }
    }

    /// Route a local candidate by the negotiation state at delivery time.
    ///
    /// Runs under the state lock so delivery order matches discovery order.
    async fn handle_local_candidate(&self, candidate: IceCandidate) {
        let mut state = self.state.lock().await;
        let Some(round) = state.connection_id.clone() else {
            debug!("Dropping candidate for a closed session");
            return;
        };

        if state.negotiation == NegotiationState::Renegotiating {
            state.pending_candidates.push((candidate, round));
            debug!("Buffered candidate, {} pending", state.pending_candidates.len());
            return;
        }

        if let Some(callback) = self.callbacks.ice_candidate.get() {
            isolate("ice candidate callback", || callback(candidate, round));
        }
    }
}
