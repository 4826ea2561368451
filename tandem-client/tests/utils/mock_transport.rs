use anyhow::{Result, anyhow};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tandem_client::{
    ChannelHandle, MediaTrack, PeerTransport, RemoteTrack, SenderHandle, TransportEvent,
    TransportFactory,
};
use tandem_core::config::SessionConfig;
use tandem_core::model::{IceCandidate, SdpType, SessionDescription, TrackKind};
use tokio::sync::mpsc;

use crate::utils::MockChannelHandle;

/// Peer transport that records every call and lets the test raise events.
pub struct MockPeerTransport {
    events: mpsc::Sender<TransportEvent>,
    senders: Mutex<HashMap<SenderHandle, String>>,
    local_descriptions: Mutex<Vec<SessionDescription>>,
    remote_descriptions: Mutex<Vec<SessionDescription>>,
    remote_candidates: Mutex<Vec<IceCandidate>>,
    channels: Mutex<Vec<Arc<MockChannelHandle>>>,
    offers: AtomicUsize,
    fail_offers: AtomicBool,
    closed: AtomicBool,
}

impl MockPeerTransport {
    pub fn new(events: mpsc::Sender<TransportEvent>) -> Self {
        Self {
            events,
            senders: Mutex::new(HashMap::new()),
            local_descriptions: Mutex::new(Vec::new()),
            remote_descriptions: Mutex::new(Vec::new()),
            remote_candidates: Mutex::new(Vec::new()),
            channels: Mutex::new(Vec::new()),
            offers: AtomicUsize::new(0),
            fail_offers: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    pub async fn emit(&self, event: TransportEvent) {
        self.events
            .send(event)
            .await
            .expect("session stopped listening for transport events");
    }

    pub async fn emit_candidate(&self, candidate: &str) {
        self.emit(TransportEvent::CandidateDiscovered(IceCandidate::new(candidate)))
            .await;
    }

    pub async fn emit_remote_track(&self, track_id: &str, stream_id: &str, kind: TrackKind) {
        self.emit(TransportEvent::RemoteTrackAdded(RemoteTrack {
            track_id: track_id.to_owned(),
            stream_id: stream_id.to_owned(),
            kind,
        }))
        .await;
    }

    pub fn fail_offers(&self, fail: bool) {
        self.fail_offers.store(fail, Ordering::SeqCst);
    }

    /// Track ids currently bound to a sender.
    pub fn attached_tracks(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.senders.lock().values().cloned().collect();
        ids.sort();
        ids
    }

    pub fn local_descriptions(&self) -> Vec<SessionDescription> {
        self.local_descriptions.lock().clone()
    }

    pub fn remote_descriptions(&self) -> Vec<SessionDescription> {
        self.remote_descriptions.lock().clone()
    }

    pub fn remote_candidates(&self) -> Vec<IceCandidate> {
        self.remote_candidates.lock().clone()
    }

    pub fn channels(&self) -> Vec<Arc<MockChannelHandle>> {
        self.channels.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PeerTransport for MockPeerTransport {
    async fn attach_track(&self, track: Arc<dyn MediaTrack>) -> Result<SenderHandle> {
        let handle = SenderHandle::new();
        self.senders.lock().insert(handle, track.id());
        Ok(handle)
    }

    async fn detach_track(&self, sender: SenderHandle) -> Result<()> {
        self.senders
            .lock()
            .remove(&sender)
            .map(|_| ())
            .ok_or_else(|| anyhow!("unknown sender"))
    }

    async fn replace_track(&self, sender: SenderHandle, track: Arc<dyn MediaTrack>) -> Result<()> {
        let mut senders = self.senders.lock();
        let slot = senders
            .get_mut(&sender)
            .ok_or_else(|| anyhow!("unknown sender"))?;
        *slot = track.id();
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        if self.fail_offers.load(Ordering::SeqCst) {
            return Err(anyhow!("offer rejected"));
        }
        let n = self.offers.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SessionDescription::offer(format!("mock-offer-{n}")))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let has_offer = self
            .remote_descriptions
            .lock()
            .last()
            .is_some_and(|desc| desc.sdp_type == SdpType::Offer);
        if !has_offer {
            return Err(anyhow!("no remote offer to answer"));
        }
        Ok(SessionDescription::answer("mock-answer"))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        self.local_descriptions.lock().push(desc);
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        self.remote_descriptions.lock().push(desc);
        Ok(())
    }

    async fn add_remote_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.remote_candidates.lock().push(candidate);
        Ok(())
    }

    async fn create_channel(&self, label: &str) -> Result<Arc<dyn ChannelHandle>> {
        let channel = MockChannelHandle::new(label);
        self.channels.lock().push(channel.clone());
        Ok(channel)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Factory that keeps the transport it built so the test can drive it.
#[derive(Default)]
pub struct MockTransportFactory {
    transport: Mutex<Option<Arc<MockPeerTransport>>>,
}

impl MockTransportFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn transport(&self) -> Arc<MockPeerTransport> {
        self.transport
            .lock()
            .clone()
            .expect("session has not created a transport yet")
    }
}

#[async_trait]
impl TransportFactory for MockTransportFactory {
    async fn create(
        &self,
        _config: &SessionConfig,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Arc<dyn PeerTransport>> {
        let transport = Arc::new(MockPeerTransport::new(events));
        *self.transport.lock() = Some(transport.clone());
        Ok(transport)
    }
}
