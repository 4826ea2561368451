use crate::transport::{
    ChannelHandle, MediaTrack, PeerTransport, RemoteTrack, RtcChannelHandle, SenderHandle,
    TransportEvent, TransportFactory, TransportState,
};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tandem_core::config::SessionConfig;
use tandem_core::model::{IceCandidate, SdpType, SessionDescription, TrackKind};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_remote::TrackRemote;

/// [`PeerTransport`] backed by a webrtc `RTCPeerConnection`.
pub struct RtcPeerTransport {
    peer_connection: Arc<RTCPeerConnection>,
    senders: DashMap<SenderHandle, Arc<RTCRtpSender>>,
}

impl RtcPeerTransport {
    /// Build the peer connection and route its callbacks into `event_tx`.
    pub async fn new(config: &SessionConfig, event_tx: mpsc::Sender<TransportEvent>) -> Result<Self> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: config
                .ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);

        let state_tx = event_tx.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();
                Box::pin(async move {
                    info!("Peer connection state changed: {:?}", s);
                    let _ = tx.send(TransportEvent::StateChanged(map_state(s))).await;
                })
            },
        ));

        let ice_tx = event_tx.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();
            Box::pin(async move {
                let Some(candidate) = c else { return };
                let init = match candidate.to_json() {
                    Ok(init) => init,
                    Err(e) => {
                        warn!("Failed to serialize local ICE candidate: {}", e);
                        return;
                    }
                };
                let _ = tx
                    .send(TransportEvent::CandidateDiscovered(IceCandidate {
                        candidate: init.candidate,
                        sdp_mid: init.sdp_mid,
                        sdp_m_line_index: init.sdp_mline_index,
                        username_fragment: init.username_fragment,
                    }))
                    .await;
            })
        }));

        let negotiation_tx = event_tx.clone();
        peer_connection.on_negotiation_needed(Box::new(move || {
            let tx = negotiation_tx.clone();
            Box::pin(async move {
                debug!("Negotiation needed");
                let _ = tx.send(TransportEvent::NegotiationNeeded).await;
            })
        }));

        let track_tx = event_tx.clone();
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let tx = track_tx.clone();
                Box::pin(async move {
                    let remote = RemoteTrack {
                        track_id: track.id(),
                        stream_id: track.stream_id(),
                        kind: match track.kind() {
                            RTPCodecType::Audio => TrackKind::Audio,
                            _ => TrackKind::Video,
                        },
                    };
                    debug!("Remote track {} added to stream {}", remote.track_id, remote.stream_id);
                    let _ = tx.send(TransportEvent::RemoteTrackAdded(remote)).await;
                })
            },
        ));

        let dc_tx = event_tx;
        peer_connection.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
            let tx = dc_tx.clone();
            Box::pin(async move {
                debug!("Inbound DataChannel '{}'", dc.label());
                let handle: Arc<dyn ChannelHandle> = Arc::new(RtcChannelHandle::new(dc));
                let _ = tx.send(TransportEvent::InboundChannelOpened(handle)).await;
            })
        }));

        Ok(Self {
            peer_connection,
            senders: DashMap::new(),
        })
    }

    fn sender(&self, handle: SenderHandle) -> Result<Arc<RTCRtpSender>> {
        self.senders
            .get(&handle)
            .map(|entry| entry.value().clone())
            .with_context(|| format!("Unknown sender {:?}", handle))
    }
}

#[async_trait]
impl PeerTransport for RtcPeerTransport {
    async fn attach_track(&self, track: Arc<dyn MediaTrack>) -> Result<SenderHandle> {
        let rtp_track = track
            .rtp_track()
            .with_context(|| format!("Track {} has no RTP source", track.id()))?;
        let sender = self.peer_connection.add_track(rtp_track).await?;

        let handle = SenderHandle::new();
        self.senders.insert(handle, sender);
        Ok(handle)
    }

    async fn detach_track(&self, sender: SenderHandle) -> Result<()> {
        let Some((_, rtp_sender)) = self.senders.remove(&sender) else {
            bail!("Unknown sender {:?}", sender);
        };
        self.peer_connection.remove_track(&rtp_sender).await?;
        Ok(())
    }

    async fn replace_track(&self, sender: SenderHandle, track: Arc<dyn MediaTrack>) -> Result<()> {
        let rtp_sender = self.sender(sender)?;
        let rtp_track = track
            .rtp_track()
            .with_context(|| format!("Track {} has no RTP source", track.id()))?;
        rtp_sender.replace_track(Some(rtp_track)).await?;
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        let offer = self.peer_connection.create_offer(None).await?;
        from_rtc_description(offer)
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self.peer_connection.create_answer(None).await?;
        from_rtc_description(answer)
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        self.peer_connection
            .set_local_description(to_rtc_description(desc)?)
            .await?;
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        self.peer_connection
            .set_remote_description(to_rtc_description(desc)?)
            .await?;
        Ok(())
    }

    async fn add_remote_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: candidate.username_fragment,
        };
        self.peer_connection.add_ice_candidate(init).await?;
        Ok(())
    }

    async fn create_channel(&self, label: &str) -> Result<Arc<dyn ChannelHandle>> {
        let dc = self
            .peer_connection
            .create_data_channel(label, None)
            .await
            .context("Failed to create data channel")?;
        Ok(Arc::new(RtcChannelHandle::new(dc)))
    }

    async fn close(&self) -> Result<()> {
        self.senders.clear();
        self.peer_connection.close().await?;
        Ok(())
    }
}

/// Creates an [`RtcPeerTransport`] per session.
#[derive(Debug, Clone, Copy, Default)]
pub struct RtcTransportFactory;

#[async_trait]
impl TransportFactory for RtcTransportFactory {
    async fn create(
        &self,
        config: &SessionConfig,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Arc<dyn PeerTransport>> {
        Ok(Arc::new(RtcPeerTransport::new(config, events).await?))
    }
}

fn map_state(state: RTCPeerConnectionState) -> TransportState {
    match state {
        RTCPeerConnectionState::Connecting => TransportState::Connecting,
        RTCPeerConnectionState::Connected => TransportState::Connected,
        RTCPeerConnectionState::Disconnected => TransportState::Disconnected,
        RTCPeerConnectionState::Failed => TransportState::Failed,
        RTCPeerConnectionState::Closed => TransportState::Closed,
        _ => TransportState::New,
    }
}

fn to_rtc_description(desc: SessionDescription) -> Result<RTCSessionDescription> {
    let rtc = match desc.sdp_type {
        SdpType::Offer => RTCSessionDescription::offer(desc.sdp)?,
        SdpType::Answer => RTCSessionDescription::answer(desc.sdp)?,
    };
    Ok(rtc)
}

fn from_rtc_description(desc: RTCSessionDescription) -> Result<SessionDescription> {
    let sdp_type = match desc.sdp_type {
        RTCSdpType::Offer => SdpType::Offer,
        RTCSdpType::Answer => SdpType::Answer,
        other => bail!("Unsupported session description type {}", other),
    };
    Ok(SessionDescription {
        sdp_type,
        sdp: desc.sdp,
    })
}
