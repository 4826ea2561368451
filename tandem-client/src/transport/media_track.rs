use anyhow::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tandem_core::model::TrackKind;
use tracing::debug;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// Handle to a local capture track supplied by the media layer.
///
/// The session never creates tracks; it attaches, detaches and toggles the
/// handles it is given.
pub trait MediaTrack: Send + Sync {
    fn id(&self) -> String;

    fn kind(&self) -> TrackKind;

    fn stream_id(&self) -> String;

    fn is_enabled(&self) -> bool;

    fn set_enabled(&self, enabled: bool);

    fn stop(&self);

    /// RTP source handed to the peer connection, for tracks backed by one.
    fn rtp_track(&self) -> Option<Arc<dyn TrackLocal + Send + Sync>> {
        None
    }
}

/// A group of local tracks sharing one stream id.
#[derive(Clone)]
pub struct MediaStream {
    pub id: String,
    pub tracks: Vec<Arc<dyn MediaTrack>>,
}

impl MediaStream {
    pub fn new(id: impl Into<String>, tracks: Vec<Arc<dyn MediaTrack>>) -> Self {
        Self {
            id: id.into(),
            tracks,
        }
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &Arc<dyn MediaTrack>> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Video)
    }
}

/// Sample-fed track for the webrtc peer connection.
///
/// Disabled or stopped tracks silently drop the samples written to them.
pub struct LocalMediaTrack {
    kind: TrackKind,
    track: Arc<TrackLocalStaticSample>,
    enabled: AtomicBool,
    stopped: AtomicBool,
}

impl LocalMediaTrack {
    pub fn audio(id: impl Into<String>, stream_id: impl Into<String>) -> Self {
        Self::with_codec(TrackKind::Audio, MIME_TYPE_OPUS, id.into(), stream_id.into())
    }

    pub fn video(id: impl Into<String>, stream_id: impl Into<String>) -> Self {
        Self::with_codec(TrackKind::Video, MIME_TYPE_VP8, id.into(), stream_id.into())
    }

    fn with_codec(kind: TrackKind, mime_type: &str, id: String, stream_id: String) -> Self {
        let capability = RTCRtpCodecCapability {
            mime_type: mime_type.to_owned(),
            ..Default::default()
        };

        Self {
            kind,
            track: Arc::new(TrackLocalStaticSample::new(capability, id, stream_id)),
            enabled: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Push one encoded media sample to every sender bound to this track.
    pub async fn write_sample(&self, sample: &Sample) -> Result<()> {
        if self.is_stopped() || !self.is_enabled() {
            return Ok(());
        }
        self.track.write_sample(sample).await?;
        Ok(())
    }
}

impl MediaTrack for LocalMediaTrack {
    fn id(&self) -> String {
        self.track.id().to_owned()
    }

    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn stream_id(&self) -> String {
        self.track.stream_id().to_owned()
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    fn stop(&self) {
        if !self.stopped.swap(true, Ordering::AcqRel) {
            debug!("Local track {} stopped", self.track.id());
        }
    }

    fn rtp_track(&self) -> Option<Arc<dyn TrackLocal + Send + Sync>> {
        Some(self.track.clone() as Arc<dyn TrackLocal + Send + Sync>)
    }
}
