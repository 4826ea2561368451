use crate::transport::ChannelHandle;
use std::sync::Arc;
use tandem_core::model::{IceCandidate, TrackKind};

/// Track announced by the remote side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack {
    pub track_id: String,
    pub stream_id: String,
    pub kind: TrackKind,
}

/// Coarse connection state of the underlying transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Events the peer transport emits for the session that owns it.
pub enum TransportEvent {
    /// A local ICE candidate was gathered and has to reach the peer.
    CandidateDiscovered(IceCandidate),

    /// The set of attached tracks changed; a negotiation round is due.
    NegotiationNeeded,

    /// The remote side started sending a track.
    RemoteTrackAdded(RemoteTrack),

    /// The remote side created a data channel.
    InboundChannelOpened(Arc<dyn ChannelHandle>),

    StateChanged(TransportState),
}

impl std::fmt::Debug for TransportEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CandidateDiscovered(c) => f.debug_tuple("CandidateDiscovered").field(c).finish(),
            Self::NegotiationNeeded => f.write_str("NegotiationNeeded"),
            Self::RemoteTrackAdded(t) => f.debug_tuple("RemoteTrackAdded").field(t).finish(),
            Self::InboundChannelOpened(c) => f
                .debug_tuple("InboundChannelOpened")
                .field(&c.label())
                .finish(),
            Self::StateChanged(s) => f.debug_tuple("StateChanged").field(s).finish(),
        }
    }
}
