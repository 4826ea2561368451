mod channel;
mod chat;
mod connection;
mod media;
mod room;
mod signaling;

pub use channel::ReadyState;
pub use chat::{ChatMessage, ChatPayload};
pub use connection::{ConnectionId, NegotiationState};
pub use media::{SenderKind, TrackKind};
pub use room::{MembershipRequest, RoomAssignment, SignalQuery};
pub use signaling::{IceCandidate, SdpType, SessionDescription, SignalType, SignalingMessage};
