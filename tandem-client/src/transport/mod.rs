mod channel_handle;
mod media_track;
mod peer_transport;
mod rtc_channel;
mod rtc_transport;
mod transport_event;

pub use channel_handle::*;
pub use media_track::*;
pub use peer_transport::*;
pub use rtc_channel::*;
pub use rtc_transport::*;
pub use transport_event::*;
