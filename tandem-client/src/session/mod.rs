mod peer_session;
mod session_callbacks;

pub use peer_session::*;
pub use session_callbacks::*;
