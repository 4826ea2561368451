mod http_signal_store;
mod signaling_bridge;

pub use http_signal_store::*;
pub use signaling_bridge::*;
