pub use tandem_core::model::{ChatMessage, ConnectionId, SignalType, SignalingMessage};

pub mod model {
    pub use tandem_core::model::*;
}

pub mod config {
    pub use tandem_core::config::*;
}

pub mod error {
    pub use tandem_core::error::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use tandem_client::*;
}

#[cfg(feature = "server")]
pub mod server {
    pub use tandem_server::*;
}
