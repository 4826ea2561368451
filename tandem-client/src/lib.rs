mod call;
mod channel;
mod chat;
mod fault;
mod session;
mod signaling;
mod transport;

pub use call::*;
pub use channel::*;
pub use chat::*;
pub use session::*;
pub use signaling::*;
pub use transport::*;
