mod config;
mod http;
mod hub;

pub use config::*;
pub use http::*;
pub use hub::*;
