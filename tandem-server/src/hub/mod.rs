mod hub_error;
mod signal_hub;

pub use hub_error::*;
pub use signal_hub::*;
