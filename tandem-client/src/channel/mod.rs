mod channel_source;
mod data_channel_manager;
mod observers;

pub use channel_source::*;
pub use data_channel_manager::*;
pub use observers::*;
