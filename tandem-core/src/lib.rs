pub mod config;
pub mod error;
pub mod model;
pub mod traits;
pub mod utils;

pub use config::*;
pub use error::*;
pub use model::*;
pub use traits::*;
