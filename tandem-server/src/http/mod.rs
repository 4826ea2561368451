mod api_error;
mod routes;

pub use api_error::*;
pub use routes::*;
