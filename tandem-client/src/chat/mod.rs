mod chat_router;

pub use chat_router::*;
