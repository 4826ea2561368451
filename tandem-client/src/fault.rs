use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::error;

/// Run a subscriber or callback so that a panic inside it stays contained.
///
/// Returns false when the callback panicked.
pub(crate) fn isolate<F: FnOnce()>(what: &str, f: F) -> bool {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => true,
        Err(panic) => {
            error!("Handler fault in {}: {}", what, panic_message(&panic));
            false
        }
    }
}

pub(crate) fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
