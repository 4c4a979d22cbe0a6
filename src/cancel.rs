//! Cooperative cancellation for long-running solves (C6, C7).
//!
//! The numeric core has no async runtime underneath it, so cancellation is
//! a plain polling trait rather than `tokio_util::sync::CancellationToken`
//! — callers check it between iterations and bail out with
//! [`crate::error::PoolError::Cancelled`] when it fires.
/// Polled between Newton/root-finder/least-squares iterations.
pub trait CancellationToken {
    fn is_cancelled(&self) -> bool;
}

/// A token that never cancels; the default for callers that don't need it.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

impl CancellationToken for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

impl CancellationToken for std::sync::atomic::AtomicBool {
    fn is_cancelled(&self) -> bool {
        self.load(std::sync::atomic::Ordering::Relaxed)
    }
}
