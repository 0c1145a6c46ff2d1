use thiserror::Error;
use tokio::{task::JoinError, time::Duration};

/// The error type produced by a failing subscriber callback, either
/// synchronously or through a deferred [`Outcome`](crate::broadcaster::Outcome).
pub type SubscriberError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum EmitError {
    /// A subscriber callback failed during delivery. The unsafe emit variants
    /// return this to the caller; the safe variants hand it to the
    /// caller-supplied error handler instead.
    #[error("subscriber {name:?} failed during delivery: {source}")]
    Subscriber {
        /// The diagnostic label attached at subscribe time, if any.
        name: Option<String>,
        source: SubscriberError,
    },
    /// One or more deliveries of a deferred emission failed. Contains every
    /// error caught while waiting on the delivery tasks.
    #[error("one or more deliveries failed: {0:?}")]
    DeliveryFailed(Vec<EmitError>),
    /// A spawned delivery task could not be joined.
    #[error("failed to join a delivery task: {0}")]
    Join(JoinError),
    /// Waiting on a delivery task exceeded the given duration.
    #[error("timed out after {0:?} while waiting for a delivery")]
    WaitTimeout(Duration),
    /// A subscriber returned a deferred outcome but no tokio runtime was
    /// available to drive it. Only reachable from the synchronous emit
    /// variants when called outside a runtime.
    #[error("a deferred subscriber outcome requires a running tokio runtime")]
    NoRuntime,
}
