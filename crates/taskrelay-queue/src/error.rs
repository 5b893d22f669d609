//! Errors raised by the queue connector (§7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    /// `checkQueueOrThrow` found no matching queue.
    #[error("ENOQUEUE:{0}")]
    Missing(String),

    /// The shared connection dropped; channel caches were invalidated.
    #[error("queue connection lost")]
    ConnectionLost,

    /// Any other transport-level failure (connect, declare, publish).
    #[error("queue transport error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, QueueError>;
