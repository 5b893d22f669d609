//! Errors raised by the object-store lister and batch planner.

use thiserror::Error;

/// Errors surfaced while listing an object store.
#[derive(Debug, Error)]
pub enum ObjectStoreError {
    /// The backing SDK call failed. No retries are attempted at this layer
    /// (§4.2): the caller decides whether to retry.
    #[error("object store request failed: {0}")]
    Request(String),
}

/// Errors raised while expanding a manifest into plan items.
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error(transparent)]
    Core(#[from] taskrelay_core::CoreError),

    #[error(transparent)]
    ObjectStore(#[from] ObjectStoreError),
}

pub type Result<T> = std::result::Result<T, PlannerError>;
