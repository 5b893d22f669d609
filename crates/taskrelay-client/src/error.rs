//! `ClientError` is the sole error type the public API surfaces (§10.2),
//! aggregating the lower crates' errors via `#[from]`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error(transparent)]
    Planner(#[from] taskrelay_planner::PlannerError),

    #[error(transparent)]
    Queue(#[from] taskrelay_queue::QueueError),

    #[error(transparent)]
    Kv(#[from] taskrelay_kv::KvError),

    #[error(transparent)]
    Completion(#[from] taskrelay_completion::CompletionError),

    #[error(transparent)]
    Core(#[from] taskrelay_core::CoreError),

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
