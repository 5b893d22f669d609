//! Errors raised by the completion connector (§7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("a waiter is already registered for task {0}")]
    AlreadyWaiting(String),

    #[error(transparent)]
    Kv(#[from] taskrelay_kv::KvError),
}

pub type Result<T> = std::result::Result<T, CompletionError>;
