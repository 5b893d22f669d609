//! Errors raised by the key-value connector (§7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("key-value operation on `{key}` failed: {reason}")]
    Operation { key: String, reason: String },
}

pub type Result<T> = std::result::Result<T, KvError>;
