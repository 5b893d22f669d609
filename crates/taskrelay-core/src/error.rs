//! Shared, synchronous error vocabulary.
//!
//! Errors that can be raised before any I/O happens (malformed object-store
//! URLs, inconsistent manifest options) live here so both the planner and
//! the client crate can return the same variant without depending on each
//! other.

use thiserror::Error;

/// Errors raised while validating manifest-derived arguments, independent of
/// any backing store.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A `s3://` URL was malformed (§6 grammar).
    #[error("invalid object-store url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: &'static str },

    /// `io.batch.enabled` is true but `io.inputs` is empty.
    #[error("batch expansion requires at least one io.inputs entry (EBATCH_NO_INPUTS)")]
    BatchNoInputs,

    /// A manifest field was structurally present but semantically invalid.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
