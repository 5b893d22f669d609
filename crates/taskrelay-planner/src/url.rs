//! `s3://<bucket>[/<path>]` parsing (§6).
//!
//! This is the planner's own tiny grammar, not a general URL parser —
//! connection-string parsing for the queue and key-value backends is out of
//! scope for this core (§1) and handled by `lapin`/`redis` directly.

use taskrelay_core::CoreError;

/// A parsed object-store location: a prefix (trailing `/`, including the
/// empty path) or an exact key (no trailing `/`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectLocation {
    Prefix { bucket: String, prefix: String },
    Key { bucket: String, key: String },
}

impl ObjectLocation {
    pub fn bucket(&self) -> &str {
        match self {
            Self::Prefix { bucket, .. } | Self::Key { bucket, .. } => bucket,
        }
    }
}

/// Parse `s3://bucket[/path]`. A trailing `/` (or an empty path) yields a
/// prefix; otherwise the last path component is treated as an exact key.
pub fn parse_s3_url(url: &str) -> Result<ObjectLocation, CoreError> {
    let rest = url.strip_prefix("s3://").ok_or_else(|| CoreError::InvalidUrl {
        url: url.to_string(),
        reason: "missing s3:// scheme",
    })?;

    let (bucket, path) = match rest.split_once('/') {
        Some((bucket, path)) => (bucket, path),
        None => (rest, ""),
    };

    if bucket.is_empty() {
        return Err(CoreError::InvalidUrl {
            url: url.to_string(),
            reason: "empty bucket name",
        });
    }

    if path.is_empty() || path.ends_with('/') {
        Ok(ObjectLocation::Prefix {
            bucket: bucket.to_string(),
            prefix: path.to_string(),
        })
    } else {
        Ok(ObjectLocation::Key {
            bucket: bucket.to_string(),
            key: path.to_string(),
        })
    }
}
