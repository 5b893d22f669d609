//! Environment-driven configuration for the queue and key-value connections
//! (§10.3). Connection-string parsing itself is delegated to `lapin`'s and
//! `redis`'s own URL parsers; this crate only resolves which strings to
//! hand them.
//!
//! Like `taskrelay-planner::objectstore::S3Config`, this never calls
//! `dotenvy::dotenv()` itself — loading a `.env` file is the embedding
//! application's job. `from_env()` only reads variables already in the
//! process environment.

use std::time::Duration;

const DEFAULT_HEARTBEAT_SECS: u16 = 60;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub amqp_url: String,
    pub redis_url: String,
    pub heartbeat_secs: u16,
    pub poll_interval: Duration,
    pub default_work_id: Option<String>,
}

impl ClientConfig {
    /// Read `TASKRELAY_AMQP_URL`, `TASKRELAY_REDIS_URL`,
    /// `TASKRELAY_HEARTBEAT_SECS`, `TASKRELAY_POLL_INTERVAL_MS`, and
    /// `TASKRELAY_DEFAULT_WORK_ID` from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let amqp_url = std::env::var("TASKRELAY_AMQP_URL")
            .map_err(|_| ConfigError::Missing("TASKRELAY_AMQP_URL"))?;
        let redis_url = std::env::var("TASKRELAY_REDIS_URL")
            .map_err(|_| ConfigError::Missing("TASKRELAY_REDIS_URL"))?;
        let heartbeat_secs = std::env::var("TASKRELAY_HEARTBEAT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_HEARTBEAT_SECS);
        let poll_interval_ms = std::env::var("TASKRELAY_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_POLL_INTERVAL_MS);
        let default_work_id = std::env::var("TASKRELAY_DEFAULT_WORK_ID").ok();

        Ok(Self {
            amqp_url,
            redis_url,
            heartbeat_secs,
            poll_interval: Duration::from_millis(poll_interval_ms),
            default_work_id,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
}
