//! Client-side core: submit tasks to a queue and key-value store, then
//! wait on or watch their completion, without depending on any particular
//! worker runtime.

pub mod client;
pub mod config;
pub mod error;
pub mod submit;
pub mod wait;

pub use client::Client;
pub use config::{ClientConfig, ConfigError};
pub use error::{ClientError, Result};
pub use submit::{BatchOptions, BatchResult, SingleResult, TaskResult};
pub use wait::{OnEvent, WaitManyOutcome, WaitOutcome, WaitState, WatchEvent, WatchOptions, WatchOutcome};
