//! Typed key-value connector (C7): list-push, set-add/remove, and a
//! pipelined random-member primitive used for fast-peek and polling.

pub mod backend;
pub mod error;
pub mod redis_backend;

#[cfg(any(test, feature = "test-util"))]
pub mod fake;

pub use backend::KvBackend;
pub use error::{KvError, Result};
pub use redis_backend::RedisKv;

#[cfg(any(test, feature = "test-util"))]
pub use fake::FakeKv;
