//! AMQP 0-9-1 queue connector (C6): lazy connection/channel lifecycle,
//! passive existence checks, and backpressured publication.

pub mod connector;
pub mod error;
pub mod transport;

#[cfg(any(test, feature = "test-util"))]
pub mod fake;

pub use connector::LapinQueueConnector;
pub use error::{QueueError, Result};
pub use transport::QueueTransport;

#[cfg(any(test, feature = "test-util"))]
pub use fake::FakeQueue;
