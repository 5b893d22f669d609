//! The queue connector's trait seam (§4.6): the submission engine and its
//! tests depend on [`QueueTransport`], never on `lapin` directly.

use async_trait::async_trait;

use crate::error::{QueueError, Result};

/// A message queue capable of passive existence checks and backpressured
/// publication. Implementors do not declare queues (§6) — that is an
/// external operator's responsibility.
#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Passive declare. `Ok(false)` on a 404; any other failure is an `Err`.
    async fn check_queue(&self, name: &str) -> Result<bool>;

    /// Fire-and-forget send.
    async fn publish(&self, name: &str, payload: &[u8]) -> Result<()>;

    /// Send, waiting for a drain signal if the channel's write buffer is
    /// full. This is the backpressure point `createBatch` depends on.
    async fn publish_burst(&self, name: &str, payload: &[u8]) -> Result<()>;

    /// Close all channels, then the connection. Idempotent.
    async fn close(&self) -> Result<()>;

    /// [`check_queue`](Self::check_queue), raising [`QueueError::Missing`] when absent.
    async fn check_queue_or_throw(&self, name: &str) -> Result<()> {
        if self.check_queue(name).await? {
            Ok(())
        } else {
            Err(QueueError::Missing(name.to_string()))
        }
    }
}
