//! In-memory [`QueueTransport`] fake (§10.4): backs `taskrelay-completion`
//! and `taskrelay-client` integration tests without a live broker.

use std::sync::Mutex as StdMutex;

use dashmap::DashMap;

use crate::error::{QueueError, Result};
use crate::transport::QueueTransport;

/// Records every published payload per queue name. `declared` controls what
/// `check_queue` reports; `fail_on` lets a test inject a publish failure for
/// a specific payload (e.g. scenario D's rollback test).
pub struct FakeQueue {
    declared: DashMap<String, bool>,
    published: DashMap<String, Vec<Vec<u8>>>,
    fail_on: StdMutex<Vec<Vec<u8>>>,
}

impl FakeQueue {
    pub fn new() -> Self {
        Self {
            declared: DashMap::new(),
            published: DashMap::new(),
            fail_on: StdMutex::new(Vec::new()),
        }
    }

    pub fn declare(&self, name: &str) {
        self.declared.insert(name.to_string(), true);
    }

    pub fn fail_next_publish_of(&self, payload: impl Into<Vec<u8>>) {
        self.fail_on.lock().unwrap().push(payload.into());
    }

    pub fn messages(&self, name: &str) -> Vec<Vec<u8>> {
        self.published.get(name).map(|v| v.clone()).unwrap_or_default()
    }
}

impl Default for FakeQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl QueueTransport for FakeQueue {
    async fn check_queue(&self, name: &str) -> Result<bool> {
        Ok(self.declared.get(name).map(|v| *v).unwrap_or(false))
    }

    async fn publish(&self, name: &str, payload: &[u8]) -> Result<()> {
        self.published.entry(name.to_string()).or_default().push(payload.to_vec());
        Ok(())
    }

    async fn publish_burst(&self, name: &str, payload: &[u8]) -> Result<()> {
        let should_fail = {
            let mut fail_on = self.fail_on.lock().unwrap();
            match fail_on.iter().position(|p| p == payload) {
                Some(pos) => {
                    fail_on.remove(pos);
                    true
                }
                None => false,
            }
        };
        if should_fail {
            return Err(QueueError::Transport("simulated publish failure".into()));
        }
        self.publish(name, payload).await
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn check_queue_reports_declared_state() {
        let queue = FakeQueue::new();
        assert!(!queue.check_queue("q1").await.unwrap());
        queue.declare("q1");
        assert!(queue.check_queue("q1").await.unwrap());
    }

    #[tokio::test]
    async fn check_queue_or_throw_raises_enoqueue() {
        let queue = FakeQueue::new();
        let err = queue.check_queue_or_throw("missing").await.unwrap_err();
        assert!(matches!(err, QueueError::Missing(name) if name == "missing"));
    }

    #[tokio::test]
    async fn publish_burst_honors_injected_failure() {
        let queue = FakeQueue::new();
        queue.declare("q1");
        queue.fail_next_publish_of(b"t1".to_vec());

        assert!(queue.publish_burst("q1", b"t1").await.is_err());
        assert!(queue.publish_burst("q1", b"t1").await.is_ok());
        assert_eq!(queue.messages("q1"), vec![b"t1".to_vec()]);
    }
}
