//! Completion connector (C8, §4.8): a single cooperative poll loop that
//! drains the per-work completion set and resolves in-process waiters.
//!
//! The resolver table is a [`DashMap`], not a map behind a `tokio::sync::Mutex`
//! — every mutation (`insert`/`remove`) is one `DashMap` operation, so no
//! extra lock is needed to keep it consistent across the loop and the
//! waiter-registering call sites (§5, §9).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use dashmap::DashMap;
use taskrelay_core::TaskId;
use taskrelay_kv::KvBackend;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{CompletionError, Result};

const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

pub struct CompletionConnector {
    kv: Arc<dyn KvBackend>,
    work_id: String,
    poll_interval: Duration,
    resolvers: DashMap<TaskId, oneshot::Sender<i32>>,
    running: AtomicBool,
    stop_notify: Notify,
    handle: StdMutex<Option<JoinHandle<()>>>,
}

impl CompletionConnector {
    pub fn new(kv: Arc<dyn KvBackend>, work_id: impl Into<String>, poll_interval: Duration) -> Arc<Self> {
        Arc::new(Self {
            kv,
            work_id: work_id.into(),
            poll_interval,
            resolvers: DashMap::new(),
            running: AtomicBool::new(false),
            stop_notify: Notify::new(),
            handle: StdMutex::new(None),
        })
    }

    pub fn with_default_interval(kv: Arc<dyn KvBackend>, work_id: impl Into<String>) -> Arc<Self> {
        Self::new(kv, work_id, Duration::from_millis(DEFAULT_POLL_INTERVAL_MS))
    }

    fn completion_set_key(&self) -> String {
        format!("wf:{}:tasksPendingCompletionHandling", self.work_id)
    }

    /// Start the poll loop exactly once (§5: spawned exactly once per client).
    /// Calling this when already running is a no-op, which is what lets C10
    /// call it unconditionally before every wait.
    pub fn ensure_running(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let this = self.clone();
        let handle = tokio::spawn(this.run_loop());
        *self.handle.lock().unwrap() = Some(handle);
    }

    /// Flip the running flag and cancel the loop's sleep. Idempotent.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.stop_notify.notify_waiters();
    }

    /// Install a resolver for `task_id`. Errors if one is already registered.
    pub fn wait_for_task(&self, task_id: TaskId) -> Result<oneshot::Receiver<i32>> {
        let (tx, rx) = oneshot::channel();
        match self.resolvers.entry(task_id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(CompletionError::AlreadyWaiting(task_id))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(tx);
                Ok(rx)
            }
        }
    }

    /// Drop the resolver for `task_id`, if any. Returns whether one existed.
    pub fn cancel_wait(&self, task_id: &str) -> bool {
        self.resolvers.remove(task_id).is_some()
    }

    /// Non-destructive read of `<task_id>`'s exit-code member.
    pub async fn peek_exit_code(&self, task_id: &str) -> Result<Option<i32>> {
        let member = self.kv.s_rand_member(task_id).await?;
        Ok(member.and_then(|m| m.parse().ok()))
    }

    /// Write `code` into `<task_id>` and add `task_id` to the completion set.
    /// Used by tests/simulation; real workers do this themselves (§6).
    pub async fn notify_task_completion(&self, task_id: &str, code: i32) -> Result<()> {
        self.kv.s_add(task_id, &code.to_string()).await?;
        self.kv.s_add(&self.completion_set_key(), task_id).await?;
        Ok(())
    }

    async fn run_loop(self: Arc<Self>) {
        info!(work_id = %self.work_id, "completion loop started");
        while self.running.load(Ordering::SeqCst) {
            let completion_set = self.completion_set_key();

            let member = match self.kv.s_rand_member(&completion_set).await {
                Ok(member) => member,
                Err(e) => {
                    warn!(error = %e, "completion loop: failed to read completion set");
                    None
                }
            };

            let Some(task_id) = member else {
                tokio::select! {
                    _ = tokio::time::sleep(self.poll_interval) => {}
                    _ = self.stop_notify.notified() => {}
                }
                continue;
            };

            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            let code = match self.kv.s_rand_member(&task_id).await {
                Ok(Some(raw)) => raw.parse::<i32>().ok(),
                Ok(None) => None,
                Err(e) => {
                    warn!(error = %e, task_id = %task_id, "completion loop: failed to read exit code");
                    None
                }
            };

            match self.resolvers.remove(&task_id) {
                Some((_, tx)) => {
                    if let Err(e) = self.kv.s_rem(&completion_set, &task_id).await {
                        warn!(error = %e, task_id = %task_id, "completion loop: failed to clear completion-set membership");
                    }
                    let _ = tx.send(code.unwrap_or(-1));
                }
                None => {
                    debug!(task_id = %task_id, "completion loop: no resolver registered, dropping late completion");
                    if let Err(e) = self.kv.s_rem(&completion_set, &task_id).await {
                        warn!(error = %e, task_id = %task_id, "completion loop: failed to clear completion-set membership");
                    }
                }
            }
        }
        info!(work_id = %self.work_id, "completion loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskrelay_kv::FakeKv;

    fn connector(work_id: &str) -> (Arc<CompletionConnector>, Arc<FakeKv>) {
        let kv: Arc<FakeKv> = Arc::new(FakeKv::new());
        let connector = CompletionConnector::new(kv.clone(), work_id, Duration::from_millis(10));
        (connector, kv)
    }

    #[tokio::test]
    async fn wait_for_task_rejects_duplicate_registration() {
        let (connector, _kv) = connector("w1");
        let _rx = connector.wait_for_task("t1".to_string()).unwrap();
        let err = connector.wait_for_task("t1".to_string()).unwrap_err();
        assert!(matches!(err, CompletionError::AlreadyWaiting(id) if id == "t1"));
    }

    #[tokio::test]
    async fn cancel_wait_reports_whether_a_resolver_existed() {
        let (connector, _kv) = connector("w1");
        assert!(!connector.cancel_wait("t1"));
        connector.wait_for_task("t1".to_string()).unwrap();
        assert!(connector.cancel_wait("t1"));
        assert!(!connector.cancel_wait("t1"));
    }

    #[tokio::test]
    async fn loop_resolves_a_registered_waiter() {
        let (connector, kv) = connector("w1");
        connector.ensure_running();

        let rx = connector.wait_for_task("t1".to_string()).unwrap();
        connector.notify_task_completion("t1", 0).await.unwrap();

        let code = tokio::time::timeout(Duration::from_secs(1), rx).await.unwrap().unwrap();
        assert_eq!(code, 0);
        assert!(!kv.set_contains("wf:w1:tasksPendingCompletionHandling", "t1"));
        connector.stop();
    }

    #[tokio::test]
    async fn loop_drops_late_completions_without_a_resolver() {
        let (connector, kv) = connector("w1");
        connector.ensure_running();

        connector.notify_task_completion("t1", 3).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!kv.set_contains("wf:w1:tasksPendingCompletionHandling", "t1"));
        connector.stop();
    }

    #[tokio::test]
    async fn peek_exit_code_is_non_destructive() {
        let (connector, _kv) = connector("w1");
        connector.notify_task_completion("t1", 7).await.unwrap();
        assert_eq!(connector.peek_exit_code("t1").await.unwrap(), Some(7));
        assert_eq!(connector.peek_exit_code("t1").await.unwrap(), Some(7));
    }
}
