//! Wait/watch engine (C10, §4.10): single, many, and whole-work waiters.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use taskrelay_core::{extract_work_id, CoreError};
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::client::Client;
use crate::error::{ClientError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitState {
    Done,
    Timeout,
    Failed,
    Idle,
}

#[derive(Debug, Clone)]
pub struct WaitOutcome {
    pub state: WaitState,
    pub task_id: String,
    pub code: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct WaitManyOutcome {
    pub state_done: bool,
    pub state: WaitState,
    pub done: Vec<(String, i32)>,
    pub pending: Vec<String>,
}

impl Default for WaitState {
    fn default() -> Self {
        Self::Done
    }
}

/// What a `watchWork` caller is told as events arrive.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    TaskDone { task_id: String, code: i32 },
    Progress { done: usize, total: usize },
}

pub type OnEvent = Arc<dyn Fn(WatchEvent) + Send + Sync>;

#[derive(Default)]
pub struct WatchOptions {
    pub timeout_sec: Option<u64>,
    pub idle_sec: Option<u64>,
    pub poll_ms: Option<u64>,
    pub expected: Option<usize>,
    pub on_event: Option<OnEvent>,
}

#[derive(Debug, Clone)]
pub struct WatchOutcome {
    pub state: WaitState,
    pub total: usize,
    pub results: Vec<(String, i32)>,
}

fn work_id_of(task_id: &str) -> Result<String> {
    extract_work_id(task_id)
        .map(str::to_string)
        .ok_or_else(|| ClientError::Core(CoreError::InvalidArgument(format!("malformed task id {task_id}"))))
}

impl Client {
    /// Fast-peek first; only falls through to registering a resolver with
    /// the completion connector if the exit code isn't already written.
    pub async fn wait_for_task(&self, task_id: &str, timeout_sec: Option<u64>) -> Result<WaitOutcome> {
        let work_id = work_id_of(task_id)?;
        let connector = self.completion_connector(&work_id);

        if let Some(code) = connector.peek_exit_code(task_id).await? {
            return Ok(WaitOutcome {
                state: WaitState::Done,
                task_id: task_id.to_string(),
                code: Some(code),
            });
        }

        connector.ensure_running();
        let rx = connector.wait_for_task(task_id.to_string())?;

        let resolve = |code: i32| WaitOutcome {
            state: WaitState::Done,
            task_id: task_id.to_string(),
            code: Some(code),
        };

        match timeout_sec.filter(|&s| s > 0) {
            None => Ok(resolve(rx.await.map_err(|_| connector_dropped())?)),
            Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), rx).await {
                Ok(Ok(code)) => Ok(resolve(code)),
                Ok(Err(_)) => Ok(resolve(connector.peek_exit_code(task_id).await?.unwrap_or(-1))),
                Err(_) => {
                    connector.cancel_wait(task_id);
                    // One last fast-peek avoids a false timeout raced against
                    // a completion that landed right as the timer fired.
                    match connector.peek_exit_code(task_id).await? {
                        Some(code) => Ok(resolve(code)),
                        None => Ok(WaitOutcome {
                            state: WaitState::Timeout,
                            task_id: task_id.to_string(),
                            code: None,
                        }),
                    }
                }
            },
        }
    }

    /// Start a waiter per pending id concurrently; as each resolves it moves
    /// from `pending` to `done`. `failFast` cancels all remaining waiters on
    /// the first non-zero completion.
    pub async fn wait_for_many(
        &self,
        task_ids: &[String],
        timeout_sec: Option<u64>,
        fail_fast: bool,
    ) -> Result<WaitManyOutcome> {
        let peeked = self.kv.multi_s_rand_member(task_ids).await?;
        let mut done: Vec<(String, i32)> = Vec::new();
        let mut pending: Vec<String> = Vec::new();
        for (id, member) in task_ids.iter().zip(peeked) {
            match member.and_then(|m| m.parse::<i32>().ok()) {
                Some(code) => done.push((id.clone(), code)),
                None => pending.push(id.clone()),
            }
        }

        if pending.is_empty() {
            return Ok(WaitManyOutcome {
                state_done: true,
                state: WaitState::Done,
                done,
                pending: vec![],
            });
        }

        for id in &pending {
            self.completion_connector(&work_id_of(id)?).ensure_running();
        }

        let mut futs = FuturesUnordered::new();
        for id in &pending {
            let id = id.clone();
            futs.push(async move { (id.clone(), self.wait_for_task(&id, None).await) });
        }

        let deadline = timeout_sec.filter(|&s| s > 0).map(|s| Instant::now() + Duration::from_secs(s));
        let mut remaining: HashSet<String> = pending.into_iter().collect();

        loop {
            if remaining.is_empty() {
                return Ok(WaitManyOutcome {
                    state_done: true,
                    state: WaitState::Done,
                    done,
                    pending: vec![],
                });
            }

            let next = futs.next();
            let resolved = match deadline {
                Some(d) => tokio::select! {
                    item = next => item,
                    _ = tokio::time::sleep_until(d) => None,
                },
                None => next.await,
            };

            let Some((id, outcome)) = resolved else {
                for id in &remaining {
                    if let Ok(work_id) = work_id_of(id) {
                        self.completion_connector(&work_id).cancel_wait(id);
                    }
                }
                let mut pending: Vec<String> = remaining.into_iter().collect();
                pending.sort();
                return Ok(WaitManyOutcome {
                    state_done: false,
                    state: WaitState::Timeout,
                    done,
                    pending,
                });
            };

            remaining.remove(&id);
            let outcome = outcome?;
            let code = outcome.code.unwrap_or(-1);
            done.push((id, code));

            if fail_fast && code != 0 {
                for id in &remaining {
                    if let Ok(work_id) = work_id_of(id) {
                        self.completion_connector(&work_id).cancel_wait(id);
                    }
                }
                let mut pending: Vec<String> = remaining.into_iter().collect();
                pending.sort();
                return Ok(WaitManyOutcome {
                    state_done: false,
                    state: WaitState::Failed,
                    done,
                    pending,
                });
            }
        }
    }

    /// Snapshot `work_id`'s task set, fast-peek everyone, then poll the
    /// stragglers non-blockingly until done, timed out, or idle.
    pub async fn watch_work(&self, work_id: &str, opts: WatchOptions) -> Result<WatchOutcome> {
        let work_set = format!("work:{work_id}:tasks");
        let expected = match opts.expected {
            Some(n) => n,
            None => self.kv.s_card(&work_set).await? as usize,
        };

        let mut members = self.kv.s_members(&work_set).await?;
        if members.len() > expected {
            members.truncate(expected);
        }

        let peeked = self.kv.multi_s_rand_member(&members).await?;
        let mut results: Vec<(String, i32)> = Vec::new();
        let mut waiting: Vec<String> = Vec::new();
        for (id, member) in members.iter().zip(peeked) {
            match member.and_then(|m| m.parse::<i32>().ok()) {
                Some(code) => {
                    emit(&opts, WatchEvent::TaskDone { task_id: id.clone(), code });
                    results.push((id.clone(), code));
                }
                None => waiting.push(id.clone()),
            }
        }
        emit(&opts, WatchEvent::Progress { done: results.len(), total: expected });

        if results.len() >= expected {
            return Ok(WatchOutcome { state: WaitState::Done, total: expected, results });
        }

        let connector = self.completion_connector(work_id);
        connector.ensure_running();

        let mut waiters: Vec<(String, oneshot::Receiver<i32>)> = Vec::new();
        for id in &waiting {
            if let Ok(rx) = connector.wait_for_task(id.clone()) {
                waiters.push((id.clone(), rx));
            }
        }

        let start = Instant::now();
        let mut last_new = start;
        let poll_interval = opts.poll_ms.map(Duration::from_millis).unwrap_or(Duration::from_millis(1000));

        loop {
            waiters.retain_mut(|(id, rx)| match rx.try_recv() {
                Ok(code) => {
                    results.push((id.clone(), code));
                    last_new = Instant::now();
                    emit(&opts, WatchEvent::TaskDone { task_id: id.clone(), code });
                    emit(&opts, WatchEvent::Progress { done: results.len(), total: expected });
                    false
                }
                Err(oneshot::error::TryRecvError::Empty) => true,
                Err(oneshot::error::TryRecvError::Closed) => false,
            });

            if results.len() >= expected || waiters.is_empty() {
                return Ok(WatchOutcome { state: WaitState::Done, total: expected, results });
            }

            if let Some(timeout_sec) = opts.timeout_sec.filter(|&s| s > 0) {
                if start.elapsed() >= Duration::from_secs(timeout_sec) {
                    return Ok(WatchOutcome { state: WaitState::Timeout, total: expected, results });
                }
            }
            if let Some(idle_sec) = opts.idle_sec.filter(|&s| s > 0) {
                if last_new.elapsed() >= Duration::from_secs(idle_sec) {
                    return Ok(WatchOutcome { state: WaitState::Idle, total: expected, results });
                }
            }

            tokio::time::sleep(poll_interval).await;
        }
    }
}

fn emit(opts: &WatchOptions, event: WatchEvent) {
    if let Some(cb) = &opts.on_event {
        cb(event);
    }
}

fn connector_dropped() -> ClientError {
    ClientError::Core(CoreError::InvalidArgument(
        "completion connector dropped the waiter".into(),
    ))
}
