//! Integration tests exercising `Client` against the in-memory queue, kv,
//! and object-store fakes: submission, batch planning, rollback on publish
//! failure, and the wait/watch engine.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use taskrelay_client::{BatchOptions, Client, WaitState};
use taskrelay_core::{BatchSpec, Grouping, InputSpec, IoSpec, Manifest, ManifestMetadata, ManifestSpec};
use taskrelay_kv::{FakeKv, KvBackend};
use taskrelay_planner::{InMemoryStore, Lister, ObjectStore};
use taskrelay_queue::{FakeQueue, QueueTransport};

fn manifest(work_id: Option<&str>, io: Option<IoSpec>) -> Manifest {
    Manifest {
        metadata: ManifestMetadata {
            work_id: work_id.map(str::to_string),
        },
        spec: ManifestSpec {
            task_type: "render".to_string(),
            executable: "/bin/render".to_string(),
            args: vec![json!("{in}")],
            work_dir: "/work".to_string(),
            input_dir: "/in".to_string(),
            output_dir: "/out".to_string(),
            io,
        },
    }
}

fn client(store: Vec<&str>, page_size: usize) -> (Arc<Client>, Arc<FakeQueue>, Arc<FakeKv>) {
    let objects: Arc<dyn ObjectStore> = Arc::new(InMemoryStore::new(store, page_size));
    let lister = Arc::new(Lister::new(objects));
    let queue = Arc::new(FakeQueue::new());
    let kv = Arc::new(FakeKv::new());
    queue.declare("render");

    let client = Client::new(
        queue.clone() as Arc<dyn QueueTransport>,
        kv.clone() as Arc<dyn KvBackend>,
        lister,
        Duration::from_millis(20),
        None,
    );
    (client, queue, kv)
}

// ═══════════════════════════════════════════════════════════════════════
//  Scenario A: single submission bypasses the planner entirely
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn single_submission_writes_descriptor_and_publishes() {
    let (client, queue, kv) = client(vec![], 10);
    let manifest = manifest(Some("w1"), None);

    let result = client.create_single(&manifest).await.unwrap();
    assert!(result.task_id.starts_with("wf:w1:task:"));

    let msg_key = format!("{}_msg", result.task_id);
    let descriptor = kv.list_head(&msg_key).expect("descriptor was not written");
    assert!(descriptor.contains("\"taskType\":\"render\""));

    assert!(kv.set_contains("work:w1:tasks", &result.task_id));
    assert_eq!(queue.messages("render"), vec![result.task_id.as_bytes().to_vec()]);
}

#[tokio::test]
async fn single_submission_requires_a_work_id() {
    let (client, _queue, _kv) = client(vec![], 10);
    let manifest = manifest(None, None);
    assert!(client.create_single(&manifest).await.is_err());
}

// ═══════════════════════════════════════════════════════════════════════
//  Scenario B: object-grouped batch, packed by maxPerTask
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn object_grouped_batch_packs_keys_and_submits_each_task() {
    let keys = vec![
        "frames/a.png",
        "frames/b.png",
        "frames/c.png",
        "frames/d.png",
        "frames/e.png",
    ];
    let (client, queue, kv) = client(keys, 10);

    let io = IoSpec {
        inputs: vec![InputSpec {
            kind: "s3".to_string(),
            url: "s3://bucket/frames/".to_string(),
            recursive: Some(true),
            include: None,
            exclude: None,
            max_files: None,
        }],
        output: None,
        batch: Some(BatchSpec {
            enabled: Some(true),
            grouping: Some(Grouping::Object),
            prefix_depth: None,
            max_per_task: Some(2),
        }),
    };
    let manifest = manifest(Some("w2"), Some(io));

    let result = client.create_batch(&manifest, BatchOptions::default()).await.unwrap();

    // 5 objects packed two at a time -> 3 tasks (2, 2, 1).
    assert_eq!(result.tasks.len(), 3);
    assert!(result.tasks.iter().all(|t| t.error.is_none()));
    assert_eq!(queue.messages("render").len(), 3);
    for task in &result.tasks {
        assert!(kv.set_contains("work:w2:tasks", &task.task_id));
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Scenario C: prefix-grouped batch, one task per immediate child prefix
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn prefix_grouped_batch_yields_one_task_per_child_prefix() {
    let keys = vec![
        "runs/job-1/input.dat",
        "runs/job-2/input.dat",
        "runs/job-3/input.dat",
    ];
    let (client, queue, _kv) = client(keys, 10);

    let io = IoSpec {
        inputs: vec![InputSpec {
            kind: "s3".to_string(),
            url: "s3://bucket/runs/".to_string(),
            recursive: None,
            include: None,
            exclude: None,
            max_files: None,
        }],
        output: None,
        batch: Some(BatchSpec {
            enabled: Some(true),
            grouping: Some(Grouping::Prefix),
            prefix_depth: Some(1),
            max_per_task: None,
        }),
    };
    let manifest = manifest(Some("w3"), Some(io));

    let result = client.create_batch(&manifest, BatchOptions::default()).await.unwrap();
    assert_eq!(result.tasks.len(), 3);
    assert_eq!(queue.messages("render").len(), 3);
}

// ═══════════════════════════════════════════════════════════════════════
//  Scenario D: a publish failure rolls back the message and work-set entry
// ═══════════════════════════════════════════════════════════════════════

struct AlwaysFailsPublish;

#[async_trait]
impl QueueTransport for AlwaysFailsPublish {
    async fn check_queue(&self, _name: &str) -> taskrelay_queue::Result<bool> {
        Ok(true)
    }

    async fn publish(&self, _name: &str, _payload: &[u8]) -> taskrelay_queue::Result<()> {
        Ok(())
    }

    async fn publish_burst(&self, _name: &str, _payload: &[u8]) -> taskrelay_queue::Result<()> {
        Err(taskrelay_queue::QueueError::Transport("simulated broker outage".into()))
    }

    async fn close(&self) -> taskrelay_queue::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn failed_publish_rolls_back_the_descriptor_and_work_set_entry() {
    let objects: Arc<dyn ObjectStore> = Arc::new(InMemoryStore::new(vec!["frames/a.png"], 10));
    let lister = Arc::new(Lister::new(objects));
    let kv = Arc::new(FakeKv::new());

    let client = Client::new(
        Arc::new(AlwaysFailsPublish) as Arc<dyn QueueTransport>,
        kv.clone() as Arc<dyn KvBackend>,
        lister,
        Duration::from_millis(20),
        None,
    );

    let io = IoSpec {
        inputs: vec![InputSpec {
            kind: "s3".to_string(),
            url: "s3://bucket/frames/".to_string(),
            recursive: Some(true),
            include: None,
            exclude: None,
            max_files: None,
        }],
        output: None,
        batch: Some(BatchSpec {
            enabled: Some(true),
            grouping: Some(Grouping::Object),
            prefix_depth: None,
            max_per_task: Some(1),
        }),
    };
    let manifest = manifest(Some("w4"), Some(io));

    let result = client.create_batch(&manifest, BatchOptions::default()).await.unwrap();
    assert_eq!(result.tasks.len(), 1);
    let task = &result.tasks[0];
    assert!(task.error.is_some());

    assert!(!kv.set_contains("work:w4:tasks", &task.task_id));
    assert_eq!(kv.list_head(&format!("{}_msg", task.task_id)), None);
}

#[tokio::test]
async fn stop_on_error_aborts_the_batch_on_first_failure() {
    let objects: Arc<dyn ObjectStore> =
        Arc::new(InMemoryStore::new(vec!["frames/a.png", "frames/b.png"], 10));
    let lister = Arc::new(Lister::new(objects));
    let kv = Arc::new(FakeKv::new());

    let client = Client::new(
        Arc::new(AlwaysFailsPublish) as Arc<dyn QueueTransport>,
        kv as Arc<dyn KvBackend>,
        lister,
        Duration::from_millis(20),
        None,
    );

    let io = IoSpec {
        inputs: vec![InputSpec {
            kind: "s3".to_string(),
            url: "s3://bucket/frames/".to_string(),
            recursive: Some(true),
            include: None,
            exclude: None,
            max_files: None,
        }],
        output: None,
        batch: Some(BatchSpec {
            enabled: Some(true),
            grouping: Some(Grouping::Object),
            prefix_depth: None,
            max_per_task: Some(1),
        }),
    };
    let manifest = manifest(Some("w5"), Some(io));

    let err = client
        .create_batch(&manifest, BatchOptions { rate_per_sec: None, stop_on_error: true })
        .await
        .unwrap_err();
    assert!(matches!(err, taskrelay_client::ClientError::Queue(_)));
}

// ═══════════════════════════════════════════════════════════════════════
//  Scenario E: waitForTask's fast path short-circuits the completion loop
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn wait_for_task_returns_immediately_when_already_complete() {
    let (client, _queue, kv) = client(vec![], 10);
    let task_id = "wf:w6:task:1-aaaaaaaa";
    kv.s_add(task_id, "0").await.unwrap();

    let outcome = client.wait_for_task(task_id, Some(5)).await.unwrap();
    assert_eq!(outcome.state, WaitState::Done);
    assert_eq!(outcome.code, Some(0));
}

#[tokio::test]
async fn wait_for_task_times_out_when_never_completed() {
    let (client, _queue, _kv) = client(vec![], 10);
    let task_id = "wf:w7:task:1-bbbbbbbb";

    let outcome = client.wait_for_task(task_id, Some(1)).await.unwrap();
    assert_eq!(outcome.state, WaitState::Timeout);
    assert_eq!(outcome.code, None);
}

// ═══════════════════════════════════════════════════════════════════════
//  Scenario F: watchWork reports idle once no task completes for a while
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn watch_work_goes_idle_when_a_task_never_completes() {
    let (client, _queue, kv) = client(vec![], 10);
    kv.s_add("work:w8:tasks", "wf:w8:task:1-cccccccc").await.unwrap();
    kv.s_add("work:w8:tasks", "wf:w8:task:1-dddddddd").await.unwrap();
    kv.s_add("wf:w8:task:1-cccccccc", "0").await.unwrap();

    let outcome = client
        .watch_work(
            "w8",
            taskrelay_client::WatchOptions {
                idle_sec: Some(1),
                poll_ms: Some(50),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(outcome.state, WaitState::Idle);
    assert_eq!(outcome.total, 2);
    assert_eq!(outcome.results.len(), 1);
}

// ═══════════════════════════════════════════════════════════════════════
//  Scenario G: waitForMany's failFast cancels the remaining waiters
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn wait_for_many_fail_fast_cancels_remaining_waiters() {
    let (client, _queue, kv) = client(vec![], 10);
    let failing = "wf:w9:task:1-aaaaaaaa".to_string();
    let survivor = "wf:w9:task:1-bbbbbbbb".to_string();
    let task_ids = vec![failing.clone(), survivor.clone()];

    let waiter = {
        let client = client.clone();
        let task_ids = task_ids.clone();
        tokio::spawn(async move { client.wait_for_many(&task_ids, None, true).await })
    };

    // Give wait_for_many time to register its resolvers before the failing
    // task completes, so the failure is observed through the completion
    // loop rather than the initial fast-peek, which bypasses failFast
    // entirely for tasks that are already done.
    tokio::time::sleep(Duration::from_millis(50)).await;

    kv.s_add(&failing, "1").await.unwrap();
    kv.s_add("wf:w9:tasksPendingCompletionHandling", &failing).await.unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(2), waiter)
        .await
        .expect("wait_for_many timed out")
        .expect("task panicked")
        .unwrap();

    assert_eq!(outcome.state, WaitState::Failed);
    assert_eq!(outcome.done, vec![(failing.clone(), 1)]);
    assert_eq!(outcome.pending, vec![survivor.clone()]);

    // The cancelled waiter's resolver must actually have been removed, not
    // merely forgotten about: a fresh wait on the same task id should time
    // out cleanly instead of failing on duplicate registration.
    let retry = client.wait_for_task(&survivor, Some(1)).await.unwrap();
    assert_eq!(retry.state, WaitState::Timeout);
}
