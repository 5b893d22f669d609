//! Shared data model: manifests, plan items, and task descriptors.
//!
//! These are plain, serde-derived records rather than a dynamic tree —
//! schema defaulting and validation are the manifest validator's job (an
//! external collaborator); this crate only describes the shape a validated
//! manifest takes.

use serde::{Deserialize, Serialize};

use crate::ids::TaskId;

/// Top-level submission manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub metadata: ManifestMetadata,
    pub spec: ManifestSpec,
}

/// Manifest metadata. Only the work id is consumed by this core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManifestMetadata {
    #[serde(rename = "workId", skip_serializing_if = "Option::is_none")]
    pub work_id: Option<String>,
}

/// The task specification: what to run, and how its inputs/outputs are wired.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestSpec {
    /// Queue name the minted task id is published to.
    #[serde(rename = "taskType")]
    pub task_type: String,
    pub executable: String,
    /// Argument vector. Elements are typically strings but may be any JSON
    /// scalar — the templater (`{in}`/`{inN}`) only rewrites string
    /// elements and passes everything else through unchanged.
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
    #[serde(rename = "work_dir", default)]
    pub work_dir: String,
    #[serde(rename = "input_dir", default)]
    pub input_dir: String,
    #[serde(rename = "output_dir", default)]
    pub output_dir: String,
    #[serde(default)]
    pub io: Option<IoSpec>,
}

/// Input/output wiring and batch-expansion configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IoSpec {
    #[serde(default)]
    pub inputs: Vec<InputSpec>,
    #[serde(default)]
    pub output: Option<OutputSpec>,
    #[serde(default)]
    pub batch: Option<BatchSpec>,
}

/// A single declared object-store input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    #[serde(default)]
    pub recursive: Option<bool>,
    #[serde(default)]
    pub include: Option<Vec<String>>,
    #[serde(default)]
    pub exclude: Option<Vec<String>>,
    #[serde(rename = "maxFiles", default)]
    pub max_files: Option<usize>,
}

/// The declared object-store output location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    #[serde(default)]
    pub overwrite: Option<bool>,
    #[serde(default)]
    pub layout: Option<String>,
}

/// How a manifest expands into many tasks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSpec {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub grouping: Option<Grouping>,
    #[serde(rename = "prefixDepth", default)]
    pub prefix_depth: Option<u32>,
    #[serde(rename = "maxPerTask", default)]
    pub max_per_task: Option<usize>,
}

/// Grouping strategy for batch expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grouping {
    Object,
    Prefix,
}

impl Default for Grouping {
    fn default() -> Self {
        Self::Object
    }
}

/// One planner output: a single task's inputs, local basenames, and
/// argument vector. The planner emits these lazily.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanItem {
    pub inputs: Vec<PlanInput>,
    #[serde(rename = "localInputs", default)]
    pub local_inputs: Vec<LocalInput>,
    pub args: Vec<serde_json::Value>,
    pub source: PlanSource,
}

/// A single object-store reference carried by a [`PlanItem`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanInput {
    pub bucket: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default)]
    pub recursive: Option<bool>,
    #[serde(default)]
    pub include: Option<Vec<String>>,
    #[serde(default)]
    pub exclude: Option<Vec<String>>,
}

/// A local, worker-materialized input derived from an object key's basename.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalInput {
    pub name: String,
    #[serde(rename = "workflow_input")]
    pub workflow_input: bool,
}

/// Records which grouping strategy produced a [`PlanItem`], for diagnostics
/// and for test assertions (scenarios B/C in the testable-properties list).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlanSource {
    Single { single: bool },
    Prefix { prefix: String },
    Keys { keys: Vec<String> },
}

/// The JSON payload persisted at `<TaskId>_msg` for a worker to consume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub executable: String,
    pub name: String,
    pub args: Vec<serde_json::Value>,
    pub work_dir: String,
    pub input_dir: String,
    pub output_dir: String,
    /// Local inputs the worker must materialize before running (mirrors the
    /// plan item's `localInputs`).
    pub inputs: Vec<LocalInput>,
    /// Local outputs the worker is expected to produce. The manifest does
    /// not currently describe per-file local outputs (only the aggregate
    /// `io.output` destination), so this is always empty; kept as a field
    /// so a future manifest revision can populate it without breaking the
    /// descriptor shape workers already parse.
    pub outputs: Vec<LocalInput>,
    #[serde(rename = "taskId")]
    pub task_id: TaskId,
    #[serde(rename = "taskType")]
    pub task_type: String,
    pub io: DescriptorIo,
}

/// The `io` section of a [`TaskDescriptor`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptorIo {
    pub inputs: Vec<PlanInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch: Option<BatchSpec>,
}
