//! Identifier minting and the shared data model for the taskrelay submission
//! core. See `taskrelay-planner`, `taskrelay-queue`, `taskrelay-kv`,
//! `taskrelay-completion`, and `taskrelay-client` for the connectors and
//! engines built on top of these types.

pub mod error;
pub mod ids;
pub mod model;

pub use error::{CoreError, Result};
pub use ids::{TaskId, WorkId, extract_work_id, new_task_id, new_work_id};
pub use model::{
    BatchSpec, DescriptorIo, Grouping, InputSpec, IoSpec, LocalInput, Manifest, ManifestMetadata,
    ManifestSpec, OutputSpec, PlanInput, PlanItem, PlanSource, TaskDescriptor,
};
