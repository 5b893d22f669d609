//! Task descriptor construction (C5, §4.5): combines a minted [`TaskId`]
//! with a [`PlanItem`] and the owning manifest's spec to produce the JSON
//! payload workers consume.

use taskrelay_core::{DescriptorIo, ManifestSpec, PlanItem, TaskDescriptor, TaskId};

/// Build the descriptor persisted at `<TaskId>_msg` for one plan item.
///
/// Per-file local outputs are not described by the manifest today (only the
/// aggregate `io.output` destination is), so `outputs` is always empty.
pub fn build_descriptor(task_id: TaskId, spec: &ManifestSpec, item: &PlanItem) -> TaskDescriptor {
    TaskDescriptor {
        executable: spec.executable.clone(),
        name: spec.task_type.clone(),
        args: item.args.clone(),
        work_dir: spec.work_dir.clone(),
        input_dir: spec.input_dir.clone(),
        output_dir: spec.output_dir.clone(),
        inputs: item.local_inputs.clone(),
        outputs: Vec::new(),
        task_id,
        task_type: spec.task_type.clone(),
        io: DescriptorIo {
            inputs: item.inputs.clone(),
            output: spec.io.as_ref().and_then(|io| io.output.clone()),
            batch: spec.io.as_ref().and_then(|io| io.batch.clone()),
        },
    }
}
