//! Batch planner (C4, §4.4): expands a manifest into a lazy sequence of
//! [`PlanItem`]s.

use std::sync::Arc;

use async_stream::try_stream;
use futures::{Stream, StreamExt};
use taskrelay_core::{CoreError, Grouping, LocalInput, ManifestSpec, PlanInput, PlanItem, PlanSource};

use crate::error::PlannerError;
use crate::objectstore::{Lister, ListedItem};
use crate::template::template_args;
use crate::url::{ObjectLocation, parse_s3_url};

const DEFAULT_PREFIX_DEPTH: u32 = 1;
const DEFAULT_MAX_PER_TASK: usize = 1;

/// Produce the lazy sequence of [`PlanItem`]s described by `spec`.
///
/// When `io.batch.enabled` is false or absent, the stream yields exactly one
/// single-mode item and terminates — the object store is never consulted.
pub fn plan<'a>(
    lister: Arc<Lister>,
    spec: &'a ManifestSpec,
) -> impl Stream<Item = Result<PlanItem, PlannerError>> + 'a {
    try_stream! {
        let batch = spec.io.as_ref().and_then(|io| io.batch.as_ref());
        let enabled = batch.and_then(|b| b.enabled).unwrap_or(false);

        if !enabled {
            yield PlanItem {
                inputs: spec
                    .io
                    .as_ref()
                    .map(|io| io.inputs.iter().map(to_plan_input).collect())
                    .unwrap_or_default(),
                local_inputs: Vec::new(),
                args: spec.args.clone(),
                source: PlanSource::Single { single: true },
            };
            return;
        }

        let io = spec.io.as_ref().ok_or(PlannerError::Core(CoreError::BatchNoInputs))?;
        let base = io.inputs.first().ok_or(PlannerError::Core(CoreError::BatchNoInputs))?;
        let location = parse_s3_url(&base.url)?;

        let grouping = batch.and_then(|b| b.grouping).unwrap_or_default();
        let prefix_depth = batch.and_then(|b| b.prefix_depth).unwrap_or(DEFAULT_PREFIX_DEPTH);
        let max_per_task = batch
            .and_then(|b| b.max_per_task)
            .unwrap_or(DEFAULT_MAX_PER_TASK)
            .max(1);

        match grouping {
            Grouping::Prefix => {
                let base_prefix = match &location {
                    ObjectLocation::Prefix { prefix, .. } => prefix.clone(),
                    ObjectLocation::Key { key, .. } => key.clone(),
                };
                let children = lister
                    .list_prefixes_at_depth(location.bucket(), &base_prefix, prefix_depth)
                    .await?;

                for child in children {
                    yield PlanItem {
                        inputs: vec![PlanInput {
                            bucket: location.bucket().to_string(),
                            prefix: Some(child.clone()),
                            key: None,
                            recursive: Some(true),
                            include: base.include.clone(),
                            exclude: base.exclude.clone(),
                        }],
                        local_inputs: Vec::new(),
                        args: spec.args.clone(),
                        source: PlanSource::Prefix { prefix: child },
                    };
                }
            }
            Grouping::Object => {
                let (bucket, list_prefix) = match &location {
                    ObjectLocation::Prefix { bucket, prefix } => (bucket.clone(), prefix.clone()),
                    ObjectLocation::Key { bucket, key } => (bucket.clone(), key.clone()),
                };
                let recursive = base.recursive != Some(false);

                let objects = lister.stream_objects(
                    bucket.clone(),
                    list_prefix,
                    recursive,
                    base.include.clone().unwrap_or_default(),
                    base.exclude.clone().unwrap_or_default(),
                    base.max_files,
                );
                futures::pin_mut!(objects);

                let mut pack_keys: Vec<String> = Vec::new();
                while let Some(item) = objects.next().await {
                    match item? {
                        ListedItem::CommonPrefixes(_) => continue,
                        ListedItem::Object(object) => {
                            pack_keys.push(object.key);
                            if pack_keys.len() == max_per_task {
                                yield build_object_pack(&bucket, std::mem::take(&mut pack_keys), spec);
                            }
                        }
                    }
                }
                if !pack_keys.is_empty() {
                    yield build_object_pack(&bucket, pack_keys, spec);
                }
            }
        }
    }
}

fn build_object_pack(bucket: &str, keys: Vec<String>, spec: &ManifestSpec) -> PlanItem {
    let basenames: Vec<String> = keys.iter().map(|k| basename(k).to_string()).collect();
    let inputs = keys
        .iter()
        .map(|key| PlanInput {
            bucket: bucket.to_string(),
            prefix: None,
            key: Some(key.clone()),
            recursive: None,
            include: None,
            exclude: None,
        })
        .collect();
    let local_inputs = basenames
        .iter()
        .map(|name| LocalInput {
            name: name.clone(),
            workflow_input: true,
        })
        .collect();
    let args = template_args(&spec.args, &basenames);

    PlanItem {
        inputs,
        local_inputs,
        args,
        source: PlanSource::Keys { keys },
    }
}

fn to_plan_input(input: &taskrelay_core::InputSpec) -> PlanInput {
    let location = parse_s3_url(&input.url).ok();
    let (bucket, prefix, key) = match location {
        Some(ObjectLocation::Prefix { bucket, prefix }) => (bucket, Some(prefix), None),
        Some(ObjectLocation::Key { bucket, key }) => (bucket, None, Some(key)),
        None => (String::new(), None, None),
    };
    PlanInput {
        bucket,
        prefix,
        key,
        recursive: input.recursive,
        include: input.include.clone(),
        exclude: input.exclude.clone(),
    }
}

fn basename(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}
