//! Work and task identifier minting.
//!
//! Identifiers are plain strings rather than UUIDs so that a `WorkId` can be
//! threaded straight through to the queue payload and key-value keys without
//! a parsing step: `TaskId` embeds its `WorkId` and is recoverable with
//! [`extract_work_id`].

use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

/// A logical batch of tasks. Either user-supplied or minted by [`new_work_id`].
pub type WorkId = String;

/// A single unit of remote computation, of the form `wf:<WorkId>:task:<millis>-<8-hex>`.
pub type TaskId = String;

const WORK_ID_HEX_LEN: usize = 6;
const TASK_ID_HEX_LEN: usize = 8;

/// Return `provided` if non-empty, otherwise mint a fresh work id of the form
/// `<unix-millis>-<6-hex>`.
pub fn new_work_id(provided: Option<&str>) -> WorkId {
    match provided {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => format!("{}-{}", unix_millis(), random_hex(WORK_ID_HEX_LEN)),
    }
}

/// Mint a task id belonging to `work_id`: `wf:<WorkId>:task:<millis>-<8-hex>`.
pub fn new_task_id(work_id: &str) -> TaskId {
    format!(
        "wf:{work_id}:task:{}-{}",
        unix_millis(),
        random_hex(TASK_ID_HEX_LEN)
    )
}

/// Recover the `WorkId` embedded in a `TaskId`, or `None` if it doesn't match
/// the `wf:<id>:task:...` shape.
pub fn extract_work_id(task_id: &str) -> Option<&str> {
    let rest = task_id.strip_prefix("wf:")?;
    let (work_id, tail) = rest.split_once(":task:")?;
    if work_id.is_empty() || tail.is_empty() {
        return None;
    }
    Some(work_id)
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

fn random_hex(len: usize) -> String {
    static CHARSET: OnceLock<[char; 16]> = OnceLock::new();
    let charset = CHARSET.get_or_init(|| {
        [
            '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f',
        ]
    });
    let mut rng = rand::thread_rng();
    (0..len).map(|_| charset[rng.gen_range(0..16)]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn new_work_id_respects_provided_value() {
        assert_eq!(new_work_id(Some("w1")), "w1");
    }

    #[test]
    fn new_work_id_mints_when_absent_or_empty() {
        assert!(!new_work_id(None).is_empty());
        assert!(!new_work_id(Some("")).is_empty());
    }

    #[test]
    fn new_task_id_embeds_work_id() {
        let id = new_task_id("w1");
        assert!(id.starts_with("wf:w1:task:"));
    }

    #[test]
    fn extract_work_id_rejects_malformed_ids() {
        assert_eq!(extract_work_id("not-a-task-id"), None);
        assert_eq!(extract_work_id("wf::task:123"), None);
        assert_eq!(extract_work_id("wf:w1:task:"), None);
    }

    proptest! {
        #[test]
        fn extract_work_id_roundtrips(work_id in "[a-zA-Z0-9_-]{1,40}") {
            let task_id = new_task_id(&work_id);
            prop_assert_eq!(extract_work_id(&task_id), Some(work_id.as_str()));
        }

        #[test]
        fn minted_task_ids_are_unique(work_id in "[a-zA-Z0-9_-]{1,20}") {
            let a = new_task_id(&work_id);
            let b = new_task_id(&work_id);
            prop_assert_ne!(a, b);
        }
    }
}
