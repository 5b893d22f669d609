//! Object-store lister, argument templater, batch planner, and descriptor
//! builder: everything needed to expand a manifest into the task
//! descriptors the submission engine publishes.

pub mod descriptor;
pub mod error;
pub mod objectstore;
pub mod plan;
pub mod template;
pub mod url;

pub use descriptor::build_descriptor;
pub use error::{ObjectStoreError, PlannerError, Result};
pub use objectstore::{Lister, ListedItem, ObjectPage, ObjectStore, ObjectSummary, S3Config, S3ObjectStore};
pub use plan::plan;
pub use template::template_args;
pub use url::{ObjectLocation, parse_s3_url};

#[cfg(any(test, feature = "test-util"))]
pub use objectstore::fake::InMemoryStore;
