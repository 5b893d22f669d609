//! The key-value connector's trait seam (§4.7): `taskrelay-completion` and
//! `taskrelay-client` depend on [`KvBackend`], never on `redis` directly.

use async_trait::async_trait;

use crate::error::Result;

/// Thin typed wrapper over the handful of list/set primitives the
/// submission and completion protocols need.
#[async_trait]
pub trait KvBackend: Send + Sync {
    async fn l_push(&self, key: &str, value: &str) -> Result<()>;
    async fn s_add(&self, key: &str, member: &str) -> Result<()>;
    async fn s_rem(&self, key: &str, member: &str) -> Result<()>;
    async fn s_card(&self, key: &str) -> Result<u64>;
    async fn s_members(&self, key: &str) -> Result<Vec<String>>;
    async fn s_rand_member(&self, key: &str) -> Result<Option<String>>;
    async fn del(&self, key: &str) -> Result<()>;

    /// Batch a homogeneous sequence of `sRandMember` calls into a single
    /// pipeline round trip (`redis::Pipeline` in the production binding).
    /// Results are positional: `results[i]` answers `keys[i]`.
    async fn multi_s_rand_member(&self, keys: &[String]) -> Result<Vec<Option<String>>>;

    /// Release the underlying connection. Idempotent.
    async fn close(&self) -> Result<()>;
}
