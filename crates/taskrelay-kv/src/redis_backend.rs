//! Production [`KvBackend`] over Redis, via the `redis` crate's async
//! multiplexed connection (§10.3).

use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::backend::KvBackend;
use crate::error::{KvError, Result};

pub struct RedisKv {
    conn: ConnectionManager,
}

impl RedisKv {
    /// Open a multiplexed connection to `redis_url` (e.g. `redis://127.0.0.1:6379`).
    /// The connection manager reconnects transparently on drop; callers never
    /// see a disconnected handle.
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).map_err(|e| KvError::Operation {
            key: String::new(),
            reason: e.to_string(),
        })?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| KvError::Operation {
                key: String::new(),
                reason: e.to_string(),
            })?;
        Ok(Self { conn })
    }

    fn op_err(key: &str, e: redis::RedisError) -> KvError {
        KvError::Operation {
            key: key.to_string(),
            reason: e.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl KvBackend for RedisKv {
    async fn l_push(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.lpush::<_, _, ()>(key, value)
            .await
            .map_err(|e| Self::op_err(key, e))
    }

    async fn s_add(&self, key: &str, member: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.sadd::<_, _, ()>(key, member)
            .await
            .map_err(|e| Self::op_err(key, e))
    }

    async fn s_rem(&self, key: &str, member: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.srem::<_, _, ()>(key, member)
            .await
            .map_err(|e| Self::op_err(key, e))
    }

    async fn s_card(&self, key: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        conn.scard(key).await.map_err(|e| Self::op_err(key, e))
    }

    async fn s_members(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        conn.smembers(key).await.map_err(|e| Self::op_err(key, e))
    }

    async fn s_rand_member(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        conn.srandmember(key).await.map_err(|e| Self::op_err(key, e))
    }

    async fn del(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await.map_err(|e| Self::op_err(key, e))
    }

    async fn multi_s_rand_member(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        for key in keys {
            pipe.srandmember(key);
        }
        pipe.query_async(&mut conn)
            .await
            .map_err(|e| KvError::Operation {
                key: "multi_s_rand_member".into(),
                reason: e.to_string(),
            })
    }

    /// `ConnectionManager` has no explicit shutdown hook; it drops its
    /// multiplexed connection when the last clone goes out of scope.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
