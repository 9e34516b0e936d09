//! Redis key-value backend.

use async_trait::async_trait;
use catalog_core::{CatalogError, Result};
use deadpool_redis::{Connection, Pool};
use redis::AsyncCommands;

use crate::traits::KeyValueStore;

/// Key-value store backed by a Redis connection pool.
///
/// Listing uses `SCAN MATCH` rather than `KEYS` so a large catalog does not block
/// the Redis server.
#[derive(Clone)]
pub struct RedisKeyValueStore {
    pool: Pool,
}

impl RedisKeyValueStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Check that a connection can be obtained (for start-up and readiness logs).
    pub async fn is_available(&self) -> bool {
        self.pool.get().await.is_ok()
    }

    async fn connection(&self) -> Result<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| CatalogError::backing_store(format!("failed to get Redis connection: {e}")))
    }
}

#[async_trait]
impl KeyValueStore for RedisKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.connection().await?;
        conn.get::<_, Option<Vec<u8>>>(key)
            .await
            .map_err(|e| CatalogError::backing_store(format!("Redis GET {key} failed: {e}")))
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut conn = self.connection().await?;
        conn.set::<_, _, ()>(key, value)
            .await
            .map_err(|e| CatalogError::backing_store(format!("Redis SET {key} failed: {e}")))
    }

    async fn delete(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(keys)
            .await
            .map_err(|e| CatalogError::backing_store(format!("Redis DEL failed: {e}")))
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut conn = self.connection().await?;
        let pattern = format!("{}*", escape_glob(prefix));
        let mut keys = Vec::new();
        {
            let mut iter = conn
                .scan_match::<_, String>(&pattern)
                .await
                .map_err(|e| CatalogError::backing_store(format!("Redis SCAN failed: {e}")))?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

/// Escape Redis glob metacharacters so `prefix` matches literally.
fn escape_glob(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\' | '^') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
