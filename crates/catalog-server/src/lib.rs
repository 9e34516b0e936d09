pub mod config;
pub mod error;
pub mod handlers;
pub mod observability;
pub mod query;
pub mod refresh;
pub mod scheduler;
pub mod server;
pub mod upstream;

use std::sync::Arc;
use std::time::Duration;

use catalog_core::CatalogError;
use catalog_storage::{
    BlobSnapshotStore, DynSnapshotStore, KeyedSnapshotStore, MemoryKeyValueStore,
    RedisKeyValueStore, StoreStrategy,
};

pub use config::{AppConfig, KeyedBackend, RedisConfig, ServerConfig, StoreConfig, UpstreamConfig};
pub use error::ApiError;
pub use observability::init_tracing;
pub use query::QueryService;
pub use refresh::{RefreshController, RefreshResult};
pub use scheduler::RefreshScheduler;
pub use server::{AppState, CatalogGatewayServer, ServerBuilder, build_app, build_state};
pub use upstream::{CatalogSource, HttpCatalogSource};

/// Create the snapshot store selected by configuration.
///
/// ## Strategies
///
/// - **blob**: in-process atomic pointer to the verbatim payload
/// - **keyed** + `memory`: one key per record in an in-process map
/// - **keyed** + `redis`: one key per record in Redis
///
/// A missing Redis password is a configuration error. An unreachable Redis is
/// only logged: reads answer 503 and refreshes fail until it comes back.
pub async fn create_snapshot_store(config: &StoreConfig) -> Result<DynSnapshotStore, CatalogError> {
    match (config.strategy, config.keyed_backend) {
        (StoreStrategy::Blob, _) => {
            tracing::info!("Using blob snapshot store");
            Ok(Arc::new(BlobSnapshotStore::new()))
        }
        (StoreStrategy::Keyed, KeyedBackend::Memory) => {
            tracing::info!(prefix = %config.key_prefix, "Using keyed snapshot store (in-process map)");
            Ok(Arc::new(KeyedSnapshotStore::new(
                MemoryKeyValueStore::new(),
                config.key_prefix.clone(),
            )))
        }
        (StoreStrategy::Keyed, KeyedBackend::Redis) => {
            let kv = connect_redis(&config.redis).await?;
            tracing::info!(prefix = %config.key_prefix, "Using keyed snapshot store (Redis)");
            Ok(Arc::new(KeyedSnapshotStore::new(kv, config.key_prefix.clone())))
        }
    }
}

async fn connect_redis(config: &RedisConfig) -> Result<RedisKeyValueStore, CatalogError> {
    let password = config
        .password
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| CatalogError::config("Redis password is required for the keyed strategy"))?;

    let mut url = url::Url::parse(&config.url)
        .map_err(|e| CatalogError::config(format!("invalid Redis URL: {e}")))?;
    url.set_password(Some(password))
        .map_err(|_| CatalogError::config("Redis URL cannot carry a password"))?;

    tracing::info!(url = %config.url, "Connecting to Redis");

    let timeout = Duration::from_millis(config.timeout_ms);
    let mut pool_config = deadpool_redis::PoolConfig::new(config.pool_size);
    pool_config.timeouts.wait = Some(timeout);
    pool_config.timeouts.create = Some(timeout);
    pool_config.timeouts.recycle = Some(timeout);

    let mut redis_config = deadpool_redis::Config::from_url(url.as_str());
    redis_config.pool = Some(pool_config);

    let pool = redis_config
        .create_pool(Some(deadpool_redis::Runtime::Tokio1))
        .map_err(|e| CatalogError::config(format!("failed to create Redis pool: {e}")))?;

    let kv = RedisKeyValueStore::new(pool);
    if kv.is_available().await {
        tracing::info!("Connected to Redis");
    } else {
        tracing::warn!("Redis is not reachable yet; catalog reads will fail until it is");
    }
    Ok(kv)
}
