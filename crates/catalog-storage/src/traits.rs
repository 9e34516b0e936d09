//! Storage traits for the catalog snapshot.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use catalog_core::{Result, Snapshot};
use serde::{Deserialize, Serialize};

/// How a store keeps the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreStrategy {
    /// The upstream payload is kept verbatim as one immutable value.
    #[default]
    Blob,
    /// Each record is decoded and stored under its own key.
    Keyed,
}

impl StoreStrategy {
    /// Whether the refresh path must decode the payload before replacing.
    pub fn wants_records(self) -> bool {
        matches!(self, Self::Keyed)
    }
}

impl fmt::Display for StoreStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blob => write!(f, "blob"),
            Self::Keyed => write!(f, "keyed"),
        }
    }
}

/// Holder of the single current catalog snapshot.
///
/// Implementations must be safe under arbitrary concurrent `read` and `replace`
/// calls. A reader sees either the previous snapshot or the new one, never a
/// partially written one. When replaces overlap, the last one to complete wins.
///
/// # Example
///
/// ```ignore
/// use catalog_storage::{BlobSnapshotStore, SnapshotStore};
///
/// async fn serve(store: &dyn SnapshotStore) -> catalog_core::Result<Vec<u8>> {
///     let snapshot = store.read().await?.ok_or(catalog_core::CatalogError::Unavailable)?;
///     Ok(snapshot.payload()?.into_owned())
/// }
/// ```
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    fn strategy(&self) -> StoreStrategy;

    /// Atomically install `snapshot` as the current one.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Decode` if the snapshot cannot be decomposed into
    /// records and `CatalogError::BackingStore` if the external store fails. On
    /// error the previously current snapshot stays visible.
    async fn replace(&self, snapshot: Snapshot) -> Result<()>;

    /// The current snapshot, or `None` if no replace has ever succeeded.
    ///
    /// # Errors
    ///
    /// Returns an error only for backing-store or decode failures; the empty
    /// state is `Ok(None)`.
    async fn read(&self) -> Result<Option<Arc<Snapshot>>>;
}

/// Minimal external key-value service used by the keyed strategy.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Delete the given keys. Missing keys are ignored.
    async fn delete(&self, keys: &[String]) -> Result<()>;

    /// All keys starting with `prefix`, in no particular order.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}
