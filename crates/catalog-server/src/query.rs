use std::sync::Arc;

use catalog_core::{CatalogError, Snapshot};
use catalog_storage::{DynSnapshotStore, StoreStrategy};

/// Read side of the gateway. Never triggers a refresh.
#[derive(Clone)]
pub struct QueryService {
    store: DynSnapshotStore,
}

impl QueryService {
    pub fn new(store: DynSnapshotStore) -> Self {
        Self { store }
    }

    pub fn strategy(&self) -> StoreStrategy {
        self.store.strategy()
    }

    /// The current snapshot, or `CatalogError::Unavailable` before the first
    /// successful refresh.
    pub async fn current_snapshot(&self) -> Result<Arc<Snapshot>, CatalogError> {
        self.store.read().await?.ok_or(CatalogError::Unavailable)
    }

    /// JSON body for clients: verbatim for the blob strategy, re-serialized
    /// records for the keyed strategy.
    pub async fn current_payload(&self) -> Result<Vec<u8>, CatalogError> {
        let snapshot = self.current_snapshot().await?;
        Ok(snapshot.payload()?.into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_storage::{BlobSnapshotStore, KeyedSnapshotStore, MemoryKeyValueStore};
    use time::macros::datetime;

    #[tokio::test]
    async fn unavailable_before_first_snapshot() {
        let query = QueryService::new(Arc::new(BlobSnapshotStore::new()));
        assert!(matches!(
            query.current_snapshot().await,
            Err(CatalogError::Unavailable)
        ));
        assert!(query.current_payload().await.unwrap_err().is_unavailable());
    }

    #[tokio::test]
    async fn blob_payload_is_verbatim() {
        let store: DynSnapshotStore = Arc::new(BlobSnapshotStore::new());
        // Whitespace and key order survive untouched.
        let raw = b"[ {\"units\":\"pcs\", \"name\":\"Widget\", \"artc\":\"A1\"} ]".to_vec();
        store
            .replace(Snapshot::raw(raw.clone(), datetime!(2024-01-01 0:00 UTC)))
            .await
            .unwrap();

        let query = QueryService::new(store);
        assert_eq!(query.current_payload().await.unwrap(), raw);
        assert_eq!(query.strategy(), StoreStrategy::Blob);
    }

    #[tokio::test]
    async fn keyed_payload_is_reserialized() {
        let store: DynSnapshotStore =
            Arc::new(KeyedSnapshotStore::new(MemoryKeyValueStore::new(), "catalog"));
        store
            .replace(Snapshot::raw(
                b"[ {\"units\":\"pcs\", \"name\":\"Widget\", \"artc\":\"A1\"} ]".to_vec(),
                datetime!(2024-01-01 0:00 UTC),
            ))
            .await
            .unwrap();

        let query = QueryService::new(store);
        assert_eq!(
            query.current_payload().await.unwrap(),
            br#"[{"name":"Widget","artc":"A1","units":"pcs"}]"#.to_vec()
        );
    }
}
