//! Opaque-blob snapshot store.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use catalog_core::{Result, Snapshot};

use crate::traits::{SnapshotStore, StoreStrategy};

/// Keeps the current snapshot behind an atomic pointer.
///
/// `read` is a single atomic load and never blocks, neither on other readers nor
/// on a concurrent `replace`. Readers that loaded the old snapshot keep their
/// `Arc` until they drop it.
#[derive(Default)]
pub struct BlobSnapshotStore {
    current: ArcSwapOption<Snapshot>,
}

impl BlobSnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for BlobSnapshotStore {
    fn strategy(&self) -> StoreStrategy {
        StoreStrategy::Blob
    }

    async fn replace(&self, snapshot: Snapshot) -> Result<()> {
        tracing::debug!(fetched_at = %snapshot.fetched_at(), "blob snapshot replaced");
        self.current.store(Some(Arc::new(snapshot)));
        Ok(())
    }

    async fn read(&self) -> Result<Option<Arc<Snapshot>>> {
        Ok(self.current.load_full())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn snapshot(marker: i64) -> Snapshot {
        let at = OffsetDateTime::from_unix_timestamp(marker).unwrap();
        let payload = format!(r#"[{{"name":"item-{marker}","artc":"{marker}","units":"pcs"}}]"#);
        Snapshot::raw(payload.into_bytes(), at)
    }

    #[tokio::test]
    async fn empty_until_first_replace() {
        let store = BlobSnapshotStore::new();
        assert!(store.read().await.unwrap().is_none());

        store.replace(snapshot(1)).await.unwrap();
        let current = store.read().await.unwrap().unwrap();
        assert_eq!(*current, snapshot(1));
    }

    #[tokio::test]
    async fn last_replace_wins() {
        let store = BlobSnapshotStore::new();
        for marker in 1..=5 {
            store.replace(snapshot(marker)).await.unwrap();
        }
        assert_eq!(*store.read().await.unwrap().unwrap(), snapshot(5));
    }

    #[tokio::test]
    async fn old_readers_keep_their_snapshot() {
        let store = BlobSnapshotStore::new();
        store.replace(snapshot(1)).await.unwrap();
        let held = store.read().await.unwrap().unwrap();

        store.replace(snapshot(2)).await.unwrap();

        assert_eq!(*held, snapshot(1));
        assert_eq!(*store.read().await.unwrap().unwrap(), snapshot(2));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_readers_never_see_torn_snapshots() {
        let store = Arc::new(BlobSnapshotStore::new());

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for marker in 1..=200 {
                    store.replace(snapshot(marker)).await.unwrap();
                    tokio::task::yield_now().await;
                }
            })
        };

        let mut readers = Vec::new();
        for _ in 0..4 {
            let store = store.clone();
            readers.push(tokio::spawn(async move {
                for _ in 0..500 {
                    if let Some(current) = store.read().await.unwrap() {
                        let marker = current.fetched_at().unix_timestamp();
                        assert_eq!(*current, snapshot(marker));
                    }
                    tokio::task::yield_now().await;
                }
            }));
        }

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }
        assert_eq!(*store.read().await.unwrap().unwrap(), snapshot(200));
    }
}
