//! Refresh orchestration: fetch, decode if the store needs records, replace.

use std::sync::Arc;
use std::time::Instant;

use catalog_core::{CatalogError, Snapshot, decode_records, now_utc};
use catalog_storage::DynSnapshotStore;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::upstream::CatalogSource;

/// `Ok(fetched_at)` on success, the reason otherwise.
pub type RefreshResult = Result<OffsetDateTime, CatalogError>;

/// Commits fresh upstream data to the snapshot store.
///
/// Refreshes are single-flight: a caller arriving while another refresh runs
/// waits for it to finish and then performs its own. A failed refresh never
/// touches the store, so the previous snapshot keeps being served.
pub struct RefreshController {
    source: Arc<dyn CatalogSource>,
    store: DynSnapshotStore,
    in_flight: Mutex<()>,
}

impl RefreshController {
    pub fn new(source: Arc<dyn CatalogSource>, store: DynSnapshotStore) -> Self {
        Self {
            source,
            store,
            in_flight: Mutex::new(()),
        }
    }

    #[instrument(skip(self), fields(strategy = %self.store.strategy()))]
    pub async fn refresh(&self) -> RefreshResult {
        let _guard = self.in_flight.lock().await;
        let started = Instant::now();

        match self.fetch_and_replace().await {
            Ok(fetched_at) => {
                info!(
                    fetched_at = %fetched_at,
                    elapsed_ms = %started.elapsed().as_millis(),
                    "catalog refreshed"
                );
                Ok(fetched_at)
            }
            Err(e) => {
                warn!(
                    category = %e.category(),
                    error = %e,
                    elapsed_ms = %started.elapsed().as_millis(),
                    "catalog refresh failed, keeping previous snapshot"
                );
                Err(e)
            }
        }
    }

    /// Best-effort refresh before the server starts accepting requests.
    pub async fn refresh_on_startup(&self) {
        if self.refresh().await.is_err() {
            warn!("initial catalog refresh failed, serving without data until the next refresh");
        }
    }

    /// Whether a refresh is currently running.
    pub fn is_refreshing(&self) -> bool {
        self.in_flight.try_lock().is_err()
    }

    async fn fetch_and_replace(&self) -> RefreshResult {
        let payload = self.source.fetch().await?;
        let fetched_at = now_utc();

        let snapshot = if self.store.strategy().wants_records() {
            Snapshot::from_records(decode_records(&payload)?, fetched_at)
        } else {
            Snapshot::raw(payload, fetched_at)
        };

        self.store.replace(snapshot).await?;
        Ok(fetched_at)
    }
}
