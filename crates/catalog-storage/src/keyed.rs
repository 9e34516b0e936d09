//! Keyed snapshot store.
//!
//! Each record is stored under its own key in an external key-value service.
//! Records of one snapshot share a *generation* namespace, and a single pointer
//! key names the current generation:
//!
//! ```text
//! {prefix}:current                          -> {"generation": g2, "fetchedAt": ..., "count": N}
//! {prefix}:gen:{g2}:record:{name}           -> {"position": i, "name": ..., "artc": ..., "units": ...}
//! {prefix}:gen:{g1}:record:{name}           -> previous generation, kept for in-flight readers
//! ```
//!
//! ## Consistency
//!
//! `replace` writes every record of a fresh generation first and switches the
//! pointer last. The pointer write is the only point at which the new snapshot
//! becomes visible, so a failure while writing records leaves the previous
//! snapshot current and intact. A pointer write that reports an error is checked
//! by re-reading the pointer before the new generation is discarded. Generations
//! older than the one being superseded are purged best-effort after the switch.
//!
//! `read` resolves the pointer once and reads only that generation. A key that
//! vanishes mid-read, a record count that disagrees with the pointer, or a record
//! that fails to decode fails the whole read. A partial snapshot is never
//! returned.
//!
//! Generations are immutable, so the last decoded snapshot is memoized by
//! generation id and a read whose pointer still names it costs one round trip.

use std::collections::BTreeSet;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use catalog_core::{CatalogError, Record, Result, Snapshot};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::traits::{KeyValueStore, SnapshotStore, StoreStrategy};

const POINTER_SUFFIX: &str = "current";
const GENERATION_SEGMENT: &str = "gen";
const RECORD_SEGMENT: &str = "record";

/// Value of the pointer key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerationPointer {
    generation: String,
    #[serde(with = "time::serde::rfc3339")]
    fetched_at: OffsetDateTime,
    count: usize,
}

/// Value of a record key. `position` preserves the upstream order.
#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    position: usize,
    #[serde(flatten)]
    record: Record,
}

struct Memo {
    generation: String,
    snapshot: Arc<Snapshot>,
}

pub struct KeyedSnapshotStore<K> {
    kv: K,
    prefix: String,
    memo: ArcSwapOption<Memo>,
}

impl<K: KeyValueStore> KeyedSnapshotStore<K> {
    /// Create a store writing under `prefix` (e.g. `catalog`).
    pub fn new(kv: K, prefix: impl Into<String>) -> Self {
        Self {
            kv,
            prefix: prefix.into(),
            memo: ArcSwapOption::empty(),
        }
    }

    fn pointer_key(&self) -> String {
        format!("{}:{POINTER_SUFFIX}", self.prefix)
    }

    fn generations_prefix(&self) -> String {
        format!("{}:{GENERATION_SEGMENT}:", self.prefix)
    }

    fn records_prefix(&self, generation: &str) -> String {
        format!(
            "{}:{GENERATION_SEGMENT}:{generation}:{RECORD_SEGMENT}:",
            self.prefix
        )
    }

    fn record_key(&self, generation: &str, name: &str) -> String {
        format!("{}{name}", self.records_prefix(generation))
    }

    /// Extract the generation id from a record key.
    fn generation_of<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(&self.generations_prefix())?
            .split_once(':')
            .map(|(generation, _)| generation)
    }

    async fn load_pointer(&self) -> Result<Option<GenerationPointer>> {
        let Some(raw) = self.kv.get(&self.pointer_key()).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|e| CatalogError::decode(format!("malformed generation pointer: {e}")))
    }

    async fn write_generation(&self, generation: &str, records: &[Record]) -> Result<()> {
        for (position, record) in records.iter().enumerate() {
            let value = serde_json::to_vec(&StoredRecord {
                position,
                record: record.clone(),
            })
            .map_err(|e| CatalogError::decode(format!("failed to encode record: {e}")))?;
            self.kv
                .set(&self.record_key(generation, record.key()), &value)
                .await?;
        }
        Ok(())
    }

    /// Best-effort removal of a generation that never became current.
    async fn discard_generation(&self, generation: &str) {
        let result = match self.kv.list_keys(&self.records_prefix(generation)).await {
            Ok(keys) => self.kv.delete(&keys).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::warn!(generation, error = %e, "failed to discard incomplete generation");
        }
    }

    /// Best-effort removal of generations older than `superseded`.
    ///
    /// Generation ids are UUIDv7 strings, which sort by creation time. Only
    /// generations strictly older than the one just superseded are removed, so a
    /// concurrent replace never loses the generation it is about to publish and
    /// readers still holding the superseded pointer can finish.
    async fn purge_older_than(&self, superseded: &str) {
        let keys = match self.kv.list_keys(&self.generations_prefix()).await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(error = %e, "failed to list generations for purge");
                return;
            }
        };

        let stale: Vec<String> = keys
            .into_iter()
            .filter(|key| {
                self.generation_of(key)
                    .is_some_and(|generation| generation < superseded)
            })
            .collect();
        if stale.is_empty() {
            return;
        }

        let generations: BTreeSet<&str> =
            stale.iter().filter_map(|key| self.generation_of(key)).collect();
        match self.kv.delete(&stale).await {
            Ok(()) => tracing::debug!(
                generations = generations.len(),
                keys = stale.len(),
                "purged stale generations"
            ),
            Err(e) => tracing::warn!(error = %e, "failed to purge stale generations"),
        }
    }

    async fn read_generation(&self, pointer: &GenerationPointer) -> Result<Snapshot> {
        let generation = &pointer.generation;
        let keys = self.kv.list_keys(&self.records_prefix(generation)).await?;
        if keys.len() != pointer.count {
            return Err(CatalogError::backing_store(format!(
                "generation {generation} is incomplete: expected {} records, found {}",
                pointer.count,
                keys.len()
            )));
        }

        let mut stored = Vec::with_capacity(keys.len());
        for key in &keys {
            let raw = self.kv.get(key).await?.ok_or_else(|| {
                CatalogError::backing_store(format!(
                    "record key {key} disappeared while reading generation {generation}"
                ))
            })?;
            let record: StoredRecord = serde_json::from_slice(&raw)
                .map_err(|e| CatalogError::decode(format!("malformed record at {key}: {e}")))?;
            stored.push(record);
        }
        stored.sort_by_key(|record| record.position);

        let records = stored.into_iter().map(|stored| stored.record).collect();
        Ok(Snapshot::from_records(records, pointer.fetched_at))
    }
}

#[async_trait]
impl<K: KeyValueStore> SnapshotStore for KeyedSnapshotStore<K> {
    fn strategy(&self) -> StoreStrategy {
        StoreStrategy::Keyed
    }

    async fn replace(&self, snapshot: Snapshot) -> Result<()> {
        let records = snapshot.records()?.into_owned();
        let superseded = match self.load_pointer().await {
            Ok(pointer) => pointer.map(|p| p.generation),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable generation pointer");
                None
            }
        };

        let generation = Uuid::now_v7().to_string();
        if let Err(e) = self.write_generation(&generation, &records).await {
            tracing::warn!(generation = %generation, error = %e, "keyed replace failed before publish");
            self.discard_generation(&generation).await;
            return Err(e);
        }

        let pointer = GenerationPointer {
            generation: generation.clone(),
            fetched_at: snapshot.fetched_at(),
            count: records.len(),
        };
        let pointer_value = serde_json::to_vec(&pointer)
            .map_err(|e| CatalogError::decode(format!("failed to encode generation pointer: {e}")))?;
        if let Err(e) = self.kv.set(&self.pointer_key(), &pointer_value).await {
            // The write may have landed even though the reply was lost.
            match self.load_pointer().await {
                Ok(Some(current)) if current.generation == generation => {
                    tracing::warn!(
                        generation = %generation,
                        error = %e,
                        "pointer write reported an error but was applied"
                    );
                }
                Ok(_) => {
                    self.discard_generation(&generation).await;
                    return Err(e);
                }
                Err(reload) => {
                    // Unknown outcome: leave the generation for a later purge.
                    tracing::warn!(
                        generation = %generation,
                        error = %e,
                        reload_error = %reload,
                        "pointer write outcome unknown, keeping new generation"
                    );
                    return Err(e);
                }
            }
        }

        tracing::info!(
            backend = self.kv.backend_name(),
            generation = %generation,
            records = records.len(),
            "keyed snapshot published"
        );

        self.memo.store(Some(Arc::new(Memo {
            generation,
            snapshot: Arc::new(Snapshot::from_records(records, snapshot.fetched_at())),
        })));

        if let Some(superseded) = superseded {
            self.purge_older_than(&superseded).await;
        }
        Ok(())
    }

    async fn read(&self) -> Result<Option<Arc<Snapshot>>> {
        let Some(pointer) = self.load_pointer().await? else {
            return Ok(None);
        };

        if let Some(memo) = self.memo.load_full() {
            if memo.generation == pointer.generation {
                return Ok(Some(memo.snapshot.clone()));
            }
        }

        let snapshot = Arc::new(self.read_generation(&pointer).await?);
        self.memo.store(Some(Arc::new(Memo {
            generation: pointer.generation,
            snapshot: snapshot.clone(),
        })));
        Ok(Some(snapshot))
    }
}
