//! # catalog-storage
//!
//! Snapshot storage for the catalog gateway.
//!
//! The main trait is [`SnapshotStore`]: one current catalog snapshot, replaced
//! wholesale and read atomically. Two strategies implement it:
//!
//! - [`BlobSnapshotStore`]: the upstream payload verbatim, behind an atomic pointer
//! - [`KeyedSnapshotStore`]: one key per record in an external [`KeyValueStore`]
//!
//! The refresh and query paths are written once against the trait; the strategy
//! is picked when the store is constructed.

mod blob;
mod keyed;
pub mod kv;
mod traits;

pub use blob::BlobSnapshotStore;
pub use keyed::KeyedSnapshotStore;
pub use kv::{MemoryKeyValueStore, RedisKeyValueStore};
pub use traits::{KeyValueStore, SnapshotStore, StoreStrategy};

/// Shared handle to the process-wide snapshot store.
pub type DynSnapshotStore = std::sync::Arc<dyn SnapshotStore>;
