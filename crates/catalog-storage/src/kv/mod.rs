//! Key-value backends for the keyed snapshot store.
//!
//! - **Redis**: shared external service, used in production
//! - **Memory**: in-process DashMap, used for local runs and tests

pub mod memory;
pub mod redis;

pub use memory::MemoryKeyValueStore;
pub use self::redis::RedisKeyValueStore;
