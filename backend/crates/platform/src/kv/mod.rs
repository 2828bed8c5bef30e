//! Key-Value Store Abstraction
//!
//! The rate limiter and the article cache only talk to this trait, so the
//! process never holds an ambient store client:
//! - [`RedisStore`] for production
//! - [`MemoryStore`] for tests and single-instance development

mod memory_store;
mod redis_store;

pub use memory_store::MemoryStore;
pub use redis_store::RedisStore;

use std::collections::HashMap;
use std::time::Duration;

/// Result alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Key-value backend failure
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend is unreachable or rejected the command
    #[error("key-value backend error: {0}")]
    Backend(#[from] redis::RedisError),

    /// A value exists but has the wrong shape (e.g. non-numeric counter)
    #[error("malformed value at `{key}`: {reason}")]
    Malformed { key: String, reason: String },
}

/// Operations the blog needs from a key-value store.
///
/// Every method is one atomic step from the caller's point of view; callers
/// compose them without additional locking.
#[trait_variant::make(KeyValueStore: Send)]
pub trait LocalKeyValueStore {
    /// Read a string value
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write a string value, replacing any previous value and expiry
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()>;

    /// Delete keys, returning how many existed
    async fn delete(&self, keys: &[&str]) -> StoreResult<u64>;

    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Increment an integer counter only if the key is present.
    ///
    /// Returns `None` without creating the key when it is absent, so a
    /// counter that expired between a check and this call stays gone.
    async fn incr_if_exists(&self, key: &str) -> StoreResult<Option<i64>>;

    /// Write several fields of a hash (field map) at once
    async fn hash_set_all(&self, key: &str, fields: &[(String, String)]) -> StoreResult<()>;

    /// Read a whole hash; empty when the key is absent
    async fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, String>>;

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> StoreResult<()>;

    /// Add members to a sorted set and set its expiry, as one batch
    async fn sorted_set_add_all(
        &self,
        key: &str,
        members: &[(f64, String)],
        ttl: Option<Duration>,
    ) -> StoreResult<()>;

    /// Number of members in a sorted set
    async fn sorted_set_card(&self, key: &str) -> StoreResult<u64>;

    /// Members ranked `start..=stop` in descending score order
    async fn sorted_set_rev_range(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> StoreResult<Vec<String>>;
}
