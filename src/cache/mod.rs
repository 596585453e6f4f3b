// cache/mod.rs - Key-value cache backing sessions, role sets and resource code sets
//
// The gate only ever issues idempotent writes (SET with TTL, SADD, EXPIRE, DEL),
// so any backend offering those primitives can sit behind `CacheStore`.

pub mod keys;
pub mod memory;
pub mod remote;
pub mod timeout;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub use memory::MemoryCache;
pub use remote::RedisCache;
pub use timeout::TimeoutCache;

/// Errors surfaced by a cache backend
#[derive(Debug, Error, Clone)]
pub enum CacheError {
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),

    #[error("Cache operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Wrong value type stored at key '{0}'")]
    WrongType(String),
}

/// Shared cache client. Implementations must be safe for concurrent use.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Read a string value, `None` when the key is absent or expired
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Overwrite a string value and arm its expiration
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// All members of a set, empty when the key is absent
    async fn members(&self, key: &str) -> Result<Vec<String>, CacheError>;

    /// Add members to a set, creating it when absent. Existing members are kept.
    async fn add_members(&self, key: &str, members: &[String]) -> Result<(), CacheError>;

    /// Re-arm the expiration of an existing key. Returns false when absent.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError>;

    /// Remove a key. Returns false when it did not exist.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Round trip used by health checks
    async fn ping(&self) -> Result<(), CacheError>;
}
