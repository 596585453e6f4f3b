use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::{CacheError, CacheStore};

/// Bounds every call on the wrapped backend.
///
/// A call that overruns resolves to `CacheError::Timeout`; the inner future is
/// dropped, which cancels it.
pub struct TimeoutCache {
    inner: Arc<dyn CacheStore>,
    limit: Duration,
}

impl TimeoutCache {
    pub fn new(inner: Arc<dyn CacheStore>, limit: Duration) -> Self {
        Self { inner, limit }
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, CacheError>
    where
        F: Future<Output = Result<T, CacheError>> + Send,
    {
        tokio::time::timeout(self.limit, fut)
            .await
            .map_err(|_| CacheError::Timeout(self.limit))?
    }
}

#[async_trait]
impl CacheStore for TimeoutCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.bounded(self.inner.get(key)).await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.bounded(self.inner.set_ex(key, value, ttl)).await
    }

    async fn members(&self, key: &str) -> Result<Vec<String>, CacheError> {
        self.bounded(self.inner.members(key)).await
    }

    async fn add_members(&self, key: &str, members: &[String]) -> Result<(), CacheError> {
        self.bounded(self.inner.add_members(key, members)).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        self.bounded(self.inner.expire(key, ttl)).await
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        self.bounded(self.inner.delete(key)).await
    }

    async fn ping(&self) -> Result<(), CacheError> {
        self.bounded(self.inner.ping()).await
    }
}
