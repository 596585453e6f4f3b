// testing/mod.rs - Test doubles for the cache backend and the directory
//
// Compiled for unit tests and behind the `testing` feature, which the crate
// enables for its own integration tests so they can build a gate without Postgres.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::cache::{CacheError, CacheStore, MemoryCache};
use crate::directory::{DataPermission, Directory, DirectoryError};

/// In-memory directory with lookup counters and switchable failures
#[derive(Default)]
pub struct StaticDirectory {
    user_roles: Mutex<HashMap<u64, Vec<u64>>>,
    role_codes: Mutex<HashMap<u64, Vec<String>>>,
    role_data_permissions: Mutex<HashMap<u64, DataPermission>>,
    fail_roles: AtomicBool,
    fail_codes: AtomicBool,
    delay: Option<Duration>,
    role_lookups: AtomicUsize,
    code_lookups: AtomicUsize,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user_roles(self, user_id: u64, roles: impl IntoIterator<Item = u64>) -> Self {
        self.set_user_roles(user_id, roles);
        self
    }

    pub fn with_role_codes<S: Into<String>>(
        self,
        role_id: u64,
        codes: impl IntoIterator<Item = S>,
    ) -> Self {
        self.set_role_codes(role_id, codes);
        self
    }

    pub fn with_role_data_permission(self, role_id: u64, permission: DataPermission) -> Self {
        self.set_role_data_permission(role_id, permission);
        self
    }

    /// Every lookup fails
    pub fn failing(self) -> Self {
        self.fail_roles.store(true, Ordering::SeqCst);
        self.fail_codes.store(true, Ordering::SeqCst);
        self
    }

    /// Only resource code lookups fail
    pub fn failing_codes(self) -> Self {
        self.fail_codes.store(true, Ordering::SeqCst);
        self
    }

    /// Sleep before answering, widening race windows in concurrency tests
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_user_roles(&self, user_id: u64, roles: impl IntoIterator<Item = u64>) {
        let mut map = self.user_roles.lock().unwrap_or_else(|e| e.into_inner());
        map.insert(user_id, roles.into_iter().collect());
    }

    pub fn set_role_codes<S: Into<String>>(&self, role_id: u64, codes: impl IntoIterator<Item = S>) {
        let mut map = self.role_codes.lock().unwrap_or_else(|e| e.into_inner());
        map.insert(role_id, codes.into_iter().map(Into::into).collect());
    }

    pub fn set_role_data_permission(&self, role_id: u64, permission: DataPermission) {
        let mut map = self.role_data_permissions.lock().unwrap_or_else(|e| e.into_inner());
        map.insert(role_id, permission);
    }

    pub fn role_lookups(&self) -> usize {
        self.role_lookups.load(Ordering::SeqCst)
    }

    pub fn code_lookups(&self) -> usize {
        self.code_lookups.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl Directory for StaticDirectory {
    async fn roles_of_user(&self, user_id: u64) -> Result<Vec<u64>, DirectoryError> {
        self.role_lookups.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if self.fail_roles.load(Ordering::SeqCst) {
            return Err(DirectoryError::Unavailable("static directory offline".to_string()));
        }
        let map = self.user_roles.lock().unwrap_or_else(|e| e.into_inner());
        Ok(map.get(&user_id).cloned().unwrap_or_default())
    }

    async fn data_permissions_of_roles(
        &self,
        role_ids: &[u64],
    ) -> Result<Vec<DataPermission>, DirectoryError> {
        if self.fail_roles.load(Ordering::SeqCst) {
            return Err(DirectoryError::Unavailable("static directory offline".to_string()));
        }
        let map = self.role_data_permissions.lock().unwrap_or_else(|e| e.into_inner());
        Ok(role_ids.iter().filter_map(|id| map.get(id).copied()).collect())
    }

    async fn resource_codes_of_role(&self, role_id: u64) -> Result<Vec<String>, DirectoryError> {
        self.code_lookups.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if self.fail_codes.load(Ordering::SeqCst) {
            return Err(DirectoryError::Unavailable("static directory offline".to_string()));
        }
        let map = self.role_codes.lock().unwrap_or_else(|e| e.into_inner());
        Ok(map.get(&role_id).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
struct Faults {
    fail_prefixes: Vec<String>,
    stall_prefixes: Vec<(String, Duration)>,
    stall_all: Option<Duration>,
}

/// Wraps a `MemoryCache`, counting calls and injecting failures or stalls by key prefix
pub struct FaultyCache {
    inner: MemoryCache,
    faults: Mutex<Faults>,
    calls: AtomicUsize,
}

impl FaultyCache {
    pub fn new(inner: MemoryCache) -> Self {
        Self {
            inner,
            faults: Mutex::new(Faults::default()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &MemoryCache {
        &self.inner
    }

    /// Number of operations attempted so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Keys starting with `prefix` report the backend as unavailable
    pub fn fail_prefix(&self, prefix: &str) {
        self.faults().fail_prefixes.push(prefix.to_string());
    }

    /// Keys starting with `prefix` hang for `stall` before answering
    pub fn stall_prefix(&self, prefix: &str, stall: Duration) {
        self.faults().stall_prefixes.push((prefix.to_string(), stall));
    }

    pub fn stall_all(&self, stall: Duration) {
        self.faults().stall_all = Some(stall);
    }

    pub fn clear_faults(&self) {
        *self.faults() = Faults::default();
    }

    fn faults(&self) -> std::sync::MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn before(&self, key: &str) -> Result<(), CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (fail, stall) = {
            let faults = self.faults();
            let fail = faults.fail_prefixes.iter().any(|p| key.starts_with(p.as_str()));
            let stall = faults
                .stall_prefixes
                .iter()
                .find(|(p, _)| key.starts_with(p.as_str()))
                .map(|(_, d)| *d)
                .or(faults.stall_all);
            (fail, stall)
        };
        if let Some(stall) = stall {
            tokio::time::sleep(stall).await;
        }
        if fail {
            return Err(CacheError::Unavailable(format!("injected failure for {}", key)));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStore for FaultyCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.before(key).await?;
        self.inner.get(key).await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.before(key).await?;
        self.inner.set_ex(key, value, ttl).await
    }

    async fn members(&self, key: &str) -> Result<Vec<String>, CacheError> {
        self.before(key).await?;
        self.inner.members(key).await
    }

    async fn add_members(&self, key: &str, members: &[String]) -> Result<(), CacheError> {
        self.before(key).await?;
        self.inner.add_members(key, members).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        self.before(key).await?;
        self.inner.expire(key, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        self.before(key).await?;
        self.inner.delete(key).await
    }

    async fn ping(&self) -> Result<(), CacheError> {
        self.before("").await?;
        self.inner.ping().await
    }
}
