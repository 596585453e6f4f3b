use async_trait::async_trait;
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};
use moka::Expiry;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use super::{CacheError, CacheStore};

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Set(BTreeSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    /// `None` keeps the key until it is deleted or evicted
    expires_at: Option<Instant>,
}

/// Per-entry expiration read from the deadline stored with the value
struct Deadline;

impl Deadline {
    fn remaining(entry: &Entry, now: Instant) -> Option<Duration> {
        entry.expires_at.map(|at| at.saturating_duration_since(now))
    }
}

impl Expiry<String, Entry> for Deadline {
    fn expire_after_create(&self, _key: &String, entry: &Entry, created_at: Instant) -> Option<Duration> {
        Self::remaining(entry, created_at)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Self::remaining(entry, updated_at)
    }
}

/// Bounded in-process backend with per-key expiration, used by tests and
/// single-node tooling. Expired keys are invisible immediately and evicted by
/// moka's housekeeping.
#[derive(Clone)]
pub struct MemoryCache {
    entries: Cache<String, Entry>,
}

impl MemoryCache {
    pub const DEFAULT_CAPACITY: u64 = 100_000;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(max_capacity: u64) -> Self {
        let entries = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(Deadline)
            .build();
        Self { entries }
    }

    /// Remaining lifetime of a key, `None` when absent or persistent
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let entry = self.entries.get(key).await?;
        Deadline::remaining(&entry, Instant::now())
    }

    pub async fn len(&self) -> u64 {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        match self.entries.get(key).await {
            None => Ok(None),
            Some(Entry { value: Value::Str(s), .. }) => Ok(Some(s)),
            Some(_) => Err(CacheError::WrongType(key.to_string())),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let entry = Entry {
            value: Value::Str(value.to_string()),
            expires_at: Some(Instant::now() + ttl),
        };
        self.entries.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn members(&self, key: &str) -> Result<Vec<String>, CacheError> {
        match self.entries.get(key).await {
            None => Ok(Vec::new()),
            Some(Entry { value: Value::Set(set), .. }) => Ok(set.into_iter().collect()),
            Some(_) => Err(CacheError::WrongType(key.to_string())),
        }
    }

    async fn add_members(&self, key: &str, members: &[String]) -> Result<(), CacheError> {
        if members.is_empty() {
            return Ok(());
        }
        let owned_key = key.to_string();
        self.entries
            .entry(key.to_string())
            .and_try_compute_with(|current| {
                let result = match current.map(|e| e.into_value()) {
                    // New sets are persistent until EXPIRE is applied
                    None => Ok(Op::Put(Entry {
                        value: Value::Set(members.iter().cloned().collect()),
                        expires_at: None,
                    })),
                    Some(Entry { value: Value::Set(mut set), expires_at }) => {
                        set.extend(members.iter().cloned());
                        Ok(Op::Put(Entry { value: Value::Set(set), expires_at }))
                    }
                    Some(_) => Err(CacheError::WrongType(owned_key)),
                };
                std::future::ready(result)
            })
            .await?;
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        let outcome = self
            .entries
            .entry(key.to_string())
            .and_compute_with(|current| {
                let op = match current {
                    Some(entry) => {
                        let mut entry = entry.into_value();
                        entry.expires_at = Some(Instant::now() + ttl);
                        Op::Put(entry)
                    }
                    None => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;
        Ok(matches!(outcome, CompResult::ReplacedWith(_)))
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.entries.remove(key).await.is_some())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }
}
