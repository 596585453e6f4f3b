use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::cache::{keys, CacheStore};
use crate::directory::Directory;
use super::GateError;

/// Cached `role id -> {resource code}` sets, warmed from the directory on miss
#[derive(Clone)]
pub struct PermissionResolver {
    cache: Arc<dyn CacheStore>,
    directory: Arc<dyn Directory>,
    ttl: Duration,
}

impl PermissionResolver {
    pub fn new(cache: Arc<dyn CacheStore>, directory: Arc<dyn Directory>, ttl: Duration) -> Self {
        Self { cache, directory, ttl }
    }

    /// Resource codes held by the role, sorted. Re-arms the key's TTL on every call.
    pub async fn permissions_of(&self, role_id: u64) -> Result<Vec<String>, GateError> {
        let key = keys::role_resource_codes(role_id);

        let mut codes = self.cache.members(&key).await?;
        if codes.is_empty() {
            codes = self.directory.resource_codes_of_role(role_id).await?;
            codes.retain(|code| !code.is_empty());
            debug!("Permission cache miss for role {}, loaded {} codes", role_id, codes.len());
            self.cache.add_members(&key, &codes).await?;
        }
        self.cache.expire(&key, self.ttl).await?;

        codes.sort_unstable();
        codes.dedup();
        Ok(codes)
    }

    pub async fn refresh(&self, role_id: u64) -> Result<bool, GateError> {
        Ok(self.cache.expire(&keys::role_resource_codes(role_id), self.ttl).await?)
    }

    /// Drop the cached set so the next request reloads it (after grants change)
    pub async fn invalidate(&self, role_id: u64) -> Result<bool, GateError> {
        Ok(self.cache.delete(&keys::role_resource_codes(role_id)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::testing::StaticDirectory;

    #[tokio::test]
    async fn warms_then_serves_from_cache() {
        let directory = Arc::new(
            StaticDirectory::new().with_role_codes(7, ["project:list", "project", "project"]),
        );
        let cache = Arc::new(MemoryCache::new());
        let permissions =
            PermissionResolver::new(cache.clone(), directory.clone(), Duration::from_secs(300));

        let first = permissions.permissions_of(7).await.unwrap();
        let second = permissions.permissions_of(7).await.unwrap();

        assert_eq!(first, vec!["project", "project:list"]);
        assert_eq!(first, second);
        assert_eq!(directory.code_lookups(), 1);
        assert!(cache.ttl("roleResourceCode:7").await.is_some());
    }

    #[tokio::test]
    async fn invalidate_then_reload_sees_new_grants() {
        let directory = Arc::new(StaticDirectory::new().with_role_codes(7, ["project"]));
        let cache = Arc::new(MemoryCache::new());
        let permissions =
            PermissionResolver::new(cache.clone(), directory.clone(), Duration::from_secs(300));

        permissions.permissions_of(7).await.unwrap();
        directory.set_role_codes(7, ["asset"]);
        assert_eq!(permissions.permissions_of(7).await.unwrap(), vec!["project"]);

        permissions.invalidate(7).await.unwrap();
        assert_eq!(permissions.permissions_of(7).await.unwrap(), vec!["asset"]);
    }
}
