use futures::future::try_join;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::cache::{keys, CacheStore};
use crate::directory::{DataPermission, Directory};
use super::GateError;

/// Stored in place of a level when none of the user's roles sets one
const UNSET_LEVEL: i64 = 0;

/// A user's roles together with the data permission derived from them
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvedRoles {
    /// Ascending, without duplicates
    pub role_ids: Vec<u64>,
    pub data_permission: Option<DataPermission>,
}

/// Cached `user id -> {role id}` sets, warmed from the directory on miss.
/// The user's data permission is cached beside the set and lives as long.
#[derive(Clone)]
pub struct RoleResolver {
    cache: Arc<dyn CacheStore>,
    directory: Arc<dyn Directory>,
    ttl: Duration,
}

impl RoleResolver {
    pub fn new(cache: Arc<dyn CacheStore>, directory: Arc<dyn Directory>, ttl: Duration) -> Self {
        Self { cache, directory, ttl }
    }

    /// Role ids of the user and their widest data permission.
    ///
    /// Both keys have their expiration re-armed on every call, hit or miss.
    pub async fn roles_of(&self, user_id: u64) -> Result<ResolvedRoles, GateError> {
        let key = keys::user_roles(user_id);

        let mut roles: Vec<u64> = self
            .cache
            .members(&key)
            .await?
            .into_iter()
            .filter_map(|member| match member.parse::<u64>() {
                Ok(id) => Some(id),
                Err(_) => {
                    warn!("Ignoring unparsable role id '{}' cached under {}", member, key);
                    None
                }
            })
            .collect();

        let data_permission = if roles.is_empty() {
            roles = self.directory.roles_of_user(user_id).await?;
            debug!("Role cache miss for user {}, loaded {} roles", user_id, roles.len());
            let members: Vec<String> = roles.iter().map(u64::to_string).collect();
            self.cache.add_members(&key, &members).await?;
            self.load_data_permission(user_id, &roles).await?
        } else {
            match self.cached_data_permission(user_id).await? {
                Some(level) => DataPermission::from_level(level),
                None => self.load_data_permission(user_id, &roles).await?,
            }
        };
        self.refresh(user_id).await?;

        roles.sort_unstable();
        roles.dedup();
        Ok(ResolvedRoles { role_ids: roles, data_permission })
    }

    async fn cached_data_permission(&self, user_id: u64) -> Result<Option<i64>, GateError> {
        let key = keys::user_data_permission(user_id);
        let Some(raw) = self.cache.get(&key).await? else {
            return Ok(None);
        };
        match raw.parse::<i64>() {
            Ok(level) => Ok(Some(level)),
            Err(_) => {
                warn!("Ignoring unparsable data permission '{}' cached under {}", raw, key);
                Ok(None)
            }
        }
    }

    /// Widest data permission across `roles`, written to the cache. Users
    /// without roles get nothing written.
    async fn load_data_permission(
        &self,
        user_id: u64,
        roles: &[u64],
    ) -> Result<Option<DataPermission>, GateError> {
        if roles.is_empty() {
            return Ok(None);
        }
        let levels = self.directory.data_permissions_of_roles(roles).await?;
        let widest = DataPermission::widest(levels);
        let level = widest.map_or(UNSET_LEVEL, DataPermission::level);
        self.cache
            .set_ex(&keys::user_data_permission(user_id), &level.to_string(), self.ttl)
            .await?;
        Ok(widest)
    }

    /// Slide both keys. Reports whether the role set was still cached.
    pub async fn refresh(&self, user_id: u64) -> Result<bool, GateError> {
        let (roles_alive, _) = try_join(
            self.cache.expire(&keys::user_roles(user_id), self.ttl),
            self.cache.expire(&keys::user_data_permission(user_id), self.ttl),
        )
        .await?;
        Ok(roles_alive)
    }

    /// Drop the cached set so the next request reloads it (after role re-assignment)
    pub async fn invalidate(&self, user_id: u64) -> Result<bool, GateError> {
        let (removed, _) = try_join(
            self.cache.delete(&keys::user_roles(user_id)),
            self.cache.delete(&keys::user_data_permission(user_id)),
        )
        .await?;
        Ok(removed)
    }
}
