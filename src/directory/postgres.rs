use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, warn};

use super::{DataPermission, Directory, DirectoryError};
use crate::database::{DatabaseError, DatabaseManager};

/// Directory backed by the `user_role`, `role` and `role_resource` tables
#[derive(Clone)]
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build on top of the shared directory pool
    pub async fn connect() -> Result<Self, DatabaseError> {
        let pool = DatabaseManager::main_pool().await?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl Directory for PgDirectory {
    async fn roles_of_user(&self, user_id: u64) -> Result<Vec<u64>, DirectoryError> {
        let user_id = i64::try_from(user_id)
            .map_err(|_| DirectoryError::Query(format!("user id {} out of range", user_id)))?;

        let rows: Vec<i64> = sqlx::query_scalar(
            "SELECT role_id FROM user_role WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let roles: Vec<u64> = rows
            .into_iter()
            .filter_map(|id| match u64::try_from(id) {
                Ok(id) => Some(id),
                Err(_) => {
                    warn!("Skipping negative role id {} assigned to user {}", id, user_id);
                    None
                }
            })
            .collect();

        debug!("Directory: user {} has {} roles", user_id, roles.len());
        Ok(roles)
    }

    async fn data_permissions_of_roles(
        &self,
        role_ids: &[u64],
    ) -> Result<Vec<DataPermission>, DirectoryError> {
        let ids: Vec<i64> = role_ids.iter().filter_map(|id| i64::try_from(*id).ok()).collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let levels: Vec<i64> = sqlx::query_scalar(
            "SELECT data_permission::BIGINT FROM role WHERE id = ANY($1) AND data_permission > 0",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let permissions: Vec<DataPermission> = levels
            .into_iter()
            .filter_map(|level| {
                let permission = DataPermission::from_level(level);
                if permission.is_none() {
                    warn!("Ignoring unknown data permission level {}", level);
                }
                permission
            })
            .collect();
        Ok(permissions)
    }

    async fn resource_codes_of_role(&self, role_id: u64) -> Result<Vec<String>, DirectoryError> {
        let role_id = i64::try_from(role_id)
            .map_err(|_| DirectoryError::Query(format!("role id {} out of range", role_id)))?;

        let codes: Vec<String> = sqlx::query_scalar(
            "SELECT resource_code FROM role_resource WHERE role_id = $1",
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await?;

        debug!("Directory: role {} grants {} resource codes", role_id, codes.len());
        Ok(codes)
    }
}
