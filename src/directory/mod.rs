// directory/mod.rs - Relational source of truth for role assignments and role grants
//
// The gate consults the directory only on cache misses. Both lookups are
// read-only and idempotent, so concurrent warm-ups are harmless.

pub mod postgres;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub use postgres::PgDirectory;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Directory query failed: {0}")]
    Query(String),

    #[error("Directory unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Row visibility a role carries. Lower levels see more, so a user holding
/// several roles gets the lowest level among them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DataPermission {
    All = 1,
    Dept = 2,
    DeptAndSub = 3,
    #[serde(rename = "self")]
    OwnOnly = 4,
}

impl DataPermission {
    /// Stored level, `0` meaning unset
    pub fn from_level(level: i64) -> Option<Self> {
        match level {
            1 => Some(Self::All),
            2 => Some(Self::Dept),
            3 => Some(Self::DeptAndSub),
            4 => Some(Self::OwnOnly),
            _ => None,
        }
    }

    pub fn level(self) -> i64 {
        self as i64
    }

    /// Widest permission among `levels`, ignoring unset ones
    pub fn widest(levels: impl IntoIterator<Item = DataPermission>) -> Option<Self> {
        levels.into_iter().min()
    }
}

/// Lookups the gate needs from the user directory
#[async_trait]
pub trait Directory: Send + Sync {
    /// Ids of every role currently assigned to the user
    async fn roles_of_user(&self, user_id: u64) -> Result<Vec<u64>, DirectoryError>;

    /// Data permissions set on the given roles. Roles without one are omitted.
    async fn data_permissions_of_roles(
        &self,
        role_ids: &[u64],
    ) -> Result<Vec<DataPermission>, DirectoryError>;

    /// Resource codes currently granted to the role
    async fn resource_codes_of_role(&self, role_id: u64) -> Result<Vec<String>, DirectoryError>;
}
