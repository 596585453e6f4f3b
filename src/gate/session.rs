use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::cache::{keys, CacheStore};
use super::GateError;

/// `session id -> user id` entries with a sliding expiration
#[derive(Clone)]
pub struct SessionStore {
    cache: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(cache: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Confirm the session is live and owned by `claimed_user_id`.
    ///
    /// Does not touch the expiration; the gate refreshes it only once the
    /// request is authorized.
    pub async fn validate(&self, session_id: &str, claimed_user_id: u64) -> Result<(), GateError> {
        let stored = self.cache.get(&keys::session(session_id)).await?;

        match stored {
            None => Err(GateError::SessionNotFound),
            Some(uid) if uid.trim().parse::<u64>().ok() == Some(claimed_user_id) => Ok(()),
            Some(_) => {
                debug!("Session {} is bound to another user", session_id);
                Err(GateError::SessionMismatch)
            }
        }
    }

    /// Create a new session for `user_id` and return its id
    pub async fn open(&self, user_id: u64) -> Result<String, GateError> {
        let session_id = Uuid::new_v4().simple().to_string();
        self.cache
            .set_ex(&keys::session(&session_id), &user_id.to_string(), self.ttl)
            .await?;
        Ok(session_id)
    }

    /// Re-arm the sliding window. Returns false if the session vanished meanwhile.
    pub async fn refresh(&self, session_id: &str) -> Result<bool, GateError> {
        Ok(self.cache.expire(&keys::session(session_id), self.ttl).await?)
    }

    /// Remove the session (logout or forced invalidation)
    pub async fn revoke(&self, session_id: &str) -> Result<bool, GateError> {
        Ok(self.cache.delete(&keys::session(session_id)).await?)
    }
}
