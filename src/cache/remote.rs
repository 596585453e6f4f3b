use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Cmd, FromRedisValue, RedisError};
use std::time::Duration;
use tracing::info;

use super::{CacheError, CacheStore};

/// Shared Redis backend. Sessions written here by the login service are what
/// the gate validates against.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    /// Connect to `url` (`redis://host:port/db`). The manager reconnects on its own
    /// after transient failures.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(|e| CacheError::Unavailable(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        info!("Connected to cache at {}", redact(url));
        Ok(Self { conn })
    }

    async fn run<T: FromRedisValue>(&self, key: &str, cmd: Cmd) -> Result<T, CacheError> {
        let mut conn = self.conn.clone();
        cmd.query_async(&mut conn).await.map_err(|e| map_error(key, e))
    }
}

/// Redis expirations have whole-second granularity; never round down to zero
fn ttl_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    secs.max(1)
}

fn map_error(key: &str, err: RedisError) -> CacheError {
    if err.code() == Some("WRONGTYPE") {
        CacheError::WrongType(key.to_string())
    } else {
        CacheError::Unavailable(err.to_string())
    }
}

/// Drop credentials from a connection URL before logging it
fn redact(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("***"));
            }
            parsed.to_string()
        }
        Err(_) => "<invalid url>".to_string(),
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.run(key, redis::cmd("GET").arg(key).clone()).await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.run(key, redis::cmd("SETEX").arg(key).arg(ttl_secs(ttl)).arg(value).clone())
            .await
    }

    async fn members(&self, key: &str) -> Result<Vec<String>, CacheError> {
        self.run(key, redis::cmd("SMEMBERS").arg(key).clone()).await
    }

    async fn add_members(&self, key: &str, members: &[String]) -> Result<(), CacheError> {
        if members.is_empty() {
            return Ok(());
        }
        let _: i64 = self.run(key, redis::cmd("SADD").arg(key).arg(members).clone()).await?;
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        self.run(key, redis::cmd("EXPIRE").arg(key).arg(ttl_secs(ttl)).clone()).await
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let removed: i64 = self.run(key, redis::cmd("DEL").arg(key).clone()).await?;
        Ok(removed > 0)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let _: String = self.run("", redis::cmd("PING")).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_rounds_up_to_whole_seconds() {
        assert_eq!(ttl_secs(Duration::from_secs(7200)), 7200);
        assert_eq!(ttl_secs(Duration::from_millis(1500)), 2);
        assert_eq!(ttl_secs(Duration::from_millis(10)), 1);
        assert_eq!(ttl_secs(Duration::ZERO), 1);
    }

    #[test]
    fn connection_urls_are_redacted() {
        assert_eq!(redact("redis://:hunter2@cache:6379/0"), "redis://:***@cache:6379/0");
        assert_eq!(redact("redis://cache:6379"), "redis://cache:6379");
    }

    #[tokio::test]
    async fn invalid_url_is_unavailable() {
        let err = RedisCache::connect("not a url").await.err();
        assert!(matches!(err, Some(CacheError::Unavailable(_))));
    }

    #[test]
    fn transport_errors_are_unavailable() {
        let err = RedisError::from((redis::ErrorKind::IoError, "connection refused"));
        assert!(matches!(map_error("userRole:1", err), CacheError::Unavailable(_)));
    }
}
