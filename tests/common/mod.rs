#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use celestial_gate::cache::MemoryCache;
use celestial_gate::config::AppConfig;
use celestial_gate::directory::DataPermission;
use celestial_gate::gate::{AuthorizationGate, GateSettings};
use celestial_gate::testing::StaticDirectory;

pub const SECRET: &str = "integration-secret";

pub struct TestServer {
    pub base_url: String,
    pub gate: AuthorizationGate,
    pub cache: MemoryCache,
    pub directory: Arc<StaticDirectory>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Open a session for `user_id` and return the bearer credential
    pub async fn login(&self, user_id: u64) -> Result<String> {
        let issued = self.gate.issuer().issue(user_id, Some("acme".into()), None).await?;
        Ok(issued.token)
    }
}

/// Directory used by most tests:
/// user 1 is superadmin, user 42 holds role 7 (`project`),
/// user 43 holds role 9 (`user:dispatchroles`, `resource:list`)
pub fn default_directory() -> StaticDirectory {
    StaticDirectory::new()
        .with_user_roles(1, [1])
        .with_user_roles(42, [7])
        .with_user_roles(43, [9])
        .with_role_codes(7, ["project"])
        .with_role_codes(9, ["user:dispatchroles", "resource:list"])
        .with_role_data_permission(7, DataPermission::DeptAndSub)
}

pub async fn spawn_server() -> Result<TestServer> {
    spawn_with(default_directory()).await
}

/// Serve the full app on an ephemeral port, one server per test
pub async fn spawn_with(directory: StaticDirectory) -> Result<TestServer> {
    let settings = GateSettings {
        jwt_secret: SECRET.to_string(),
        superadmin_role_id: 1,
        token_expiry_hours: 1,
        session_ttl: Duration::from_secs(600),
        role_ttl: Duration::from_secs(3600),
        permission_ttl: Duration::from_secs(3600),
        op_timeout: Duration::from_millis(500),
    };
    let cache = MemoryCache::new();
    let directory = Arc::new(directory);
    let gate = AuthorizationGate::new(settings, Arc::new(cache.clone()), directory.clone());

    let app = celestial_gate::app(gate.clone(), &AppConfig::development())?;
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .context("failed to bind test listener")?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok(TestServer {
        base_url: format!("http://{}", addr),
        gate,
        cache,
        directory,
    })
}
