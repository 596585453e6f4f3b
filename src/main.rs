use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use celestial_gate::{
    cache::RedisCache,
    config,
    database::DatabaseManager,
    directory::PgDirectory,
    gate::{AuthorizationGate, GateSettings},
    is_production,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::config();
    tracing::info!("Starting Celestial gate in {:?} mode", config.environment);

    if config.security.jwt_secret.is_empty() {
        anyhow::bail!("JWT_SECRET must be set");
    }
    if is_production!() && config.security.cors_origins.iter().any(|o| o == "*") {
        tracing::warn!("Wildcard CORS origin configured in production");
    }

    if config.cache.url.is_empty() {
        anyhow::bail!("CACHE_URL must be set");
    }
    // Sessions are written here by the login service
    let cache = RedisCache::connect(&config.cache.url)
        .await
        .context("failed to connect to the session cache")?;

    let directory = PgDirectory::connect()
        .await
        .context("failed to open directory database pool")?;

    let gate = AuthorizationGate::new(GateSettings::from_config(config), Arc::new(cache), Arc::new(directory));
    let app = celestial_gate::app(gate, config).context("invalid route table")?;

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Celestial gate listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    DatabaseManager::close_all().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
