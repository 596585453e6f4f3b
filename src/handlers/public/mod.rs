// handlers/public/mod.rs - Endpoints reachable without a credential

use axum::{extract::Extension, http::StatusCode, response::Json};
use serde_json::{json, Value};

use crate::cache::CacheStore;
use crate::gate::AuthorizationGate;

pub async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Celestial authorization gateway",
            "version": version,
            "endpoints": {
                "health": "/health (public)",
                "auth": "/api/auth/whoami, /api/auth/permissions, /api/auth/session (login required)",
                "cache": "/api/auth/cache/users/:user_id, /api/auth/cache/roles/:role_id (resource code required)",
                "resources": "/api/auth/resources (resource code required)",
            }
        }
    }))
}

/// Liveness plus a cache round trip; the directory is only reached on cache misses
pub async fn health(Extension(gate): Extension<AuthorizationGate>) -> (StatusCode, Json<Value>) {
    let now = chrono::Utc::now();

    match gate.cache().ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "cache": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::error!("Health check cache ping failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "cache unavailable",
                    "data": {
                        "status": "degraded",
                        "timestamp": now
                    }
                })),
            )
        }
    }
}
