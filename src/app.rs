// app.rs - Router assembly
//
// Every endpoint is declared once in the registry together with the code it
// demands. Shared state reaches handlers through extensions.

use axum::{http::HeaderValue, Extension, Router};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::gate::AuthorizationGate;
use crate::handlers::{elevated, protected, public};
use crate::routes::{RegistryError, RouteRegistry};

pub const CODE_DISPATCH_ROLE: &str = "user:dispatchroles";
pub const CODE_DISPATCH_RESOURCE: &str = "role:dispatchresources";
pub const CODE_RESOURCE_LIST: &str = "resource:list";

pub fn app(gate: AuthorizationGate, config: &AppConfig) -> Result<Router, RegistryError> {
    let (router, table) = RouteRegistry::builder(gate.clone())
        // Public
        .get("/", "anon", public::root)
        .get("/health", "anon", public::health)
        // Any logged-in user
        .get("/api/auth/whoami", "user", protected::auth::whoami)
        .get("/api/auth/permissions", "user", protected::auth::permissions_get)
        .delete("/api/auth/session", "user", protected::auth::logout)
        // Operators
        .delete("/api/auth/cache/users/:user_id", CODE_DISPATCH_ROLE, elevated::user_cache_delete)
        .delete("/api/auth/cache/roles/:role_id", CODE_DISPATCH_RESOURCE, elevated::role_cache_delete)
        .get("/api/auth/resources", CODE_RESOURCE_LIST, elevated::resources_get)
        .build()?;

    let mut router = router
        .layer(Extension(gate))
        .layer(Extension(Arc::new(table)));

    if config.security.enable_cors {
        router = router.layer(cors_layer(&config.security.cors_origins));
    }
    if config.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }

    Ok(router)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(Any)
        .allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::gate::GateSettings;
    use crate::testing::StaticDirectory;
    use axum::{body::Body, http::Request, http::StatusCode};
    use std::time::Duration;
    use tower::ServiceExt;

    fn gate() -> AuthorizationGate {
        let settings = GateSettings {
            jwt_secret: "app-secret".into(),
            superadmin_role_id: 1,
            token_expiry_hours: 1,
            session_ttl: Duration::from_secs(60),
            role_ttl: Duration::from_secs(60),
            permission_ttl: Duration::from_secs(60),
            op_timeout: Duration::ZERO,
        };
        AuthorizationGate::new(settings, Arc::new(MemoryCache::new()), Arc::new(StaticDirectory::new()))
    }

    #[tokio::test]
    async fn public_routes_need_no_credential() {
        let router = app(gate(), &AppConfig::development()).unwrap();

        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn protected_routes_reject_anonymous_callers() {
        let router = app(gate(), &AppConfig::development()).unwrap();

        let response = router
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/auth/cache/roles/3")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    async fn preflight(origins: &[&str], origin: &str) -> Option<String> {
        let mut config = AppConfig::development();
        config.security.cors_origins = origins.iter().map(|o| o.to_string()).collect();
        let router = app(gate(), &config).unwrap();

        let response = router
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/api/auth/whoami")
                    .header("Origin", origin)
                    .header("Access-Control-Request-Method", "GET")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        response
            .headers()
            .get("access-control-allow-origin")
            .map(|v| v.to_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn cors_wildcard_allows_any_origin() {
        assert_eq!(preflight(&["*"], "https://elsewhere.test").await.as_deref(), Some("*"));
    }

    #[tokio::test]
    async fn cors_list_allows_only_listed_origins() {
        let origins = ["https://console.example.com", "bad\norigin"];
        assert_eq!(
            preflight(&origins, "https://console.example.com").await.as_deref(),
            Some("https://console.example.com")
        );
        assert_eq!(preflight(&origins, "https://elsewhere.test").await, None);
    }
}
