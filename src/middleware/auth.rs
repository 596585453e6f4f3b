use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;
use crate::gate::{AuthorizationGate, Decision, Requirement};

pub use crate::gate::AuthContext as AuthUser;

/// Per-route middleware state: the shared gate plus the code this route demands
#[derive(Clone)]
pub struct RouteGuard {
    pub gate: AuthorizationGate,
    pub required: Requirement,
}

impl RouteGuard {
    pub fn new(gate: AuthorizationGate, required: Requirement) -> Self {
        Self { gate, required }
    }
}

/// Authorization middleware: runs the gate and, on allow, injects `AuthUser`
/// into the request extensions for downstream handlers
pub async fn require_code(
    State(guard): State<RouteGuard>,
    mut request: Request,
    next: Next,
) -> Response {
    let decision = guard.gate.authorize_headers(&guard.required, request.headers()).await;
    match decision {
        Ok(Decision::Bypass) => next.run(request).await,
        Ok(Decision::Allow(ctx)) => {
            request.extensions_mut().insert(ctx);
            next.run(request).await
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::gate::GateSettings;
    use crate::testing::StaticDirectory;
    use axum::{
        body::Body,
        http::{header, Request as HttpRequest, StatusCode},
        middleware::from_fn_with_state,
        routing::get,
        Extension, Router,
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn gate() -> AuthorizationGate {
        let settings = GateSettings {
            jwt_secret: "middleware-secret".into(),
            superadmin_role_id: 1,
            token_expiry_hours: 1,
            session_ttl: Duration::from_secs(60),
            role_ttl: Duration::from_secs(60),
            permission_ttl: Duration::from_secs(60),
            op_timeout: Duration::from_millis(200),
        };
        let directory = StaticDirectory::new()
            .with_user_roles(42, [7])
            .with_role_codes(7, ["project"]);
        AuthorizationGate::new(settings, Arc::new(MemoryCache::new()), Arc::new(directory))
    }

    fn router(gate: AuthorizationGate, code: &str) -> Router {
        let guard = RouteGuard::new(gate, Requirement::parse(code));
        Router::new().route(
            "/probe",
            get(|Extension(user): Extension<AuthUser>| async move { user.user_id.to_string() })
                .route_layer(from_fn_with_state(guard, require_code)),
        )
    }

    #[tokio::test]
    async fn injects_identity_on_allow() {
        let gate = gate();
        let issued = gate.issuer().issue(42, None, None).await.unwrap();

        let response = router(gate, "project:add")
            .oneshot(
                HttpRequest::builder()
                    .uri("/probe")
                    .header(header::AUTHORIZATION, format!("Bearer {}", issued.token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"42");
    }

    #[tokio::test]
    async fn missing_credential_is_bad_request() {
        let response = router(gate(), "project:add")
            .oneshot(HttpRequest::builder().uri("/probe").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn forbidden_is_unauthorized() {
        let gate = gate();
        let issued = gate.issuer().issue(42, None, None).await.unwrap();

        let response = router(gate, "asset:add")
            .oneshot(
                HttpRequest::builder()
                    .uri("/probe")
                    .header(header::COOKIE, format!("token={}", issued.token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
