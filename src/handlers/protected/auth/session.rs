// handlers/protected/auth/session.rs - GET /api/auth/whoami, DELETE /api/auth/session

use axum::extract::Extension;
use serde_json::{json, Value};

use crate::gate::AuthorizationGate;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

/// GET /api/auth/whoami - identity resolved by the gate for this request
pub async fn whoami(Extension(user): Extension<AuthUser>) -> ApiResult<AuthUser> {
    Ok(ApiResponse::success(user))
}

/// DELETE /api/auth/session - revoke the session behind the presented credential.
///
/// The credential itself stays cryptographically valid until it expires, but
/// every later request fails the session check.
pub async fn logout(
    Extension(gate): Extension<AuthorizationGate>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Value> {
    let revoked = gate.logout(&user).await?;
    Ok(ApiResponse::success(json!({ "revoked": revoked })))
}
