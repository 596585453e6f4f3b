// handlers/elevated/cache.rs - drop cached role and permission sets
//
// Called after role assignments or grants change in the directory so the next
// request rebuilds the set instead of waiting out the TTL.

use axum::extract::{Extension, Path};
use serde_json::{json, Value};

use crate::gate::AuthorizationGate;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

/// DELETE /api/auth/cache/users/:user_id
pub async fn user_cache_delete(
    Extension(gate): Extension<AuthorizationGate>,
    Extension(caller): Extension<AuthUser>,
    Path(user_id): Path<u64>,
) -> ApiResult<Value> {
    let removed = gate.roles().invalidate(user_id).await?;
    tracing::info!(caller = caller.user_id, user_id, removed, "User role cache invalidated");

    Ok(ApiResponse::success(json!({
        "userId": user_id,
        "removed": removed
    })))
}

/// DELETE /api/auth/cache/roles/:role_id
pub async fn role_cache_delete(
    Extension(gate): Extension<AuthorizationGate>,
    Extension(caller): Extension<AuthUser>,
    Path(role_id): Path<u64>,
) -> ApiResult<Value> {
    let removed = gate.permissions().invalidate(role_id).await?;
    tracing::info!(caller = caller.user_id, role_id, removed, "Role permission cache invalidated");

    Ok(ApiResponse::success(json!({
        "roleId": role_id,
        "removed": removed
    })))
}
