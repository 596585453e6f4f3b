// handlers/protected/auth/permissions.rs - GET /api/auth/permissions

use axum::extract::Extension;

use crate::gate::{AuthorizationGate, EffectivePermissions};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

/// Resource codes the caller holds across all roles, so a front end can decide
/// which actions to offer. Superadmins get the flag instead of a list.
pub async fn permissions_get(
    Extension(gate): Extension<AuthorizationGate>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<EffectivePermissions> {
    let effective = gate.effective_permissions(user.user_id).await?;
    Ok(ApiResponse::success(effective))
}
