// handlers/elevated/resources.rs - GET /api/auth/resources

use axum::extract::Extension;
use serde::Serialize;
use std::sync::Arc;

use crate::middleware::{ApiResponse, ApiResult};
use crate::routes::{RegisteredRoute, RouteTable};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceListing {
    pub routes: Vec<RegisteredRoute>,
    pub resource_codes: Vec<String>,
}

/// Every registered route with the code it demands, for grant administration
pub async fn resources_get(Extension(table): Extension<Arc<RouteTable>>) -> ApiResult<ResourceListing> {
    Ok(ApiResponse::success(ResourceListing {
        routes: table.routes.clone(),
        resource_codes: table.resource_codes(),
    }))
}
