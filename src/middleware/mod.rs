pub mod auth;
pub mod response;

pub use auth::{require_code, AuthUser, RouteGuard};
pub use response::{ApiResponse, ApiResult};
