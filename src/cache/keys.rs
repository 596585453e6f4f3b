// Cache key layout shared with the login service that opens sessions.

pub const SESSION_PREFIX: &str = "sessionId:";
pub const USER_ROLES_PREFIX: &str = "userRole:";
pub const ROLE_RESOURCE_CODES_PREFIX: &str = "roleResourceCode:";
pub const USER_DATA_PERMISSION_PREFIX: &str = "userDataPerm:";

pub fn session(session_id: &str) -> String {
    format!("{}{}", SESSION_PREFIX, session_id)
}

pub fn user_roles(user_id: u64) -> String {
    format!("{}{}", USER_ROLES_PREFIX, user_id)
}

pub fn user_data_permission(user_id: u64) -> String {
    format!("{}{}", USER_DATA_PERMISSION_PREFIX, user_id)
}

pub fn role_resource_codes(role_id: u64) -> String {
    format!("{}{}", ROLE_RESOURCE_CODES_PREFIX, role_id)
}
