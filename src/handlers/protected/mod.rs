// handlers/protected/mod.rs - Endpoints for any caller with a live session
pub mod auth;

pub use auth::*;
