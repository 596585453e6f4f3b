// handlers/protected/auth/mod.rs - The caller's own identity, grants and session
pub mod permissions;
pub mod session;

pub use permissions::permissions_get;
pub use session::{logout, whoami};
