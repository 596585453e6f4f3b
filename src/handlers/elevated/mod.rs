// Elevated handlers: operator endpoints guarded by dedicated resource codes
pub mod cache;
pub mod resources;

pub use cache::{role_cache_delete, user_cache_delete};
pub use resources::resources_get;
