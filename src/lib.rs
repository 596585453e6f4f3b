pub mod app;
pub mod auth;
pub mod cache;
pub mod cli;
pub mod config;
pub mod database;
pub mod directory;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod middleware;
pub mod routes;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use app::app;
