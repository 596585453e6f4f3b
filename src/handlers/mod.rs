// handlers/mod.rs - Handlers grouped by the access they demand
//
// Public (no credential) -> Protected (any logged-in user) -> Elevated (specific resource codes)
// The codes themselves are declared in app.rs through the route registry.
pub mod public;
pub mod protected;
pub mod elevated;
