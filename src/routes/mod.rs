// routes/mod.rs - Explicit route registry
//
// Every protected route is declared here together with the resource code it
// demands. The registry is built once at startup and handed to the router;
// there is no process-global table of codes.

use axum::{
    handler::Handler,
    middleware::from_fn_with_state,
    routing::{self, MethodRouter},
    Router,
};
use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;

use crate::gate::matcher::SEGMENT_SEPARATOR;
use crate::gate::{AuthorizationGate, Requirement};
use crate::middleware::{require_code, RouteGuard};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Route {method} {path} is registered twice")]
    DuplicateRoute { method: &'static str, path: String },

    #[error("Route {method} {path} declares invalid resource code '{code}'")]
    InvalidCode {
        method: &'static str,
        path: String,
        code: String,
    },
}

/// One row of the route table: who may call what
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RegisteredRoute {
    pub method: &'static str,
    pub path: String,
    pub code: String,
}

/// Registered routes, shared with handlers that describe the API
#[derive(Debug, Clone, Default, Serialize)]
pub struct RouteTable {
    pub routes: Vec<RegisteredRoute>,
}

impl RouteTable {
    /// Distinct resource codes demanded by any route, sorted
    pub fn resource_codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = self
            .routes
            .iter()
            .filter(|r| matches!(Requirement::parse(&r.code), Requirement::Resource(_)))
            .map(|r| r.code.clone())
            .collect();
        codes.sort_unstable();
        codes.dedup();
        codes
    }
}

struct Pending {
    method: &'static str,
    path: String,
    required: Requirement,
    handler: MethodRouter,
}

/// Builder collecting `(method, path, code, handler)` declarations
pub struct RouteRegistry {
    gate: AuthorizationGate,
    pending: Vec<Pending>,
}

impl RouteRegistry {
    pub fn builder(gate: AuthorizationGate) -> Self {
        Self {
            gate,
            pending: Vec::new(),
        }
    }

    pub fn get<H, T>(self, path: &str, code: &str, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.register("GET", path, code, routing::get(handler))
    }

    pub fn post<H, T>(self, path: &str, code: &str, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.register("POST", path, code, routing::post(handler))
    }

    pub fn put<H, T>(self, path: &str, code: &str, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.register("PUT", path, code, routing::put(handler))
    }

    pub fn delete<H, T>(self, path: &str, code: &str, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.register("DELETE", path, code, routing::delete(handler))
    }

    fn register(mut self, method: &'static str, path: &str, code: &str, handler: MethodRouter) -> Self {
        self.pending.push(Pending {
            method,
            path: path.to_string(),
            required: Requirement::parse(code),
            handler,
        });
        self
    }

    /// Validate every declaration and assemble the guarded router
    pub fn build(self) -> Result<(Router, RouteTable), RegistryError> {
        let mut seen = HashSet::new();
        let mut router = Router::new();
        let mut table = RouteTable::default();

        for Pending { method, path, required, handler } in self.pending {
            if !seen.insert((method, path.clone())) {
                return Err(RegistryError::DuplicateRoute { method, path });
            }
            if let Requirement::Resource(code) = &required {
                if !is_valid_code(code) {
                    return Err(RegistryError::InvalidCode {
                        method,
                        path,
                        code: code.clone(),
                    });
                }
            }

            table.routes.push(RegisteredRoute {
                method,
                path: path.clone(),
                code: required.as_code().to_string(),
            });

            let handler = match required {
                Requirement::Exempt => handler,
                _ => handler.route_layer(from_fn_with_state(
                    RouteGuard::new(self.gate.clone(), required),
                    require_code,
                )),
            };
            // Same path with another method merges into one method router
            router = router.route(&path, handler);
        }

        tracing::info!("Registered {} routes", table.routes.len());
        Ok((router, table))
    }
}

/// Non-empty lowercase segments, no surrounding whitespace. Stored grants are
/// lowercase and matching is exact, so a mixed-case route code could never be granted.
fn is_valid_code(code: &str) -> bool {
    code.split(SEGMENT_SEPARATOR).all(|segment| {
        !segment.is_empty() && segment.trim() == segment && !segment.chars().any(char::is_uppercase)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::gate::GateSettings;
    use crate::testing::StaticDirectory;
    use std::sync::Arc;
    use std::time::Duration;

    fn gate() -> AuthorizationGate {
        let settings = GateSettings {
            jwt_secret: "registry-secret".into(),
            superadmin_role_id: 1,
            token_expiry_hours: 1,
            session_ttl: Duration::from_secs(60),
            role_ttl: Duration::from_secs(60),
            permission_ttl: Duration::from_secs(60),
            op_timeout: Duration::ZERO,
        };
        AuthorizationGate::new(settings, Arc::new(MemoryCache::new()), Arc::new(StaticDirectory::new()))
    }

    async fn ok() -> &'static str {
        "ok"
    }

    #[test]
    fn validates_codes() {
        assert!(is_valid_code("project"));
        assert!(is_valid_code("project:detail:plan:add"));
        assert!(!is_valid_code("project::add"));
        assert!(!is_valid_code("project:"));
        assert!(!is_valid_code(" project"));
        assert!(!is_valid_code("user:dispatchRoles"));
        assert!(!is_valid_code("Project"));
    }

    #[test]
    fn builds_table_in_declaration_order() {
        let (_, table) = RouteRegistry::builder(gate())
            .get("/api/project", "project:list", ok)
            .post("/api/project", "project:add", ok)
            .get("/api/ping", "anon", ok)
            .get("/api/me", "user", ok)
            .build()
            .unwrap();

        assert_eq!(table.routes.len(), 4);
        assert_eq!(table.routes[1].method, "POST");
        assert_eq!(table.routes[2].code, "anon");
        assert_eq!(table.resource_codes(), vec!["project:add", "project:list"]);
    }

    #[test]
    fn rejects_duplicates_and_bad_codes() {
        let err = RouteRegistry::builder(gate())
            .get("/a", "x", ok)
            .get("/a", "y", ok)
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateRoute { .. }));

        let err = RouteRegistry::builder(gate())
            .get("/a", "project::add", ok)
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidCode { .. }));

        let err = RouteRegistry::builder(gate())
            .delete("/api/users/:id/roles", "user:dispatchRoles", ok)
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidCode { ref code, .. } if code == "user:dispatchRoles"));
    }
}
