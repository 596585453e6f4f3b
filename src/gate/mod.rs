// gate/mod.rs - Authorization gate
//
// Per request: verify credential -> confirm session -> resolve roles ->
// superadmin pre-pass -> scan role grants in ascending role order -> decide.
// Cache writes along the way (set warm-up, TTL refresh) are idempotent, so
// concurrent requests for the same user converge without locking.

pub mod error;
pub mod matcher;
pub mod permissions;
pub mod roles;
pub mod session;

use axum::http::HeaderMap;
use futures::future::{try_join, try_join_all};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::auth::{extract_credential, fingerprint, CredentialVerifier, SessionIssuer};
use crate::cache::{CacheStore, TimeoutCache};
use crate::config::AppConfig;
use crate::directory::{DataPermission, Directory};

pub use error::GateError;
pub use matcher::{any_grants, grants};
pub use permissions::PermissionResolver;
pub use roles::{ResolvedRoles, RoleResolver};
pub use session::SessionStore;

/// Route code meaning "no authorization at all"
pub const EXEMPT_CODE: &str = "anon";
/// Route code meaning "any logged-in user"
pub const LOGIN_ONLY_CODE: &str = "user";

/// What a route demands from its caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// `""` or `"anon"`: the gate is bypassed entirely
    Exempt,
    /// `"user"`: valid credential and live session, no grant needed
    LoginOnly,
    /// A hierarchical resource code such as `project:plan:add`
    Resource(String),
}

impl Requirement {
    pub fn parse(code: &str) -> Self {
        match code {
            "" | EXEMPT_CODE => Requirement::Exempt,
            LOGIN_ONLY_CODE => Requirement::LoginOnly,
            other => Requirement::Resource(other.to_string()),
        }
    }

    pub fn as_code(&self) -> &str {
        match self {
            Requirement::Exempt => EXEMPT_CODE,
            Requirement::LoginOnly => LOGIN_ONLY_CODE,
            Requirement::Resource(code) => code,
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

impl From<&str> for Requirement {
    fn from(code: &str) -> Self {
        Requirement::parse(code)
    }
}

/// Identity made available to handlers of an authorized request
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthContext {
    pub user_id: u64,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_scope: Option<Value>,
    pub roles: Vec<u64>,
    /// Widest row visibility among the user's roles
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_permission: Option<DataPermission>,
    pub is_superadmin: bool,
}

/// Successful outcome of the gate
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Exempt route; nothing was checked
    Bypass,
    Allow(AuthContext),
}

impl Decision {
    pub fn identity(&self) -> Option<&AuthContext> {
        match self {
            Decision::Bypass => None,
            Decision::Allow(ctx) => Some(ctx),
        }
    }
}

/// Union of a user's grants, as shown to front ends deciding what to render
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EffectivePermissions {
    pub is_superadmin: bool,
    pub resource_codes: Vec<String>,
}

/// Tunables for the gate, usually taken from `AppConfig`
#[derive(Debug, Clone)]
pub struct GateSettings {
    pub jwt_secret: String,
    pub superadmin_role_id: u64,
    pub token_expiry_hours: u64,
    pub session_ttl: Duration,
    pub role_ttl: Duration,
    pub permission_ttl: Duration,
    /// Zero disables the per-call bound
    pub op_timeout: Duration,
}

impl GateSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            jwt_secret: config.security.jwt_secret.clone(),
            superadmin_role_id: config.security.superadmin_role_id,
            token_expiry_hours: config.security.token_expiry_hours,
            session_ttl: config.security.session_ttl(),
            role_ttl: config.cache.role_ttl(),
            permission_ttl: config.cache.permission_ttl(),
            op_timeout: config.cache.op_timeout(),
        }
    }
}

/// Decides, per request, whether the caller may reach a route
#[derive(Clone)]
pub struct AuthorizationGate {
    verifier: CredentialVerifier,
    sessions: SessionStore,
    roles: RoleResolver,
    permissions: PermissionResolver,
    issuer: SessionIssuer,
    cache: Arc<dyn CacheStore>,
    superadmin_role_id: u64,
}

impl AuthorizationGate {
    pub fn new(settings: GateSettings, cache: Arc<dyn CacheStore>, directory: Arc<dyn Directory>) -> Self {
        let cache: Arc<dyn CacheStore> = if settings.op_timeout.is_zero() {
            cache
        } else {
            Arc::new(TimeoutCache::new(cache, settings.op_timeout))
        };

        let sessions = SessionStore::new(cache.clone(), settings.session_ttl);
        let issuer = SessionIssuer::new(
            sessions.clone(),
            settings.jwt_secret.clone(),
            settings.token_expiry_hours,
        );

        Self {
            verifier: CredentialVerifier::new(&settings.jwt_secret),
            roles: RoleResolver::new(cache.clone(), directory.clone(), settings.role_ttl),
            permissions: PermissionResolver::new(cache.clone(), directory, settings.permission_ttl),
            sessions,
            issuer,
            cache,
            superadmin_role_id: settings.superadmin_role_id,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn roles(&self) -> &RoleResolver {
        &self.roles
    }

    pub fn permissions(&self) -> &PermissionResolver {
        &self.permissions
    }

    pub fn issuer(&self) -> &SessionIssuer {
        &self.issuer
    }

    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        &self.cache
    }

    pub fn superadmin_role_id(&self) -> u64 {
        self.superadmin_role_id
    }

    /// Gate a request using its headers. Exempt routes never look at the headers.
    pub async fn authorize_headers(
        &self,
        required: &Requirement,
        headers: &HeaderMap,
    ) -> Result<Decision, GateError> {
        if *required == Requirement::Exempt {
            return Ok(Decision::Bypass);
        }
        let token = extract_credential(headers).map_err(|e| {
            warn!(required = %required, error = e.error_code(), "Authorization denied");
            e
        })?;
        self.authorize(required, &token).await
    }

    /// Gate a request carrying `token` against `required`
    #[tracing::instrument(
        name = "authorize",
        skip_all,
        fields(required = %required, user_id = tracing::field::Empty)
    )]
    pub async fn authorize(&self, required: &Requirement, token: &str) -> Result<Decision, GateError> {
        if *required == Requirement::Exempt {
            return Ok(Decision::Bypass);
        }

        match self.decide(required, token).await {
            Ok(ctx) => {
                debug!(user_id = ctx.user_id, superadmin = ctx.is_superadmin, "Authorization granted");
                Ok(Decision::Allow(ctx))
            }
            Err(e) => {
                if e.is_server_error() {
                    error!(error = %e, "Authorization failed closed");
                } else {
                    // Never the credential itself, only a digest for correlation
                    info!(
                        error = e.error_code(),
                        credential = %fingerprint(token),
                        "Authorization denied"
                    );
                }
                Err(e)
            }
        }
    }

    async fn decide(&self, required: &Requirement, token: &str) -> Result<AuthContext, GateError> {
        let claims = self.verifier.verify(token)?;
        tracing::Span::current().record("user_id", claims.user_id);

        self.sessions.validate(&claims.session_id, claims.user_id).await?;

        let ResolvedRoles { role_ids: roles, data_permission } =
            self.roles.roles_of(claims.user_id).await?;
        let is_superadmin = roles.contains(&self.superadmin_role_id);

        let mut scanned = Vec::new();
        let granted = match required {
            Requirement::Exempt | Requirement::LoginOnly => true,
            Requirement::Resource(_) if is_superadmin => true,
            Requirement::Resource(code) => {
                let mut granted = false;
                for role_id in &roles {
                    let held = self.permissions.permissions_of(*role_id).await?;
                    scanned.push(*role_id);
                    if any_grants(&held, code) {
                        debug!(role_id = *role_id, "Role grants required code");
                        granted = true;
                        break;
                    }
                }
                granted
            }
        };

        if !granted {
            return Err(GateError::Forbidden);
        }

        self.refresh_after_allow(&claims.session_id, claims.user_id, &scanned).await?;

        Ok(AuthContext {
            user_id: claims.user_id,
            session_id: claims.session_id,
            tenant_id: claims.tenant_id,
            data_scope: claims.data_scope,
            roles,
            data_permission,
            is_superadmin,
        })
    }

    /// Slide every key the decision relied on. A session that disappeared
    /// between validation and now (concurrent logout) turns the allow into a deny.
    async fn refresh_after_allow(
        &self,
        session_id: &str,
        user_id: u64,
        scanned_roles: &[u64],
    ) -> Result<(), GateError> {
        let (session_alive, _) =
            try_join(self.sessions.refresh(session_id), self.roles.refresh(user_id)).await?;
        if !session_alive {
            return Err(GateError::SessionNotFound);
        }
        try_join_all(scanned_roles.iter().map(|role_id| self.permissions.refresh(*role_id))).await?;
        Ok(())
    }

    /// Every resource code the user holds across roles, or the superadmin flag
    pub async fn effective_permissions(&self, user_id: u64) -> Result<EffectivePermissions, GateError> {
        let roles = self.roles.roles_of(user_id).await?.role_ids;
        if roles.contains(&self.superadmin_role_id) {
            return Ok(EffectivePermissions {
                is_superadmin: true,
                resource_codes: Vec::new(),
            });
        }

        let per_role = try_join_all(roles.iter().map(|role_id| self.permissions.permissions_of(*role_id))).await?;
        let mut codes: Vec<String> = per_role.into_iter().flatten().collect();
        codes.sort_unstable();
        codes.dedup();

        Ok(EffectivePermissions {
            is_superadmin: false,
            resource_codes: codes,
        })
    }

    /// End the session behind an authorized request
    pub async fn logout(&self, ctx: &AuthContext) -> Result<bool, GateError> {
        let removed = self.sessions.revoke(&ctx.session_id).await?;
        info!(user_id = ctx.user_id, "Session revoked");
        Ok(removed)
    }
}
