use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub security: SecurityConfig,
    pub cache: CacheConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// HS256 signing secret shared with the credential issuer
    pub jwt_secret: String,
    /// Role id that satisfies every resource code
    pub superadmin_role_id: u64,
    /// Sliding session window, re-armed by every authorized request
    pub session_ttl_secs: u64,
    /// Lifetime stamped into freshly issued credentials
    pub token_expiry_hours: u64,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Shared cache holding sessions, e.g. `redis://127.0.0.1:6379/0`
    pub url: String,
    pub role_ttl_secs: u64,
    pub permission_ttl_secs: u64,
    /// Upper bound for any single cache round trip
    pub op_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub enable_request_logging: bool,
}

const THREE_DAYS_SECS: u64 = 3 * 24 * 60 * 60;

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_SUPERADMIN_ROLE_ID") {
            self.security.superadmin_role_id = v.parse().unwrap_or(self.security.superadmin_role_id);
        }
        if let Ok(v) = env::var("SECURITY_SESSION_TTL_SECS") {
            self.security.session_ttl_secs = v.parse().unwrap_or(self.security.session_ttl_secs);
        }
        if let Ok(v) = env::var("SECURITY_TOKEN_EXPIRY_HOURS") {
            self.security.token_expiry_hours = v.parse().unwrap_or(self.security.token_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }

        // Cache overrides
        if let Ok(v) = env::var("CACHE_URL") {
            self.cache.url = v;
        }
        if let Ok(v) = env::var("CACHE_ROLE_TTL_SECS") {
            self.cache.role_ttl_secs = v.parse().unwrap_or(self.cache.role_ttl_secs);
        }
        if let Ok(v) = env::var("CACHE_PERMISSION_TTL_SECS") {
            self.cache.permission_ttl_secs = v.parse().unwrap_or(self.cache.permission_ttl_secs);
        }
        if let Ok(v) = env::var("CACHE_OP_TIMEOUT_MS") {
            self.cache.op_timeout_ms = v.parse().unwrap_or(self.cache.op_timeout_ms);
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // API overrides
        if let Ok(v) = env::var("GATE_PORT").or_else(|_| env::var("PORT")) {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            security: SecurityConfig {
                jwt_secret: "celestial-dev-secret".to_string(),
                superadmin_role_id: 1,
                session_ttl_secs: 2 * 60 * 60,
                token_expiry_hours: 24 * 7, // 1 week
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
            },
            cache: CacheConfig {
                url: "redis://127.0.0.1:6379/0".to_string(),
                role_ttl_secs: THREE_DAYS_SECS,
                permission_ttl_secs: THREE_DAYS_SECS,
                op_timeout_ms: 1000,
            },
            database: DatabaseConfig {
                max_connections: 10,
                connection_timeout: 30,
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: true,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            security: SecurityConfig {
                // Must be supplied through JWT_SECRET
                jwt_secret: String::new(),
                superadmin_role_id: 1,
                session_ttl_secs: 2 * 60 * 60,
                token_expiry_hours: 24,
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
            },
            cache: CacheConfig {
                // Must be supplied through CACHE_URL
                url: String::new(),
                role_ttl_secs: THREE_DAYS_SECS,
                permission_ttl_secs: THREE_DAYS_SECS,
                op_timeout_ms: 500,
            },
            database: DatabaseConfig {
                max_connections: 20,
                connection_timeout: 10,
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: true,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            security: SecurityConfig {
                jwt_secret: String::new(),
                superadmin_role_id: 1,
                session_ttl_secs: 60 * 60,
                token_expiry_hours: 12,
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
            },
            cache: CacheConfig {
                url: String::new(),
                role_ttl_secs: THREE_DAYS_SECS,
                permission_ttl_secs: THREE_DAYS_SECS,
                op_timeout_ms: 250,
            },
            database: DatabaseConfig {
                max_connections: 50,
                connection_timeout: 5,
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: false,
            },
        }
    }
}

impl SecurityConfig {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

impl CacheConfig {
    pub fn role_ttl(&self) -> Duration {
        Duration::from_secs(self.role_ttl_secs)
    }

    pub fn permission_ttl(&self) -> Duration {
        Duration::from_secs(self.permission_ttl_secs)
    }

    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_production {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Production)
    };
}
