pub mod verifier;

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::gate::session::SessionStore;
use crate::gate::GateError;

pub use verifier::{extract_credential, fingerprint, CredentialVerifier, VerifiedClaims};

/// Claims written into issued credentials
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub uid: String,
    pub sid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tid: Option<String>,
    #[serde(default, rename = "dataScope", skip_serializing_if = "Option::is_none")]
    pub data_scope: Option<Value>,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: u64, session_id: String, tenant_id: Option<String>, expiry_hours: u64) -> Self {
        let now = Utc::now();
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            uid: user_id.to_string(),
            sid: session_id,
            tid: tenant_id,
            data_scope: None,
            exp,
            iat: now.timestamp(),
        }
    }

    pub fn with_data_scope(mut self, scope: Value) -> Self {
        self.data_scope = Some(scope);
        self
    }
}

#[derive(Debug)]
pub enum JwtError {
    TokenGeneration(String),
    InvalidSecret,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::TokenGeneration(msg) => write!(f, "JWT generation error: {}", msg),
            JwtError::InvalidSecret => write!(f, "Invalid JWT secret"),
        }
    }
}

impl std::error::Error for JwtError {}

pub fn generate_jwt(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    let header = Header::default();

    encode(&header, claims, &encoding_key)
        .map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

/// A freshly opened session and the credential bound to it
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub session_id: String,
    pub expires_at: i64,
}

/// Opens sessions for the login flow: stores `session -> user` and signs the
/// credential that points at it
#[derive(Clone)]
pub struct SessionIssuer {
    sessions: SessionStore,
    secret: String,
    expiry_hours: u64,
}

impl SessionIssuer {
    pub fn new(sessions: SessionStore, secret: impl Into<String>, expiry_hours: u64) -> Self {
        Self {
            sessions,
            secret: secret.into(),
            expiry_hours,
        }
    }

    pub async fn issue(
        &self,
        user_id: u64,
        tenant_id: Option<String>,
        data_scope: Option<Value>,
    ) -> Result<IssuedToken, GateError> {
        let session_id = self.sessions.open(user_id).await?;

        let mut claims = Claims::new(user_id, session_id.clone(), tenant_id, self.expiry_hours);
        if let Some(scope) = data_scope {
            claims = claims.with_data_scope(scope);
        }

        let token = match generate_jwt(&claims, &self.secret) {
            Ok(token) => token,
            Err(e) => {
                // Do not leave an orphaned session behind
                if let Err(revoke_err) = self.sessions.revoke(&session_id).await {
                    tracing::warn!("Failed to drop session after signing error: {}", revoke_err);
                }
                return Err(GateError::InternalError(e.to_string()));
            }
        };

        tracing::info!("Issued session for user {}", user_id);
        Ok(IssuedToken {
            token,
            session_id,
            expires_at: claims.exp,
        })
    }
}
