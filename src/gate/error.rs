use axum::http::StatusCode;
use thiserror::Error;

use crate::cache::CacheError;
use crate::directory::DirectoryError;

/// Every way the authorization gate can refuse a request
#[derive(Debug, Error)]
pub enum GateError {
    #[error("Missing or malformed credential")]
    MalformedCredential,

    #[error("Invalid signature or expired credential: {0}")]
    InvalidSignatureOrExpired(String),

    #[error("Credential carries an invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("Session not found")]
    SessionNotFound,

    #[error("Session does not belong to the credential's user")]
    SessionMismatch,

    #[error("Cache lookup failed: {0}")]
    LookupFailure(#[from] CacheError),

    #[error("No role grants the required resource code")]
    Forbidden,

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl GateError {
    /// HTTP status used when this error denies a request
    pub fn status_code(&self) -> StatusCode {
        match self {
            GateError::MalformedCredential => StatusCode::BAD_REQUEST,
            GateError::InvalidSignatureOrExpired(_)
            | GateError::InvalidIdentity(_)
            | GateError::SessionNotFound
            | GateError::SessionMismatch
            | GateError::Forbidden => StatusCode::UNAUTHORIZED,
            GateError::LookupFailure(_) | GateError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Short client-facing message; never carries internal detail
    pub fn public_message(&self) -> &'static str {
        match self {
            GateError::MalformedCredential => "Missing or malformed token",
            GateError::InvalidSignatureOrExpired(_) => "Invalid or expired token",
            GateError::InvalidIdentity(_) => "Invalid token identity",
            GateError::SessionNotFound => "Session expired",
            GateError::SessionMismatch => "Session does not match token",
            GateError::Forbidden => "Permission denied",
            GateError::LookupFailure(_) | GateError::InternalError(_) => "System error",
        }
    }

    /// Stable machine-readable code for clients
    pub fn error_code(&self) -> &'static str {
        match self {
            GateError::MalformedCredential => "MALFORMED_CREDENTIAL",
            GateError::InvalidSignatureOrExpired(_) => "INVALID_CREDENTIAL",
            GateError::InvalidIdentity(_) => "INVALID_IDENTITY",
            GateError::SessionNotFound => "SESSION_NOT_FOUND",
            GateError::SessionMismatch => "SESSION_MISMATCH",
            GateError::Forbidden => "FORBIDDEN",
            GateError::LookupFailure(_) => "LOOKUP_FAILURE",
            GateError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Server-side failures as opposed to a caller being turned away
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

impl From<DirectoryError> for GateError {
    fn from(err: DirectoryError) -> Self {
        GateError::InternalError(err.to_string())
    }
}
