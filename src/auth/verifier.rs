use axum::http::{header, HeaderMap, HeaderValue};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::gate::GateError;

/// Cookie consulted when no Authorization header is sent
pub const TOKEN_COOKIE: &str = "token";

/// Claims as they appear on the wire. Identity fields stay loosely typed here
/// so a wrong type is reported as an identity problem, not a parse failure.
#[derive(Debug, Deserialize)]
struct RawClaims {
    #[serde(default)]
    uid: Option<Value>,
    #[serde(default)]
    sid: Option<Value>,
    #[serde(default)]
    tid: Option<Value>,
    #[serde(default, rename = "dataScope")]
    data_scope: Option<Value>,
}

/// Typed identity extracted from a verified credential
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedClaims {
    pub user_id: u64,
    pub session_id: String,
    pub tenant_id: Option<String>,
    /// Forwarded untouched for downstream data filtering
    pub data_scope: Option<Value>,
}

impl VerifiedClaims {
    pub fn has_tenant(&self) -> bool {
        self.tenant_id.is_some()
    }
}

/// Checks HS256 signature and expiry, then validates the identity claims.
/// Performs no I/O.
#[derive(Clone)]
pub struct CredentialVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl CredentialVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        // Login issues credentials without `exp` and relies on the session TTL;
        // an `exp` that is present is still enforced
        validation.required_spec_claims.clear();
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<VerifiedClaims, GateError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(GateError::MalformedCredential);
        }

        let data = decode::<RawClaims>(token, &self.key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidToken
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_) => GateError::MalformedCredential,
                _ => GateError::InvalidSignatureOrExpired(e.to_string()),
            }
        })?;

        let raw = data.claims;
        let user_id = parse_user_id(raw.uid.as_ref())?;
        let session_id = match raw.sid {
            Some(Value::String(s)) if !s.trim().is_empty() => s,
            _ => return Err(GateError::InvalidIdentity("missing session id".to_string())),
        };
        // A tenant claim that is not a non-empty string is treated as absent
        let tenant_id = match raw.tid {
            Some(Value::String(s)) if !s.is_empty() => Some(s),
            _ => None,
        };

        Ok(VerifiedClaims {
            user_id,
            session_id,
            tenant_id,
            data_scope: raw.data_scope.filter(|v| !v.is_null()),
        })
    }
}

fn parse_user_id(value: Option<&Value>) -> Result<u64, GateError> {
    let text = match value {
        Some(Value::String(s)) => s.as_str(),
        Some(other) => {
            return Err(GateError::InvalidIdentity(format!(
                "user id must be a numeric string, got {}",
                other
            )))
        }
        None => return Err(GateError::InvalidIdentity("missing user id".to_string())),
    };

    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(GateError::InvalidIdentity(format!("non-numeric user id '{}'", text)));
    }
    match text.parse::<u64>() {
        Ok(0) | Err(_) => Err(GateError::InvalidIdentity(format!("unusable user id '{}'", text))),
        Ok(id) => Ok(id),
    }
}

/// Pull the raw credential from the `Authorization` header, with or without a
/// `Bearer ` prefix, falling back to the `token` cookie when the header is
/// absent or carries another scheme.
pub fn extract_credential(headers: &HeaderMap) -> Result<String, GateError> {
    if let Some(token) = headers.get(header::AUTHORIZATION).and_then(header_credential) {
        return Ok(token);
    }

    for value in headers.get_all(header::COOKIE) {
        let Ok(cookies) = value.to_str() else { continue };
        for pair in cookies.split(';') {
            if let Some((name, token)) = pair.trim().split_once('=') {
                if name == TOKEN_COOKIE && !token.is_empty() {
                    return Ok(token.to_string());
                }
            }
        }
    }

    Err(GateError::MalformedCredential)
}

fn header_credential(value: &HeaderValue) -> Option<String> {
    let value = value.to_str().ok()?.trim();
    let token = match value.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        Some(_) => return None,
        None if value.eq_ignore_ascii_case("bearer") => return None,
        None => value,
    };
    (!token.is_empty()).then(|| token.to_string())
}

/// Short digest for correlating log lines without recording the credential
pub fn fingerprint(token: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(token.as_bytes()));
    digest[..12].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &str = "verifier-test-secret";

    fn sign(claims: Value, secret: &str) -> String {
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    fn future_exp() -> i64 {
        Utc::now().timestamp() + 3600
    }

    #[test]
    fn verifies_well_formed_credential() {
        let token = sign(
            json!({"uid": "42", "sid": "s-1", "tid": "acme", "dataScope": 2, "exp": future_exp()}),
            SECRET,
        );
        let claims = CredentialVerifier::new(SECRET).verify(&token).unwrap();
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.session_id, "s-1");
        assert_eq!(claims.tenant_id.as_deref(), Some("acme"));
        assert!(claims.has_tenant());
        assert_eq!(claims.data_scope, Some(json!(2)));
    }

    #[test]
    fn tenant_is_optional() {
        let token = sign(json!({"uid": "42", "sid": "s-1", "exp": future_exp()}), SECRET);
        let claims = CredentialVerifier::new(SECRET).verify(&token).unwrap();
        assert!(!claims.has_tenant());
    }

    #[test]
    fn rejects_foreign_signature() {
        let token = sign(json!({"uid": "42", "sid": "s-1", "exp": future_exp()}), "other-secret");
        let err = CredentialVerifier::new(SECRET).verify(&token).unwrap_err();
        assert!(matches!(err, GateError::InvalidSignatureOrExpired(_)));
    }

    #[test]
    fn rejects_tampered_payload() {
        let token = sign(json!({"uid": "42", "sid": "s-1", "exp": future_exp()}), SECRET);
        let forged = sign(json!({"uid": "1", "sid": "s-1", "exp": future_exp()}), SECRET);
        // Splice the forged payload onto the original signature
        let parts: Vec<&str> = token.split('.').collect();
        let forged_parts: Vec<&str> = forged.split('.').collect();
        let tampered = format!("{}.{}.{}", parts[0], forged_parts[1], parts[2]);

        let err = CredentialVerifier::new(SECRET).verify(&tampered).unwrap_err();
        assert!(matches!(err, GateError::InvalidSignatureOrExpired(_)));
    }

    #[test]
    fn accepts_credential_without_expiry() {
        // Shape written by the login service: identity claims only
        let token = sign(json!({"uid": "42", "sid": "x", "tid": "1"}), SECRET);
        let claims = CredentialVerifier::new(SECRET).verify(&token).unwrap();
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.session_id, "x");
        assert_eq!(claims.tenant_id.as_deref(), Some("1"));
    }

    #[test]
    fn rejects_expired_credential() {
        let token = sign(json!({"uid": "42", "sid": "s-1", "exp": Utc::now().timestamp() - 10}), SECRET);
        let err = CredentialVerifier::new(SECRET).verify(&token).unwrap_err();
        assert!(matches!(err, GateError::InvalidSignatureOrExpired(_)));
    }

    #[test]
    fn garbage_is_malformed() {
        let verifier = CredentialVerifier::new(SECRET);
        assert!(matches!(verifier.verify("not-a-jwt"), Err(GateError::MalformedCredential)));
        assert!(matches!(verifier.verify("   "), Err(GateError::MalformedCredential)));
    }

    #[test]
    fn rejects_non_numeric_user_ids() {
        let verifier = CredentialVerifier::new(SECRET);
        for uid in [json!("abc"), json!(""), json!("0"), json!(42), json!("-3")] {
            let token = sign(json!({"uid": uid, "sid": "s-1", "exp": future_exp()}), SECRET);
            let err = verifier.verify(&token).unwrap_err();
            assert!(matches!(err, GateError::InvalidIdentity(_)), "uid {} gave {:?}", uid, err);
        }
    }

    #[test]
    fn rejects_missing_session_id() {
        let token = sign(json!({"uid": "42", "exp": future_exp()}), SECRET);
        let err = CredentialVerifier::new(SECRET).verify(&token).unwrap_err();
        assert!(matches!(err, GateError::InvalidIdentity(_)));
    }

    #[test]
    fn extracts_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(extract_credential(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn falls_back_to_token_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; token=abc.def.ghi"));
        assert_eq!(extract_credential(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn accepts_bare_header_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("abc.def.ghi"));
        assert_eq!(extract_credential(&headers).unwrap(), "abc.def.ghi");

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("bearer abc.def.ghi"));
        assert_eq!(extract_credential(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn other_scheme_falls_through_to_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic xyz"));
        headers.insert(header::COOKIE, HeaderValue::from_static("token=abc.def.ghi"));
        assert_eq!(extract_credential(&headers).unwrap(), "abc.def.ghi");

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_credential(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn missing_or_unusable_transport_is_malformed() {
        assert!(matches!(extract_credential(&HeaderMap::new()), Err(GateError::MalformedCredential)));

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert!(matches!(extract_credential(&headers), Err(GateError::MalformedCredential)));

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(matches!(extract_credential(&headers), Err(GateError::MalformedCredential)));

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("token="));
        assert!(matches!(extract_credential(&headers), Err(GateError::MalformedCredential)));
    }

    #[test]
    fn fingerprint_is_short_and_stable() {
        assert_eq!(fingerprint("abc"), fingerprint("abc"));
        assert_eq!(fingerprint("abc").len(), 12);
        assert_ne!(fingerprint("abc"), fingerprint("abd"));
    }
}
