use clap::Subcommand;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::auth::{fingerprint, generate_jwt, Claims, CredentialVerifier, IssuedToken, SessionIssuer};
use crate::cache::RedisCache;
use crate::gate::SessionStore;
use crate::cli::utils::{output_error, output_success, print_fields};
use crate::cli::OutputFormat;
use crate::config;

#[derive(Subcommand)]
pub enum TokenCommands {
    #[command(about = "Sign a credential for a user and session")]
    Issue {
        #[arg(help = "User id (uid claim)")]
        user_id: u64,
        #[arg(long, help = "Existing session id (sid claim); if omitted a session is opened in CACHE_URL")]
        session: Option<String>,
        #[arg(long, help = "Tenant id (tid claim)")]
        tenant: Option<String>,
        #[arg(long, help = "Data scope as JSON (dataScope claim)")]
        scope: Option<String>,
        #[arg(long, help = "Lifetime in hours (defaults to SECURITY_TOKEN_EXPIRY_HOURS)")]
        hours: Option<u64>,
    },

    #[command(about = "Verify a credential and show its identity claims")]
    Inspect {
        #[arg(help = "Credential to verify")]
        token: String,
    },
}

pub async fn handle(cmd: TokenCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let secret = config::config().security.jwt_secret.clone();
    if secret.is_empty() {
        anyhow::bail!("JWT_SECRET must be set");
    }

    match cmd {
        TokenCommands::Issue { user_id, session, tenant, scope, hours } => {
            if user_id == 0 {
                anyhow::bail!("user id must be positive");
            }
            let hours = hours.unwrap_or(config::config().security.token_expiry_hours);
            let scope: Option<Value> = scope.map(|raw| serde_json::from_str(&raw)).transpose()?;

            let issued = match session {
                // Caller manages the session entry; only sign
                Some(session_id) => {
                    let mut claims = Claims::new(user_id, session_id.clone(), tenant, hours);
                    if let Some(scope) = scope {
                        claims = claims.with_data_scope(scope);
                    }
                    let token = generate_jwt(&claims, &secret)?;
                    IssuedToken { token, session_id, expires_at: claims.exp }
                }
                None => {
                    let url = &config::config().cache.url;
                    if url.is_empty() {
                        anyhow::bail!("CACHE_URL must be set to open a session");
                    }
                    let cache = RedisCache::connect(url).await?;
                    let sessions = SessionStore::new(Arc::new(cache), config::config().security.session_ttl());
                    SessionIssuer::new(sessions, secret.clone(), hours)
                        .issue(user_id, tenant, scope)
                        .await?
                }
            };

            match output_format {
                OutputFormat::Text => println!("{}", issued.token),
                OutputFormat::Json => output_success(
                    &output_format,
                    "Credential issued",
                    Some(json!({
                        "token": issued.token,
                        "sessionId": issued.session_id,
                        "expiresAt": issued.expires_at
                    })),
                )?,
            }
            Ok(())
        }
        TokenCommands::Inspect { token } => {
            let verifier = CredentialVerifier::new(&secret);
            match verifier.verify(&token) {
                Ok(claims) => {
                    let details = json!({
                        "userId": claims.user_id,
                        "sessionId": claims.session_id,
                        "tenantId": claims.tenant_id,
                        "dataScope": claims.data_scope,
                        "fingerprint": fingerprint(&token)
                    });
                    output_success(&output_format, "Credential is valid", Some(details.clone()))?;
                    if let OutputFormat::Text = output_format {
                        print_fields(&details);
                    }
                    Ok(())
                }
                Err(e) => {
                    output_error(&output_format, &e.to_string(), Some(e.error_code()))?;
                    std::process::exit(1);
                }
            }
        }
    }
}
