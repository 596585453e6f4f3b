mod common;

use std::time::Duration;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::Value;

use celestial_gate::cache::{keys, CacheStore};

#[tokio::test]
async fn missing_grant_is_unauthorized() -> Result<()> {
    let server = common::spawn_server().await?;
    // role 7 holds `project`, nothing for `resource:list`
    let token = server.login(42).await?;

    let res = reqwest::Client::new()
        .get(server.url("/api/auth/resources"))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let body = res.json::<Value>().await?;
    assert_eq!(body["code"], "FORBIDDEN");
    assert_eq!(body["message"], "Permission denied");
    Ok(())
}

#[tokio::test]
async fn resources_lists_registered_routes() -> Result<()> {
    let server = common::spawn_server().await?;
    let token = server.login(43).await?;

    let res = reqwest::Client::new()
        .get(server.url("/api/auth/resources"))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body = res.json::<Value>().await?;
    let codes = body["data"]["resourceCodes"].as_array().cloned().unwrap_or_default();
    assert!(codes.contains(&Value::from("resource:list")));
    assert!(codes.contains(&Value::from("role:dispatchresources")));
    assert!(!codes.contains(&Value::from("anon")));
    Ok(())
}

#[tokio::test]
async fn superadmin_passes_every_route() -> Result<()> {
    let server = common::spawn_server().await?;
    let token = server.login(1).await?;

    let res = reqwest::Client::new()
        .delete(server.url("/api/auth/cache/roles/7"))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn invalidated_role_cache_picks_up_directory_changes() -> Result<()> {
    let server = common::spawn_server().await?;
    let client = reqwest::Client::new();
    let user = server.login(42).await?;
    let operator = server.login(43).await?;

    // Warm the cache: user 42 holds only role 7
    let res = client
        .get(server.url("/api/auth/resources"))
        .bearer_auth(&user)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(server.cache.members(&keys::user_roles(42)).await?.contains(&"7".to_string()));

    // The directory changes; the cached set still says role 7 only
    server.directory.set_user_roles(42, [7, 9]);
    let res = client
        .get(server.url("/api/auth/resources"))
        .bearer_auth(&user)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .delete(server.url("/api/auth/cache/users/42"))
        .bearer_auth(&operator)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["data"]["removed"], true);

    let res = client
        .get(server.url("/api/auth/resources"))
        .bearer_auth(&user)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn allowed_request_slides_session_ttl() -> Result<()> {
    let server = common::spawn_server().await?;
    let token = server.login(42).await?;
    let session_id = celestial_gate::auth::CredentialVerifier::new(common::SECRET)
        .verify(&token)?
        .session_id;

    let res = reqwest::Client::new()
        .get(server.url("/api/auth/whoami"))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let ttl = server.cache.ttl(&keys::session(&session_id)).await;
    assert!(matches!(ttl, Some(t) if t > Duration::from_secs(590)));
    let role_ttl = server.cache.ttl(&keys::user_roles(42)).await;
    assert!(matches!(role_ttl, Some(t) if t > Duration::from_secs(3500)));
    Ok(())
}

#[tokio::test]
async fn directory_outage_on_cold_cache_is_server_error() -> Result<()> {
    let server = common::spawn_with(common::default_directory().failing()).await?;
    let token = server.login(42).await?;

    let res = reqwest::Client::new()
        .get(server.url("/api/auth/whoami"))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = res.json::<Value>().await?;
    assert_eq!(body["message"], "System error");
    Ok(())
}
