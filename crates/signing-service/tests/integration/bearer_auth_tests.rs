//! Integration tests for bearer token validation on the local API
//!
//! Tokens are signed with the same credential the server provisioned and
//! presented to `/api/v1/me`, which echoes the mapped principal.

use reqwest::StatusCode;
use serde_json::Value;
use signing_service::config::Config;
use signing_service::models::MeResponse;
use signing_test_utils::{test_credential, TestSigningServer, TestTokenBuilder, TokenAssertions};
use std::collections::HashMap;

async fn get_me(
    server: &TestSigningServer,
    token: Option<&str>,
) -> Result<reqwest::Response, anyhow::Error> {
    let mut request = reqwest::Client::new().get(format!("{}/api/v1/me", server.url()));
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }
    Ok(request.send().await?)
}

fn config_with(pairs: &[(&str, &str)]) -> Result<Config, anyhow::Error> {
    let mut vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    vars.insert("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string());
    Ok(Config::from_vars(&vars)?)
}

// ============================================================================
// Accepted tokens
// ============================================================================

/// A token from the provisioned key maps name and roles onto the principal.
#[tokio::test]
async fn test_valid_token_yields_principal() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestSigningServer::spawn(Some(test_credential(1)?)).await?;
    let token = server.issue_token(
        TestTokenBuilder::new()
            .for_user("user-42")
            .with_name("alice")
            .with_role("reader")
            .with_role("writer"),
    )?;
    token
        .assert_valid_jwt()
        .assert_signed_by("Development")
        .assert_has_role("writer");

    // Act
    let response = get_me(&server, Some(&token)).await?;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let me: MeResponse = response.json().await?;
    assert_eq!(me.name.as_deref(), Some("alice"));
    assert_eq!(me.roles, vec!["reader".to_string(), "writer".to_string()]);
    assert_eq!(me.subject.as_deref(), Some("user-42"));

    Ok(())
}

/// With AUTHORITY configured, tokens issued under that authority are accepted.
#[tokio::test]
async fn test_configured_authority_is_accepted_issuer() -> Result<(), anyhow::Error> {
    let config = config_with(&[("AUTHORITY", "https://login.example.test")])?;
    let server = TestSigningServer::spawn_with_config(config, Some(test_credential(1)?)).await?;

    let token = TestTokenBuilder::new()
        .for_audience("LocalApi")
        .issued_by("https://login.example.test")
        .sign(server.credential().expect("credential"))?;

    let response = get_me(&server, Some(&token)).await?;
    assert_eq!(response.status(), StatusCode::OK);

    Ok(())
}

// ============================================================================
// Rejected tokens
// ============================================================================

/// A missing Authorization header is a 401 with a Bearer challenge.
#[tokio::test]
async fn test_missing_token_is_unauthorized() -> Result<(), anyhow::Error> {
    let server = TestSigningServer::spawn(Some(test_credential(1)?)).await?;

    let response = get_me(&server, None).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let challenge = response
        .headers()
        .get("www-authenticate")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(challenge.starts_with("Bearer"), "got challenge {challenge:?}");

    let body: Value = response.json().await?;
    assert_eq!(body["error"]["code"], "INVALID_TOKEN");

    Ok(())
}

/// Audience, issuer, lifetime and signing key are each enforced.
#[tokio::test]
async fn test_invalid_tokens_are_unauthorized() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestSigningServer::spawn(Some(test_credential(1)?)).await?;
    let credential = server.credential().expect("credential").clone();
    let foreign = test_credential(2)?;

    let cases = [
        (
            "wrong audience",
            TestTokenBuilder::new()
                .for_audience("OtherApi")
                .sign(&credential)?,
        ),
        (
            "foreign issuer",
            TestTokenBuilder::new()
                .issued_by("https://attacker.test")
                .sign(&credential)?,
        ),
        (
            "expired",
            server.issue_token(TestTokenBuilder::new().expires_in(-600))?,
        ),
        (
            "foreign key",
            TestTokenBuilder::new().sign(&foreign)?,
        ),
        ("garbage", "not.a.jwt".to_string()),
    ];

    for (case, token) in cases {
        // Act
        let response = get_me(&server, Some(&token)).await?;

        // Assert
        assert_eq!(
            response.status(),
            StatusCode::UNAUTHORIZED,
            "{case} token should be rejected"
        );
    }

    Ok(())
}

/// Without a provisioned key, validation cannot be resolved and the API is unavailable.
#[tokio::test]
async fn test_no_credential_is_service_unavailable() -> Result<(), anyhow::Error> {
    let server = TestSigningServer::spawn(None).await?;
    let token = TestTokenBuilder::new().sign(&test_credential(1)?)?;

    let response = get_me(&server, Some(&token)).await?;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json().await?;
    assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");

    Ok(())
}

/// A collaborator outage is reported as 503 and recovers on the next request.
#[tokio::test]
async fn test_resolution_recovers_after_collaborator_failure() -> Result<(), anyhow::Error> {
    use signing_service::auth::{DeferredTokenValidationResolver, TokenValidationOptions};
    use signing_service::errors::AuthError;
    use signing_test_utils::mock::{MockCredentialStore, MockIssuerNameService};
    use std::sync::Arc;

    // Arrange
    let credential = test_credential(1)?;
    let store = Arc::new(MockCredentialStore::returning(credential.clone()).failing_first(1));
    let issuer = Arc::new(MockIssuerNameService::returning("https://issuer.test"));
    let resolver = DeferredTokenValidationResolver::new(
        TokenValidationOptions::for_local_api("LocalApi", None),
        store.clone(),
        issuer.clone(),
    );
    let token = TestTokenBuilder::new()
        .issued_by("https://issuer.test")
        .sign(&credential)?;

    // Act
    let first = resolver.validate(&token).await;
    let second = resolver.validate(&token).await;
    let third = resolver.validate(&token).await;

    // Assert
    assert!(matches!(first, Err(AuthError::ResolutionFailed(_))));
    assert!(second.is_ok());
    assert!(third.is_ok());
    assert_eq!(store.call_count(), 2, "one failed call and one successful call");
    assert_eq!(issuer.call_count(), 1);

    Ok(())
}
