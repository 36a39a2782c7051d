//! Integration tests for the JWKS endpoint

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use reqwest::StatusCode;
use rsa::traits::PublicKeyParts;
use signing_service::crypto::{SigningCredential, DEVELOPMENT_KEY_ID};
use signing_service::keys::Certificate;
use signing_service::models::Jwks;
use signing_test_utils::{test_rsa_key, TestCertificateBuilder, TestSigningServer};

/// Returns the status, the Cache-Control header and the parsed key set.
async fn fetch_jwks(
    server: &TestSigningServer,
) -> Result<(StatusCode, Option<String>, Jwks), anyhow::Error> {
    let response = reqwest::Client::new()
        .get(format!("{}/.well-known/jwks.json", server.url()))
        .send()
        .await?;

    let status = response.status();
    let cache_control = response
        .headers()
        .get("cache-control")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let jwks: Jwks = response.json().await?;

    Ok((status, cache_control, jwks))
}

/// A development key is published under its fixed key id.
#[tokio::test]
async fn test_jwks_publishes_development_key() -> Result<(), anyhow::Error> {
    // Arrange
    let key = test_rsa_key(1)?;
    let expected_n = URL_SAFE_NO_PAD.encode(key.n().to_bytes_be());
    let server = TestSigningServer::spawn(Some(SigningCredential::development(key))).await?;

    // Act
    let (status, cache_control, jwks) = fetch_jwks(&server).await?;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache_control.as_deref(), Some("max-age=3600"));

    assert_eq!(jwks.keys.len(), 1, "Exactly one key should be published");
    let jwk = &jwks.keys[0];
    assert_eq!(jwk.kid.as_deref(), Some(DEVELOPMENT_KEY_ID));
    assert_eq!(jwk.kty, "RSA");
    assert_eq!(jwk.use_, "sig");
    assert_eq!(jwk.alg, "RS256");
    assert_eq!(jwk.n, expected_n);
    assert_eq!(jwk.e, "AQAB");

    Ok(())
}

/// A certificate-backed key is published without a key id.
#[tokio::test]
async fn test_jwks_publishes_certificate_key_without_kid() -> Result<(), anyhow::Error> {
    // Arrange
    let cert = TestCertificateBuilder::new("jwks.test").with_key(2).build()?;
    let certificate = Certificate::from_parts(&cert.der, &cert.key_pkcs8_der()?)?;
    let server =
        TestSigningServer::spawn(Some(SigningCredential::from_certificate(certificate))).await?;

    // Act
    let (_, _, jwks) = fetch_jwks(&server).await?;

    // Assert
    assert_eq!(jwks.keys.len(), 1);
    assert!(jwks.keys[0].kid.is_none(), "Certificate keys carry no kid");

    Ok(())
}

/// Nothing is published when no key was configured.
#[tokio::test]
async fn test_jwks_empty_without_credential() -> Result<(), anyhow::Error> {
    let server = TestSigningServer::spawn(None).await?;

    let (status, _, jwks) = fetch_jwks(&server).await?;

    assert_eq!(status, StatusCode::OK);
    assert!(jwks.keys.is_empty());

    Ok(())
}
