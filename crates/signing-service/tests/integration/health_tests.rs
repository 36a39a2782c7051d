//! Integration tests for the liveness and metrics endpoints

use reqwest::StatusCode;
use signing_test_utils::{test_credential, TestSigningServer, TestTokenBuilder};

/// `/health` answers 200 OK whether or not a key was provisioned.
#[tokio::test]
async fn test_health_endpoint_returns_ok() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestSigningServer::spawn(None).await?;

    // Act
    let response = reqwest::Client::new()
        .get(format!("{}/health", server.url()))
        .send()
        .await?;

    // Assert
    assert_eq!(
        response.status(),
        StatusCode::OK,
        "Health check should return 200 OK"
    );
    assert_eq!(response.text().await?, "OK", "Health check body should be 'OK'");

    Ok(())
}

/// `/metrics` serves Prometheus text without authentication.
#[tokio::test]
async fn test_metrics_endpoint_is_public() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestSigningServer::spawn(Some(test_credential(1)?)).await?;
    let client = reqwest::Client::new();

    let token = server.issue_token(TestTokenBuilder::new().for_user("metrics-probe"))?;
    client
        .get(format!("{}/api/v1/me", server.url()))
        .bearer_auth(token)
        .send()
        .await?;

    // Act
    let response = client
        .get(format!("{}/metrics", server.url()))
        .send()
        .await?;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.text().await?;
    assert!(
        !body.contains("metrics-probe"),
        "Metrics must not carry principal data"
    );

    Ok(())
}
