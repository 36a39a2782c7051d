//! Test server harness for E2E testing
//!
//! Provides TestSigningServer for spawning real signing service instances in tests.

use crate::token_builders::TestTokenBuilder;
use signing_service::config::Config;
use signing_service::crypto::SigningCredential;
use signing_service::routes::{self, AppState};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Test harness for spawning the signing service in E2E tests
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_me_e2e() -> Result<()> {
///     let server = TestSigningServer::spawn(Some(test_credential(1)?)).await?;
///     let token = server.issue_token(TestTokenBuilder::new().for_user("alice"))?;
///
///     let response = reqwest::Client::new()
///         .get(format!("{}/api/v1/me", server.url()))
///         .bearer_auth(token)
///         .send()
///         .await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestSigningServer {
    addr: SocketAddr,
    config: Config,
    credential: Option<SigningCredential>,
    _handle: JoinHandle<()>,
}

impl TestSigningServer {
    /// Spawn a server with default configuration around `credential`.
    pub async fn spawn(credential: Option<SigningCredential>) -> Result<Self, anyhow::Error> {
        let config = Config::from_vars(&HashMap::from([(
            "BIND_ADDRESS".to_string(),
            "127.0.0.1:0".to_string(),
        )]))?;

        Self::spawn_with_config(config, credential).await
    }

    /// Spawn a new test server instance
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Serve the real route table over `credential`
    /// - Start the HTTP server in the background
    pub async fn spawn_with_config(
        config: Config,
        credential: Option<SigningCredential>,
    ) -> Result<Self, anyhow::Error> {
        let state = Arc::new(AppState::new(config.clone(), credential.clone()));

        // Initialize metrics recorder for test server
        // Note: This may fail if already installed in the test process.
        // In that case, we create a new recorder without installing it globally.
        let metrics_handle = match routes::init_metrics_recorder() {
            Ok(handle) => handle,
            Err(_) => {
                use metrics_exporter_prometheus::PrometheusBuilder;
                let recorder = PrometheusBuilder::new().build_recorder();
                recorder.handle()
            }
        };

        let app = routes::build_routes(state, metrics_handle);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        // Spawn server in background
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            credential,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn credential(&self) -> Option<&SigningCredential> {
        self.credential.as_ref()
    }

    /// Sign `builder`'s claims for this server's audience and issuer.
    pub fn issue_token(&self, builder: TestTokenBuilder) -> Result<String, anyhow::Error> {
        let credential = self
            .credential
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Server has no signing credential"))?;

        let issuer = self
            .config
            .authority
            .as_deref()
            .unwrap_or(self.config.issuer_uri.as_str());

        let token = builder
            .for_audience(&self.config.api_name)
            .issued_by(issuer)
            .sign(credential)?;
        Ok(token)
    }
}

impl Drop for TestSigningServer {
    fn drop(&mut self) {
        // Abort the HTTP server task when the test completes.
        self._handle.abort();
    }
}
