//! HTTP routes for the signing service.
//!
//! Defines the Axum router and application state.

use crate::auth::{
    DeferredTokenValidationResolver, InMemoryCredentialStore, StaticIssuerNameService,
    TokenValidationOptions,
};
use crate::config::Config;
use crate::crypto::SigningCredential;
use crate::handlers;
use crate::middleware::auth::{require_bearer, AuthState};
use axum::{routing::get, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,

    /// The provisioned signing credential, if a key was configured.
    pub credential: Option<SigningCredential>,

    /// Validates bearer tokens for the local API.
    pub resolver: Arc<DeferredTokenValidationResolver>,
}

impl AppState {
    /// Wire the built-in collaborators around `credential`.
    pub fn new(config: Config, credential: Option<SigningCredential>) -> Self {
        let credential_store = Arc::new(InMemoryCredentialStore::new(credential.clone()));
        let issuer_name_service = Arc::new(StaticIssuerNameService::new(config.issuer_uri.clone()));
        let options =
            TokenValidationOptions::for_local_api(config.api_name.clone(), config.authority.clone());

        let resolver = Arc::new(DeferredTokenValidationResolver::new(
            options,
            credential_store,
            issuer_name_service,
        ));

        Self {
            config,
            credential,
            resolver,
        }
    }
}

/// Install the global Prometheus recorder.
///
/// Fails if a recorder is already installed in this process.
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness check
/// - `/.well-known/jwks.json` - Public key of the signing credential
/// - `/api/v1/me` - Bearer-protected principal echo
/// - `/metrics` - Prometheus scrape endpoint
/// - TraceLayer for request logging
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let auth_state = AuthState {
        resolver: Arc::clone(&state.resolver),
    };

    // Token-consuming routes
    let protected_routes = Router::new()
        .route("/api/v1/me", get(handlers::handle_get_me))
        .layer(axum::middleware::from_fn_with_state(auth_state, require_bearer));

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/.well-known/jwks.json", get(handlers::handle_get_jwks))
        .with_state(state);

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    public_routes
        .merge(protected_routes)
        .merge(metrics_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
}
