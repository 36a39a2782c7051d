use crate::models::Jwks;
use crate::observability::metrics::record_jwks_request;
use crate::routes::AppState;
use axum::{
    extract::State,
    http::header::{HeaderMap, HeaderValue, CACHE_CONTROL},
    Json,
};
use std::sync::Arc;
use tracing::instrument;

/// Handle JWKS request
///
/// GET /.well-known/jwks.json
///
/// Returns the public key of the provisioned signing credential in JWKS
/// format (RFC 7517), or an empty key set when no key was provisioned.
/// Cache-Control is set to max-age=3600 (1 hour).
#[instrument(name = "signing.jwks.get", skip_all, fields(keys))]
pub async fn handle_get_jwks(State(state): State<Arc<AppState>>) -> (HeaderMap, Json<Jwks>) {
    let keys: Vec<_> = state
        .credential
        .iter()
        .map(|credential| credential.verification_key().to_jwk())
        .collect();

    let label = if keys.is_empty() { "empty" } else { "present" };
    tracing::Span::current().record("keys", label);
    record_jwks_request(label);

    let mut headers = HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=3600"));

    (headers, Json(Jwks { keys }))
}
