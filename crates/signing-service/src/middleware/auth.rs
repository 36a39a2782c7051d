//! Bearer authentication middleware for the local API.
//!
//! Extracts the Bearer token from the Authorization header, validates it
//! through the [`DeferredTokenValidationResolver`], and injects the
//! [`AuthenticatedPrincipal`] into request extensions.

use crate::auth::{AuthenticatedPrincipal, DeferredTokenValidationResolver};
use crate::errors::AuthError;
use crate::observability::metrics::record_token_validation;
use crate::observability::{hash_for_correlation, ErrorCategory};
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    pub resolver: Arc<DeferredTokenValidationResolver>,
}

/// Require a valid bearer token.
///
/// # Response
///
/// - 503 if validation parameters could not be resolved yet, whether or not
///   a token was sent
/// - 401 with `WWW-Authenticate` if the token is missing or invalid
/// - Otherwise continues with the principal in extensions
#[instrument(skip_all, name = "signing.middleware.auth")]
pub async fn require_bearer(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, AuthError> {
    // Resolution is triggered by the request itself, before the token is read.
    state.resolver.resolve().await.inspect_err(|e| {
        record_token_validation("error", Some(ErrorCategory::from(e).as_str()));
    })?;

    let token = bearer_token(&req).inspect_err(|_| {
        record_token_validation("error", Some(ErrorCategory::Authentication.as_str()));
    })?;

    let principal = state.resolver.validate(token).await?;

    tracing::debug!(
        target: "signing.auth",
        principal = %hash_for_correlation(principal.name.as_deref().unwrap_or_default()),
        roles = principal.roles.len(),
        "Bearer token accepted"
    );

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

fn bearer_token(req: &Request) -> Result<&str, AuthError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!(target: "signing.auth", "Missing Authorization header");
            AuthError::InvalidToken("Missing Authorization header".to_string())
        })?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            tracing::debug!(target: "signing.auth", "Invalid Authorization header format");
            AuthError::InvalidToken("Invalid Authorization header format".to_string())
        })
}

/// Extension trait for reading the principal from a request.
pub trait PrincipalExt {
    /// `None` if the auth middleware was not applied to this request.
    fn principal(&self) -> Option<&AuthenticatedPrincipal>;
}

impl<B> PrincipalExt for axum::extract::Request<B> {
    fn principal(&self) -> Option<&AuthenticatedPrincipal> {
        self.extensions().get::<AuthenticatedPrincipal>()
    }
}
