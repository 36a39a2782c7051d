//! Deferred resolution of token validation parameters.
//!
//! The authority and verification key are not known when the local API is
//! registered; the credential is provisioned later and the authority may
//! come from the issuer-name service. The first bearer request resolves
//! them and every later request reuses the result.

use crate::auth::collaborators::{CredentialStore, IssuerNameService};
use crate::auth::options::TokenValidationOptions;
use crate::crypto::{self, VerificationKey};
use crate::errors::AuthError;
use crate::observability::metrics::{record_token_validation, record_validation_resolution};
use crate::observability::ErrorCategory;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::instrument;

/// Authority and verification key used for every bearer token.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationState {
    authority: Option<String>,
    verification_key: Option<VerificationKey>,
}

impl ValidationState {
    pub fn new(authority: Option<String>, verification_key: Option<VerificationKey>) -> Self {
        Self {
            authority,
            verification_key,
        }
    }

    pub fn authority(&self) -> Option<&str> {
        self.authority.as_deref()
    }

    pub fn verification_key(&self) -> Option<&VerificationKey> {
        self.verification_key.as_ref()
    }

    fn is_empty(&self) -> bool {
        self.authority.is_none() && self.verification_key.is_none()
    }
}

/// The caller of a validated bearer token.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedPrincipal {
    pub name: Option<String>,
    pub roles: Vec<String>,
    pub claims: Map<String, Value>,
}

impl AuthenticatedPrincipal {
    /// Map claims using the bound name and role claim types.
    ///
    /// The role claim may be a single string or an array of strings.
    pub fn from_claims(claims: Map<String, Value>, name_claim: &str, role_claim: &str) -> Self {
        let name = claims
            .get(name_claim)
            .and_then(Value::as_str)
            .map(str::to_string);

        let roles = match claims.get(role_claim) {
            Some(Value::String(role)) => vec![role.clone()],
            Some(Value::Array(values)) => values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };

        Self {
            name,
            roles,
            claims,
        }
    }

    pub fn subject(&self) -> Option<&str> {
        self.claims.get("sub").and_then(Value::as_str)
    }

    pub fn is_in_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Resolves the [`ValidationState`] on first use and validates bearer tokens.
///
/// Resolution runs at most once to completion. Concurrent first requests
/// wait for the one in flight. A failed resolution leaves the state
/// unresolved and the next request tries again.
pub struct DeferredTokenValidationResolver {
    options: TokenValidationOptions,
    credential_store: Arc<dyn CredentialStore>,
    issuer_name_service: Arc<dyn IssuerNameService>,
    state: OnceCell<ValidationState>,
}

impl DeferredTokenValidationResolver {
    pub fn new(
        options: TokenValidationOptions,
        credential_store: Arc<dyn CredentialStore>,
        issuer_name_service: Arc<dyn IssuerNameService>,
    ) -> Self {
        Self {
            options,
            credential_store,
            issuer_name_service,
            state: OnceCell::new(),
        }
    }

    /// Seed the state. A state carrying either value counts as resolved and
    /// the collaborators are never consulted; an empty state is ignored.
    pub fn with_initial_state(mut self, state: ValidationState) -> Self {
        if !state.is_empty() {
            self.state = OnceCell::new_with(Some(state));
        }
        self
    }

    pub fn options(&self) -> &TokenValidationOptions {
        &self.options
    }

    /// The resolved state, if resolution has happened.
    pub fn state(&self) -> Option<&ValidationState> {
        self.state.get()
    }

    pub fn is_resolved(&self) -> bool {
        self.state.initialized()
    }

    /// Resolve the state if needed and return it.
    pub async fn resolve(&self) -> Result<&ValidationState, AuthError> {
        self.state.get_or_try_init(|| self.resolve_from_collaborators()).await
    }

    #[instrument(skip_all)]
    async fn resolve_from_collaborators(&self) -> Result<ValidationState, AuthError> {
        let result = async {
            let credential = self.credential_store.get_signing_credential().await?;
            let authority = match self.options.configured_authority() {
                Some(configured) => configured.to_string(),
                None => self.issuer_name_service.get_current_authority().await?,
            };
            Ok::<_, AuthError>(ValidationState::new(
                Some(authority),
                Some(credential.verification_key()),
            ))
        }
        .await;

        match &result {
            Ok(state) => {
                record_validation_resolution("success");
                tracing::info!(
                    target: "signing.auth",
                    authority = state.authority().unwrap_or_default(),
                    key_id = state.verification_key().and_then(VerificationKey::key_id).unwrap_or("none"),
                    "Resolved token validation parameters"
                );
            }
            Err(e) => {
                record_validation_resolution("error");
                tracing::warn!(
                    target: "signing.auth",
                    error = %e,
                    "Token validation parameters could not be resolved, will retry on next request"
                );
            }
        }

        result
    }

    /// Validate a bearer token and map it to a principal.
    #[instrument(skip_all, fields(status))]
    pub async fn validate(&self, token: &str) -> Result<AuthenticatedPrincipal, AuthError> {
        let result = self.validate_inner(token).await;

        match &result {
            Ok(_) => {
                tracing::Span::current().record("status", "success");
                record_token_validation("success", None);
            }
            Err(e) => {
                tracing::Span::current().record("status", "error");
                record_token_validation("error", Some(ErrorCategory::from(e).as_str()));
            }
        }

        result
    }

    async fn validate_inner(&self, token: &str) -> Result<AuthenticatedPrincipal, AuthError> {
        let state = self.resolve().await?;

        let key = state.verification_key().ok_or_else(|| {
            tracing::debug!(target: "signing.auth", "No verification key available");
            AuthError::InvalidToken("The access token is invalid or expired".to_string())
        })?;

        let issuers = self.options.accepted_issuers(state.authority()).await?;

        let claims: Map<String, Value> =
            crypto::verify_token(token, key, self.options.audience(), &issuers)?;

        Ok(AuthenticatedPrincipal::from_claims(
            claims,
            self.options.name_claim_type(),
            self.options.role_claim_type(),
        ))
    }
}

impl fmt::Debug for DeferredTokenValidationResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredTokenValidationResolver")
            .field("options", &self.options)
            .field("state", &self.state.get())
            .finish_non_exhaustive()
    }
}
