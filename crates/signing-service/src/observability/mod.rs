//! Observability for the signing service.
//!
//! # Privacy by Default
//!
//! All instrumentation uses `#[instrument(skip_all)]` and explicit safe field allow-listing.
//! Fields are categorized as:
//! - **SAFE**: Can be logged in plaintext (key source, store coordinates, flags)
//! - **HASHED**: Must be SHA-256 hashed for correlation (principal names)
//! - **NEVER**: Must never appear in logs (passwords, tokens, private keys)
//!
//! # Log targets
//!
//! - `signing.keys`: key provisioning
//! - `signing.certs`: certificate files and stores
//! - `signing.dev_key`: development key generation and reload
//! - `signing.auth`: bearer token resolution and validation

pub mod metrics;

use crate::errors::AuthError;
use sha2::{Digest, Sha256};

/// Hash a field value for correlation in logs (SHA-256, first 8 hex chars)
///
/// Used for principal names, which need correlation across log entries but
/// should not be logged in plaintext.
pub fn hash_for_correlation(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    hex::encode(digest.get(..4).unwrap_or_default())
}

/// Error categories for metrics labels (bounded cardinality)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing or malformed bearer credentials
    Authentication,
    /// Signature, expiry, audience or issuer rejected
    Cryptographic,
    /// Collaborators unavailable during resolution
    Resolution,
    /// Anything else
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Authentication => "authentication",
            ErrorCategory::Cryptographic => "cryptographic",
            ErrorCategory::Resolution => "resolution",
            ErrorCategory::Internal => "internal",
        }
    }
}

impl From<&AuthError> for ErrorCategory {
    fn from(err: &AuthError) -> Self {
        match err {
            AuthError::InvalidToken(_) => ErrorCategory::Cryptographic,
            AuthError::ResolutionFailed(_) => ErrorCategory::Resolution,
            AuthError::Internal => ErrorCategory::Internal,
        }
    }
}
