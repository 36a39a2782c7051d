use axum::{
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Failures while turning a key definition into a signing credential.
///
/// Every variant is fatal to startup: provisioning is never retried and the
/// process must not reach a serving state after one of these.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("{field} must be specified for {source_kind} source")]
    MissingField {
        field: &'static str,
        source_kind: &'static str,
    },

    #[error("Invalid key type '{0}'")]
    InvalidKeyType(String),

    #[error("Invalid certificate store location '{0}'")]
    InvalidStoreLocation(String),

    #[error("Invalid storage flag '{0}'")]
    InvalidStorageFlag(String),

    #[error("Storage flags '{flags}' are not supported: {reason}")]
    RejectedStorageFlags { flags: String, reason: String },

    #[error("There was an error loading the certificate. The file '{}' was not found.", .0.display())]
    CertificateNotFound(PathBuf),

    #[error("There was an error loading the certificate. No password was provided.")]
    MissingPassword,

    #[error(
        "There was an error loading the certificate. Either the password is incorrect or the \
         process does not have permissions to store the key in the keyset '{flags}': {reason}"
    )]
    CertificateLoad { flags: String, reason: String },

    #[error("Couldn't find a valid certificate with subject '{subject}' on the '{location}\\{store}'")]
    NoValidCertificate {
        subject: String,
        location: String,
        store: String,
    },

    #[error(
        "Couldn't find the file '{}' and creation of a development key was not requested.",
        .0.display()
    )]
    DevelopmentKeyMissing(PathBuf),

    #[error("'{}' could not be deserialized to RSA key parameters: {reason}", .path.display())]
    InvalidDevelopmentKey { path: PathBuf, reason: String },

    #[error("Generated RSA key has {bits} bits, at least {required} are required")]
    WeakKey { bits: usize, required: usize },

    #[error("RSA key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Unsupported signing key: {0}")]
    UnsupportedKey(String),

    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigurationError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigurationError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure to use a provisioned key for signing.
#[derive(Debug, Error)]
#[error("Crypto error: {0}")]
pub struct CryptoError(pub String);

/// Request-time errors raised while authenticating a bearer token.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// The credential store or issuer-name service could not be reached.
    /// Resolution stays pending and the next request retries it.
    #[error("Token validation parameters could not be resolved: {0}")]
    ResolutionFailed(String),

    #[error("Internal server error")]
    Internal,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AuthError::InvalidToken(reason) => {
                (StatusCode::UNAUTHORIZED, "INVALID_TOKEN", reason.clone())
            }
            AuthError::ResolutionFailed(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                "Token validation is temporarily unavailable".to_string(),
            ),
            AuthError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer error=\"invalid_token\""),
            );
        }
        response
    }
}
