//! Metrics definitions for the signing service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `signing_` prefix
//! - `_total` suffix for counters
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `source`: 3 values (development, file, store)
//! - `status`: 2 values (success, error)
//! - `error_category`: 4 values (see [`super::ErrorCategory`]) plus `none`

use metrics::counter;

// ============================================================================
// Key Provisioning Metrics
// ============================================================================

/// Record the outcome of provisioning the signing key.
///
/// Metric: `signing_key_provisioning_total`
/// Labels: `source`, `status`
pub fn record_key_provisioning(source: &str, status: &str) {
    counter!("signing_key_provisioning_total", "source" => source.to_string(), "status" => status.to_string())
        .increment(1);
}

// ============================================================================
// Token Validation Metrics
// ============================================================================

/// Record an attempt to resolve the token validation parameters.
///
/// Metric: `signing_validation_resolution_total`
/// Labels: `status`
///
/// A healthy process records exactly one `success`.
pub fn record_validation_resolution(status: &str) {
    counter!("signing_validation_resolution_total", "status" => status.to_string()).increment(1);
}

/// Record a bearer token validation result.
///
/// Metric: `signing_token_validations_total`
/// Labels: `status`, `error_category`
pub fn record_token_validation(status: &str, error_category: Option<&str>) {
    let category = error_category.unwrap_or("none");
    counter!("signing_token_validations_total", "status" => status.to_string(), "error_category" => category.to_string())
        .increment(1);
}

// ============================================================================
// JWKS Metrics
// ============================================================================

/// Record a JWKS request.
///
/// Metric: `signing_jwks_requests_total`
/// Labels: `keys` (`present` or `empty`)
pub fn record_jwks_request(keys: &str) {
    counter!("signing_jwks_requests_total", "keys" => keys.to_string()).increment(1);
}
