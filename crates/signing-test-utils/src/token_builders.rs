//! Builder patterns for test data construction
//!
//! Provides fluent APIs for creating test tokens.

use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};
use signing_service::crypto::SigningCredential;
use signing_service::errors::CryptoError;

/// Builder for creating test JWT claims
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .for_user("alice")
///     .with_role("admin")
///     .for_audience("LocalApi")
///     .sign(&credential)?;
/// ```
pub struct TestTokenBuilder {
    sub: String,
    name: Option<String>,
    roles: Vec<String>,
    aud: String,
    iss: Option<String>,
    exp: i64,
    iat: i64,
    extra: Map<String, Value>,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            sub: "test-subject".to_string(),
            name: None,
            roles: Vec::new(),
            aud: "LocalApi".to_string(),
            iss: None,
            exp: (now + Duration::seconds(3600)).timestamp(),
            iat: now.timestamp(),
            extra: Map::new(),
        }
    }

    /// Set the subject
    pub fn for_user(mut self, subject: &str) -> Self {
        self.sub = subject.to_string();
        self
    }

    /// Set the `name` claim
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Add a `role` claim value
    pub fn with_role(mut self, role: &str) -> Self {
        self.roles.push(role.to_string());
        self
    }

    pub fn for_audience(mut self, audience: &str) -> Self {
        self.aud = audience.to_string();
        self
    }

    pub fn issued_by(mut self, issuer: &str) -> Self {
        self.iss = Some(issuer.to_string());
        self
    }

    /// Set expiration in seconds from now
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self
    }

    /// Set issued-at timestamp
    pub fn issued_at(mut self, timestamp: i64) -> Self {
        self.iat = timestamp;
        self
    }

    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.extra.insert(name.to_string(), value);
        self
    }

    /// Build the claims as a JSON value
    ///
    /// A single role is emitted as a string, several as an array.
    pub fn build(self) -> Value {
        let mut claims = self.extra;
        claims.insert("sub".to_string(), json!(self.sub));
        claims.insert("aud".to_string(), json!(self.aud));
        claims.insert("exp".to_string(), json!(self.exp));
        claims.insert("iat".to_string(), json!(self.iat));

        if let Some(iss) = self.iss {
            claims.insert("iss".to_string(), json!(iss));
        }
        if let Some(name) = self.name {
            claims.insert("name".to_string(), json!(name));
        }
        match self.roles.as_slice() {
            [] => {}
            [role] => {
                claims.insert("role".to_string(), json!(role));
            }
            roles => {
                claims.insert("role".to_string(), json!(roles));
            }
        }

        Value::Object(claims)
    }

    /// Build the claims and sign them with `credential`.
    pub fn sign(self, credential: &SigningCredential) -> Result<String, CryptoError> {
        credential.sign(&self.build())
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}
