//! Custom test assertions for expressive tests
//!
//! Provides trait-based assertions for signed tokens.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;
use serde_json::Value;

/// JWT header structure
#[derive(Debug, Deserialize)]
struct JwtHeader {
    pub alg: String,
    pub typ: String,
    #[serde(default)]
    pub kid: Option<String>,
}

fn segment(token: &str, index: usize) -> Vec<u8> {
    let part = token
        .split('.')
        .nth(index)
        .unwrap_or_else(|| panic!("JWT has no segment {index}"));
    URL_SAFE_NO_PAD
        .decode(part)
        .unwrap_or_else(|e| panic!("Failed to base64 decode JWT segment {index}: {e}"))
}

fn header(token: &str) -> JwtHeader {
    serde_json::from_slice(&segment(token, 0)).expect("Failed to parse JWT header")
}

fn claims(token: &str) -> Value {
    serde_json::from_slice(&segment(token, 1)).expect("Failed to parse JWT claims")
}

/// Custom assertions for signed tokens
///
/// # Example
/// ```rust,ignore
/// token
///     .assert_valid_jwt()
///     .assert_has_role("admin")
///     .assert_signed_by("Development");
/// ```
pub trait TokenAssertions {
    /// Assert that the token is a structurally valid RS256 JWT
    fn assert_valid_jwt(&self) -> &Self;

    /// Assert that the token carries the specified role
    fn assert_has_role(&self, role: &str) -> &Self;

    /// Assert that the token header names the specified key id
    fn assert_signed_by(&self, key_id: &str) -> &Self;

    /// Assert that the token header carries no key id
    fn assert_unkeyed(&self) -> &Self;

    /// Assert that the token expires within the specified seconds
    fn assert_expires_in(&self, seconds: u64) -> &Self;

    /// Assert that the token is for the specified subject
    fn assert_for_subject(&self, subject: &str) -> &Self;
}

impl TokenAssertions for String {
    fn assert_valid_jwt(&self) -> &Self {
        let parts = self.split('.').count();
        assert_eq!(
            parts, 3,
            "JWT must have 3 parts (header.payload.signature), got {}",
            parts
        );

        let header = header(self);
        assert_eq!(header.alg, "RS256", "Expected RS256 algorithm");
        assert_eq!(header.typ, "JWT", "Expected JWT type");

        assert!(claims(self).is_object(), "JWT claims must be a JSON object");

        self
    }

    fn assert_has_role(&self, role: &str) -> &Self {
        let claims = claims(self);
        let roles: Vec<&str> = match &claims["role"] {
            Value::String(single) => vec![single.as_str()],
            Value::Array(many) => many.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };

        assert!(
            roles.contains(&role),
            "Token does not contain role '{}'. Available roles: {:?}",
            role,
            roles
        );

        self
    }

    fn assert_signed_by(&self, key_id: &str) -> &Self {
        let header = header(self);
        assert_eq!(
            header.kid.as_deref(),
            Some(key_id),
            "Expected key_id '{}', got {:?}",
            key_id,
            header.kid
        );

        self
    }

    fn assert_unkeyed(&self) -> &Self {
        let header = header(self);
        assert!(header.kid.is_none(), "Expected no key_id, got {:?}", header.kid);
        self
    }

    fn assert_expires_in(&self, seconds: u64) -> &Self {
        let exp = claims(self)["exp"]
            .as_i64()
            .expect("JWT claims have no numeric exp");

        let now = chrono::Utc::now().timestamp();
        let expires_in = exp - now;

        // Allow 5-second tolerance for clock skew
        assert!(
            (expires_in - seconds as i64).abs() <= 5,
            "Expected token to expire in {} seconds, but expires in {} seconds",
            seconds,
            expires_in
        );

        self
    }

    fn assert_for_subject(&self, subject: &str) -> &Self {
        let claims = claims(self);
        assert_eq!(
            claims["sub"].as_str(),
            Some(subject),
            "Expected subject '{}', got {}",
            subject,
            claims["sub"]
        );

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unsigned(header: &str, payload: &str) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(header.as_bytes()),
            URL_SAFE_NO_PAD.encode(payload.as_bytes())
        )
    }

    #[test]
    fn test_assert_valid_jwt_with_valid_token() {
        let token = unsigned(
            r#"{"alg":"RS256","typ":"JWT","kid":"Development"}"#,
            r#"{"sub":"test-client","exp":9999999999,"iat":1234567890}"#,
        );

        token.assert_valid_jwt().assert_signed_by("Development");
    }

    #[test]
    #[should_panic(expected = "JWT must have 3 parts")]
    fn test_assert_valid_jwt_with_invalid_structure() {
        let token = "invalid.token".to_string();
        token.assert_valid_jwt();
    }

    #[test]
    #[should_panic(expected = "Expected RS256 algorithm")]
    fn test_assert_valid_jwt_rejects_other_algorithms() {
        let token = unsigned(r#"{"alg":"HS256","typ":"JWT"}"#, r#"{"sub":"x"}"#);
        token.assert_valid_jwt();
    }

    #[test]
    fn test_assert_has_role() {
        let token = unsigned(
            r#"{"alg":"RS256","typ":"JWT"}"#,
            r#"{"sub":"test","role":["reader","writer"]}"#,
        );

        token
            .assert_has_role("reader")
            .assert_has_role("writer")
            .assert_unkeyed();
    }

    #[test]
    #[should_panic(expected = "does not contain role")]
    fn test_assert_has_role_missing() {
        let token = unsigned(r#"{"alg":"RS256","typ":"JWT"}"#, r#"{"sub":"test","role":"reader"}"#);
        token.assert_has_role("admin");
    }

    #[test]
    fn test_assert_for_subject() {
        let token = unsigned(
            r#"{"alg":"RS256","typ":"JWT"}"#,
            r#"{"sub":"test-client-123","exp":9999999999}"#,
        );

        token.assert_for_subject("test-client-123");
    }
}
