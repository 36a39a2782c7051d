//! Signing credentials and bearer token verification.

use crate::errors::{AuthError, CryptoError};
use crate::keys::Certificate;
use crate::models::JsonWebKey;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::instrument;

/// Maximum accepted bearer token size in bytes (8KB).
///
/// Checked before any decoding or signature verification.
pub const MAX_TOKEN_SIZE_BYTES: usize = 8192;

/// Key id carried by development credentials.
pub const DEVELOPMENT_KEY_ID: &str = "Development";

const INVALID_TOKEN_MESSAGE: &str = "The access token is invalid or expired";

/// The private key behind a [`SigningCredential`].
pub enum SigningKey {
    Development(RsaPrivateKey),
    Certificate(Certificate),
}

impl SigningKey {
    pub fn rsa(&self) -> &RsaPrivateKey {
        match self {
            SigningKey::Development(key) => key,
            SigningKey::Certificate(certificate) => certificate.private_key(),
        }
    }
}

/// The credential tokens are signed with. Always RS256.
///
/// Cloning shares the underlying key.
#[derive(Clone)]
pub struct SigningCredential {
    key: Arc<SigningKey>,
}

impl SigningCredential {
    pub fn development(key: RsaPrivateKey) -> Self {
        Self {
            key: Arc::new(SigningKey::Development(key)),
        }
    }

    pub fn from_certificate(certificate: Certificate) -> Self {
        Self {
            key: Arc::new(SigningKey::Certificate(certificate)),
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        Algorithm::RS256
    }

    /// `Some("Development")` for development keys, `None` for certificates.
    pub fn key_id(&self) -> Option<&str> {
        match self.key.as_ref() {
            SigningKey::Development(_) => Some(DEVELOPMENT_KEY_ID),
            SigningKey::Certificate(_) => None,
        }
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.key
    }

    pub fn certificate(&self) -> Option<&Certificate> {
        match self.key.as_ref() {
            SigningKey::Certificate(certificate) => Some(certificate),
            SigningKey::Development(_) => None,
        }
    }

    pub fn encoding_key(&self) -> Result<EncodingKey, CryptoError> {
        let der = self
            .key
            .rsa()
            .to_pkcs1_der()
            .map_err(|e| CryptoError(format!("RSA key encoding failed: {e}")))?;
        Ok(EncodingKey::from_rsa_der(der.as_bytes()))
    }

    pub fn verification_key(&self) -> VerificationKey {
        let key = self.key.rsa();
        VerificationKey::from_rsa_components(
            self.key_id().map(str::to_string),
            key.n().to_bytes_be(),
            key.e().to_bytes_be(),
        )
    }

    /// Sign `claims` as a compact JWT.
    #[instrument(skip_all)]
    pub fn sign<T: Serialize>(&self, claims: &T) -> Result<String, CryptoError> {
        let mut header = Header::new(self.algorithm());
        header.typ = Some("JWT".to_string());
        header.kid = self.key_id().map(str::to_string);

        encode(&header, claims, &self.encoding_key()?)
            .map_err(|e| CryptoError(format!("JWT signing operation failed: {e}")))
    }
}

impl fmt::Debug for SigningCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningCredential")
            .field("algorithm", &self.algorithm())
            .field("key_id", &self.key_id())
            .field("certificate", &self.certificate())
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Public half of a signing credential.
#[derive(Clone)]
pub struct VerificationKey {
    key_id: Option<String>,
    modulus: Vec<u8>,
    exponent: Vec<u8>,
    decoding_key: DecodingKey,
}

impl VerificationKey {
    /// Build from big-endian RSA modulus and exponent.
    pub fn from_rsa_components(key_id: Option<String>, modulus: Vec<u8>, exponent: Vec<u8>) -> Self {
        let decoding_key = DecodingKey::from_rsa_raw_components(&modulus, &exponent);
        Self {
            key_id,
            modulus,
            exponent,
            decoding_key,
        }
    }

    pub fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    pub fn to_jwk(&self) -> JsonWebKey {
        JsonWebKey {
            kid: self.key_id.clone(),
            kty: "RSA".to_string(),
            use_: "sig".to_string(),
            alg: "RS256".to_string(),
            n: URL_SAFE_NO_PAD.encode(&self.modulus),
            e: URL_SAFE_NO_PAD.encode(&self.exponent),
        }
    }
}

impl PartialEq for VerificationKey {
    fn eq(&self, other: &Self) -> bool {
        self.key_id == other.key_id && self.modulus == other.modulus && self.exponent == other.exponent
    }
}

impl fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationKey")
            .field("key_id", &self.key_id)
            .field("modulus_bits", &(self.modulus.len() * 8))
            .finish_non_exhaustive()
    }
}

/// Verify an RS256 bearer token and decode its claims.
///
/// Checks the signature, `exp`, the audience, and the issuer when
/// `issuers` is non-empty. Every failure maps to the same generic message;
/// the reason is logged at debug level.
#[instrument(skip_all)]
pub fn verify_token<T: DeserializeOwned>(
    token: &str,
    key: &VerificationKey,
    audience: &str,
    issuers: &[String],
) -> Result<T, AuthError> {
    if token.len() > MAX_TOKEN_SIZE_BYTES {
        tracing::debug!(
            target: "signing.auth",
            token_size = token.len(),
            max_size = MAX_TOKEN_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(AuthError::InvalidToken(INVALID_TOKEN_MESSAGE.to_string()));
    }

    let mut validation = Validation::new(Algorithm::RS256);
    validation.validate_exp = true;
    validation.set_audience(&[audience]);
    if !issuers.is_empty() {
        validation.set_issuer(issuers);
    }

    let token_data = decode::<T>(token, &key.decoding_key, &validation).map_err(|e| {
        tracing::debug!(target: "signing.auth", error = %e, "Token verification failed");
        AuthError::InvalidToken(INVALID_TOKEN_MESSAGE.to_string())
    })?;

    Ok(token_data.claims)
}
