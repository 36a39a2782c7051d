//! X.509 certificate loading and selection.
//!
//! Certificates reach the provisioner either from a password-protected
//! PKCS#12 bundle on disk or from a [`CertificateStore`]. Either way the
//! result is a [`Certificate`] holding the parsed metadata and the RSA
//! private key that will sign tokens.

use crate::errors::ConfigurationError;
use crate::keys::storage_flags::{Platform, StorageFlags};
use crate::keys::store::{CertificateStore, StoreLocation};
use chrono::{DateTime, Utc};
use common::secret::{ExposeSecret, SecretString};
use p12_keystore::KeyStore;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use tracing::instrument;
use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::FromDer;
use x509_parser::time::ASN1Time;

/// A certificate together with its RSA private key.
pub struct Certificate {
    der: Vec<u8>,
    subject: String,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    thumbprint: String,
    private_key: RsaPrivateKey,
}

/// Metadata read from a DER certificate without touching any key material.
#[derive(Debug, Clone)]
pub struct CertificateInfo {
    pub subject: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub(crate) public_key_spki: Vec<u8>,
}

impl CertificateInfo {
    pub fn from_der(der: &[u8]) -> Result<Self, String> {
        let (_, parsed) =
            X509Certificate::from_der(der).map_err(|e| format!("invalid certificate: {e}"))?;

        let validity = parsed.validity();
        let not_before = asn1_to_utc(&validity.not_before)?;
        let not_after = asn1_to_utc(&validity.not_after)?;

        Ok(CertificateInfo {
            subject: parsed.subject().to_string(),
            not_before,
            not_after,
            public_key_spki: parsed.public_key().raw.to_vec(),
        })
    }
}

fn asn1_to_utc(time: &ASN1Time) -> Result<DateTime<Utc>, String> {
    DateTime::from_timestamp(time.timestamp(), 0)
        .ok_or_else(|| format!("certificate time {time} is out of range"))
}

impl Certificate {
    /// Pair a DER certificate with its PKCS#8 private key.
    ///
    /// The key must be RSA and must belong to the certificate.
    pub fn from_parts(cert_der: &[u8], pkcs8_key: &[u8]) -> Result<Self, ConfigurationError> {
        let info = CertificateInfo::from_der(cert_der).map_err(ConfigurationError::UnsupportedKey)?;

        let private_key = RsaPrivateKey::from_pkcs8_der(pkcs8_key).map_err(|e| {
            ConfigurationError::UnsupportedKey(format!("private key is not an RSA key: {e}"))
        })?;

        let certificate_key = RsaPublicKey::from_public_key_der(&info.public_key_spki).map_err(|e| {
            ConfigurationError::UnsupportedKey(format!("certificate key is not an RSA key: {e}"))
        })?;

        if RsaPublicKey::from(&private_key) != certificate_key {
            return Err(ConfigurationError::UnsupportedKey(format!(
                "private key does not match certificate '{}'",
                info.subject
            )));
        }

        Ok(Certificate {
            der: cert_der.to_vec(),
            thumbprint: hex::encode(Sha256::digest(cert_der)),
            subject: info.subject,
            not_before: info.not_before,
            not_after: info.not_after,
            private_key,
        })
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    pub fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    /// Lowercase hex SHA-256 of the DER encoding.
    pub fn thumbprint(&self) -> &str {
        &self.thumbprint
    }

    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject)
            .field("not_before", &self.not_before)
            .field("not_after", &self.not_after)
            .field("thumbprint", &self.thumbprint)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

/// A certificate handle enumerated from a store.
///
/// Dropping a handle releases it. Only the selected handle is converted into
/// a [`Certificate`].
pub trait StoreCertificate: Send {
    fn subject(&self) -> &str;
    fn not_before(&self) -> DateTime<Utc>;
    fn not_after(&self) -> DateTime<Utc>;
    fn into_certificate(self) -> Result<Certificate, ConfigurationError>;
}

/// Pick the valid candidate that expires first.
///
/// Candidates outside `notBefore <= now < notAfter` are ignored. On equal
/// expiry the earlier candidate wins. Every candidate that is not returned
/// is dropped before this function returns.
pub fn select_certificate<C: StoreCertificate>(candidates: Vec<C>, now: DateTime<Utc>) -> Option<C> {
    let mut selected: Option<C> = None;

    for candidate in candidates {
        if !(candidate.not_before() <= now && now < candidate.not_after()) {
            continue;
        }
        match &selected {
            Some(current) if current.not_after() <= candidate.not_after() => {}
            _ => selected = Some(candidate),
        }
    }

    selected
}

/// Compare two distinguished names.
///
/// RDNs are compared case-insensitively with surrounding whitespace removed,
/// in either encoding order.
pub fn subject_matches(candidate: &str, wanted: &str) -> bool {
    let normalize = |dn: &str| -> Vec<String> {
        dn.split(',')
            .map(|rdn| {
                rdn.split('=')
                    .map(|part| part.trim().to_lowercase())
                    .collect::<Vec<_>>()
                    .join("=")
            })
            .filter(|rdn| !rdn.is_empty())
            .collect()
    };

    let candidate = normalize(candidate);
    let wanted = normalize(wanted);
    if candidate.is_empty() || candidate.len() != wanted.len() {
        return false;
    }

    candidate == wanted || candidate.iter().eq(wanted.iter().rev())
}

/// Load a certificate and its private key from a PKCS#12 file.
#[instrument(skip_all, fields(path = %path.display(), storage_flags = %storage_flags))]
pub fn load_from_file(
    path: &Path,
    password: Option<&SecretString>,
    storage_flags: StorageFlags,
    platform: Platform,
) -> Result<Certificate, ConfigurationError> {
    if !path.is_file() {
        return Err(ConfigurationError::CertificateNotFound(path.to_path_buf()));
    }

    let password = password.ok_or(ConfigurationError::MissingPassword)?;

    storage_flags.check_supported(platform)?;

    let load_error = |reason: String| ConfigurationError::CertificateLoad {
        flags: storage_flags.to_string(),
        reason,
    };

    let bytes = std::fs::read(path).map_err(|e| ConfigurationError::io(path, e))?;

    // Reads both legacy SHA-1/3DES bundles and the SHA-256/PBES2 layout
    // OpenSSL 3 writes by default. A wrong password fails the MAC check here.
    let keystore = KeyStore::from_pkcs12(&bytes, password.expose_secret())
        .map_err(|e| load_error(e.to_string()))?;

    let (_, chain) = keystore
        .private_key_chain()
        .ok_or_else(|| load_error("bundle contains no private key".to_string()))?;

    // A bundle may carry the issuing chain too; pick the certificate that
    // belongs to the private key.
    let mut last_error = None;
    for certificate in chain.chain() {
        match Certificate::from_parts(certificate.as_der(), chain.key()) {
            Ok(loaded) => return Ok(loaded),
            Err(e) => last_error = Some(e),
        }
    }

    Err(last_error.unwrap_or_else(|| load_error("bundle contains no certificate".to_string())))
}

/// Load the soonest-expiring valid certificate for `subject` from a store.
#[instrument(skip_all, fields(subject = %subject, store = %store_name, location = %location))]
pub async fn load_from_store<S: CertificateStore>(
    store: &S,
    subject: &str,
    store_name: &str,
    location: StoreLocation,
    now: DateTime<Utc>,
) -> Result<Certificate, ConfigurationError> {
    let entries = store.open_read_only(store_name, location).await?;
    let enumerated = entries.len();

    let matching: Vec<S::Entry> = entries
        .into_iter()
        .filter(|entry| subject_matches(entry.subject(), subject))
        .collect();

    tracing::debug!(
        target: "signing.certs",
        enumerated,
        matching = matching.len(),
        "Enumerated certificate store"
    );

    let selected = select_certificate(matching, now).ok_or_else(|| {
        ConfigurationError::NoValidCertificate {
            subject: subject.to_string(),
            location: location.to_string(),
            store: store_name.to_string(),
        }
    })?;

    selected.into_certificate()
}
