//! Self-signed certificate fixtures
//!
//! Builds RSA certificates over the fixture keys and writes them in the two
//! shapes the provisioner reads: password-protected PKCS#12 bundles and PEM
//! store entries.

use crate::crypto_fixtures::{test_rsa_key_pem, test_rsa_key_pkcs8_der, FixtureError};
use rcgen::{date_time_ymd, CertificateParams, DistinguishedName, DnType, KeyPair};
use std::path::{Path, PathBuf};

/// A bundle written by `openssl pkcs12 -export` with OpenSSL 3 defaults:
/// SHA-256 MAC and PBES2/AES-256-CBC encrypted bags.
pub const OPENSSL3_PKCS12: &[u8] = include_bytes!("../fixtures/openssl3-sha256-aes256.pfx");
pub const OPENSSL3_PKCS12_PASSWORD: &str = "modern-secret";
pub const OPENSSL3_PKCS12_SUBJECT: &str = "CN=OpenSSL Modern Bundle";

/// A calendar date, `(year, month, day)`, at midnight UTC.
pub type Ymd = (i32, u8, u8);

/// A self-signed certificate and the fixture key it was issued for.
#[derive(Debug, Clone)]
pub struct TestCertificate {
    pub common_name: String,
    pub der: Vec<u8>,
    pub pem: String,
    pub key_index: u8,
}

impl TestCertificate {
    /// Subject as the certificate parser renders it.
    pub fn subject(&self) -> String {
        format!("CN={}", self.common_name)
    }

    /// PKCS#8 DER of the certificate's private key.
    pub fn key_pkcs8_der(&self) -> Result<Vec<u8>, FixtureError> {
        test_rsa_key_pkcs8_der(self.key_index)
    }

    /// Write the certificate and its key into a password-protected PKCS#12 file.
    pub fn write_pkcs12(&self, path: &Path, password: &str) -> Result<(), FixtureError> {
        self.write_pkcs12_with_chain(path, password, None)
    }

    /// Like [`TestCertificate::write_pkcs12`] with an extra CA certificate in the bundle.
    pub fn write_pkcs12_with_chain(
        &self,
        path: &Path,
        password: &str,
        ca: Option<&TestCertificate>,
    ) -> Result<(), FixtureError> {
        let key = self.key_pkcs8_der()?;
        let pfx = p12::PFX::new(
            &self.der,
            &key,
            ca.map(|ca| ca.der.as_slice()),
            password,
            &self.common_name,
        )
        .ok_or_else(|| FixtureError::Certificate("Failed to build PKCS#12 bundle".to_string()))?;

        std::fs::write(path, pfx.to_der())?;
        Ok(())
    }

    /// Write `<dir>/<file_name>` containing the certificate and its private key.
    pub fn write_store_entry(&self, dir: &Path, file_name: &str) -> Result<PathBuf, FixtureError> {
        self.write_store_entry_with_key(dir, file_name, Some(self.key_index))
    }

    /// Write a store entry pairing the certificate with fixture key `key_index`,
    /// or with no key at all.
    pub fn write_store_entry_with_key(
        &self,
        dir: &Path,
        file_name: &str,
        key_index: Option<u8>,
    ) -> Result<PathBuf, FixtureError> {
        std::fs::create_dir_all(dir)?;

        let mut contents = self.pem.clone();
        if let Some(index) = key_index {
            contents.push_str(test_rsa_key_pem(index));
        }

        let path = dir.join(file_name);
        std::fs::write(&path, contents)?;
        Ok(path)
    }
}

/// Builder for self-signed RSA certificates.
///
/// # Example
/// ```rust,ignore
/// let cert = TestCertificateBuilder::new("signing.test")
///     .valid_between((2025, 1, 1), (2026, 1, 1))
///     .build()?;
/// cert.write_pkcs12(&dir.join("signing.pfx"), "secret")?;
/// ```
pub struct TestCertificateBuilder {
    common_name: String,
    key_index: u8,
    not_before: Ymd,
    not_after: Ymd,
}

impl TestCertificateBuilder {
    pub fn new(common_name: &str) -> Self {
        Self {
            common_name: common_name.to_string(),
            key_index: 1,
            not_before: (2000, 1, 1),
            not_after: (2999, 1, 1),
        }
    }

    /// Issue the certificate for fixture key `index`.
    pub fn with_key(mut self, index: u8) -> Self {
        self.key_index = index;
        self
    }

    pub fn valid_between(mut self, not_before: Ymd, not_after: Ymd) -> Self {
        self.not_before = not_before;
        self.not_after = not_after;
        self
    }

    pub fn build(self) -> Result<TestCertificate, FixtureError> {
        let key_pair = KeyPair::from_pem(test_rsa_key_pem(self.key_index))
            .map_err(|e| FixtureError::Certificate(e.to_string()))?;

        let mut params = CertificateParams::new(vec![self.common_name.clone()])
            .map_err(|e| FixtureError::Certificate(e.to_string()))?;

        let mut name = DistinguishedName::new();
        name.push(DnType::CommonName, self.common_name.as_str());
        params.distinguished_name = name;

        let (year, month, day) = self.not_before;
        params.not_before = date_time_ymd(year, month, day);
        let (year, month, day) = self.not_after;
        params.not_after = date_time_ymd(year, month, day);

        let certificate = params
            .self_signed(&key_pair)
            .map_err(|e| FixtureError::Certificate(e.to_string()))?;

        Ok(TestCertificate {
            common_name: self.common_name,
            der: certificate.der().to_vec(),
            pem: certificate.pem(),
            key_index: self.key_index,
        })
    }
}
