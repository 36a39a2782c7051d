//! Certificate store backends.
//!
//! A store is addressed by a [`StoreLocation`] and a store name, mirroring
//! the coordinates used by OS certificate repositories. The only backend
//! shipped here keeps one PEM file per certificate under
//! `<root>/<location>/<store name>/`.

use crate::errors::ConfigurationError;
use crate::keys::certificate::{Certificate, CertificateInfo, StoreCertificate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::secret::{ExposeSecret, SecretBox};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::instrument;
use x509_parser::pem::Pem;

/// Scope of a certificate store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreLocation {
    CurrentUser,
    LocalMachine,
}

impl StoreLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreLocation::CurrentUser => "CurrentUser",
            StoreLocation::LocalMachine => "LocalMachine",
        }
    }

    /// Parse a location by exact name or by its numeric value (`1`, `2`).
    pub fn parse(value: Option<&str>) -> Result<Self, ConfigurationError> {
        match value.map(str::trim) {
            Some("CurrentUser") | Some("1") => Ok(StoreLocation::CurrentUser),
            Some("LocalMachine") | Some("2") => Ok(StoreLocation::LocalMachine),
            other => Err(ConfigurationError::InvalidStoreLocation(
                other.unwrap_or_default().to_string(),
            )),
        }
    }
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A read-only view of a certificate store.
///
/// `open_read_only` returns every certificate in the store; the caller owns
/// the handles and releases them by dropping.
#[async_trait]
pub trait CertificateStore: Send + Sync {
    type Entry: StoreCertificate;

    async fn open_read_only(
        &self,
        store_name: &str,
        location: StoreLocation,
    ) -> Result<Vec<Self::Entry>, ConfigurationError>;
}

/// Filesystem-backed certificate store.
///
/// Each `*.pem` file holds one `CERTIFICATE` block and, optionally, a
/// `PRIVATE KEY` (PKCS#8) block. Store names are lowercased on disk.
#[derive(Debug, Clone)]
pub struct DirectoryCertificateStore {
    root: PathBuf,
}

impl DirectoryCertificateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory backing `store_name` at `location`.
    pub fn store_path(&self, store_name: &str, location: StoreLocation) -> PathBuf {
        self.root
            .join(location.as_str())
            .join(store_name.to_ascii_lowercase())
    }
}

#[async_trait]
impl CertificateStore for DirectoryCertificateStore {
    type Entry = DirectoryStoreEntry;

    #[instrument(skip_all, fields(store = %store_name, location = %location))]
    async fn open_read_only(
        &self,
        store_name: &str,
        location: StoreLocation,
    ) -> Result<Vec<DirectoryStoreEntry>, ConfigurationError> {
        let dir = self.store_path(store_name, location);

        let mut read_dir = match tokio::fs::read_dir(&dir).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(target: "signing.certs", path = %dir.display(), "Store does not exist");
                return Ok(Vec::new());
            }
            Err(e) => return Err(ConfigurationError::io(&dir, e)),
        };

        let mut entries = Vec::new();
        while let Some(file) = read_dir
            .next_entry()
            .await
            .map_err(|e| ConfigurationError::io(&dir, e))?
        {
            let path = file.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("pem") {
                continue;
            }

            let contents = tokio::fs::read(&path)
                .await
                .map_err(|e| ConfigurationError::io(&path, e))?;

            match DirectoryStoreEntry::parse(&path, &contents) {
                Ok(entry) => entries.push(entry),
                Err(reason) => {
                    tracing::warn!(
                        target: "signing.certs",
                        path = %path.display(),
                        reason = %reason,
                        "Skipping unreadable store entry"
                    );
                }
            }
        }

        Ok(entries)
    }
}

/// One certificate enumerated from a [`DirectoryCertificateStore`].
pub struct DirectoryStoreEntry {
    path: PathBuf,
    info: CertificateInfo,
    certificate_der: Vec<u8>,
    private_key: Option<SecretBox<Vec<u8>>>,
}

impl DirectoryStoreEntry {
    fn parse(path: &Path, contents: &[u8]) -> Result<Self, String> {
        let mut certificate_der = None;
        let mut private_key = None;

        for block in Pem::iter_from_buffer(contents) {
            let block = block.map_err(|e| format!("invalid PEM: {e}"))?;
            match block.label.as_str() {
                "CERTIFICATE" if certificate_der.is_none() => certificate_der = Some(block.contents),
                "PRIVATE KEY" if private_key.is_none() => {
                    private_key = Some(SecretBox::new(Box::new(block.contents)))
                }
                _ => {}
            }
        }

        let certificate_der = certificate_der.ok_or("no CERTIFICATE block")?;
        let info = CertificateInfo::from_der(&certificate_der)?;

        Ok(DirectoryStoreEntry {
            path: path.to_path_buf(),
            info,
            certificate_der,
            private_key,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StoreCertificate for DirectoryStoreEntry {
    fn subject(&self) -> &str {
        &self.info.subject
    }

    fn not_before(&self) -> DateTime<Utc> {
        self.info.not_before
    }

    fn not_after(&self) -> DateTime<Utc> {
        self.info.not_after
    }

    fn into_certificate(self) -> Result<Certificate, ConfigurationError> {
        let private_key = self.private_key.ok_or_else(|| {
            ConfigurationError::UnsupportedKey(format!(
                "certificate '{}' in '{}' has no private key",
                self.info.subject,
                self.path.display()
            ))
        })?;

        Certificate::from_parts(&self.certificate_der, private_key.expose_secret())
    }
}
