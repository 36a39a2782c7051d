//! Turns the configured key definition into the process signing credential.

use crate::crypto::SigningCredential;
use crate::errors::ConfigurationError;
use crate::keys::certificate;
use crate::keys::definition::{KeyDefinition, KeySource};
use crate::keys::development::{self, DEFAULT_DEVELOPMENT_KEY_PATH};
use crate::keys::storage_flags::{Platform, StorageFlags};
use crate::keys::store::{CertificateStore, StoreLocation};
use crate::observability::metrics::record_key_provisioning;
use chrono::{DateTime, Utc};
use common::config::ConfigSection;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Provisions the signing credential once at startup.
pub struct KeyProvisioner<S> {
    base_dir: PathBuf,
    platform: Platform,
    store: S,
}

impl<S: CertificateStore> KeyProvisioner<S> {
    /// Relative paths in the definition resolve against `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>, store: S) -> Self {
        Self {
            base_dir: base_dir.into(),
            platform: Platform::current(),
            store,
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Provision from the `SIGNING_KEY__*` section.
    ///
    /// An empty section means no key was configured and yields `Ok(None)`.
    pub async fn provision(
        &self,
        section: &ConfigSection,
    ) -> Result<Option<SigningCredential>, ConfigurationError> {
        self.provision_at(section, Utc::now()).await
    }

    /// [`KeyProvisioner::provision`] with an explicit clock for store selection.
    pub async fn provision_at(
        &self,
        section: &ConfigSection,
        now: DateTime<Utc>,
    ) -> Result<Option<SigningCredential>, ConfigurationError> {
        let Some(definition) = KeyDefinition::from_section(section) else {
            tracing::info!(target: "signing.keys", "No signing key configured, skipping provisioning");
            return Ok(None);
        };

        self.provision_definition(&definition, now).await.map(Some)
    }

    #[instrument(skip_all, fields(source))]
    pub async fn provision_definition(
        &self,
        definition: &KeyDefinition,
        now: DateTime<Utc>,
    ) -> Result<SigningCredential, ConfigurationError> {
        let source = match definition.source_kind() {
            Ok(source) => source,
            Err(e) => {
                record_key_provisioning("unknown", "error");
                return Err(e);
            }
        };
        tracing::Span::current().record("source", source.as_str());

        let label = source.as_str().to_ascii_lowercase();
        let result = match source {
            KeySource::Development => self.provision_development(definition).await,
            KeySource::File => self.provision_file(definition).await,
            KeySource::Store => self.provision_store(definition, now).await,
        };

        match &result {
            Ok(_) => record_key_provisioning(&label, "success"),
            Err(e) => {
                record_key_provisioning(&label, "error");
                tracing::error!(target: "signing.keys", error = %e, "Signing key provisioning failed");
            }
        }
        result
    }

    async fn provision_development(
        &self,
        definition: &KeyDefinition,
    ) -> Result<SigningCredential, ConfigurationError> {
        let path = self.resolve(
            definition
                .file_path
                .as_deref()
                .unwrap_or(DEFAULT_DEVELOPMENT_KEY_PATH),
        );
        let create_if_missing = definition.persisted.unwrap_or(true);

        let task_path = path.clone();
        let key = tokio::task::spawn_blocking(move || {
            development::load_or_create(&task_path, create_if_missing)
        })
        .await
        .map_err(|e| ConfigurationError::KeyGeneration(format!("development key task failed: {e}")))??;

        tracing::info!(
            target: "signing.keys",
            event = "development_key_loaded",
            path = %path.display(),
            "Loaded development signing key"
        );

        Ok(SigningCredential::development(key.into_private_key()))
    }

    async fn provision_file(
        &self,
        definition: &KeyDefinition,
    ) -> Result<SigningCredential, ConfigurationError> {
        let file_path = KeyDefinition::required(&definition.file_path, "FilePath", KeySource::File)?;
        let path = self.resolve(file_path);

        let storage_flags = match definition.storage_flags.as_deref() {
            Some(list) => StorageFlags::parse_list(list)?,
            None => None,
        }
        .unwrap_or_else(|| StorageFlags::platform_default(self.platform));

        let password = definition.password.clone();
        let platform = self.platform;
        let task_path = path.clone();
        let loaded = tokio::task::spawn_blocking(move || {
            certificate::load_from_file(&task_path, password.as_ref(), storage_flags, platform)
        })
        .await
        .map_err(|e| ConfigurationError::CertificateLoad {
            flags: storage_flags.to_string(),
            reason: format!("certificate load task failed: {e}"),
        })??;

        tracing::info!(
            target: "signing.keys",
            event = "certificate_loaded_from_file",
            path = %path.display(),
            storage_flags = %storage_flags,
            thumbprint = %loaded.thumbprint(),
            "Loaded signing certificate from file"
        );

        Ok(SigningCredential::from_certificate(loaded))
    }

    async fn provision_store(
        &self,
        definition: &KeyDefinition,
        now: DateTime<Utc>,
    ) -> Result<SigningCredential, ConfigurationError> {
        let subject = KeyDefinition::required(&definition.name, "Name", KeySource::Store)?;
        let store_name =
            KeyDefinition::required(&definition.store_name, "StoreName", KeySource::Store)?;
        let location = StoreLocation::parse(definition.store_location.as_deref())?;

        let loaded =
            certificate::load_from_store(&self.store, subject, store_name, location, now).await?;

        tracing::info!(
            target: "signing.keys",
            event = "certificate_loaded_from_store",
            store = %store_name,
            location = %location,
            thumbprint = %loaded.thumbprint(),
            not_after = %loaded.not_after(),
            "Loaded signing certificate from store"
        );

        Ok(SigningCredential::from_certificate(loaded))
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}
