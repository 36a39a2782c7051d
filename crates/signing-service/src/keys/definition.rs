//! Declarative signing key definition.

use crate::errors::ConfigurationError;
use common::config::ConfigSection;
use common::secret::SecretString;

/// Where the signing key comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Development,
    File,
    Store,
}

impl KeySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeySource::Development => "Development",
            KeySource::File => "File",
            KeySource::Store => "Store",
        }
    }

    /// Parse the `Type` field. Names are matched exactly.
    pub fn parse(value: Option<&str>) -> Result<Self, ConfigurationError> {
        match value {
            Some("Development") => Ok(KeySource::Development),
            Some("File") => Ok(KeySource::File),
            Some("Store") => Ok(KeySource::Store),
            other => Err(ConfigurationError::InvalidKeyType(
                other.unwrap_or("(null)").to_string(),
            )),
        }
    }
}

/// A key definition as read from the `SIGNING_KEY__*` section.
///
/// Fields are kept as raw strings; kind-specific requirements are checked by
/// the accessors below when the provisioner dispatches on [`KeySource`].
#[derive(Debug, Clone, Default)]
pub struct KeyDefinition {
    pub source: Option<String>,
    pub persisted: Option<bool>,
    pub file_path: Option<String>,
    pub password: Option<SecretString>,
    pub name: Option<String>,
    pub store_location: Option<String>,
    pub store_name: Option<String>,
    pub storage_flags: Option<String>,
}

impl KeyDefinition {
    /// Build a definition from a flat section.
    ///
    /// Returns `None` when the section is empty, meaning no key was configured.
    /// A `Persisted` value that is not a boolean is ignored.
    pub fn from_section(section: &ConfigSection) -> Option<Self> {
        if section.is_empty() {
            return None;
        }

        let field = |name: &str| section.get(name).map(str::to_string);

        Some(KeyDefinition {
            source: field("Type"),
            persisted: section.get("Persisted").and_then(parse_bool),
            file_path: field("FilePath"),
            password: section.get("Password").map(SecretString::from),
            name: field("Name"),
            store_location: field("StoreLocation"),
            store_name: field("StoreName"),
            storage_flags: field("StorageFlags"),
        })
    }

    pub fn source_kind(&self) -> Result<KeySource, ConfigurationError> {
        KeySource::parse(self.source.as_deref())
    }

    pub(crate) fn required<'a>(
        value: &'a Option<String>,
        field: &'static str,
        source: KeySource,
    ) -> Result<&'a str, ConfigurationError> {
        value
            .as_deref()
            .ok_or(ConfigurationError::MissingField {
                field,
                source_kind: source.as_str(),
            })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}
