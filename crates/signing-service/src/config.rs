use common::config::ConfigSection;
use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8083";
pub const DEFAULT_API_NAME: &str = "LocalApi";
pub const DEFAULT_ISSUER_URI: &str = "http://localhost:8083";
pub const DEFAULT_CERT_STORE_ROOT: &str = "/etc/signing-authority/stores";

/// Prefix of the flat signing key definition variables.
pub const SIGNING_KEY_PREFIX: &str = "SIGNING_KEY__";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    /// Logical api name, bound as the token audience.
    pub api_name: String,
    /// Externally configured authority. Wins over `issuer_uri` when set.
    pub authority: Option<String>,
    /// Authority reported by the built-in issuer-name service.
    pub issuer_uri: String,
    pub cert_store_root: PathBuf,
    /// `SIGNING_KEY__*` fields; empty when no key is configured.
    pub signing_key: ConfigSection,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing)
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        bind_address
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue {
                name: "BIND_ADDRESS".to_string(),
                reason: e.to_string(),
            })?;

        let api_name = vars
            .get("API_NAME")
            .cloned()
            .unwrap_or_else(|| DEFAULT_API_NAME.to_string());

        if api_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "API_NAME".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        let authority = vars
            .get("AUTHORITY")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let issuer_uri = vars
            .get("ISSUER_URI")
            .cloned()
            .unwrap_or_else(|| DEFAULT_ISSUER_URI.to_string());

        let cert_store_root = vars
            .get("CERT_STORE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CERT_STORE_ROOT));

        let signing_key = ConfigSection::from_prefixed(vars, SIGNING_KEY_PREFIX);

        Ok(Config {
            bind_address,
            api_name,
            authority,
            issuer_uri,
            cert_store_root,
            signing_key,
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind_address
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::InvalidValue {
                name: "BIND_ADDRESS".to_string(),
                reason: e.to_string(),
            })
    }
}
