//! Token validation options bound for the local API.

use crate::errors::AuthError;
use async_trait::async_trait;
use std::sync::Arc;

/// Claim holding the principal name.
pub const NAME_CLAIM_TYPE: &str = "name";

/// Claim holding the principal roles.
pub const ROLE_CLAIM_TYPE: &str = "role";

/// The subset of provider metadata token validation consumes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenIdConfiguration {
    pub issuer: Option<String>,
}

/// Supplies provider metadata to token validation.
#[async_trait]
pub trait ConfigurationManager: Send + Sync {
    async fn get_configuration(&self) -> Result<OpenIdConfiguration, AuthError>;

    /// Ask for fresh metadata on the next call.
    fn request_refresh(&self);
}

/// Always returns the same configuration. Refresh requests are ignored.
#[derive(Debug, Clone)]
pub struct StaticConfigurationManager {
    configuration: OpenIdConfiguration,
}

impl StaticConfigurationManager {
    pub fn new(issuer: Option<String>) -> Self {
        Self {
            configuration: OpenIdConfiguration { issuer },
        }
    }
}

#[async_trait]
impl ConfigurationManager for StaticConfigurationManager {
    async fn get_configuration(&self) -> Result<OpenIdConfiguration, AuthError> {
        Ok(self.configuration.clone())
    }

    fn request_refresh(&self) {}
}

/// Validation parameters fixed when the local API is registered.
#[derive(Clone)]
pub struct TokenValidationOptions {
    audience: String,
    configured_authority: Option<String>,
    configuration_manager: Arc<dyn ConfigurationManager>,
}

impl TokenValidationOptions {
    /// Bind `api_name` as the audience and install a static configuration
    /// manager issuing as `configured_authority`.
    pub fn for_local_api(api_name: impl Into<String>, configured_authority: Option<String>) -> Self {
        let configuration_manager = Arc::new(StaticConfigurationManager::new(configured_authority.clone()));
        Self {
            audience: api_name.into(),
            configured_authority,
            configuration_manager,
        }
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    pub fn name_claim_type(&self) -> &'static str {
        NAME_CLAIM_TYPE
    }

    pub fn role_claim_type(&self) -> &'static str {
        ROLE_CLAIM_TYPE
    }

    /// The externally configured authority, which wins over the issuer-name service.
    pub fn configured_authority(&self) -> Option<&str> {
        self.configured_authority.as_deref()
    }

    /// Issuers a token may carry: the resolved authority followed by the
    /// configuration manager's issuer, without duplicates.
    pub async fn accepted_issuers(
        &self,
        resolved_authority: Option<&str>,
    ) -> Result<Vec<String>, AuthError> {
        let mut issuers: Vec<String> = resolved_authority.map(str::to_string).into_iter().collect();

        let configuration = self.configuration_manager.get_configuration().await?;
        if let Some(issuer) = configuration.issuer {
            if !issuers.contains(&issuer) {
                issuers.push(issuer);
            }
        }

        Ok(issuers)
    }
}

impl std::fmt::Debug for TokenValidationOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenValidationOptions")
            .field("audience", &self.audience)
            .field("configured_authority", &self.configured_authority)
            .finish_non_exhaustive()
    }
}
