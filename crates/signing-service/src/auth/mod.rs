//! Bearer token validation for the co-located API.

pub mod collaborators;
pub mod options;
pub mod resolver;

pub use collaborators::{
    CredentialStore, InMemoryCredentialStore, IssuerNameService, StaticIssuerNameService,
};
pub use options::{ConfigurationManager, StaticConfigurationManager, TokenValidationOptions};
pub use resolver::{AuthenticatedPrincipal, DeferredTokenValidationResolver, ValidationState};
