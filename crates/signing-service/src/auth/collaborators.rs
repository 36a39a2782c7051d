//! Collaborators consulted when token validation parameters are resolved.

use crate::crypto::SigningCredential;
use crate::errors::AuthError;
use async_trait::async_trait;

/// Source of the credential the token-issuing component signs with.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get_signing_credential(&self) -> Result<SigningCredential, AuthError>;
}

/// Source of the authority (issuer) this process issues tokens as.
#[async_trait]
pub trait IssuerNameService: Send + Sync {
    async fn get_current_authority(&self) -> Result<String, AuthError>;
}

/// Holds the credential produced at startup.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCredentialStore {
    credential: Option<SigningCredential>,
}

impl InMemoryCredentialStore {
    pub fn new(credential: Option<SigningCredential>) -> Self {
        Self { credential }
    }

    pub fn credential(&self) -> Option<&SigningCredential> {
        self.credential.as_ref()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get_signing_credential(&self) -> Result<SigningCredential, AuthError> {
        self.credential
            .clone()
            .ok_or_else(|| AuthError::ResolutionFailed("no signing credential provisioned".to_string()))
    }
}

/// Returns a fixed issuer URI.
#[derive(Debug, Clone)]
pub struct StaticIssuerNameService {
    issuer: String,
}

impl StaticIssuerNameService {
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
        }
    }
}

#[async_trait]
impl IssuerNameService for StaticIssuerNameService {
    async fn get_current_authority(&self) -> Result<String, AuthError> {
        Ok(self.issuer.clone())
    }
}

/// Call-counting collaborators for tests.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Mock credential store.
    pub struct MockCredentialStore {
        credential: Option<SigningCredential>,
        /// Calls that fail before the store starts answering.
        failures: AtomicUsize,
        delay: Option<Duration>,
        call_count: AtomicUsize,
    }

    impl MockCredentialStore {
        /// Create a mock that always returns `credential`.
        pub fn returning(credential: SigningCredential) -> Self {
            Self {
                credential: Some(credential),
                failures: AtomicUsize::new(0),
                delay: None,
                call_count: AtomicUsize::new(0),
            }
        }

        /// Create a mock that always fails.
        pub fn failing() -> Self {
            Self {
                credential: None,
                failures: AtomicUsize::new(0),
                delay: None,
                call_count: AtomicUsize::new(0),
            }
        }

        /// Fail the first `count` calls, then answer normally.
        pub fn failing_first(mut self, count: usize) -> Self {
            self.failures = AtomicUsize::new(count);
            self
        }

        /// Suspend for `delay` before answering.
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// Get the number of calls made.
        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CredentialStore for MockCredentialStore {
        async fn get_signing_credential(&self) -> Result<SigningCredential, AuthError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            let failing = self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(AuthError::ResolutionFailed("mock credential store unavailable".to_string()));
            }

            self.credential
                .clone()
                .ok_or_else(|| AuthError::ResolutionFailed("mock credential store error".to_string()))
        }
    }

    /// Mock issuer-name service.
    pub struct MockIssuerNameService {
        authority: Option<String>,
        call_count: AtomicUsize,
    }

    impl MockIssuerNameService {
        pub fn returning(authority: impl Into<String>) -> Self {
            Self {
                authority: Some(authority.into()),
                call_count: AtomicUsize::new(0),
            }
        }

        pub fn failing() -> Self {
            Self {
                authority: None,
                call_count: AtomicUsize::new(0),
            }
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl IssuerNameService for MockIssuerNameService {
        async fn get_current_authority(&self) -> Result<String, AuthError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            self.authority
                .clone()
                .ok_or_else(|| AuthError::ResolutionFailed("mock issuer service error".to_string()))
        }
    }

}
