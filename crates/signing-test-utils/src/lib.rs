//! # Signing Test Utilities
//!
//! Shared test utilities for the signing service.
//!
//! This crate provides:
//! - Deterministic crypto fixtures (fixed RSA keys for reproducible tests)
//! - Self-signed certificates written as PKCS#12 bundles or store entries
//! - Test data builders (TestTokenBuilder)
//! - Server test harness (TestSigningServer for E2E tests)
//! - Custom assertions (TokenAssertions trait)
//! - Mock credential store and issuer-name collaborators
//!
//! ## Usage
//!
//! ```rust,ignore
//! use signing_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let credential = test_credential(1)?;
//!
//!     let token = TestTokenBuilder::new()
//!         .for_user("alice")
//!         .with_role("admin")
//!         .sign(&credential)?;
//!
//!     token.assert_valid_jwt().assert_has_role("admin");
//!     Ok(())
//! }
//! ```

pub mod assertions;
pub mod certificate_fixtures;
pub mod crypto_fixtures;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use assertions::*;
pub use certificate_fixtures::*;
pub use crypto_fixtures::*;
pub use server_harness::*;
pub use token_builders::*;

/// Call-counting collaborators for resolver tests.
pub use signing_service::auth::collaborators::mock;
