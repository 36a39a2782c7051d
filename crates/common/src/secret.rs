//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports the [`secrecy`] wrappers used for certificate passwords and raw
//! private key bytes. `Debug` on these types prints a redaction marker, so a
//! struct that derives `Debug` over a secret field is safe to hand to
//! `tracing`. Values are zeroized on drop.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct PfxLocation {
//!     path: String,
//!     password: SecretString,
//! }
//!
//! let location = PfxLocation {
//!     path: "certs/signing.pfx".to_string(),
//!     password: SecretString::from("hunter2"),
//! };
//!
//! assert!(!format!("{location:?}").contains("hunter2"));
//! assert_eq!(location.password.expose_secret(), "hunter2");
//! ```
//!
//! # Usage
//!
//! Use `SecretString` for:
//! - PKCS#12 passwords read from configuration
//!
//! Use `SecretBox<Vec<u8>>` for:
//! - PKCS#8 private key bytes read from a certificate store entry

pub use secrecy::{ExposeSecret, SecretBox, SecretString};
