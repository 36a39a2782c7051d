//! Signing key sources.
//!
//! - [`definition`]: the `SIGNING_KEY__*` configuration section
//! - [`development`]: locally generated RSA key persisted as JSON
//! - [`certificate`]: PKCS#12 files and certificate store selection
//! - [`store`]: certificate store backends
//! - [`storage_flags`]: key storage flags and platform defaults

pub mod certificate;
pub mod definition;
pub mod development;
pub mod storage_flags;
pub mod store;

pub use certificate::{load_from_file, load_from_store, select_certificate, Certificate};
pub use definition::{KeyDefinition, KeySource};
pub use development::{load_or_create, DevelopmentKey, RsaKeyParameters};
pub use storage_flags::{Platform, StorageFlags};
pub use store::{CertificateStore, DirectoryCertificateStore, StoreLocation};
