//! Integration tests for signing key provisioning
//!
//! Each test writes real key material into a temporary directory, runs the
//! provisioner over a `SIGNING_KEY__*` section and checks the resulting
//! credential, usually by serving it and presenting a token it signed.

use chrono::{DateTime, TimeZone, Utc};
use common::config::ConfigSection;
use reqwest::StatusCode;
use signing_service::errors::ConfigurationError;
use signing_service::keys::{
    load_or_create, DirectoryCertificateStore, Platform, StorageFlags, StoreLocation,
};
use signing_service::services::KeyProvisioner;
use signing_test_utils::{
    TestCertificateBuilder, TestSigningServer, TestTokenBuilder, TokenAssertions,
    OPENSSL3_PKCS12, OPENSSL3_PKCS12_PASSWORD, OPENSSL3_PKCS12_SUBJECT,
};
use std::path::Path;

fn provisioner(dir: &Path) -> KeyProvisioner<DirectoryCertificateStore> {
    KeyProvisioner::new(dir, DirectoryCertificateStore::new(dir.join("stores")))
        .with_platform(Platform::Linux)
}

fn section(pairs: &[(&str, &str)]) -> ConfigSection {
    ConfigSection::from_pairs(pairs.iter().copied())
}

fn mid_2025() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
}

// ============================================================================
// Development keys
// ============================================================================

/// The first run creates the key file; later runs sign with the same key.
#[tokio::test]
async fn test_development_key_is_created_once_and_reused() -> Result<(), anyhow::Error> {
    // Arrange
    let dir = tempfile::tempdir()?;
    let definition = section(&[("Type", "Development"), ("FilePath", "keys/dev.json")]);

    // Act
    let first = provisioner(dir.path())
        .provision(&definition)
        .await?
        .expect("credential");
    let second = provisioner(dir.path())
        .provision(&definition)
        .await?
        .expect("credential");

    // Assert
    assert!(dir.path().join("keys/dev.json").is_file());
    assert_eq!(first.verification_key(), second.verification_key());

    let persisted = load_or_create(&dir.path().join("keys/dev.json"), false)?;
    assert_eq!(
        signing_service::crypto::SigningCredential::development(persisted.into_private_key())
            .verification_key(),
        first.verification_key()
    );

    Ok(())
}

/// A development credential validates tokens it signed through the full HTTP stack.
#[tokio::test]
async fn test_development_key_end_to_end() -> Result<(), anyhow::Error> {
    let dir = tempfile::tempdir()?;
    let credential = provisioner(dir.path())
        .provision(&section(&[("Type", "Development")]))
        .await?;
    assert!(dir.path().join("obj/tempkey.json").is_file());

    let server = TestSigningServer::spawn(credential).await?;
    let token = server.issue_token(TestTokenBuilder::new().with_role("admin"))?;
    token.assert_signed_by("Development");

    let response = reqwest::Client::new()
        .get(format!("{}/api/v1/me", server.url()))
        .bearer_auth(token)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    Ok(())
}

/// Development keys are not created when `Persisted` is false.
#[tokio::test]
async fn test_development_key_missing_without_persist() -> Result<(), anyhow::Error> {
    let dir = tempfile::tempdir()?;

    let result = provisioner(dir.path())
        .provision(&section(&[("Type", "Development"), ("Persisted", "false")]))
        .await;

    assert!(matches!(
        result,
        Err(ConfigurationError::DevelopmentKeyMissing(_))
    ));
    assert!(!dir.path().join("obj").exists());

    Ok(())
}

// ============================================================================
// PKCS#12 files
// ============================================================================

/// The right password loads the certificate; a wrong one fails startup.
#[tokio::test]
async fn test_file_certificate_requires_correct_password() -> Result<(), anyhow::Error> {
    // Arrange
    let dir = tempfile::tempdir()?;
    let cert = TestCertificateBuilder::new("file.signing.test").build()?;
    cert.write_pkcs12(&dir.path().join("signing.pfx"), "correct horse")?;

    // Act
    let loaded = provisioner(dir.path())
        .provision(&section(&[
            ("Type", "File"),
            ("FilePath", "signing.pfx"),
            ("Password", "correct horse"),
        ]))
        .await?
        .expect("credential");

    let rejected = provisioner(dir.path())
        .provision(&section(&[
            ("Type", "File"),
            ("FilePath", "signing.pfx"),
            ("Password", "battery staple"),
        ]))
        .await;

    // Assert
    let certificate = loaded.certificate().expect("certificate-backed credential");
    assert_eq!(certificate.subject(), "CN=file.signing.test");
    assert!(loaded.key_id().is_none());

    match rejected {
        Err(ConfigurationError::CertificateLoad { flags, .. }) => {
            assert_eq!(flags, "EphemeralKeySet", "platform default flags are reported");
        }
        other => panic!("expected CertificateLoad, got {other:?}"),
    }

    Ok(())
}

/// Bundles with a SHA-256 MAC and AES-256 encrypted bags load like legacy ones.
#[tokio::test]
async fn test_file_certificate_openssl3_bundle() -> Result<(), anyhow::Error> {
    // Arrange
    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join("openssl3.pfx"), OPENSSL3_PKCS12)?;

    // Act
    let loaded = provisioner(dir.path())
        .provision(&section(&[
            ("Type", "File"),
            ("FilePath", "openssl3.pfx"),
            ("Password", OPENSSL3_PKCS12_PASSWORD),
        ]))
        .await?
        .expect("credential");

    let rejected = provisioner(dir.path())
        .provision(&section(&[
            ("Type", "File"),
            ("FilePath", "openssl3.pfx"),
            ("Password", "not-the-password"),
        ]))
        .await;

    // Assert
    let certificate = loaded.certificate().expect("certificate-backed credential");
    assert_eq!(certificate.subject(), OPENSSL3_PKCS12_SUBJECT);

    match rejected {
        Err(ConfigurationError::CertificateLoad { reason, .. }) => {
            assert!(!reason.contains("task failed"), "load must fail cleanly: {reason}");
        }
        other => panic!("expected CertificateLoad, got {other:?}"),
    }

    Ok(())
}

/// A bundle carrying an extra CA certificate still yields the key's own certificate.
#[tokio::test]
async fn test_file_certificate_with_chain_picks_matching_certificate() -> Result<(), anyhow::Error> {
    let dir = tempfile::tempdir()?;
    let leaf = TestCertificateBuilder::new("leaf.signing.test").with_key(1).build()?;
    let ca = TestCertificateBuilder::new("ca.signing.test").with_key(2).build()?;
    leaf.write_pkcs12_with_chain(&dir.path().join("chain.pfx"), "pw", Some(&ca))?;

    let credential = provisioner(dir.path())
        .provision(&section(&[
            ("Type", "File"),
            ("FilePath", "chain.pfx"),
            ("Password", "pw"),
        ]))
        .await?
        .expect("credential");

    assert_eq!(
        credential.certificate().map(|c| c.subject()),
        Some("CN=leaf.signing.test")
    );

    Ok(())
}

/// A certificate credential signs tokens the local API accepts.
#[tokio::test]
async fn test_file_certificate_end_to_end() -> Result<(), anyhow::Error> {
    let dir = tempfile::tempdir()?;
    TestCertificateBuilder::new("e2e.signing.test")
        .build()?
        .write_pkcs12(&dir.path().join("signing.pfx"), "pw")?;

    let credential = provisioner(dir.path())
        .provision(&section(&[
            ("Type", "File"),
            ("FilePath", "signing.pfx"),
            ("Password", "pw"),
        ]))
        .await?;

    let server = TestSigningServer::spawn(credential).await?;
    let token = server.issue_token(TestTokenBuilder::new().with_name("bob"))?;
    token.assert_valid_jwt().assert_unkeyed();

    let response = reqwest::Client::new()
        .get(format!("{}/api/v1/me", server.url()))
        .bearer_auth(token)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    Ok(())
}

// ============================================================================
// Storage flags
// ============================================================================

/// Named flags combine by OR; one unknown name fails the definition.
#[tokio::test]
async fn test_storage_flags_parse_and_reject() -> Result<(), anyhow::Error> {
    assert_eq!(
        StorageFlags::parse_list("UserKeySet Exportable")?.map(StorageFlags::bits),
        Some(5)
    );

    let dir = tempfile::tempdir()?;
    TestCertificateBuilder::new("flags.signing.test")
        .build()?
        .write_pkcs12(&dir.path().join("signing.pfx"), "pw")?;

    let result = provisioner(dir.path())
        .provision(&section(&[
            ("Type", "File"),
            ("FilePath", "signing.pfx"),
            ("Password", "pw"),
            ("StorageFlags", "Exportable Bogus"),
        ]))
        .await;

    assert!(
        matches!(result, Err(ConfigurationError::InvalidStorageFlag(ref flag)) if flag == "Bogus")
    );

    Ok(())
}

/// Ephemeral key sets are refused on macOS but load elsewhere.
#[tokio::test]
async fn test_ephemeral_flags_depend_on_platform() -> Result<(), anyhow::Error> {
    let dir = tempfile::tempdir()?;
    TestCertificateBuilder::new("platform.signing.test")
        .build()?
        .write_pkcs12(&dir.path().join("signing.pfx"), "pw")?;
    let definition = section(&[
        ("Type", "File"),
        ("FilePath", "signing.pfx"),
        ("Password", "pw"),
        ("StorageFlags", "EphemeralKeySet"),
    ]);

    let on_linux = provisioner(dir.path()).provision(&definition).await;
    let on_macos = provisioner(dir.path())
        .with_platform(Platform::MacOs)
        .provision(&definition)
        .await;

    assert!(on_linux.is_ok());
    assert!(matches!(
        on_macos,
        Err(ConfigurationError::RejectedStorageFlags { .. })
    ));

    Ok(())
}

// ============================================================================
// Certificate stores
// ============================================================================

/// The valid certificate expiring soonest is selected.
#[tokio::test]
async fn test_store_selects_soonest_expiring_valid_certificate() -> Result<(), anyhow::Error> {
    // Arrange
    let dir = tempfile::tempdir()?;
    let store = DirectoryCertificateStore::new(dir.path().join("stores"));
    let store_dir = store.store_path("My", StoreLocation::CurrentUser);

    let builder = |not_before, not_after| {
        TestCertificateBuilder::new("store.signing.test").valid_between(not_before, not_after)
    };
    let expired = builder((2020, 1, 1), (2025, 1, 1)).build()?;
    let not_yet_valid = builder((2025, 7, 1), (2025, 8, 1)).build()?;
    let long_lived = builder((2025, 1, 1), (2027, 1, 1)).build()?;
    let soonest = builder((2025, 1, 1), (2025, 9, 1)).with_key(2).build()?;
    let other_subject = TestCertificateBuilder::new("other.test")
        .valid_between((2025, 1, 1), (2025, 7, 1))
        .build()?;

    expired.write_store_entry(&store_dir, "expired.pem")?;
    not_yet_valid.write_store_entry(&store_dir, "future.pem")?;
    long_lived.write_store_entry(&store_dir, "long.pem")?;
    soonest.write_store_entry(&store_dir, "soonest.pem")?;
    other_subject.write_store_entry(&store_dir, "other.pem")?;

    // Act
    let credential = provisioner(dir.path())
        .provision_at(
            &section(&[
                ("Type", "Store"),
                ("Name", "cn=Store.Signing.Test"),
                ("StoreName", "My"),
                ("StoreLocation", "CurrentUser"),
            ]),
            mid_2025(),
        )
        .await?
        .expect("credential");

    // Assert
    let certificate = credential.certificate().expect("certificate");
    assert_eq!(
        certificate.not_after(),
        Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap()
    );
    assert_eq!(certificate.der(), soonest.der.as_slice());

    Ok(())
}

/// No valid certificate for the subject is fatal.
#[tokio::test]
async fn test_store_without_valid_certificate_fails() -> Result<(), anyhow::Error> {
    let dir = tempfile::tempdir()?;
    let store = DirectoryCertificateStore::new(dir.path().join("stores"));
    TestCertificateBuilder::new("stale.signing.test")
        .valid_between((2020, 1, 1), (2021, 1, 1))
        .build()?
        .write_store_entry(&store.store_path("My", StoreLocation::LocalMachine), "stale.pem")?;

    let result = provisioner(dir.path())
        .provision_at(
            &section(&[
                ("Type", "Store"),
                ("Name", "CN=stale.signing.test"),
                ("StoreName", "My"),
                ("StoreLocation", "2"),
            ]),
            mid_2025(),
        )
        .await;

    match result {
        Err(ConfigurationError::NoValidCertificate {
            subject, location, ..
        }) => {
            assert_eq!(subject, "CN=stale.signing.test");
            assert_eq!(location, "LocalMachine");
        }
        other => panic!("expected NoValidCertificate, got {other:?}"),
    }

    Ok(())
}

/// A store entry whose key belongs to another certificate is refused.
#[tokio::test]
async fn test_store_entry_with_mismatched_key_fails() -> Result<(), anyhow::Error> {
    let dir = tempfile::tempdir()?;
    let store = DirectoryCertificateStore::new(dir.path().join("stores"));
    TestCertificateBuilder::new("mismatch.signing.test")
        .with_key(1)
        .build()?
        .write_store_entry_with_key(
            &store.store_path("My", StoreLocation::CurrentUser),
            "mismatch.pem",
            Some(2),
        )?;

    let result = provisioner(dir.path())
        .provision_at(
            &section(&[
                ("Type", "Store"),
                ("Name", "CN=mismatch.signing.test"),
                ("StoreName", "My"),
                ("StoreLocation", "CurrentUser"),
            ]),
            mid_2025(),
        )
        .await;

    assert!(matches!(result, Err(ConfigurationError::UnsupportedKey(_))));

    Ok(())
}
