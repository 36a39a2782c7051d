//! Development signing key persisted as a local JSON file.
//!
//! The file holds the RSA parameters as standard base64 big-endian integers
//! under the names `D, Dp, Dq, E, Iq, M, P, Q`. Parameters missing from the
//! file stay missing when the key is written back out.

use crate::errors::ConfigurationError;
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{BigUint, RsaPrivateKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Smallest modulus accepted for a generated key.
pub const MIN_KEY_BITS: usize = 2048;

/// Default location of the development key, relative to the working directory.
pub const DEFAULT_DEVELOPMENT_KEY_PATH: &str = "obj/tempkey.json";

/// RSA parameters in their on-disk layout.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RsaKeyParameters {
    #[serde(rename = "D", default, with = "base64_field", skip_serializing_if = "Option::is_none")]
    pub d: Option<Vec<u8>>,
    #[serde(rename = "Dp", default, with = "base64_field", skip_serializing_if = "Option::is_none")]
    pub dp: Option<Vec<u8>>,
    #[serde(rename = "Dq", default, with = "base64_field", skip_serializing_if = "Option::is_none")]
    pub dq: Option<Vec<u8>>,
    #[serde(rename = "E", default, with = "base64_field", skip_serializing_if = "Option::is_none")]
    pub e: Option<Vec<u8>>,
    #[serde(rename = "Iq", default, with = "base64_field", skip_serializing_if = "Option::is_none")]
    pub iq: Option<Vec<u8>>,
    #[serde(rename = "M", default, with = "base64_field", skip_serializing_if = "Option::is_none")]
    pub m: Option<Vec<u8>>,
    #[serde(rename = "P", default, with = "base64_field", skip_serializing_if = "Option::is_none")]
    pub p: Option<Vec<u8>>,
    #[serde(rename = "Q", default, with = "base64_field", skip_serializing_if = "Option::is_none")]
    pub q: Option<Vec<u8>>,
}

impl RsaKeyParameters {
    /// Export every parameter of `key`.
    ///
    /// `D` is left-padded to the modulus length and the CRT values to half of
    /// it, so the encoded widths do not depend on leading zero bytes.
    pub fn from_private_key(key: &RsaPrivateKey) -> Self {
        let modulus_len = key.size();
        let half_len = modulus_len.div_ceil(2);
        let one = BigUint::from(1u8);

        let primes = key.primes();
        let (p, q) = match primes {
            [p, q, ..] => (Some(p), Some(q)),
            _ => (None, None),
        };

        RsaKeyParameters {
            d: Some(fixed_width(key.d(), modulus_len)),
            dp: p.map(|p| fixed_width(&(key.d() % &(p - &one)), half_len)),
            dq: q.map(|q| fixed_width(&(key.d() % &(q - &one)), half_len)),
            e: Some(key.e().to_bytes_be()),
            iq: key
                .crt_coefficient()
                .map(|iq| fixed_width(&iq, half_len)),
            m: Some(key.n().to_bytes_be()),
            p: p.map(|p| fixed_width(p, half_len)),
            q: q.map(|q| fixed_width(q, half_len)),
        }
    }

    /// Rebuild the private key. `M`, `E` and `D` must be present.
    pub fn to_private_key(&self) -> Result<RsaPrivateKey, String> {
        let required = |value: &Option<Vec<u8>>, name: &str| {
            value
                .as_deref()
                .map(BigUint::from_bytes_be)
                .ok_or_else(|| format!("missing {name} parameter"))
        };

        let n = required(&self.m, "M")?;
        let e = required(&self.e, "E")?;
        let d = required(&self.d, "D")?;

        let one = BigUint::from(1u8);
        if n <= one || &n % BigUint::from(2u8) != one {
            return Err("modulus must be an odd integer greater than one".to_string());
        }
        if e <= one || e >= n {
            return Err("public exponent must lie between 1 and the modulus".to_string());
        }
        if d == BigUint::from(0u8) || d >= n {
            return Err("private exponent must lie between 0 and the modulus".to_string());
        }

        let primes = match (&self.p, &self.q) {
            (Some(p), Some(q)) => {
                let p = BigUint::from_bytes_be(p);
                let q = BigUint::from_bytes_be(q);
                if p <= one || q <= one || &p * &q != n {
                    return Err("primes P and Q do not factor the modulus".to_string());
                }
                vec![p, q]
            }
            _ => Vec::new(),
        };

        let key = RsaPrivateKey::from_components(n, e, d, primes)
            .map_err(|e| format!("invalid RSA parameters: {e}"))?;
        key.validate()
            .map_err(|e| format!("invalid RSA parameters: {e}"))?;
        Ok(key)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl fmt::Debug for RsaKeyParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaKeyParameters")
            .field("m_len", &self.m.as_ref().map(Vec::len))
            .field("private", &"[REDACTED]")
            .finish()
    }
}

fn fixed_width(value: &BigUint, len: usize) -> Vec<u8> {
    let bytes = value.to_bytes_be();
    if bytes.len() >= len {
        return bytes;
    }
    let mut padded = vec![0u8; len - bytes.len()];
    padded.extend_from_slice(&bytes);
    padded
}

mod base64_field {
    use base64::{engine::general_purpose, Engine as _};
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_str(&general_purpose::STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|encoded| general_purpose::STANDARD.decode(encoded).map_err(D::Error::custom))
            .transpose()
    }
}

/// A development key and the parameters it was loaded from.
pub struct DevelopmentKey {
    parameters: RsaKeyParameters,
    private_key: RsaPrivateKey,
}

impl DevelopmentKey {
    pub fn parameters(&self) -> &RsaKeyParameters {
        &self.parameters
    }

    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }

    pub fn into_private_key(self) -> RsaPrivateKey {
        self.private_key
    }
}

impl fmt::Debug for DevelopmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DevelopmentKey")
            .field("bits", &(self.private_key.size() * 8))
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

/// Load the key at `path`, or generate and persist one.
///
/// Nothing is written unless the file is missing and `create_if_missing`
/// is set.
#[instrument(skip_all, fields(path = %path.display(), create_if_missing))]
pub fn load_or_create(path: &Path, create_if_missing: bool) -> Result<DevelopmentKey, ConfigurationError> {
    match std::fs::read(path) {
        Ok(contents) => load(path, &contents),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if !create_if_missing {
                return Err(ConfigurationError::DevelopmentKeyMissing(path.to_path_buf()));
            }
            create(path)
        }
        Err(e) => Err(ConfigurationError::io(path, e)),
    }
}

fn load(path: &Path, contents: &[u8]) -> Result<DevelopmentKey, ConfigurationError> {
    let invalid = |reason: String| ConfigurationError::InvalidDevelopmentKey {
        path: path.to_path_buf(),
        reason,
    };

    let parameters: RsaKeyParameters =
        serde_json::from_slice(contents).map_err(|e| invalid(e.to_string()))?;
    let private_key = parameters.to_private_key().map_err(invalid)?;

    tracing::debug!(
        target: "signing.dev_key",
        bits = private_key.size() * 8,
        "Loaded development key from disk"
    );

    Ok(DevelopmentKey {
        parameters,
        private_key,
    })
}

fn create(path: &Path) -> Result<DevelopmentKey, ConfigurationError> {
    let private_key = generate_key(MIN_KEY_BITS)?;
    let parameters = RsaKeyParameters::from_private_key(&private_key);

    let json = parameters
        .to_json()
        .map_err(|e| ConfigurationError::KeyGeneration(format!("key serialization failed: {e}")))?;
    write_atomically(path, json.as_bytes())?;

    tracing::info!(
        target: "signing.dev_key",
        path = %path.display(),
        bits = private_key.size() * 8,
        "Created development key"
    );

    Ok(DevelopmentKey {
        parameters,
        private_key,
    })
}

/// Generate an RSA key of `bits` and refuse anything below [`MIN_KEY_BITS`].
pub(crate) fn generate_key(bits: usize) -> Result<RsaPrivateKey, ConfigurationError> {
    let mut rng = rand::thread_rng();
    let key = RsaPrivateKey::new(&mut rng, bits)
        .map_err(|e| ConfigurationError::KeyGeneration(e.to_string()))?;

    let actual = key.n().bits();
    if actual < MIN_KEY_BITS {
        return Err(ConfigurationError::WeakKey {
            bits: actual,
            required: MIN_KEY_BITS,
        });
    }
    Ok(key)
}

fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), ConfigurationError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ConfigurationError::io(parent, e))?;
    }

    let temp_path = temp_sibling(path);
    std::fs::write(&temp_path, contents).map_err(|e| ConfigurationError::io(&temp_path, e))?;
    std::fs::rename(&temp_path, path).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        ConfigurationError::io(path, e)
    })
}

fn temp_sibling(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{file_name}.{}.tmp", std::process::id()))
}
