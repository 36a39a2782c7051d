//! Key storage flags applied when importing a PKCS#12 bundle.
//!
//! The flag names and bit values follow the X.509 key-storage flag set that
//! certificate configuration files are written against, so existing
//! `StorageFlags` settings carry over unchanged.

use crate::errors::ConfigurationError;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Target platform, fixed at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    MacOs,
    Other,
}

impl Platform {
    /// The platform this binary was compiled for.
    pub const fn current() -> Self {
        if cfg!(target_os = "linux") {
            Platform::Linux
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Other
        }
    }
}

/// A combination of key storage flags.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StorageFlags(u32);

const NAMED_FLAGS: [(&str, StorageFlags); 7] = [
    ("DefaultKeySet", StorageFlags::DEFAULT_KEY_SET),
    ("UserKeySet", StorageFlags::USER_KEY_SET),
    ("MachineKeySet", StorageFlags::MACHINE_KEY_SET),
    ("Exportable", StorageFlags::EXPORTABLE),
    ("UserProtected", StorageFlags::USER_PROTECTED),
    ("PersistKeySet", StorageFlags::PERSIST_KEY_SET),
    ("EphemeralKeySet", StorageFlags::EPHEMERAL_KEY_SET),
];

impl StorageFlags {
    pub const DEFAULT_KEY_SET: StorageFlags = StorageFlags(0);
    pub const USER_KEY_SET: StorageFlags = StorageFlags(1);
    pub const MACHINE_KEY_SET: StorageFlags = StorageFlags(2);
    pub const EXPORTABLE: StorageFlags = StorageFlags(4);
    pub const USER_PROTECTED: StorageFlags = StorageFlags(8);
    pub const PERSIST_KEY_SET: StorageFlags = StorageFlags(16);
    pub const EPHEMERAL_KEY_SET: StorageFlags = StorageFlags(32);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: StorageFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Flags used when the key definition does not name any.
    ///
    /// Linux gets an in-memory key set so nothing is written to disk; macOS
    /// needs a persisted key set for the keychain import to succeed.
    pub const fn platform_default(platform: Platform) -> Self {
        match platform {
            Platform::Linux => StorageFlags::EPHEMERAL_KEY_SET,
            Platform::MacOs => StorageFlags::PERSIST_KEY_SET,
            Platform::Other => StorageFlags::DEFAULT_KEY_SET,
        }
    }

    /// Parse a single flag name (exact, case-sensitive).
    pub fn parse_flag(candidate: &str) -> Result<Self, ConfigurationError> {
        NAMED_FLAGS
            .iter()
            .find(|(name, _)| *name == candidate)
            .map(|(_, flag)| *flag)
            .ok_or_else(|| ConfigurationError::InvalidStorageFlag(candidate.to_string()))
    }

    /// Parse a space-separated list of flag names and OR them together.
    ///
    /// Returns `None` for a list without any names so the caller can fall
    /// back to [`StorageFlags::platform_default`]. A single unknown name fails
    /// the whole list.
    pub fn parse_list(list: &str) -> Result<Option<Self>, ConfigurationError> {
        let mut result: Option<StorageFlags> = None;
        for candidate in list.split_whitespace() {
            let flag = Self::parse_flag(candidate)?;
            result = Some(result.map_or(flag, |acc| acc | flag));
        }
        Ok(result)
    }

    /// Reject combinations the key import cannot honour on `platform`.
    pub fn check_supported(self, platform: Platform) -> Result<(), ConfigurationError> {
        let reject = |reason: &str| {
            Err(ConfigurationError::RejectedStorageFlags {
                flags: self.to_string(),
                reason: reason.to_string(),
            })
        };

        if self.contains(Self::USER_KEY_SET) && self.contains(Self::MACHINE_KEY_SET) {
            return reject("UserKeySet and MachineKeySet are mutually exclusive");
        }
        if self.contains(Self::EPHEMERAL_KEY_SET) && self.contains(Self::PERSIST_KEY_SET) {
            return reject("EphemeralKeySet and PersistKeySet are mutually exclusive");
        }
        if platform == Platform::MacOs && self.contains(Self::EPHEMERAL_KEY_SET) {
            return reject("EphemeralKeySet is not available on macOS");
        }
        Ok(())
    }
}

impl BitOr for StorageFlags {
    type Output = StorageFlags;

    fn bitor(self, rhs: StorageFlags) -> StorageFlags {
        StorageFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for StorageFlags {
    fn bitor_assign(&mut self, rhs: StorageFlags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for StorageFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return f.write_str("DefaultKeySet");
        }
        let names: Vec<&str> = NAMED_FLAGS
            .iter()
            .filter(|(_, flag)| flag.0 != 0 && self.contains(*flag))
            .map(|(name, _)| *name)
            .collect();
        f.write_str(&names.join(", "))
    }
}

impl fmt::Debug for StorageFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorageFlags({self})")
    }
}
