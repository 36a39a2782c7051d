//! Flat configuration sections.
//!
//! A section is a set of `field -> value` pairs carved out of a larger variable
//! map by prefix, e.g. every `SIGNING_KEY__*` environment variable. Field names
//! are compared case-insensitively, so `SIGNING_KEY__FilePath` and
//! `SIGNING_KEY__FILEPATH` address the same field.
//!
//! # Example
//!
//! ```rust
//! use common::config::ConfigSection;
//! use std::collections::HashMap;
//!
//! let vars = HashMap::from([
//!     ("SIGNING_KEY__TYPE".to_string(), "Development".to_string()),
//!     ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
//! ]);
//!
//! let section = ConfigSection::from_prefixed(&vars, "SIGNING_KEY__");
//! assert_eq!(section.get("Type"), Some("Development"));
//! assert_eq!(section.len(), 1);
//! ```

use std::collections::{BTreeMap, HashMap};

/// A flat key-value configuration section with case-insensitive field names.
///
/// `Debug` prints field names only; values may hold passwords.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConfigSection {
    // Keyed by the lowercased field name.
    entries: BTreeMap<String, String>,
}

impl ConfigSection {
    /// Create an empty section.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect every variable whose name starts with `prefix` (ignoring ASCII
    /// case), keyed by the remainder of the name.
    ///
    /// Variables that equal the prefix exactly are ignored.
    #[must_use]
    pub fn from_prefixed<S: std::hash::BuildHasher>(
        vars: &HashMap<String, String, S>,
        prefix: &str,
    ) -> Self {
        let mut section = Self::new();
        for (name, value) in vars {
            let Some(head) = name.get(..prefix.len()) else {
                continue;
            };
            if !head.eq_ignore_ascii_case(prefix) {
                continue;
            }
            if let Some(field) = name.get(prefix.len()..) {
                if !field.is_empty() {
                    section.insert(field, value);
                }
            }
        }
        section
    }

    /// Build a section from `(field, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut section = Self::new();
        for (field, value) in pairs {
            section.insert(field.as_ref(), value);
        }
        section
    }

    /// Set a field, replacing any value stored under the same name in any case.
    pub fn insert(&mut self, field: &str, value: impl Into<String>) {
        self.entries.insert(field.to_ascii_lowercase(), value.into());
    }

    /// Look up a field by name, ignoring ASCII case.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.entries
            .get(&field.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// True when no field was supplied at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of fields in the section.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl std::fmt::Debug for ConfigSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}
