//! Canonical tag sets
//!
//! Tags are kept sorted by key, so the same pairs supplied in any order compare
//! equal and hash equally. This is what keeps one logical series from forking
//! into several counters.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use super::RegistryError;
use super::naming::label_name;

/// A canonical set of tag key/value pairs
///
/// Keys are unique and non-empty. Values may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Tags(BTreeMap<String, String>);

impl Tags {
    /// The empty tag set
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a canonical tag set from caller-supplied pairs
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::InvalidIdentity` if a key is empty or the same
    /// key appears more than once. Duplicates are rejected rather than letting
    /// the last value win.
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Result<Self, RegistryError> {
        let mut map = BTreeMap::new();
        for (key, value) in pairs {
            if key.is_empty() {
                return Err(RegistryError::InvalidIdentity {
                    reason: "tag key must not be empty".to_string(),
                });
            }
            if map.insert((*key).to_string(), (*value).to_string()).is_some() {
                return Err(RegistryError::InvalidIdentity {
                    reason: format!("duplicate tag key '{}'", key),
                });
            }
        }
        Ok(Self(map))
    }

    /// Fill in any key from `defaults` that this set does not already carry
    pub(crate) fn with_defaults(mut self, defaults: &Tags) -> Self {
        for (key, value) in &defaults.0 {
            self.0
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        self
    }

    /// Reject keys that are distinct here but export as the same label
    ///
    /// `x.y` and `x_y` are different tag keys, yet both become the Prometheus
    /// label `x_y`; a series carrying both could not be exposed.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::InvalidIdentity` naming both keys.
    pub fn ensure_distinct_labels(&self) -> Result<(), RegistryError> {
        let mut seen: BTreeMap<String, &str> = BTreeMap::new();
        for key in self.0.keys() {
            let label = label_name(key);
            if let Some(previous) = seen.insert(label.clone(), key) {
                return Err(RegistryError::InvalidIdentity {
                    reason: format!(
                        "tag keys '{}' and '{}' both export as label '{}'",
                        previous, key, label
                    ),
                });
            }
        }
        Ok(())
    }

    /// Look up the value for a key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Iterate pairs in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Tags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return Ok(());
        }
        write!(f, "{{")?;
        for (idx, (key, value)) in self.0.iter().enumerate() {
            if idx > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}={:?}", key, value)?;
        }
        write!(f, "}}")
    }
}
