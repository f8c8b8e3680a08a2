//! Case-insensitive option maps for data-source reads.
//!
//! Data-source options (`Read.DataSource.options`) compare keys without
//! regard to ASCII case, but the casing a producer wrote must survive a
//! round trip over the wire. [`OptionMap`] therefore stores entries
//! verbatim in insertion order and normalizes only at lookup time.

use serde::{Deserialize, Serialize};

/// An insertion-ordered string map with ASCII-case-insensitive keys.
///
/// Lookup, replacement, and removal all match keys case-insensitively.
/// The stored key keeps the casing of its first insertion, and iteration
/// yields entries in insertion order, which keeps encoding deterministic.
///
/// # Example
///
/// ```
/// use planwire::OptionMap;
///
/// let mut options = OptionMap::new();
/// options.insert("Path", "/data/users.parquet");
///
/// assert_eq!(options.get("PATH"), Some("/data/users.parquet"));
/// // Original casing is preserved for the wire.
/// assert_eq!(options.iter().next(), Some(("Path", "/data/users.parquet")));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionMap {
    entries: Vec<(String, String)>,
}

impl OptionMap {
    /// Creates an empty option map.
    #[must_use]
    pub const fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the map holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts an option, replacing the value of any case-insensitive
    /// match. Returns the previous value if one existed.
    ///
    /// When replacing, the stored key keeps its original casing.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Option<String> {
        let key = key.into();
        let value = value.into();
        if let Some(entry) = self.entry_mut(&key) {
            return Some(std::mem::replace(&mut entry.1, value));
        }
        self.entries.push((key, value));
        None
    }

    /// Looks up an option value, comparing keys case-insensitively.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Returns true if a case-insensitive match for the key exists.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Removes an option, comparing keys case-insensitively.
    /// Returns the removed value if one existed.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let idx = self.entries.iter().position(|(k, _)| k.eq_ignore_ascii_case(key))?;
        Some(self.entries.remove(idx).1)
    }

    /// Iterates entries in insertion order with their original casing.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn entry_mut(&mut self, key: &str) -> Option<&mut (String, String)> {
        self.entries.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(key))
    }
}

impl FromIterator<(String, String)> for OptionMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}
