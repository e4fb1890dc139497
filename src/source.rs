//! The persisted form of one entity's properties.

use crate::error::Result;
use crate::serialization::{deserialize_envelope, serialize_envelope};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::{self, BTreeMap};

/// Flat mapping from property key to raw string value.
///
/// This is exactly what gets persisted for one entity instance. Keys are not
/// checked against any registry here: retired or not-yet-known keys are kept
/// as-is so they survive a load/save cycle untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertiesSource {
    entries: BTreeMap<String, String>,
}

impl PropertiesSource {
    pub fn new() -> Self {
        PropertiesSource::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Store a raw value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, raw: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), raw.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encode into envelope bytes for a store or cache.
    ///
    /// # Errors
    ///
    /// Returns `Error::SerializationError` if Postcard serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>> {
        serialize_envelope(self)
    }

    /// Decode envelope bytes produced by [`encode`](Self::encode).
    ///
    /// # Errors
    ///
    /// - `Error::InvalidEntry`: bytes are not a properties envelope
    /// - `Error::VersionMismatch`: written by an incompatible format version
    /// - `Error::DeserializationError`: truncated or corrupt payload
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        deserialize_envelope(bytes)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PropertiesSource {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        PropertiesSource {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl IntoIterator for PropertiesSource {
    type Item = (String, String);
    type IntoIter = btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_insert_get_remove() {
        let mut source = PropertiesSource::new();
        assert!(source.is_empty());

        assert_eq!(source.insert("name", "Ann"), None);
        assert_eq!(source.insert("name", "Bob"), Some("Ann".to_string()));
        assert_eq!(source.get("name"), Some("Bob"));
        assert!(source.contains_key("name"));

        assert_eq!(source.remove("name"), Some("Bob".to_string()));
        assert_eq!(source.get("name"), None);
    }

    #[test]
    fn test_encode_decode_keeps_unknown_keys() {
        let source: PropertiesSource =
            [("name", "Ann"), ("retired_flag", "legacy")].into_iter().collect();

        let bytes = source.encode().unwrap();
        let decoded = PropertiesSource::decode(&bytes).unwrap();

        assert_eq!(decoded, source);
        assert_eq!(decoded.get("retired_flag"), Some("legacy"));
    }

    #[test]
    fn test_iteration_is_ordered() {
        let source: PropertiesSource = [("b", "2"), ("a", "1")].into_iter().collect();
        let keys: Vec<&str> = source.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(source.iter().next(), Some(("a", "1")));
    }

    #[test]
    fn test_decode_rejects_foreign_bytes() {
        let result = PropertiesSource::decode(b"not an envelope at all");
        assert!(result.is_err());
        assert!(result.unwrap_err().is_corrupt_entry());
    }

    #[test]
    fn test_decode_empty_bytes() {
        match PropertiesSource::decode(&[]) {
            Err(Error::DeserializationError(_)) => {}
            other => panic!("Expected DeserializationError, got {:?}", other),
        }
    }
}
