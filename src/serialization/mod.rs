//! Postcard-based envelope encoding for persisted and cached properties.
//!
//! Every byte blob written to a [`PropertyStore`](crate::store::PropertyStore)
//! or a [`CacheBackend`](crate::backend::CacheBackend) follows this format:
//! ```text
//! ┌─────────────────┬─────────────────┬──────────────────────────┐
//! │  MAGIC (4 bytes)│VERSION (varint) │POSTCARD PAYLOAD (N bytes)│
//! └─────────────────┴─────────────────┴──────────────────────────┘
//!   "EPRP"              u32                postcard::to_allocvec(T)
//! ```
//!
//! The mapping between a [`PropertiesSource`](crate::PropertiesSource) and its
//! bytes is total and reversible: the payload is the ordered key/raw-value
//! map, so the same source always produces identical bytes.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Magic header for property entries: b"EPRP"
pub const ENVELOPE_MAGIC: [u8; 4] = *b"EPRP";

/// Current envelope format version.
///
/// Bump when the payload layout changes. Entries with another version are
/// rejected with `Error::VersionMismatch`; the cache evicts them, a store
/// surfaces them to the caller.
pub const CURRENT_FORMAT_VERSION: u32 = 1;

/// Versioned envelope around a payload.
///
/// ```rust
/// use entity_props::serialization::PropertiesEnvelope;
///
/// let envelope = PropertiesEnvelope::new("data");
/// assert_eq!(envelope.magic, *b"EPRP");
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PropertiesEnvelope<T> {
    /// Magic header: must be b"EPRP"
    pub magic: [u8; 4],
    /// Format version: must match CURRENT_FORMAT_VERSION
    pub version: u32,
    pub payload: T,
}

impl<T> PropertiesEnvelope<T> {
    pub fn new(payload: T) -> Self {
        Self {
            magic: ENVELOPE_MAGIC,
            version: CURRENT_FORMAT_VERSION,
            payload,
        }
    }
}

/// Serialize a value inside an envelope.
///
/// # Errors
///
/// Returns `Error::SerializationError` if Postcard serialization fails.
pub fn serialize_envelope<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let envelope = PropertiesEnvelope::new(value);
    postcard::to_allocvec(&envelope).map_err(|e| {
        error!("Properties serialization failed: {}", e);
        Error::SerializationError(e.to_string())
    })
}

/// Deserialize a value from envelope bytes, validating magic and version.
///
/// # Errors
///
/// - `Error::DeserializationError`: corrupt or truncated bytes
/// - `Error::InvalidEntry`: wrong magic header
/// - `Error::VersionMismatch`: format version differs
pub fn deserialize_envelope<'de, T: Deserialize<'de>>(bytes: &'de [u8]) -> Result<T> {
    let envelope: PropertiesEnvelope<T> = postcard::from_bytes(bytes).map_err(|e| {
        error!("Properties deserialization failed: {}", e);
        Error::DeserializationError(e.to_string())
    })?;

    if envelope.magic != ENVELOPE_MAGIC {
        warn!(
            "Invalid properties entry: expected magic {:?}, got {:?}",
            ENVELOPE_MAGIC, envelope.magic
        );
        return Err(Error::InvalidEntry(format!(
            "Invalid magic: expected {:?}, got {:?}",
            ENVELOPE_MAGIC, envelope.magic
        )));
    }

    if envelope.version != CURRENT_FORMAT_VERSION {
        warn!(
            "Properties format mismatch: expected {}, got {}",
            CURRENT_FORMAT_VERSION, envelope.version
        );
        return Err(Error::VersionMismatch {
            expected: CURRENT_FORMAT_VERSION,
            found: envelope.version,
        });
    }

    Ok(envelope.payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::PropertiesSource;

    fn sample() -> PropertiesSource {
        [("name", "Ann"), ("tags", r#"["vip"]"#)].into_iter().collect()
    }

    #[test]
    fn test_roundtrip() {
        let source = sample();
        let bytes = serialize_envelope(&source).unwrap();
        let decoded: PropertiesSource = deserialize_envelope(&bytes).unwrap();
        assert_eq!(decoded, source);
    }

    #[test]
    fn test_envelope_structure() {
        let bytes = serialize_envelope(&sample()).unwrap();
        assert_eq!(&bytes[0..4], b"EPRP");

        let envelope: PropertiesEnvelope<PropertiesSource> = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(envelope.version, CURRENT_FORMAT_VERSION);
        assert_eq!(envelope.payload, sample());
    }

    #[test]
    fn test_invalid_magic_rejected() {
        let mut envelope = PropertiesEnvelope::new(sample());
        envelope.magic = *b"CKIT";
        let bytes = postcard::to_allocvec(&envelope).unwrap();

        match deserialize_envelope::<PropertiesSource>(&bytes) {
            Err(Error::InvalidEntry(_)) => {}
            other => panic!("Expected InvalidEntry, got {:?}", other),
        }
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let mut envelope = PropertiesEnvelope::new(sample());
        envelope.version = 999;
        let bytes = postcard::to_allocvec(&envelope).unwrap();

        match deserialize_envelope::<PropertiesSource>(&bytes) {
            Err(Error::VersionMismatch { expected, found }) => {
                assert_eq!(expected, CURRENT_FORMAT_VERSION);
                assert_eq!(found, 999);
            }
            other => panic!("Expected VersionMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_truncated_payload_rejected() {
        let mut bytes = serialize_envelope(&sample()).unwrap();
        bytes.truncate(bytes.len() / 2);

        match deserialize_envelope::<PropertiesSource>(&bytes) {
            Err(Error::DeserializationError(_)) => {}
            other => panic!("Expected DeserializationError, got {:?}", other),
        }
    }

    #[test]
    fn test_deterministic() {
        let a = serialize_envelope(&sample()).unwrap();
        let b = serialize_envelope(&sample()).unwrap();
        assert_eq!(a, b);
    }
}
