//! Error types for property registration, access and persistence.

use std::fmt;

/// Result type for property operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the property layer.
///
/// Only *absent* values are recovered from locally (by returning the
/// declared default). Every variant below reaches the caller unchanged.
#[derive(Debug, Clone)]
pub enum Error {
    /// The key was never registered for this entity category.
    ///
    /// A programming or configuration error: typed access is only valid for
    /// keys declared in the category's [`PropertyTypeRegistry`](crate::PropertyTypeRegistry).
    UnknownProperty(String),

    /// Registration conflict: the key is already declared by a different
    /// owner or with a different value type.
    ///
    /// Raised while building a registry. Treat as fatal for the module that
    /// attempted the registration.
    DuplicateKey {
        /// Conflicting property key
        key: String,
        /// Owner of the declaration already in the registry
        registered_by: String,
        /// Owner of the rejected declaration
        attempted_by: String,
    },

    /// A raw value could not be converted to the requested type, or a typed
    /// value does not fit the declared type.
    ///
    /// On read this usually means corrupt persisted data or a type change
    /// without migration. It is never replaced with a default.
    ConversionError {
        /// Property key being converted
        key: String,
        /// Converter or serde failure message
        reason: String,
    },

    /// Underlying property store failed.
    ///
    /// Propagated unchanged; retry policy belongs to the store.
    StoreError(String),

    /// Cache backend failed.
    BackendError(String),

    /// Encoding a properties source into envelope bytes failed.
    SerializationError(String),

    /// Decoding envelope bytes failed (truncated or corrupt payload).
    DeserializationError(String),

    /// Bytes do not carry the properties envelope magic.
    InvalidEntry(String),

    /// Envelope format version differs from the one this build writes.
    VersionMismatch {
        /// Expected format version (from compiled code)
        expected: u32,
        /// Version found in the stored bytes
        found: u32,
    },

    /// Invalid registration input (e.g. empty key or owner).
    ConfigError(String),

    /// Operation does not apply to this properties view, e.g. saving a
    /// revision-bound view through the plain lifecycle.
    InvalidOperation(String),

    /// Feature not implemented by this backend or store.
    NotImplemented(String),

    /// Generic error with custom message.
    Other(String),
}

impl Error {
    pub(crate) fn conversion(key: &str, reason: impl fmt::Display) -> Self {
        Error::ConversionError {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    /// True for errors raised by decoding stored bytes.
    pub fn is_corrupt_entry(&self) -> bool {
        matches!(
            self,
            Error::DeserializationError(_) | Error::InvalidEntry(_) | Error::VersionMismatch { .. }
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnknownProperty(key) => write!(f, "Unknown property: {}", key),
            Error::DuplicateKey {
                key,
                registered_by,
                attempted_by,
            } => write!(
                f,
                "Duplicate property key '{}': registered by {}, attempted by {}",
                key, registered_by, attempted_by
            ),
            Error::ConversionError { key, reason } => {
                write!(f, "Conversion error for '{}': {}", key, reason)
            }
            Error::StoreError(msg) => write!(f, "Store error: {}", msg),
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Error::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            Error::InvalidEntry(msg) => write!(f, "Invalid entry: {}", msg),
            Error::VersionMismatch { expected, found } => write!(
                f,
                "Format version mismatch: expected {}, found {}",
                expected, found
            ),
            Error::ConfigError(msg) => write!(f, "Config error: {}", msg),
            Error::InvalidOperation(msg) => write!(f, "Invalid operation: {}", msg),
            Error::NotImplemented(msg) => write!(f, "Not implemented: {}", msg),
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<String> for Error {
    fn from(e: String) -> Self {
        Error::Other(e)
    }
}

impl From<&str> for Error {
    fn from(e: &str) -> Self {
        Error::Other(e.to_string())
    }
}
