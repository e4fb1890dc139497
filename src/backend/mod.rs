//! Cache backends holding encoded property sources in front of a store.

use crate::error::Result;
use std::time::Duration;

#[cfg(feature = "inmemory")]
pub mod inmemory;

#[cfg(feature = "inmemory")]
pub use inmemory::{BackendStats, InMemoryBackend};

/// Trait for cache backend implementations.
///
/// A backend holds envelope-encoded
/// [`PropertiesSource`](crate::PropertiesSource) bytes keyed by the same
/// `category:id` keys as the store. It is never the source of truth: entries
/// may vanish at any time and are re-read from the store on the next load.
///
/// **IMPORTANT:** All methods use `&self` to allow concurrent access.
/// Implementations use interior mutability or external storage.
#[allow(async_fn_in_trait)]
pub trait CacheBackend: Send + Sync + Clone {
    /// Retrieve value from cache by key.
    ///
    /// # Returns
    /// - `Ok(Some(bytes))` - Value found in cache
    /// - `Ok(None)` - Cache miss (key not found or expired)
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store value in cache with optional TTL.
    ///
    /// `ttl: None` keeps the entry until it is invalidated.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    /// Remove value from cache. Removing an absent key succeeds.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if key exists in cache.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Optional: Clear all cache (use with caution).
    ///
    /// # Errors
    /// Returns `Err` if operation is not implemented or fails
    async fn clear_all(&self) -> Result<()> {
        Err(crate::error::Error::NotImplemented(
            "clear_all not implemented for this backend".to_string(),
        ))
    }
}

#[cfg(all(test, feature = "inmemory"))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_backend_exists_default() {
        let backend = InMemoryBackend::new();
        backend
            .set("client:1", vec![1, 2, 3], None)
            .await
            .expect("Failed to set key");
        assert!(backend
            .exists("client:1")
            .await
            .expect("Failed to check exists"));
        assert!(!backend
            .exists("client:2")
            .await
            .expect("Failed to check exists"));
    }
}
