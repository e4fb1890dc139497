//! Persistent key-value stores holding encoded property sources.

use crate::error::Result;

#[cfg(feature = "inmemory")]
pub mod inmemory;

#[cfg(feature = "inmemory")]
pub use inmemory::InMemoryStore;

/// Trait for the ground-truth store behind a repository.
///
/// Abstracts the persistence transport: a SQL table with one blob column, a
/// key-value database, a document store. The store is addressed by keys built
/// with [`StoreKeyBuilder`](crate::key::StoreKeyBuilder) and never interprets
/// the bytes it holds.
///
/// All methods use `&self`; implementations provide their own interior
/// mutability or external storage. Failures are reported as
/// `Error::StoreError` and are not retried by this crate.
#[allow(async_fn_in_trait)]
pub trait PropertyStore: Send + Sync {
    /// Read the bytes stored under `key`.
    ///
    /// # Returns
    /// - `Ok(Some(bytes))` - Entry exists
    /// - `Ok(None)` - Nothing stored yet (not an error)
    ///
    /// # Errors
    /// Returns `Err` if the store is unavailable.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Replace the bytes stored under `key`.
    ///
    /// # Errors
    /// Returns `Err` if the write fails.
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Remove `key`. Removing an absent key succeeds.
    ///
    /// # Errors
    /// Returns `Err` if the store is unavailable.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Health check - verify the store is reachable.
    ///
    /// # Errors
    /// Returns `Err` if the store is not accessible.
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

impl<S: PropertyStore> PropertyStore for std::sync::Arc<S> {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(key).await
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        (**self).put(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key).await
    }

    async fn health_check(&self) -> Result<bool> {
        (**self).health_check().await
    }
}
