//! In-memory property store for tests and single-process deployments.

use super::PropertyStore;
use crate::error::{Error, Result};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Thread-safe in-memory [`PropertyStore`] backed by DashMap.
///
/// Clones share the same map. Beyond plain storage it counts reads and can be
/// switched into a failing mode, which lets tests observe cache hits and the
/// propagation of store errors.
///
/// # Example
///
/// ```no_run
/// use entity_props::store::{InMemoryStore, PropertyStore};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = InMemoryStore::new();
///     store.put("client:1", b"bytes".to_vec()).await?;
///     assert!(store.get("client:1").await?.is_some());
///     Ok(())
/// }
/// ```
#[derive(Clone, Default)]
pub struct InMemoryStore {
    entries: Arc<DashMap<String, Vec<u8>>>,
    reads: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of `get` calls served so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Make every subsequent operation fail with `Error::StoreError`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self, op: &str, key: &str) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            warn!("✗ InMemoryStore {} {} -> unavailable", op, key);
            return Err(Error::StoreError(format!("store unavailable during {}", op)));
        }
        Ok(())
    }
}

impl PropertyStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.check_available("GET", key)?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        let value = self.entries.get(key).map(|entry| entry.value().clone());
        debug!(
            "✓ InMemoryStore GET {} -> {}",
            key,
            if value.is_some() { "FOUND" } else { "ABSENT" }
        );
        Ok(value)
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.check_available("PUT", key)?;
        debug!("✓ InMemoryStore PUT {} ({} bytes)", key, value.len());
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.check_available("DELETE", key)?;
        self.entries.remove(key);
        debug!("✓ InMemoryStore DELETE {}", key);
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(!self.failing.load(Ordering::SeqCst))
    }
}
