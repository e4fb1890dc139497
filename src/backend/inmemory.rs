//! Process-local cache of encoded property sources.
//!
//! Entries expire lazily: a read past the deadline drops the entry, and
//! [`InMemoryBackend::purge_expired`] sweeps the rest.

use super::CacheBackend;
use crate::error::Result;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One cached envelope and its deadline.
struct CachedEnvelope {
    bytes: Vec<u8>,
    deadline: Option<Instant>,
}

impl CachedEnvelope {
    fn live(&self, now: Instant) -> bool {
        self.deadline.map_or(true, |deadline| now <= deadline)
    }
}

/// [`CacheBackend`] keeping envelopes in a shared DashMap.
///
/// Clones share the same map, so one backend can be handed to several
/// [`CachedRepository`](crate::CachedRepository) instances of different
/// categories; their keys never collide.
///
/// # Example
///
/// ```no_run
/// use entity_props::backend::{CacheBackend, InMemoryBackend};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let backend = InMemoryBackend::new();
///     backend.set("client:1", b"bytes".to_vec(), None).await?;
///     assert!(backend.get("client:1").await?.is_some());
///     Ok(())
/// }
/// ```
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    envelopes: Arc<DashMap<String, CachedEnvelope>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached entities, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.envelopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.envelopes.is_empty()
    }

    /// Drop every expired envelope. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.envelopes.len();
        self.envelopes.retain(|_, envelope| envelope.live(now));
        let purged = before.saturating_sub(self.envelopes.len());
        if purged > 0 {
            debug!("Purged {} expired property envelopes", purged);
        }
        purged
    }

    pub fn stats(&self) -> BackendStats {
        let now = Instant::now();
        let mut stats = BackendStats::default();
        for entry in self.envelopes.iter() {
            stats.entities += 1;
            stats.envelope_bytes += entry.bytes.len();
            if !entry.live(now) {
                stats.expired += 1;
            }
        }
        stats
    }
}

impl CacheBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = Instant::now();
        let hit = self
            .envelopes
            .get(key)
            .filter(|envelope| envelope.live(now))
            .map(|envelope| envelope.bytes.clone());

        if hit.is_none() {
            self.envelopes.remove_if(key, |_, envelope| !envelope.live(now));
        }
        debug!(
            "InMemory GET {} -> {}",
            key,
            if hit.is_some() { "HIT" } else { "MISS" }
        );
        Ok(hit)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        debug!("InMemory SET {} ({} bytes, ttl {:?})", key, value.len(), ttl);
        let envelope = CachedEnvelope {
            bytes: value,
            deadline: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.envelopes.insert(key.to_string(), envelope);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.envelopes.remove(key);
        debug!("InMemory DELETE {}", key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let now = Instant::now();
        Ok(self
            .envelopes
            .get(key)
            .is_some_and(|envelope| envelope.live(now)))
    }

    async fn clear_all(&self) -> Result<()> {
        self.envelopes.clear();
        warn!("InMemory CLEAR_ALL executed - all cached properties dropped");
        Ok(())
    }
}

/// Snapshot of the backend's contents.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BackendStats {
    pub entities: usize,
    pub expired: usize,
    pub envelope_bytes: usize,
}
