//! Metrics hooks and TTL policies for the property cache.
//!
//! # Metrics
//!
//! Implement [`CacheMetrics`] to feed cache behaviour into your monitoring
//! system and attach it with
//! [`CachedRepository::with_metrics`](crate::CachedRepository::with_metrics):
//!
//! ```ignore
//! use entity_props::observability::CacheMetrics;
//! use std::time::Duration;
//!
//! struct PrometheusMetrics;
//!
//! impl CacheMetrics for PrometheusMetrics {
//!     fn record_hit(&self, _key: &str, _duration: Duration) {
//!         // counter!("property_cache_hits").inc();
//!     }
//! }
//! ```
//!
//! The trait's default methods log through the `log` crate; [`NoOpMetrics`]
//! (the default) records nothing.
//!
//! # TTL Policies
//!
//! Cached entries carry no TTL by default: they live until a save or delete
//! invalidates them. A TTL only bounds how long an entry written behind the
//! repository's back (directly into the store) stays invisible.
//!
//! ```
//! use entity_props::observability::TtlPolicy;
//! use std::time::Duration;
//!
//! let _policy = TtlPolicy::Fixed(Duration::from_secs(300));
//!
//! let _policy = TtlPolicy::PerType(|category| match category {
//!     "client" => Duration::from_secs(3600),
//!     _ => Duration::from_secs(600),
//! });
//! ```

use std::time::Duration;

/// Trait for cache metrics collection.
pub trait CacheMetrics: Send + Sync {
    /// A load was answered from the cache.
    fn record_hit(&self, key: &str, duration: Duration) {
        debug!("Cache HIT: {} took {:?}", key, duration);
    }

    /// A load fell through to the repository.
    fn record_miss(&self, key: &str, duration: Duration) {
        debug!("Cache MISS: {} took {:?}", key, duration);
    }

    /// An entry was evicted after a save or delete.
    fn record_invalidate(&self, key: &str, duration: Duration) {
        debug!("Cache INVALIDATE: {} took {:?}", key, duration);
    }

    /// An operation failed.
    fn record_error(&self, key: &str, error: &str) {
        warn!("Cache ERROR for {}: {}", key, error);
    }
}

/// Default metrics implementation (no-op).
#[derive(Clone, Default)]
pub struct NoOpMetrics;

impl CacheMetrics for NoOpMetrics {
    fn record_hit(&self, _key: &str, _duration: Duration) {}
    fn record_miss(&self, _key: &str, _duration: Duration) {}
    fn record_invalidate(&self, _key: &str, _duration: Duration) {}
    fn record_error(&self, _key: &str, _error: &str) {}
}

/// TTL (Time-to-Live) policy for cached property sources.
#[derive(Clone, Debug, Default)]
pub enum TtlPolicy {
    /// No TTL: entries live until invalidated
    #[default]
    Default,

    /// Fixed duration for all entries
    Fixed(Duration),

    /// Explicitly no TTL
    Infinite,

    /// Duration chosen by entity category
    PerType(fn(&str) -> Duration),
}

impl TtlPolicy {
    /// Get TTL for an entity category.
    pub fn get_ttl(&self, category: &str) -> Option<Duration> {
        match self {
            TtlPolicy::Default | TtlPolicy::Infinite => None,
            TtlPolicy::Fixed(d) => Some(*d),
            TtlPolicy::PerType(f) => Some(f(category)),
        }
    }
}
