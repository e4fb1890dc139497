//! Read-through, write-invalidate cache in front of a repository.

use crate::backend::CacheBackend;
use crate::entity::PropertyEntity;
use crate::error::Result;
use crate::key::{RevisionId, StoreKeyBuilder};
use crate::observability::{CacheMetrics, NoOpMetrics, TtlPolicy};
use crate::repository::{EntityPropertiesRepository, RevisionRepository};
use crate::source::PropertiesSource;
use crate::strategy::CacheStrategy;
use dashmap::DashMap;
use futures::future::try_join_all;
use std::future::Future;
use std::marker::PhantomData;
use std::time::Instant;

/// Repository decorator caching encoded [`PropertiesSource`] bytes.
///
/// Loads consult the backend first and fill it from the inner repository on a
/// miss. Saves and deletes go to the inner repository first; only once that
/// write succeeded is the cache entry evicted. Entries are never updated in
/// place, so a failed write leaves the cache as it was.
///
/// Every write bumps a per-key generation before evicting. A load that
/// overlapped a write sees the generation move and drops its fill, so a value
/// read before the write never outlives the eviction.
///
/// # Example
///
/// ```no_run
/// use entity_props::backend::InMemoryBackend;
/// use entity_props::store::InMemoryStore;
/// use entity_props::{CachedRepository, PropertyEntity, StoreRepository};
///
/// struct Client;
///
/// impl PropertyEntity for Client {
///     type Id = u64;
///     fn category() -> &'static str { "client" }
/// }
///
/// let repo = CachedRepository::<Client, _, _>::new(
///     StoreRepository::<Client, _>::new(InMemoryStore::new()),
///     InMemoryBackend::new(),
/// );
/// ```
pub struct CachedRepository<E: PropertyEntity, R, B: CacheBackend> {
    inner: R,
    backend: B,
    metrics: Box<dyn CacheMetrics>,
    ttl_policy: TtlPolicy,
    generations: DashMap<String, u64>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: PropertyEntity, R, B: CacheBackend> CachedRepository<E, R, B> {
    /// Wrap `inner` with a cache held in `backend`.
    pub fn new(inner: R, backend: B) -> Self {
        CachedRepository {
            inner,
            backend,
            metrics: Box::new(NoOpMetrics),
            ttl_policy: TtlPolicy::default(),
            generations: DashMap::new(),
            _entity: PhantomData,
        }
    }

    /// Set custom metrics handler.
    pub fn with_metrics(mut self, metrics: Box<dyn CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Set custom TTL policy.
    pub fn with_ttl_policy(mut self, policy: TtlPolicy) -> Self {
        self.ttl_policy = policy;
        self
    }

    /// Get backend reference (for advanced use).
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The wrapped repository.
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Read the entry at `key` according to `strategy`, falling back to `load`.
    ///
    /// `load` is only polled when the cache cannot answer.
    async fn read_through<F>(
        &self,
        key: &str,
        strategy: CacheStrategy,
        load: F,
    ) -> Result<PropertiesSource>
    where
        F: Future<Output = Result<PropertiesSource>>,
    {
        let timer = Instant::now();
        debug!("» Property load for key: {} (strategy: {})", key, strategy);

        match strategy {
            CacheStrategy::Bypass => {
                let result = load.await;
                match &result {
                    Ok(_) => self.metrics.record_miss(key, timer.elapsed()),
                    Err(e) => self.metrics.record_error(key, &e.to_string()),
                }
                return result;
            }
            CacheStrategy::Invalidate => {
                self.backend.delete(key).await?;
                debug!("✓ Cache invalidated for {}", key);
            }
            CacheStrategy::Refresh => {}
        }

        match self.lookup(key).await {
            Ok(Some(source)) => {
                self.metrics.record_hit(key, timer.elapsed());
                return Ok(source);
            }
            Ok(None) => {}
            Err(e) => {
                self.metrics.record_error(key, &e.to_string());
                return Err(e);
            }
        }

        debug!("Cache miss, falling back to repository");
        let generation = self.generation(key);
        let source = match load.await {
            Ok(source) => source,
            Err(e) => {
                self.metrics.record_error(key, &e.to_string());
                return Err(e);
            }
        };

        self.fill(key, &source, generation).await;
        self.metrics.record_miss(key, timer.elapsed());
        Ok(source)
    }

    /// Decode the cached entry at `key`. Corrupt entries are evicted and
    /// reported as a miss.
    async fn lookup(&self, key: &str) -> Result<Option<PropertiesSource>> {
        let Some(bytes) = self.backend.get(key).await? else {
            return Ok(None);
        };

        match PropertiesSource::decode(&bytes) {
            Ok(source) => {
                debug!("✓ Cache hit for {}", key);
                Ok(Some(source))
            }
            Err(e) if e.is_corrupt_entry() => {
                warn!("Evicting corrupt cache entry {}: {}", key, e);
                self.backend.delete(key).await?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Number of writes to `key` seen so far.
    fn generation(&self, key: &str) -> u64 {
        self.generations.get(key).map_or(0, |g| *g)
    }

    /// Populate the cache after a repository load that started at
    /// `generation`. Failures only cost a future miss.
    async fn fill(&self, key: &str, source: &PropertiesSource, generation: u64) {
        if self.generation(key) != generation {
            debug!("Skipping cache fill for {}: written during load", key);
            return;
        }
        let ttl = self.ttl_policy.get_ttl(E::category());
        let bytes = match source.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Skipping cache fill for {}: {}", key, e);
                return;
            }
        };
        if let Err(e) = self.backend.set(key, bytes, ttl).await {
            warn!("Cache fill failed for {}: {}", key, e);
            return;
        }

        // A write may have evicted between the check above and the set.
        if self.generation(key) != generation {
            debug!("Dropping cache fill for {}: written during load", key);
            if let Err(e) = self.backend.delete(key).await {
                warn!("Failed to drop stale cache fill for {}: {}", key, e);
            }
        }
    }

    /// Evict `key` after a successful write.
    async fn invalidate(&self, key: &str) -> Result<()> {
        let timer = Instant::now();
        *self.generations.entry(key.to_string()).or_insert(0) += 1;
        if let Err(e) = self.backend.delete(key).await {
            self.metrics.record_error(key, &e.to_string());
            return Err(e);
        }
        self.metrics.record_invalidate(key, timer.elapsed());
        Ok(())
    }
}

impl<E, R, B> CachedRepository<E, R, B>
where
    E: PropertyEntity,
    R: EntityPropertiesRepository<E>,
    B: CacheBackend,
{
    /// Load the properties of `id` using an explicit cache strategy.
    ///
    /// [`load_properties`](EntityPropertiesRepository::load_properties) is
    /// `load_with(id, CacheStrategy::Refresh)`.
    ///
    /// # Errors
    ///
    /// - `Error::StoreError`: the inner repository failed
    /// - `Error::BackendError`: the cache backend failed on read or eviction
    /// - `Error::DeserializationError` / `Error::InvalidEntry` /
    ///   `Error::VersionMismatch`: the store (not the cache) held bad bytes
    pub async fn load_with(&self, id: &E::Id, strategy: CacheStrategy) -> Result<PropertiesSource> {
        let key = StoreKeyBuilder::build::<E>(id);
        self.read_through(&key, strategy, self.inner.load_properties(id))
            .await
    }
}

impl<E, R, B> EntityPropertiesRepository<E> for CachedRepository<E, R, B>
where
    E: PropertyEntity,
    R: EntityPropertiesRepository<E>,
    B: CacheBackend,
{
    async fn load_properties(&self, id: &E::Id) -> Result<PropertiesSource> {
        self.load_with(id, CacheStrategy::Refresh).await
    }

    async fn save_properties(&self, id: &E::Id, source: &PropertiesSource) -> Result<()> {
        self.inner.save_properties(id, source).await?;
        self.invalidate(&StoreKeyBuilder::build::<E>(id)).await
    }

    async fn delete_properties(&self, id: &E::Id) -> Result<()> {
        self.inner.delete_properties(id).await?;
        self.invalidate(&StoreKeyBuilder::build::<E>(id)).await
    }

    async fn load_many(&self, ids: &[E::Id]) -> Result<Vec<PropertiesSource>> {
        try_join_all(ids.iter().map(|id| self.load_properties(id))).await
    }
}

impl<E, R, B> RevisionRepository<E> for CachedRepository<E, R, B>
where
    E: PropertyEntity,
    R: RevisionRepository<E>,
    B: CacheBackend,
{
    async fn load_revision(&self, id: &E::Id, revision: RevisionId) -> Result<PropertiesSource> {
        let key = StoreKeyBuilder::build_revision::<E>(id, revision);
        self.read_through(
            &key,
            CacheStrategy::Refresh,
            self.inner.load_revision(id, revision),
        )
        .await
    }

    async fn save_revision(
        &self,
        id: &E::Id,
        revision: RevisionId,
        source: &PropertiesSource,
    ) -> Result<()> {
        self.inner.save_revision(id, revision, source).await?;
        self.invalidate(&StoreKeyBuilder::build_revision::<E>(id, revision))
            .await
    }

    async fn delete_revision(&self, id: &E::Id, revision: RevisionId) -> Result<()> {
        self.inner.delete_revision(id, revision).await?;
        self.invalidate(&StoreKeyBuilder::build_revision::<E>(id, revision))
            .await
    }
}

#[cfg(all(test, feature = "inmemory"))]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::error::Error;
    use crate::repository::StoreRepository;
    use crate::store::{InMemoryStore, PropertyStore};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct Client;

    impl PropertyEntity for Client {
        type Id = u64;

        fn category() -> &'static str {
            "client"
        }
    }

    type TestRepo = CachedRepository<Client, StoreRepository<Client, InMemoryStore>, InMemoryBackend>;

    fn setup() -> (TestRepo, InMemoryStore, InMemoryBackend) {
        let store = InMemoryStore::new();
        let backend = InMemoryBackend::new();
        let repo = CachedRepository::new(StoreRepository::new(store.clone()), backend.clone());
        (repo, store, backend)
    }

    fn named(name: &str) -> PropertiesSource {
        [("name", name)].into_iter().collect()
    }

    #[tokio::test]
    async fn test_miss_fills_cache() {
        let (repo, _store, backend) = setup();
        repo.inner()
            .save_properties(&1, &named("Ann"))
            .await
            .expect("Failed to seed store");

        let loaded = repo.load_properties(&1).await.expect("Failed to load");
        assert_eq!(loaded, named("Ann"));
        assert!(backend.exists("client:1").await.expect("Failed to check"));
    }

    #[tokio::test]
    async fn test_hit_does_not_read_store() {
        let (repo, store, _backend) = setup();
        repo.save_properties(&1, &named("Ann"))
            .await
            .expect("Failed to save");

        repo.load_properties(&1).await.expect("Failed to load");
        let reads = store.read_count();
        repo.load_properties(&1).await.expect("Failed to load");
        assert_eq!(store.read_count(), reads);
    }

    #[tokio::test]
    async fn test_empty_source_is_cached() {
        let (repo, store, _backend) = setup();
        assert!(repo.load_properties(&5).await.expect("Failed to load").is_empty());
        let reads = store.read_count();
        assert!(repo.load_properties(&5).await.expect("Failed to load").is_empty());
        assert_eq!(store.read_count(), reads);
    }

    #[tokio::test]
    async fn test_save_invalidates() {
        let (repo, _store, backend) = setup();
        repo.save_properties(&1, &named("Ann"))
            .await
            .expect("Failed to save");
        repo.load_properties(&1).await.expect("Failed to load");
        assert!(backend.exists("client:1").await.expect("Failed to check"));

        repo.save_properties(&1, &named("Bob"))
            .await
            .expect("Failed to save");
        assert!(!backend.exists("client:1").await.expect("Failed to check"));
        assert_eq!(
            repo.load_properties(&1).await.expect("Failed to load"),
            named("Bob")
        );
    }

    #[tokio::test]
    async fn test_failed_save_keeps_cache_entry() {
        let (repo, store, backend) = setup();
        repo.save_properties(&1, &named("Ann"))
            .await
            .expect("Failed to save");
        repo.load_properties(&1).await.expect("Failed to load");

        store.set_failing(true);
        let result = repo.save_properties(&1, &named("Bob")).await;
        assert!(matches!(result, Err(Error::StoreError(_))));
        assert!(backend.exists("client:1").await.expect("Failed to check"));

        // Served from cache while the store is down.
        assert_eq!(
            repo.load_properties(&1).await.expect("Failed to load"),
            named("Ann")
        );
    }

    #[tokio::test]
    async fn test_delete_invalidates() {
        let (repo, _store, backend) = setup();
        repo.save_properties(&1, &named("Ann"))
            .await
            .expect("Failed to save");
        repo.load_properties(&1).await.expect("Failed to load");

        repo.delete_properties(&1).await.expect("Failed to delete");
        assert!(!backend.exists("client:1").await.expect("Failed to check"));
        assert!(repo.load_properties(&1).await.expect("Failed to load").is_empty());

        repo.delete_properties(&1).await.expect("Second delete");
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_reloaded() {
        let (repo, _store, backend) = setup();
        repo.save_properties(&1, &named("Ann"))
            .await
            .expect("Failed to save");
        backend
            .set("client:1", b"not an envelope".to_vec(), None)
            .await
            .expect("Failed to set");

        let loaded = repo.load_properties(&1).await.expect("Failed to load");
        assert_eq!(loaded, named("Ann"));

        let cached = backend
            .get("client:1")
            .await
            .expect("Failed to get")
            .expect("Cache was not refilled");
        assert_eq!(
            PropertiesSource::decode(&cached).expect("Failed to decode"),
            named("Ann")
        );
    }

    #[tokio::test]
    async fn test_invalidate_strategy_sees_external_write() {
        let (repo, _store, _backend) = setup();
        repo.save_properties(&1, &named("Ann"))
            .await
            .expect("Failed to save");
        repo.load_properties(&1).await.expect("Failed to load");

        // Written behind the cache's back.
        repo.inner()
            .save_properties(&1, &named("Bob"))
            .await
            .expect("Failed to save");
        assert_eq!(
            repo.load_properties(&1).await.expect("Failed to load"),
            named("Ann")
        );
        assert_eq!(
            repo.load_with(&1, CacheStrategy::Invalidate)
                .await
                .expect("Failed to load"),
            named("Bob")
        );
        assert_eq!(
            repo.load_properties(&1).await.expect("Failed to load"),
            named("Bob")
        );
    }

    #[tokio::test]
    async fn test_bypass_leaves_cache_untouched() {
        let (repo, _store, backend) = setup();
        repo.inner()
            .save_properties(&1, &named("Ann"))
            .await
            .expect("Failed to seed store");

        let loaded = repo
            .load_with(&1, CacheStrategy::Bypass)
            .await
            .expect("Failed to load");
        assert_eq!(loaded, named("Ann"));
        assert!(backend.is_empty());
    }

    /// Store whose reads return their snapshot only after `delay`.
    #[derive(Clone, Default)]
    struct SlowStore {
        inner: InMemoryStore,
        delay: Arc<Mutex<Duration>>,
    }

    impl PropertyStore for SlowStore {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
            let value = self.inner.get(key).await?;
            let delay = *self.delay.lock().expect("Failed to lock delay");
            tokio::time::sleep(delay).await;
            Ok(value)
        }

        async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
            self.inner.put(key, value).await
        }

        async fn delete(&self, key: &str) -> Result<()> {
            self.inner.delete(key).await
        }
    }

    /// Backend whose writes land only after `delay`.
    #[derive(Clone, Default)]
    struct SlowBackend {
        inner: InMemoryBackend,
        delay: Arc<Mutex<Duration>>,
    }

    impl CacheBackend for SlowBackend {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
            let delay = *self.delay.lock().expect("Failed to lock delay");
            tokio::time::sleep(delay).await;
            self.inner.set(key, value, ttl).await
        }

        async fn delete(&self, key: &str) -> Result<()> {
            self.inner.delete(key).await
        }
    }

    #[tokio::test]
    async fn test_load_overlapping_save_does_not_cache_old_value() {
        let store = SlowStore::default();
        let backend = InMemoryBackend::new();
        let repo = CachedRepository::<Client, _, _>::new(
            StoreRepository::new(store.clone()),
            backend.clone(),
        );
        repo.inner()
            .save_properties(&1, &named("old"))
            .await
            .expect("Failed to seed store");
        *store.delay.lock().expect("Failed to lock delay") = Duration::from_millis(100);

        let (loaded, saved) = tokio::join!(repo.load_properties(&1), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            repo.save_properties(&1, &named("new")).await
        });
        assert_eq!(loaded.expect("Failed to load"), named("old"));
        saved.expect("Failed to save");

        assert!(!backend.exists("client:1").await.expect("Failed to check"));
        *store.delay.lock().expect("Failed to lock delay") = Duration::ZERO;
        assert_eq!(
            repo.load_properties(&1).await.expect("Failed to load"),
            named("new")
        );
    }

    #[tokio::test]
    async fn test_fill_landing_after_save_is_dropped() {
        let store = InMemoryStore::new();
        let backend = SlowBackend::default();
        let repo = CachedRepository::<Client, _, _>::new(
            StoreRepository::new(store.clone()),
            backend.clone(),
        );
        repo.inner()
            .save_properties(&1, &named("old"))
            .await
            .expect("Failed to seed store");
        *backend.delay.lock().expect("Failed to lock delay") = Duration::from_millis(100);

        // The save evicts while the fill of "old" is still in flight.
        let (loaded, saved) = tokio::join!(repo.load_properties(&1), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            repo.save_properties(&1, &named("new")).await
        });
        assert_eq!(loaded.expect("Failed to load"), named("old"));
        saved.expect("Failed to save");

        assert!(!backend.exists("client:1").await.expect("Failed to check"));
        assert_eq!(
            repo.load_properties(&1).await.expect("Failed to load"),
            named("new")
        );
    }

    #[tokio::test]
    async fn test_ttl_policy_applies() {
        let store = InMemoryStore::new();
        let backend = InMemoryBackend::new();
        let repo = CachedRepository::<Client, _, _>::new(
            StoreRepository::new(store.clone()),
            backend.clone(),
        )
        .with_ttl_policy(TtlPolicy::Fixed(Duration::from_millis(50)));

        repo.load_properties(&1).await.expect("Failed to load");
        assert!(backend.exists("client:1").await.expect("Failed to check"));

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(!backend.exists("client:1").await.expect("Failed to check"));
    }

    #[tokio::test]
    async fn test_revision_entries_are_separate() {
        let (repo, _store, backend) = setup();
        repo.save_revision(&1, 3, &named("v3"))
            .await
            .expect("Failed to save");

        assert_eq!(
            repo.load_revision(&1, 3).await.expect("Failed to load"),
            named("v3")
        );
        assert!(backend.exists("client:1:rev:3").await.expect("Failed to check"));
        assert!(!backend.exists("client:1").await.expect("Failed to check"));

        repo.delete_revision(&1, 3).await.expect("Failed to delete");
        assert!(!backend.exists("client:1:rev:3").await.expect("Failed to check"));
    }

    #[tokio::test]
    async fn test_load_many_preserves_order() {
        let (repo, _store, _backend) = setup();
        repo.save_properties(&1, &named("Ann"))
            .await
            .expect("Failed to save");
        repo.save_properties(&3, &named("Cid"))
            .await
            .expect("Failed to save");

        let loaded = repo.load_many(&[3, 2, 1]).await.expect("Failed to load");
        assert_eq!(loaded, vec![named("Cid"), PropertiesSource::new(), named("Ann")]);
    }

    #[tokio::test]
    async fn test_custom_metrics() {
        #[derive(Clone, Default)]
        struct TestMetrics {
            hits: Arc<Mutex<usize>>,
            misses: Arc<Mutex<usize>>,
            invalidations: Arc<Mutex<usize>>,
        }

        impl CacheMetrics for TestMetrics {
            fn record_hit(&self, _key: &str, _duration: Duration) {
                *self.hits.lock().expect("Failed to lock hits") += 1;
            }

            fn record_miss(&self, _key: &str, _duration: Duration) {
                *self.misses.lock().expect("Failed to lock misses") += 1;
            }

            fn record_invalidate(&self, _key: &str, _duration: Duration) {
                *self
                    .invalidations
                    .lock()
                    .expect("Failed to lock invalidations") += 1;
            }
        }

        let metrics = TestMetrics::default();
        let repo = CachedRepository::<Client, _, _>::new(
            StoreRepository::new(InMemoryStore::new()),
            InMemoryBackend::new(),
        )
        .with_metrics(Box::new(metrics.clone()));

        repo.load_properties(&1).await.expect("Failed to load");
        repo.load_properties(&1).await.expect("Failed to load");
        repo.save_properties(&1, &named("Ann"))
            .await
            .expect("Failed to save");

        assert_eq!(*metrics.misses.lock().expect("Failed to lock misses"), 1);
        assert_eq!(*metrics.hits.lock().expect("Failed to lock hits"), 1);
        assert_eq!(
            *metrics
                .invalidations
                .lock()
                .expect("Failed to lock invalidations"),
            1
        );
    }
}
