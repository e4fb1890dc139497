//! Repository traits for loading and persisting property sources.
//!
//! [`EntityPropertiesRepository`] is the persistence boundary of the crate.
//! [`StoreRepository`] implements it over any [`PropertyStore`];
//! [`CachedRepository`](crate::CachedRepository) decorates any implementation
//! with a read-through, write-invalidate cache.
//!
//! Repositories are stateless with respect to entities: each call is
//! addressed by the id it receives and nothing is remembered between calls.

use crate::entity::PropertyEntity;
use crate::error::Result;
use crate::key::{RevisionId, StoreKeyBuilder};
use crate::source::PropertiesSource;
use crate::store::PropertyStore;
use std::marker::PhantomData;

/// Loads, replaces and deletes the persisted properties of one category.
#[allow(async_fn_in_trait)]
pub trait EntityPropertiesRepository<E: PropertyEntity>: Send + Sync {
    /// Load the persisted properties of `id`.
    ///
    /// # Returns
    /// The stored source, or an empty source if nothing was ever saved.
    /// Absence is not an error: every entity implicitly has an empty set.
    ///
    /// # Errors
    /// Returns `Err` if the store fails or holds undecodable bytes.
    async fn load_properties(&self, id: &E::Id) -> Result<PropertiesSource>;

    /// Replace the persisted properties of `id` with `source`.
    ///
    /// Not a merge: keys missing from `source` are gone afterwards.
    ///
    /// # Errors
    /// Returns `Err` if the store write fails.
    async fn save_properties(&self, id: &E::Id, source: &PropertiesSource) -> Result<()>;

    /// Remove every persisted property of `id`. Idempotent.
    ///
    /// # Errors
    /// Returns `Err` if the store fails.
    async fn delete_properties(&self, id: &E::Id) -> Result<()>;

    /// Batch load (optional optimization).
    ///
    /// Default implementation calls `load_properties()` for each id, in order.
    ///
    /// # Errors
    /// Returns the first error encountered.
    async fn load_many(&self, ids: &[E::Id]) -> Result<Vec<PropertiesSource>> {
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            results.push(self.load_properties(id).await?);
        }
        Ok(results)
    }
}

/// Revision-keyed variant: one source per `(id, revision)` pair.
///
/// Revisions are supplied by the caller; no conflict detection takes place.
#[allow(async_fn_in_trait)]
pub trait RevisionRepository<E: PropertyEntity>: Send + Sync {
    /// # Errors
    /// Same as [`EntityPropertiesRepository::load_properties`].
    async fn load_revision(&self, id: &E::Id, revision: RevisionId) -> Result<PropertiesSource>;

    /// # Errors
    /// Same as [`EntityPropertiesRepository::save_properties`].
    async fn save_revision(
        &self,
        id: &E::Id,
        revision: RevisionId,
        source: &PropertiesSource,
    ) -> Result<()>;

    /// # Errors
    /// Same as [`EntityPropertiesRepository::delete_properties`].
    async fn delete_revision(&self, id: &E::Id, revision: RevisionId) -> Result<()>;
}

/// Repository persisting envelope-encoded sources in a [`PropertyStore`].
pub struct StoreRepository<E: PropertyEntity, S: PropertyStore> {
    store: S,
    _entity: PhantomData<fn() -> E>,
}

impl<E: PropertyEntity, S: PropertyStore> StoreRepository<E, S> {
    pub fn new(store: S) -> Self {
        StoreRepository {
            store,
            _entity: PhantomData,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn load_key(&self, key: &str) -> Result<PropertiesSource> {
        match self.store.get(key).await? {
            Some(bytes) => {
                let source = PropertiesSource::decode(&bytes)?;
                debug!("Loaded {} properties for {}", source.len(), key);
                Ok(source)
            }
            None => {
                debug!("No properties stored for {}, starting empty", key);
                Ok(PropertiesSource::new())
            }
        }
    }

    async fn save_key(&self, key: &str, source: &PropertiesSource) -> Result<()> {
        let bytes = source.encode()?;
        self.store.put(key, bytes).await?;
        debug!("Saved {} properties for {}", source.len(), key);
        Ok(())
    }

    async fn delete_key(&self, key: &str) -> Result<()> {
        self.store.delete(key).await?;
        debug!("Deleted properties for {}", key);
        Ok(())
    }
}

impl<E: PropertyEntity, S: PropertyStore> EntityPropertiesRepository<E> for StoreRepository<E, S> {
    async fn load_properties(&self, id: &E::Id) -> Result<PropertiesSource> {
        self.load_key(&StoreKeyBuilder::build::<E>(id)).await
    }

    async fn save_properties(&self, id: &E::Id, source: &PropertiesSource) -> Result<()> {
        self.save_key(&StoreKeyBuilder::build::<E>(id), source).await
    }

    async fn delete_properties(&self, id: &E::Id) -> Result<()> {
        self.delete_key(&StoreKeyBuilder::build::<E>(id)).await
    }
}

impl<E: PropertyEntity, S: PropertyStore> RevisionRepository<E> for StoreRepository<E, S> {
    async fn load_revision(&self, id: &E::Id, revision: RevisionId) -> Result<PropertiesSource> {
        self.load_key(&StoreKeyBuilder::build_revision::<E>(id, revision))
            .await
    }

    async fn save_revision(
        &self,
        id: &E::Id,
        revision: RevisionId,
        source: &PropertiesSource,
    ) -> Result<()> {
        self.save_key(&StoreKeyBuilder::build_revision::<E>(id, revision), source)
            .await
    }

    async fn delete_revision(&self, id: &E::Id, revision: RevisionId) -> Result<()> {
        self.delete_key(&StoreKeyBuilder::build_revision::<E>(id, revision))
            .await
    }
}

#[cfg(all(test, feature = "inmemory"))]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::store::InMemoryStore;

    struct Client;

    impl PropertyEntity for Client {
        type Id = u64;

        fn category() -> &'static str {
            "client"
        }
    }

    fn sample() -> PropertiesSource {
        [("name", "Ann"), ("age", "41")].into_iter().collect()
    }

    #[tokio::test]
    async fn test_load_absent_is_empty() {
        let repo = StoreRepository::<Client, _>::new(InMemoryStore::new());
        let source = repo.load_properties(&1).await.expect("Failed to load");
        assert!(source.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let store = InMemoryStore::new();
        let repo = StoreRepository::<Client, _>::new(store.clone());

        repo.save_properties(&1, &sample()).await.expect("Failed to save");
        assert!(store.contains_key("client:1"));

        let loaded = repo.load_properties(&1).await.expect("Failed to load");
        assert_eq!(loaded, sample());
    }

    #[tokio::test]
    async fn test_save_replaces_not_merges() {
        let repo = StoreRepository::<Client, _>::new(InMemoryStore::new());
        repo.save_properties(&1, &sample()).await.expect("Failed to save");

        let replacement: PropertiesSource = [("name", "Bob")].into_iter().collect();
        repo.save_properties(&1, &replacement)
            .await
            .expect("Failed to save");

        let loaded = repo.load_properties(&1).await.expect("Failed to load");
        assert_eq!(loaded, replacement);
        assert_eq!(loaded.get("age"), None);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let repo = StoreRepository::<Client, _>::new(InMemoryStore::new());
        repo.delete_properties(&9).await.expect("Delete of absent entity");

        repo.save_properties(&9, &sample()).await.expect("Failed to save");
        repo.delete_properties(&9).await.expect("Failed to delete");
        repo.delete_properties(&9).await.expect("Second delete");
        assert!(repo.load_properties(&9).await.expect("Failed to load").is_empty());
    }

    #[tokio::test]
    async fn test_store_error_propagates() {
        let store = InMemoryStore::new();
        let repo = StoreRepository::<Client, _>::new(store.clone());
        store.set_failing(true);

        assert!(matches!(
            repo.load_properties(&1).await,
            Err(Error::StoreError(_))
        ));
        assert!(matches!(
            repo.save_properties(&1, &sample()).await,
            Err(Error::StoreError(_))
        ));
    }

    #[tokio::test]
    async fn test_corrupt_bytes_surface() {
        let store = InMemoryStore::new();
        store
            .put("client:1", b"garbage".to_vec())
            .await
            .expect("Failed to put");
        let repo = StoreRepository::<Client, _>::new(store);

        let err = repo.load_properties(&1).await.unwrap_err();
        assert!(err.is_corrupt_entry());
    }

    #[tokio::test]
    async fn test_revisions_are_separate() {
        let repo = StoreRepository::<Client, _>::new(InMemoryStore::new());
        let v1: PropertiesSource = [("name", "Ann")].into_iter().collect();
        let v2: PropertiesSource = [("name", "Ann B.")].into_iter().collect();

        repo.save_revision(&1, 1, &v1).await.expect("Failed to save");
        repo.save_revision(&1, 2, &v2).await.expect("Failed to save");

        assert_eq!(repo.load_revision(&1, 1).await.expect("Failed to load"), v1);
        assert_eq!(repo.load_revision(&1, 2).await.expect("Failed to load"), v2);
        assert!(repo.load_properties(&1).await.expect("Failed to load").is_empty());

        repo.delete_revision(&1, 1).await.expect("Failed to delete");
        assert!(repo.load_revision(&1, 1).await.expect("Failed to load").is_empty());
        assert_eq!(repo.load_revision(&1, 2).await.expect("Failed to load"), v2);
    }

    struct Tenant;

    impl PropertyEntity for Tenant {
        type Id = String;

        fn category() -> &'static str {
            "tenant"
        }
    }

    #[tokio::test]
    async fn test_string_ids_do_not_alias_revisions() {
        let repo = StoreRepository::<Tenant, _>::new(InMemoryStore::new());
        let revision: PropertiesSource = [("name", "revision-2-of-1")].into_iter().collect();
        repo.save_revision(&"1".to_string(), 2, &revision)
            .await
            .expect("Failed to save revision");

        let lookalike = repo
            .load_properties(&"1:rev:2".to_string())
            .await
            .expect("Failed to load");
        assert!(lookalike.is_empty());

        repo.save_properties(&"1:rev:2".to_string(), &sample())
            .await
            .expect("Failed to save");
        assert_eq!(
            repo.load_revision(&"1".to_string(), 2)
                .await
                .expect("Failed to load revision"),
            revision
        );
    }

    #[tokio::test]
    async fn test_load_many_default() {
        let repo = StoreRepository::<Client, _>::new(InMemoryStore::new());
        repo.save_properties(&2, &sample()).await.expect("Failed to save");

        let loaded = repo.load_many(&[1, 2]).await.expect("Failed to load");
        assert_eq!(loaded.len(), 2);
        assert!(loaded[0].is_empty());
        assert_eq!(loaded[1], sample());
    }
}
