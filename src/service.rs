//! High-level properties service.
//!
//! Binds a category's registry to its repository so callers deal in typed
//! [`EntityProperties`] views rather than raw sources.

use crate::entity::PropertyEntity;
use crate::error::{Error, Result};
use crate::key::RevisionId;
use crate::properties::EntityProperties;
use crate::registry::PropertyTypeRegistry;
use crate::repository::{EntityPropertiesRepository, RevisionRepository};
use std::marker::PhantomData;
use std::sync::Arc;

/// Entry point for loading and saving the properties of one entity category.
///
/// Cloning is cheap (two `Arc` increments), so one service can be handed to
/// every request handler. Each call produces or consumes an independent view;
/// the service itself holds no per-entity state.
///
/// # Example
///
/// ```
/// use entity_props::store::InMemoryStore;
/// use entity_props::{
///     EntityPropertiesService, PropertyEntity, PropertyType, RegistryBuilder, StoreRepository,
/// };
///
/// struct Client;
/// impl PropertyEntity for Client {
///     type Id = u64;
///     fn category() -> &'static str { "client" }
/// }
///
/// # #[tokio::main]
/// # async fn main() -> entity_props::Result<()> {
/// let mut builder = RegistryBuilder::new();
/// builder.register("crm", "tier", PropertyType::String, None)?;
///
/// let service = EntityPropertiesService::new(
///     builder.build(),
///     StoreRepository::<Client, _>::new(InMemoryStore::new()),
/// );
///
/// let mut props = service.get_properties(&7).await?;
/// props.set_value("tier", "gold")?;
/// service.save_properties(&mut props).await?;
///
/// let reloaded = service.get_properties(&7).await?;
/// assert_eq!(reloaded.get_value::<String>("tier")?, "gold");
/// # Ok(())
/// # }
/// ```
pub struct EntityPropertiesService<E: PropertyEntity, R> {
    registry: Arc<PropertyTypeRegistry>,
    repository: Arc<R>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: PropertyEntity, R> Clone for EntityPropertiesService<E, R> {
    fn clone(&self) -> Self {
        EntityPropertiesService {
            registry: Arc::clone(&self.registry),
            repository: Arc::clone(&self.repository),
            _entity: PhantomData,
        }
    }
}

impl<E, R> EntityPropertiesService<E, R>
where
    E: PropertyEntity,
    R: EntityPropertiesRepository<E>,
{
    pub fn new(registry: Arc<PropertyTypeRegistry>, repository: R) -> Self {
        EntityPropertiesService {
            registry,
            repository: Arc::new(repository),
            _entity: PhantomData,
        }
    }

    pub fn registry(&self) -> &Arc<PropertyTypeRegistry> {
        &self.registry
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Load the properties of `id` into a fresh, clean view.
    ///
    /// An entity that never saved anything yields an empty view whose reads
    /// all return defaults.
    ///
    /// # Errors
    ///
    /// Propagates repository errors (`Error::StoreError`, codec errors,
    /// `Error::BackendError` for cached repositories).
    pub async fn get_properties(&self, id: &E::Id) -> Result<EntityProperties<E>> {
        let source = self.repository.load_properties(id).await?;
        debug!(
            "Loaded properties of {}:{} ({} stored)",
            E::category(),
            id,
            source.len()
        );
        Ok(EntityProperties::new(
            id.clone(),
            Arc::clone(&self.registry),
            source,
        ))
    }

    /// Persist the full state of `properties`, replacing what was stored.
    ///
    /// On success the view is marked clean. On failure it stays dirty and may
    /// be saved again.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidOperation`: the view is bound to a revision; use
    ///   [`save_revision_properties`](Self::save_revision_properties)
    /// - Repository errors otherwise
    pub async fn save_properties(&self, properties: &mut EntityProperties<E>) -> Result<()> {
        if let Some(revision) = properties.revision() {
            return Err(Error::InvalidOperation(format!(
                "properties of {}:{} are bound to revision {}",
                E::category(),
                properties.id(),
                revision
            )));
        }

        self.repository
            .save_properties(properties.id(), properties.source())
            .await?;
        properties.mark_clean();
        info!(
            "✓ Saved {} properties of {}:{}",
            properties.source().len(),
            E::category(),
            properties.id()
        );
        Ok(())
    }

    /// Remove every stored property of `id`. Idempotent.
    ///
    /// # Errors
    ///
    /// Propagates repository errors.
    pub async fn delete_properties(&self, id: &E::Id) -> Result<()> {
        self.repository.delete_properties(id).await?;
        info!("✓ Deleted properties of {}:{}", E::category(), id);
        Ok(())
    }

    /// Load several entities at once. Views are returned in the order of `ids`.
    ///
    /// # Errors
    ///
    /// Returns the first repository error encountered.
    pub async fn get_many_properties(&self, ids: &[E::Id]) -> Result<Vec<EntityProperties<E>>> {
        let sources = self.repository.load_many(ids).await?;
        Ok(ids
            .iter()
            .cloned()
            .zip(sources)
            .map(|(id, source)| EntityProperties::new(id, Arc::clone(&self.registry), source))
            .collect())
    }
}

impl<E, R> EntityPropertiesService<E, R>
where
    E: PropertyEntity,
    R: EntityPropertiesRepository<E> + RevisionRepository<E>,
{
    /// Load the properties stored for revision `revision` of `id`.
    ///
    /// # Errors
    ///
    /// Propagates repository errors.
    pub async fn get_revision_properties(
        &self,
        id: &E::Id,
        revision: RevisionId,
    ) -> Result<EntityProperties<E>> {
        let source = self.repository.load_revision(id, revision).await?;
        Ok(EntityProperties::for_revision(
            id.clone(),
            revision,
            Arc::clone(&self.registry),
            source,
        ))
    }

    /// Persist a revision-bound view under its `(id, revision)` pair.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidOperation`: the view is not bound to a revision
    /// - Repository errors otherwise
    pub async fn save_revision_properties(
        &self,
        properties: &mut EntityProperties<E>,
    ) -> Result<()> {
        let Some(revision) = properties.revision() else {
            return Err(Error::InvalidOperation(format!(
                "properties of {}:{} are not bound to a revision",
                E::category(),
                properties.id()
            )));
        };

        self.repository
            .save_revision(properties.id(), revision, properties.source())
            .await?;
        properties.mark_clean();
        info!(
            "✓ Saved {} properties of {}:{} revision {}",
            properties.source().len(),
            E::category(),
            properties.id(),
            revision
        );
        Ok(())
    }

    /// Remove the properties stored for one revision. Idempotent.
    ///
    /// # Errors
    ///
    /// Propagates repository errors.
    pub async fn delete_revision_properties(&self, id: &E::Id, revision: RevisionId) -> Result<()> {
        self.repository.delete_revision(id, revision).await?;
        info!(
            "✓ Deleted properties of {}:{} revision {}",
            E::category(),
            id,
            revision
        );
        Ok(())
    }
}
