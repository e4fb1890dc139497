//! Typed view over one entity's persisted properties.

use crate::convert::is_explicit_null;
use crate::entity::PropertyEntity;
use crate::error::{Error, Result};
use crate::key::{PropertyKey, RevisionId};
use crate::registry::PropertyTypeRegistry;
use crate::source::PropertiesSource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Properties of a single entity, read and written as typed values.
///
/// Wraps the entity's [`PropertiesSource`] and interprets it through the
/// category's [`PropertyTypeRegistry`]. Instances are produced by
/// [`EntityPropertiesService`](crate::EntityPropertiesService), mutated during
/// one unit of work, and handed back to `save_properties`.
///
/// **Mutations are not persisted automatically.** Dropping a dirty view
/// without saving it discards every change.
///
/// A view is single-owner: mutation takes `&mut self` and the type is not
/// `Clone`. Sharing one instance between tasks is unsupported; load one view
/// per unit of work instead.
///
/// # Example
///
/// ```
/// use entity_props::{EntityProperties, PropertyEntity, PropertyType, PropertiesSource, RegistryBuilder};
///
/// struct Client;
/// impl PropertyEntity for Client {
///     type Id = u64;
///     fn category() -> &'static str { "client" }
/// }
///
/// # fn main() -> entity_props::Result<()> {
/// let mut builder = RegistryBuilder::new();
/// builder.register("core", "age", PropertyType::Integer, None)?;
/// let registry = builder.build();
///
/// let mut props = EntityProperties::<Client>::new(1, registry, PropertiesSource::new());
/// props.set_value("age", &30)?;
/// assert_eq!(props.get_value::<i64>("age")?, 30);
/// assert!(props.is_dirty());
/// # Ok(())
/// # }
/// ```
pub struct EntityProperties<E: PropertyEntity> {
    id: E::Id,
    revision: Option<RevisionId>,
    registry: Arc<PropertyTypeRegistry>,
    source: PropertiesSource,
    dirty: bool,
}

impl<E: PropertyEntity> EntityProperties<E> {
    /// Bind a loaded source to a registry. The view starts clean.
    pub fn new(id: E::Id, registry: Arc<PropertyTypeRegistry>, source: PropertiesSource) -> Self {
        EntityProperties {
            id,
            revision: None,
            registry,
            source,
            dirty: false,
        }
    }

    /// Bind a loaded revision source to a registry.
    pub fn for_revision(
        id: E::Id,
        revision: RevisionId,
        registry: Arc<PropertyTypeRegistry>,
        source: PropertiesSource,
    ) -> Self {
        let mut properties = Self::new(id, registry, source);
        properties.revision = Some(revision);
        properties
    }

    pub fn id(&self) -> &E::Id {
        &self.id
    }

    /// Revision this view was loaded for, if any.
    pub fn revision(&self) -> Option<RevisionId> {
        self.revision
    }

    pub fn registry(&self) -> &Arc<PropertyTypeRegistry> {
        &self.registry
    }

    /// Read a property as `T`.
    ///
    /// A stored raw value is converted through the registry's converter; an
    /// absent value yields a freshly built default.
    ///
    /// # Errors
    ///
    /// - `Error::UnknownProperty`: key not registered
    /// - `Error::ConversionError`: stored raw value is malformed, or does not
    ///   deserialize into `T`
    pub fn get_value<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self.get_json(key)?;
        serde_json::from_value(value).map_err(|e| Error::conversion(key, e))
    }

    /// Read a property as a dynamic JSON value.
    ///
    /// # Errors
    ///
    /// Same as [`get_value`](Self::get_value), minus the final typed step.
    pub fn get_json(&self, key: &str) -> Result<Value> {
        let descriptor = self.registry.describe(key)?;
        match self.source.get(key) {
            Some(raw) => self
                .registry
                .converter()
                .from_raw(raw, descriptor.value_type())
                .map_err(|reason| {
                    warn!(
                        "Stored value of {}:{} '{}' is not a valid {}: {}",
                        E::category(),
                        self.id,
                        key,
                        descriptor.value_type(),
                        reason
                    );
                    Error::conversion(key, reason)
                }),
            None => self.registry.create_default(key),
        }
    }

    /// Write a property.
    ///
    /// An explicit absence (`Option::None`, `()`) clears the property, so the
    /// next read yields its default.
    ///
    /// # Errors
    ///
    /// - `Error::UnknownProperty`: key not registered
    /// - `Error::ConversionError`: value does not fit the declared type, or
    ///   has no JSON representation (non-finite floats)
    ///
    /// On error the view is left unchanged.
    pub fn set_value<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_value(value).map_err(|e| Error::conversion(key, e))?;
        if json.is_null() && !is_explicit_null(value) {
            self.registry.describe(key)?;
            return Err(Error::conversion(key, "value has no JSON representation"));
        }
        self.set_json(key, &json)
    }

    /// Write a property from a dynamic JSON value.
    ///
    /// # Errors
    ///
    /// Same as [`set_value`](Self::set_value).
    pub fn set_json(&mut self, key: &str, value: &Value) -> Result<()> {
        let descriptor = self.registry.describe(key)?;

        if value.is_null() {
            self.source.remove(key);
            self.dirty = true;
            return Ok(());
        }

        let raw = self
            .registry
            .converter()
            .to_raw(value, descriptor.value_type())
            .map_err(|reason| Error::conversion(key, reason))?;
        self.source.insert(key, raw);
        self.dirty = true;
        Ok(())
    }

    /// Clear a stored value. Returns whether something was removed.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownProperty` if the key is not registered.
    pub fn remove_value(&mut self, key: &str) -> Result<bool> {
        self.registry.describe(key)?;
        let removed = self.source.remove(key).is_some();
        if removed {
            self.dirty = true;
        }
        Ok(removed)
    }

    /// Whether a value is stored for `key` (as opposed to a default).
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownProperty` if the key is not registered.
    pub fn has_value(&self, key: &str) -> Result<bool> {
        self.registry.describe(key)?;
        Ok(self.source.contains_key(key))
    }

    /// Keys with a stored raw value, including unregistered ones.
    pub fn stored_keys(&self) -> impl Iterator<Item = &str> {
        self.source.keys()
    }

    /// Typed read through a [`PropertyKey`].
    ///
    /// # Errors
    ///
    /// Same as [`get_value`](Self::get_value).
    pub fn get<T: DeserializeOwned>(&self, key: &PropertyKey<T>) -> Result<T> {
        self.get_value(key.name())
    }

    /// Typed write through a [`PropertyKey`].
    ///
    /// # Errors
    ///
    /// Same as [`set_value`](Self::set_value).
    pub fn set<T: Serialize>(&mut self, key: &PropertyKey<T>, value: &T) -> Result<()> {
        self.set_value(key.name(), value)
    }

    /// True after a successful write since load or since the last save.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Snapshot of the current raw state.
    pub fn to_source(&self) -> PropertiesSource {
        self.source.clone()
    }

    pub fn source(&self) -> &PropertiesSource {
        &self.source
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }
}

impl<E: PropertyEntity> fmt::Debug for EntityProperties<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityProperties")
            .field("category", &E::category())
            .field("id", &self.id)
            .field("revision", &self.revision)
            .field("source", &self.source)
            .field("dirty", &self.dirty)
            .finish()
    }
}
