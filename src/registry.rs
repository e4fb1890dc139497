//! Per-category property registry.
//!
//! Registration is a two-phase lifecycle: modules declare their keys on a
//! mutable [`RegistryBuilder`] during startup, then [`RegistryBuilder::build`]
//! freezes the declarations into an immutable [`PropertyTypeRegistry`] that is
//! shared through `Arc` and read concurrently without locking.
//!
//! ```
//! use entity_props::{DefaultFactory, PropertyType, RegistryBuilder};
//!
//! # fn main() -> entity_props::Result<()> {
//! let mut builder = RegistryBuilder::new();
//! builder.register(
//!     "core",
//!     "name",
//!     PropertyType::String,
//!     Some(DefaultFactory::value("unset".to_string())),
//! )?;
//! let registry = builder.build();
//!
//! assert_eq!(registry.describe("name")?.owner(), "core");
//! assert_eq!(registry.create_default("name")?, serde_json::json!("unset"));
//! # Ok(())
//! # }
//! ```

use crate::convert::{TextConverter, TypeConverter};
use crate::descriptor::{DefaultFactory, PropertyDescriptor};
use crate::error::{Error, Result};
use crate::types::PropertyType;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A module that contributes property declarations to a category.
///
/// Contributors are installed independently; they only need to agree on not
/// reusing each other's keys.
pub trait PropertyContributor {
    /// Name used as the owner of every declaration this contributor makes.
    fn owner(&self) -> &str;

    fn register(&self, builder: &mut RegistryBuilder) -> Result<()>;
}

/// Mutable registration phase of a [`PropertyTypeRegistry`].
pub struct RegistryBuilder {
    descriptors: HashMap<String, PropertyDescriptor>,
    converter: Arc<dyn TypeConverter>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        RegistryBuilder {
            descriptors: HashMap::new(),
            converter: Arc::new(TextConverter),
        }
    }

    /// Replace the default [`TextConverter`].
    pub fn with_converter(mut self, converter: impl TypeConverter + 'static) -> Self {
        self.converter = Arc::new(converter);
        self
    }

    /// Declare a property.
    ///
    /// # Errors
    ///
    /// - `Error::ConfigError`: empty owner or key
    /// - `Error::DuplicateKey`: the key is already declared by another owner
    ///   or with another type. Re-declaring the identical (owner, type) pair
    ///   is accepted and keeps the first declaration.
    pub fn register(
        &mut self,
        owner: &str,
        key: &str,
        value_type: PropertyType,
        default: Option<DefaultFactory>,
    ) -> Result<&mut Self> {
        let mut descriptor = PropertyDescriptor::new(owner, key, value_type);
        if let Some(factory) = default {
            descriptor = descriptor.with_default(factory);
        }
        self.register_descriptor(descriptor)?;
        Ok(self)
    }

    /// Declare a property from a prebuilt descriptor.
    ///
    /// # Errors
    ///
    /// Same as [`register`](Self::register).
    pub fn register_descriptor(&mut self, descriptor: PropertyDescriptor) -> Result<()> {
        if descriptor.key().is_empty() {
            return Err(Error::ConfigError("property key must not be empty".to_string()));
        }
        if descriptor.owner().is_empty() {
            return Err(Error::ConfigError(format!(
                "property '{}' has no owner",
                descriptor.key()
            )));
        }

        if let Some(existing) = self.descriptors.get(descriptor.key()) {
            if existing.same_declaration(&descriptor) {
                debug!(
                    "Property '{}' re-registered by {} (idempotent)",
                    descriptor.key(),
                    descriptor.owner()
                );
                return Ok(());
            }

            warn!(
                "Rejected property '{}' ({}) from {}: already registered as {} by {}",
                descriptor.key(),
                descriptor.value_type(),
                descriptor.owner(),
                existing.value_type(),
                existing.owner()
            );
            return Err(Error::DuplicateKey {
                key: descriptor.key().to_string(),
                registered_by: existing.owner().to_string(),
                attempted_by: descriptor.owner().to_string(),
            });
        }

        debug!(
            "Registered property '{}' ({}) for {}",
            descriptor.key(),
            descriptor.value_type(),
            descriptor.owner()
        );
        self.descriptors
            .insert(descriptor.key().to_string(), descriptor);
        Ok(())
    }

    /// Let a contributor declare its properties.
    pub fn install(&mut self, contributor: &dyn PropertyContributor) -> Result<&mut Self> {
        contributor.register(self).map_err(|e| {
            error!("Property contributor {} failed: {}", contributor.owner(), e);
            e
        })?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Freeze the declarations.
    pub fn build(self) -> Arc<PropertyTypeRegistry> {
        info!("Property registry built with {} keys", self.descriptors.len());
        Arc::new(PropertyTypeRegistry {
            descriptors: self.descriptors,
            converter: self.converter,
        })
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable set of property declarations for one entity category.
pub struct PropertyTypeRegistry {
    descriptors: HashMap<String, PropertyDescriptor>,
    converter: Arc<dyn TypeConverter>,
}

impl PropertyTypeRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Look up the declaration of `key`.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownProperty` if the key was never registered.
    pub fn describe(&self, key: &str) -> Result<&PropertyDescriptor> {
        self.descriptors
            .get(key)
            .ok_or_else(|| Error::UnknownProperty(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.descriptors.contains_key(key)
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.descriptors.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Build a fresh default for `key`.
    ///
    /// Invokes the descriptor's factory if it has one, else returns the zero
    /// value of its type. Every call produces a new value.
    ///
    /// # Errors
    ///
    /// - `Error::UnknownProperty`: key not registered
    /// - `Error::ConversionError`: the factory produced a value that does not
    ///   serialize or does not fit the declared type
    pub fn create_default(&self, key: &str) -> Result<Value> {
        let descriptor = self.describe(key)?;
        let Some(factory) = descriptor.default_factory() else {
            return Ok(descriptor.value_type().zero_value());
        };

        let value = factory
            .produce(self, key)
            .map_err(|reason| Error::conversion(key, reason))?;
        if !value.is_null() && !descriptor.value_type().accepts(&value) {
            return Err(Error::conversion(
                key,
                format!(
                    "default does not match declared type {}",
                    descriptor.value_type()
                ),
            ));
        }
        Ok(value)
    }

    /// Converter shared by every view bound to this registry.
    pub fn converter(&self) -> &dyn TypeConverter {
        self.converter.as_ref()
    }
}

impl fmt::Debug for PropertyTypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyTypeRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}
