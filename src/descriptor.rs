//! Property declarations.

use crate::registry::PropertyTypeRegistry;
use crate::types::PropertyType;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

type DefaultFn =
    dyn Fn(&PropertyTypeRegistry, &str) -> std::result::Result<Value, String> + Send + Sync;

/// Builds the default value of a property that has no stored value.
///
/// The factory runs once per lookup of an absent key and its result is
/// handed to exactly one caller, so no two entities ever share a default.
///
/// ```
/// use entity_props::DefaultFactory;
///
/// let name = DefaultFactory::value("unset".to_string());
/// let tags = DefaultFactory::new(|_registry, _key| vec!["new".to_string()]);
/// # let _ = (name, tags);
/// ```
#[derive(Clone)]
pub struct DefaultFactory(Arc<DefaultFn>);

impl DefaultFactory {
    /// Wrap a constructor receiving the owning registry and the property key.
    pub fn new<T, F>(factory: F) -> Self
    where
        T: Serialize,
        F: Fn(&PropertyTypeRegistry, &str) -> T + Send + Sync + 'static,
    {
        DefaultFactory(Arc::new(
            move |registry: &PropertyTypeRegistry, key: &str| -> std::result::Result<Value, String> {
                serde_json::to_value(factory(registry, key)).map_err(|e| e.to_string())
            },
        ))
    }

    /// Default that is a copy of `value`, cloned on every invocation.
    pub fn value<T>(value: T) -> Self
    where
        T: Serialize + Clone + Send + Sync + 'static,
    {
        Self::new(move |_, _| value.clone())
    }

    pub(crate) fn produce(
        &self,
        registry: &PropertyTypeRegistry,
        key: &str,
    ) -> std::result::Result<Value, String> {
        (self.0)(registry, key)
    }
}

impl fmt::Debug for DefaultFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DefaultFactory(..)")
    }
}

/// Immutable declaration of one property key.
#[derive(Clone, Debug)]
pub struct PropertyDescriptor {
    key: String,
    value_type: PropertyType,
    owner: String,
    default: Option<DefaultFactory>,
}

impl PropertyDescriptor {
    pub fn new(owner: impl Into<String>, key: impl Into<String>, value_type: PropertyType) -> Self {
        PropertyDescriptor {
            key: key.into(),
            value_type,
            owner: owner.into(),
            default: None,
        }
    }

    pub fn with_default(mut self, default: DefaultFactory) -> Self {
        self.default = Some(default);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value_type(&self) -> &PropertyType {
        &self.value_type
    }

    /// Module that declared this property.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn default_factory(&self) -> Option<&DefaultFactory> {
        self.default.as_ref()
    }

    /// Same owner and same type: re-registration is a no-op.
    pub(crate) fn same_declaration(&self, other: &PropertyDescriptor) -> bool {
        self.owner == other.owner && self.value_type == other.value_type
    }
}
