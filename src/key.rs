//! Store/cache key construction and typed property keys.

use crate::entity::PropertyEntity;
use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;

/// Externally supplied revision identifier.
pub type RevisionId = u64;

/// Builder for store and cache keys.
///
/// Parts are joined with `:`. Each part has `%` and `:` percent-escaped, so
/// ids and categories containing separators can never alias another entity's
/// key or a revision key.
pub struct StoreKeyBuilder;

impl StoreKeyBuilder {
    /// Key of an entity's current properties: `"{category}:{id}"`.
    pub fn build<E: PropertyEntity>(id: &E::Id) -> String {
        let id = id.to_string();
        Self::build_composite(&[E::category(), &id])
    }

    /// Key of one revision: `"{category}:{id}:rev:{revision}"`.
    pub fn build_revision<E: PropertyEntity>(id: &E::Id, revision: RevisionId) -> String {
        let id = id.to_string();
        let revision = revision.to_string();
        Self::build_composite(&[E::category(), &id, "rev", &revision])
    }

    /// Build composite key from multiple parts.
    pub fn build_composite(parts: &[&str]) -> String {
        parts
            .iter()
            .map(|part| Self::escape(part))
            .collect::<Vec<_>>()
            .join(":")
    }

    fn escape(part: &str) -> Cow<'_, str> {
        if !part.contains(['%', ':']) {
            return Cow::Borrowed(part);
        }
        let mut escaped = String::with_capacity(part.len() + 4);
        for c in part.chars() {
            match c {
                '%' => escaped.push_str("%25"),
                ':' => escaped.push_str("%3A"),
                c => escaped.push(c),
            }
        }
        Cow::Owned(escaped)
    }
}

/// Typed handle to a registered property.
///
/// Binds a key name to the Rust type callers read and write it as, so
/// call sites cannot disagree on the type.
///
/// ```
/// use entity_props::PropertyKey;
///
/// pub const NAME: PropertyKey<String> = PropertyKey::new("name");
/// assert_eq!(NAME.name(), "name");
/// ```
pub struct PropertyKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> PropertyKey<T> {
    pub const fn new(name: &'static str) -> Self {
        PropertyKey {
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for PropertyKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for PropertyKey<T> {}

impl<T> fmt::Debug for PropertyKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PropertyKey({})", self.name)
    }
}
