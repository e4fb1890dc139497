//! Entity category trait that every property-carrying entity implements.

use std::fmt::{Debug, Display};
use std::hash::Hash;

/// Marks a class of entities that can carry extension properties.
///
/// The implementing type is usually a zero-sized marker; only the associated
/// `Id` type and the category name matter. The category namespaces every store
/// and cache key, so two categories never see each other's properties even
/// when their ids collide.
///
/// # Example
///
/// ```
/// use entity_props::PropertyEntity;
///
/// pub struct Client;
///
/// impl PropertyEntity for Client {
///     type Id = u64;
///
///     fn category() -> &'static str {
///         "client"
///     }
/// }
/// ```
pub trait PropertyEntity: Send + Sync + 'static {
    /// Type of the entity's id (typically an integer, String or UUID)
    type Id: Display + Debug + Clone + Send + Sync + Eq + Hash + 'static;

    /// Return the category name for this entity type.
    ///
    /// Final store key format: `"{category}:{id}"`
    fn category() -> &'static str;
}
