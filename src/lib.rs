//! # entity-props
//!
//! Typed, registry-driven property extensions for any entity.
//!
//! Modules attach extra attributes to an entity category (clients, invoices,
//! projects, ...) without changing its schema: each property is declared once
//! in a [`PropertyTypeRegistry`], persisted as a flat string map per entity,
//! and read back as a typed value.
//!
//! ## Features
//!
//! - **Typed access:** values cross the API as any `T: Serialize /
//!   DeserializeOwned`, checked against the declared [`PropertyType`]
//! - **Fresh defaults:** absent values come from a per-call [`DefaultFactory`],
//!   never a shared instance
//! - **Store agnostic:** persistence goes through the [`PropertyStore`](store::PropertyStore) trait
//! - **Read-through cache:** [`CachedRepository`] invalidates after every
//!   successful write
//! - **Revisions:** one property set per `(id, revision)` pair
//!
//! ## Quick Start
//!
//! ```
//! use entity_props::{
//!     backend::InMemoryBackend, store::InMemoryStore, CachedRepository, DefaultFactory,
//!     EntityPropertiesService, PropertyEntity, PropertyType, RegistryBuilder, StoreRepository,
//! };
//!
//! // 1. Name the entity category
//! struct Client;
//!
//! impl PropertyEntity for Client {
//!     type Id = u64;
//!     fn category() -> &'static str { "client" }
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> entity_props::Result<()> {
//! // 2. Declare properties, then freeze the registry
//! let mut builder = RegistryBuilder::new();
//! builder.register(
//!     "crm",
//!     "name",
//!     PropertyType::String,
//!     Some(DefaultFactory::value("unset".to_string())),
//! )?;
//! let registry = builder.build();
//!
//! // 3. Wire store, cache and service
//! let repo = CachedRepository::new(
//!     StoreRepository::<Client, _>::new(InMemoryStore::new()),
//!     InMemoryBackend::new(),
//! );
//! let service = EntityPropertiesService::new(registry, repo);
//!
//! // 4. Load, mutate, save
//! let mut props = service.get_properties(&1).await?;
//! assert_eq!(props.get_value::<String>("name")?, "unset");
//! props.set_value("name", "Ann")?;
//! service.save_properties(&mut props).await?;
//!
//! assert_eq!(service.get_properties(&1).await?.get_value::<String>("name")?, "Ann");
//! # Ok(())
//! # }
//! ```
//!
//! Mutations live only in the [`EntityProperties`] view until
//! [`EntityPropertiesService::save_properties`] is called.

#[macro_use]
extern crate log;

pub mod backend;
pub mod cached;
pub mod convert;
pub mod descriptor;
pub mod entity;
pub mod error;
pub mod key;
pub mod observability;
pub mod properties;
pub mod registry;
pub mod repository;
pub mod serialization;
pub mod service;
pub mod source;
pub mod store;
pub mod strategy;
pub mod types;

// Re-exports for convenience
pub use backend::CacheBackend;
pub use cached::CachedRepository;
pub use convert::{TextConverter, TypeConverter};
pub use descriptor::{DefaultFactory, PropertyDescriptor};
pub use entity::PropertyEntity;
pub use error::{Error, Result};
pub use key::{PropertyKey, RevisionId, StoreKeyBuilder};
pub use properties::EntityProperties;
pub use registry::{PropertyContributor, PropertyTypeRegistry, RegistryBuilder};
pub use repository::{EntityPropertiesRepository, RevisionRepository, StoreRepository};
pub use service::EntityPropertiesService;
pub use source::PropertiesSource;
pub use strategy::CacheStrategy;
pub use types::PropertyType;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
