//! Client properties example: two modules extend a client entity with their
//! own typed properties, persisted through a cached repository.

use entity_props::{
    backend::InMemoryBackend,
    error::Result,
    observability::TtlPolicy,
    store::{InMemoryStore, PropertyStore},
    CacheStrategy, CachedRepository, DefaultFactory, EntityPropertiesService, PropertyContributor,
    PropertyEntity, PropertyKey, PropertyType, RegistryBuilder, StoreRepository,
};
use std::collections::BTreeMap;
use std::time::Duration;

/// Example entity category: clients of a CRM.
struct Client;

impl PropertyEntity for Client {
    type Id = u64;

    fn category() -> &'static str {
        "client"
    }
}

const NICKNAME: PropertyKey<String> = PropertyKey::new("nickname");
const NEWSLETTER: PropertyKey<bool> = PropertyKey::new("newsletter");
const CREDIT_LIMIT: PropertyKey<f64> = PropertyKey::new("credit_limit");
const CONTACTS: PropertyKey<BTreeMap<String, String>> = PropertyKey::new("contacts");

/// Properties declared by the CRM module.
struct CrmModule;

impl PropertyContributor for CrmModule {
    fn owner(&self) -> &str {
        "crm"
    }

    fn register(&self, builder: &mut RegistryBuilder) -> Result<()> {
        builder
            .register(
                self.owner(),
                NICKNAME.name(),
                PropertyType::String,
                Some(DefaultFactory::value(String::new())),
            )?
            .register(
                self.owner(),
                NEWSLETTER.name(),
                PropertyType::Bool,
                Some(DefaultFactory::value(true)),
            )?
            .register(
                self.owner(),
                CONTACTS.name(),
                PropertyType::map(PropertyType::String),
                None,
            )?;
        Ok(())
    }
}

/// Properties declared by the billing module.
struct BillingModule;

impl PropertyContributor for BillingModule {
    fn owner(&self) -> &str {
        "billing"
    }

    fn register(&self, builder: &mut RegistryBuilder) -> Result<()> {
        builder.register(
            self.owner(),
            CREDIT_LIMIT.name(),
            PropertyType::Float,
            Some(DefaultFactory::value(1000.0)),
        )?;
        Ok(())
    }
}

/// Store that announces every access, standing in for a database table.
#[derive(Clone, Default)]
struct VerboseStore {
    inner: InMemoryStore,
}

impl PropertyStore for VerboseStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        println!("  [DB] SELECT {}", key);
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        println!("  [DB] UPSERT {} ({} bytes)", key, value.len());
        self.inner.put(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        println!("  [DB] DELETE {}", key);
        self.inner.delete(key).await
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init()
        .ok();

    println!("\n=== entity-props - Client Properties Example ===\n");

    // 1. Modules declare their properties
    println!("1. Installing module declarations...");
    let mut builder = RegistryBuilder::new();
    builder.install(&CrmModule)?.install(&BillingModule)?;
    let registry = builder.build();
    println!("   ✓ Registry ready: {:?}\n", registry.keys());

    // 2. Wire store, cache and service
    println!("2. Wiring store, cache and service...");
    let repository = CachedRepository::new(
        StoreRepository::<Client, _>::new(VerboseStore::default()),
        InMemoryBackend::new(),
    )
    .with_ttl_policy(TtlPolicy::Fixed(Duration::from_secs(600)));
    let service = EntityPropertiesService::new(registry, repository);
    println!("   ✓ Service ready\n");

    // 3. First load - nothing stored, defaults apply
    println!("3. Loading client 42 for the first time:");
    let mut props = service.get_properties(&42).await?;
    println!(
        "   ✓ nickname={:?} newsletter={} credit_limit={:.2}\n",
        props.get(&NICKNAME)?,
        props.get(&NEWSLETTER)?,
        props.get(&CREDIT_LIMIT)?
    );

    // 4. Mutate and save
    println!("4. Updating client 42:");
    let mut contacts = BTreeMap::new();
    contacts.insert("billing".to_string(), "ap@example.com".to_string());
    props.set(&NICKNAME, &"Annie".to_string())?;
    props.set(&NEWSLETTER, &false)?;
    props.set(&CREDIT_LIMIT, &2500.0)?;
    props.set(&CONTACTS, &contacts)?;
    println!("   dirty before save: {}", props.is_dirty());
    service.save_properties(&mut props).await?;
    println!("   ✓ Saved, dirty after save: {}\n", props.is_dirty());

    // 5. Reload - served from the store once, then from the cache
    println!("5. Reloading client 42 twice:");
    let props = service.get_properties(&42).await?;
    let _ = service.get_properties(&42).await?;
    println!(
        "   ✓ nickname={:?} contacts={:?}\n",
        props.get(&NICKNAME)?,
        props.get(&CONTACTS)?
    );

    // 6. Rejected writes leave the view untouched
    println!("6. Writing a value of the wrong type:");
    let mut props = service.get_properties(&42).await?;
    match props.set_value("credit_limit", "a lot") {
        Err(e) => println!("   ✓ Rejected: {}", e),
        Ok(()) => println!("   ✗ Unexpectedly accepted"),
    }
    println!("   dirty: {}\n", props.is_dirty());

    // 7. Bypass the cache for a diagnostic read
    println!("7. Bypass strategy (skip cache):");
    let source = service
        .repository()
        .load_with(&42, CacheStrategy::Bypass)
        .await?;
    println!("   ✓ {} raw values stored\n", source.len());

    // 8. Revisions
    println!("8. Saving a draft revision:");
    let mut draft = service.get_revision_properties(&42, 1).await?;
    draft.set(&CREDIT_LIMIT, &5000.0)?;
    service.save_revision_properties(&mut draft).await?;
    let current = service.get_properties(&42).await?;
    println!(
        "   ✓ draft credit_limit={:.2}, current credit_limit={:.2}\n",
        service
            .get_revision_properties(&42, 1)
            .await?
            .get(&CREDIT_LIMIT)?,
        current.get(&CREDIT_LIMIT)?
    );

    // 9. Delete
    println!("9. Deleting client 42 properties:");
    service.delete_properties(&42).await?;
    let props = service.get_properties(&42).await?;
    println!("   ✓ nickname back to {:?}\n", props.get(&NICKNAME)?);

    println!("=== Example Complete ===\n");

    Ok(())
}
