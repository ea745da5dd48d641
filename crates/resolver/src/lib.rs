//! Domain-specific key/value resolver
//!
//! [`KeyValueResolver`] stores values per key under combinations of domain
//! values (country, environment, device, ...) and resolves the most specific
//! one for a caller's domain values and active change sets.
//!
//! ```no_run
//! use kv_resolver::{KeyValueResolver, Value};
//!
//! let resolver: KeyValueResolver = KeyValueResolver::with_domains(&["country", "language"])?;
//! resolver.set("greeting", Value::from("hello"), None, &[])?;
//! resolver.set("greeting", Value::from("hallo"), None, &["DE"])?;
//!
//! let lookup = resolver.resolver_for(&["DE", "de"]);
//! assert_eq!(resolver.get("greeting", &lookup)?, Some(Value::from("hallo")));
//! # Ok::<(), kv_resolver::ResolverError>(())
//! ```

pub mod registry;
pub mod resolver;
pub mod telemetry;

pub use registry::{registry, ManagedResolver, RegistrationId, ResolverRegistry};
pub use resolver::KeyValueResolver;
pub use telemetry::init_tracing;

pub use kv_resolver_config::Settings;
pub use kv_resolver_core::{
    DefaultDomainSpecificValueFactory, DomainResolver, DomainSpecificValue, DomainValues,
    InterningDomainSpecificValueFactory, KeyValues, MapBackedDomainResolver,
    MapBackedDomainValues, Persistence, PersistenceError, ResolverError, Result, SharedFactory,
    SharedPersistence, Value,
};

use std::sync::Arc;

/// Resolver for `settings`: persistence backend, factory and domains
pub fn from_settings(settings: &Settings) -> Result<KeyValueResolver> {
    let persistence = kv_resolver_persistence::persistence_from_settings(&settings.persistence)?;
    let factory: SharedFactory<Value> = if settings.interning {
        Arc::new(InterningDomainSpecificValueFactory::new())
    } else {
        Arc::new(DefaultDomainSpecificValueFactory)
    };
    let resolver = KeyValueResolver::from_parts(factory, persistence, &settings.domains)?;
    tracing::info!(
        domains = ?settings.domains,
        backend = ?settings.persistence.backend,
        "Created resolver from settings"
    );
    Ok(resolver)
}
