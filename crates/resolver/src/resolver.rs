//! Resolver facade
//!
//! Owns the ordered domain list and drives the values store for every call.
//! Keys are trimmed before use and blank keys are rejected.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io;
use std::sync::Arc;

use kv_resolver_core::{
    DomainResolver, DomainSpecificValue, DomainValues, InterningDomainSpecificValueFactory,
    KeyValues, MapBackedDomainResolver, Payload, ResolverError, Result, SharedFactory,
    SharedPersistence, Value, ValuesStore, WILDCARD,
};

use crate::registry::{registry, ManagedResolver, RegistrationId};

pub struct KeyValueResolver<V: Payload = Value> {
    store: ValuesStore<V>,
    /// Append-only; readers take a snapshot
    domains: RwLock<Arc<Vec<String>>>,
}

impl<V: Payload> KeyValueResolver<V> {
    /// In-memory resolver without domains
    pub fn new() -> Self {
        Self {
            store: ValuesStore::new(default_factory()),
            domains: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// In-memory resolver with `domains` registered in order
    pub fn with_domains<S: AsRef<str>>(domains: &[S]) -> Result<Self> {
        Self::from_parts(default_factory(), None, domains)
    }

    /// Resolver preloaded from `persistence`
    pub fn from_persistence<S: AsRef<str>>(
        persistence: SharedPersistence<V>,
        domains: &[S],
    ) -> Result<Self> {
        Self::from_parts(default_factory(), Some(persistence), domains)
    }

    /// Add the resolver to the process-wide registry.
    ///
    /// It stays listed until the returned id is deregistered.
    pub fn register(self: &Arc<Self>) -> RegistrationId {
        let managed: Arc<dyn ManagedResolver> = self.clone();
        registry().register(managed)
    }

    pub fn from_parts<S: AsRef<str>>(
        factory: SharedFactory<V>,
        persistence: Option<SharedPersistence<V>>,
        domains: &[S],
    ) -> Result<Self> {
        let mut store = ValuesStore::new(Arc::clone(&factory));
        if let Some(persistence) = persistence {
            let loaded = persistence.load_all(&factory)?;
            tracing::info!(keys = loaded.len(), "Preloaded values from persistence");
            store = store.with_persistence(persistence);
            store.set_all_values(loaded.into_iter().map(Arc::new));
        }
        let resolver = Self {
            store,
            domains: RwLock::new(Arc::new(Vec::new())),
        };
        resolver.add_domains(domains)?;
        Ok(resolver)
    }

    pub fn store(&self) -> &ValuesStore<V> {
        &self.store
    }

    /// Append domain names; all are checked before any is added
    pub fn add_domains<S: AsRef<str>>(&self, names: &[S]) -> Result<&Self> {
        if let Some(blank) = names.iter().position(|name| name.as_ref().trim().is_empty()) {
            return Err(ResolverError::InvalidArgument(format!(
                "domain name at position {} must not be blank",
                blank
            )));
        }
        if names.is_empty() {
            return Ok(self);
        }
        let mut domains = self.domains.write();
        let mut extended = domains.to_vec();
        extended.extend(names.iter().map(|name| name.as_ref().to_string()));
        *domains = Arc::new(extended);
        tracing::debug!(domains = ?*domains, "Registered domains");
        Ok(self)
    }

    /// Registered domain names in order
    pub fn domains(&self) -> Vec<String> {
        self.domain_list().to_vec()
    }

    fn domain_list(&self) -> Arc<Vec<String>> {
        Arc::clone(&*self.domains.read())
    }

    pub fn get(&self, key: &str, resolver: &dyn DomainResolver) -> Result<Option<V>> {
        let key = trim_key(key)?;
        let value = match self.store.get_key_values_from_map_or_persistence(key)? {
            Some(key_values) => key_values.get(&self.domain_list(), None, Some(resolver))?,
            None => None,
        };
        tracing::debug!(key = %key, found = value.is_some(), "Resolved value");
        Ok(value)
    }

    pub fn get_or_default(&self, key: &str, default: V, resolver: &dyn DomainResolver) -> Result<V> {
        Ok(self.get(key, resolver)?.unwrap_or(default))
    }

    /// Resolve and convert; a stored value of another type is `TypeMismatch`
    pub fn get_as<T>(&self, key: &str, resolver: &dyn DomainResolver) -> Result<Option<T>>
    where
        T: TryFrom<V>,
    {
        let key = trim_key(key)?;
        match self.get(key, resolver)? {
            Some(value) => T::try_from(value)
                .map(Some)
                .map_err(|_| ResolverError::TypeMismatch {
                    key: key.to_string(),
                    expected: std::any::type_name::<T>(),
                }),
            None => Ok(None),
        }
    }

    /// Resolve, or store `default` as the key's default value and return it
    pub fn get_or_define(
        &self,
        key: &str,
        default: V,
        description: Option<&str>,
        resolver: &dyn DomainResolver,
    ) -> Result<V> {
        if let Some(value) = self.get(key, resolver)? {
            return Ok(value);
        }
        self.set(key, default.clone(), description, &[])?;
        Ok(default)
    }

    pub fn set(
        &self,
        key: &str,
        value: V,
        description: Option<&str>,
        domain_values: &[&str],
    ) -> Result<DomainSpecificValue<V>> {
        self.set_with_change_set(key, value, description, None, domain_values)
    }

    pub fn set_with_change_set(
        &self,
        key: &str,
        value: V,
        description: Option<&str>,
        change_set: Option<&str>,
        domain_values: &[&str],
    ) -> Result<DomainSpecificValue<V>> {
        let key = trim_key(key)?;
        self.store
            .set_with_change_set(key, description, change_set, value, domain_values)
    }

    /// Store under the values `domain_values` maps the registered domains to
    pub fn set_domain_values(
        &self,
        key: &str,
        value: V,
        description: Option<&str>,
        domain_values: &dyn DomainValues,
    ) -> Result<DomainSpecificValue<V>> {
        self.set_domain_values_with_change_set(key, value, description, None, domain_values)
    }

    pub fn set_domain_values_with_change_set(
        &self,
        key: &str,
        value: V,
        description: Option<&str>,
        change_set: Option<&str>,
        domain_values: &dyn DomainValues,
    ) -> Result<DomainSpecificValue<V>> {
        let tokens = self.tokens_for(domain_values);
        let tokens: Vec<&str> = tokens.iter().map(String::as_str).collect();
        self.set_with_change_set(key, value, description, change_set, &tokens)
    }

    pub fn reload(&self) -> Result<()> {
        self.store.reload()
    }

    pub fn reload_key(&self, key: &str) -> Result<()> {
        self.store.reload_key(trim_key(key)?)
    }

    pub fn dump(&self) -> String {
        format!(
            "KeyValueResolver{{domains=[{}]{}\n}}",
            self.domain_list().join(", "),
            self.store.dump()
        )
    }

    pub fn dump_to<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        write!(out, "KeyValueResolver{{domains=[{}]", self.domain_list().join(", "))?;
        self.store.dump_to(out)?;
        writeln!(out, "\n}}")
    }

    /// Key values held in memory, without loading
    pub fn get_key_values(&self, key: &str) -> Result<Option<Arc<KeyValues<V>>>> {
        Ok(self.store.get_values_for(trim_key(key)?))
    }

    /// Copy of the key's best matches for each of `resolvers`
    pub fn get_key_values_filtered(
        &self,
        key: &str,
        resolvers: &[&dyn DomainResolver],
    ) -> Result<Option<KeyValues<V>>> {
        let domains = self.domain_list();
        self.get_key_values(key)?
            .map(|key_values| key_values.copy(&domains, resolvers))
            .transpose()
    }

    pub fn get_all_key_values(&self) -> Vec<Arc<KeyValues<V>>> {
        self.store.get_all_values()
    }

    pub fn get_all_key_values_filtered(
        &self,
        resolvers: &[&dyn DomainResolver],
    ) -> Result<Vec<KeyValues<V>>> {
        self.store.get_all_values_filtered(&self.domain_list(), resolvers)
    }

    /// Resolved value of every in-memory key that has one
    pub fn get_all_mappings(&self, resolver: &dyn DomainResolver) -> Result<HashMap<String, V>> {
        let domains = self.domain_list();
        let mut mappings = HashMap::new();
        for key_values in self.store.get_all_values() {
            if let Some(value) = key_values.get(&domains, None, Some(resolver))? {
                mappings.insert(key_values.key().to_string(), value);
            }
        }
        Ok(mappings)
    }

    pub fn remove_with_change_set(
        &self,
        key: &str,
        change_set: Option<&str>,
        domain_values: &[&str],
    ) -> Result<Option<DomainSpecificValue<V>>> {
        self.store
            .remove_with_change_set(trim_key(key)?, change_set, domain_values)
    }

    pub fn remove_domain_values_with_change_set(
        &self,
        key: &str,
        change_set: Option<&str>,
        domain_values: &dyn DomainValues,
    ) -> Result<Option<DomainSpecificValue<V>>> {
        let tokens = self.tokens_for(domain_values);
        let tokens: Vec<&str> = tokens.iter().map(String::as_str).collect();
        self.remove_with_change_set(key, change_set, &tokens)
    }

    pub fn remove(&self, key: &str, domain_values: &[&str]) -> Result<Option<DomainSpecificValue<V>>> {
        self.remove_with_change_set(key, None, domain_values)
    }

    pub fn remove_domain_values(
        &self,
        key: &str,
        domain_values: &dyn DomainValues,
    ) -> Result<Option<DomainSpecificValue<V>>> {
        self.remove_domain_values_with_change_set(key, None, domain_values)
    }

    /// Remove the best matches for the positional `domain_values`; `None` leaves a domain open
    pub fn remove_all_matching(
        &self,
        key: &str,
        domain_values: &[Option<&str>],
    ) -> Result<Vec<DomainSpecificValue<V>>> {
        self.store
            .remove_all_matching(trim_key(key)?, &self.domain_list(), domain_values)
    }

    /// Like [`remove_all_matching`](Self::remove_all_matching) with values taken from `domain_values`
    pub fn remove_all_matching_domain_values(
        &self,
        key: &str,
        domain_values: &dyn DomainValues,
    ) -> Result<Vec<DomainSpecificValue<V>>> {
        let domains = self.domain_list();
        let owned = domain_values.domain_values(&domains);
        let values: Vec<Option<&str>> = owned.iter().map(Option::as_deref).collect();
        self.store
            .remove_all_matching(trim_key(key)?, &domains, &values)
    }

    pub fn remove_key(&self, key: &str) -> Result<Option<Arc<KeyValues<V>>>> {
        self.store.remove(trim_key(key)?)
    }

    pub fn remove_change_set(&self, change_set: &str) -> Result<()> {
        if change_set.trim().is_empty() {
            return Err(ResolverError::InvalidArgument(
                "change set name must not be blank".to_string(),
            ));
        }
        self.store.remove_change_set(change_set)
    }

    /// Resolver zipping the registered domains with positional values
    pub fn resolver_for(&self, domain_values: &[&str]) -> MapBackedDomainResolver {
        let values: Vec<Option<&str>> = domain_values.iter().copied().map(Some).collect();
        MapBackedDomainResolver::positional(&self.domain_list(), &values)
    }

    /// Domain name to pattern token; domains beyond the pattern map to `*`
    pub fn domain_values_map(&self, dsv: &DomainSpecificValue<V>) -> BTreeMap<String, String> {
        let tokens = dsv.domain_values();
        self.domain_list()
            .iter()
            .enumerate()
            .map(|(i, domain)| {
                let token = tokens.get(i).copied().unwrap_or(WILDCARD);
                (domain.clone(), token.to_string())
            })
            .collect()
    }

    fn tokens_for(&self, domain_values: &dyn DomainValues) -> Vec<String> {
        domain_values
            .domain_values(&self.domain_list())
            .into_iter()
            .map(Option::unwrap_or_default)
            .collect()
    }
}

impl<V: Payload> Default for KeyValueResolver<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Payload> fmt::Display for KeyValueResolver<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyValueResolver{{domains=[{}]}}", self.domain_list().join(", "))
    }
}

impl<V: Payload> ManagedResolver for KeyValueResolver<V> {
    fn describe(&self) -> String {
        self.to_string()
    }

    fn dump(&self) -> String {
        KeyValueResolver::dump(self)
    }

    fn dump_key(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get_key_values(key)?.map(|key_values| key_values.to_string()))
    }

    fn reload(&self) -> Result<()> {
        KeyValueResolver::reload(self)
    }
}

fn default_factory<V: Payload>() -> SharedFactory<V> {
    Arc::new(InterningDomainSpecificValueFactory::new())
}

fn trim_key(key: &str) -> Result<&str> {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return Err(ResolverError::InvalidArgument(
            "key must not be blank".to_string(),
        ));
    }
    Ok(trimmed)
}
