//! All overrides of one key and the best-match search
//!
//! `KeyValues` keeps its overrides sorted by resolution precedence behind
//! its own lock, independent of the store's map lock:
//! - `get` walks the sorted overrides and returns the first one matching
//!   the caller's domain string and change sets
//! - `find_matching_values` selects the most specific overrides for a
//!   partial query, used for filtered snapshots and bulk removal
//!
//! At most one override exists per (pattern, change set) slot. Storing into
//! an occupied slot swaps the payload in place.

use parking_lot::{Mutex, MutexGuard, RwLock};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::domain_value::{DomainSpecificValue, DOMAIN_SEPARATOR, WILDCARD};
use crate::error::{ResolverError, Result};
use crate::matcher::Matcher;
use crate::traits::{
    DefaultDomainSpecificValueFactory, DomainResolver, MapBackedDomainResolver, SharedFactory,
};
use crate::value::Value;
use crate::Payload;

/// The overrides stored for a single key
pub struct KeyValues<V: Payload = Value> {
    key: String,
    description: Option<String>,
    values: RwLock<Vec<DomainSpecificValue<V>>>,
    /// Serializes store-level read-modify-write of this key
    writes: Mutex<()>,
    factory: SharedFactory<V>,
}

impl<V: Payload> KeyValues<V> {
    /// Empty key values using the default factory
    pub fn new(key: impl Into<String>, description: Option<&str>) -> Self {
        Self {
            key: key.into(),
            description: description.map(str::to_string),
            values: RwLock::new(Vec::new()),
            writes: Mutex::new(()),
            factory: Arc::new(DefaultDomainSpecificValueFactory),
        }
    }

    pub fn with_factory(mut self, factory: SharedFactory<V>) -> Self {
        self.factory = factory;
        self
    }

    /// Seed with existing overrides, e.g. from persistence
    pub fn with_values(self, values: impl IntoIterator<Item = DomainSpecificValue<V>>) -> Self {
        for value in values {
            self.insert(value);
        }
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Description, empty when none was given
    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }

    pub fn factory(&self) -> &SharedFactory<V> {
        &self.factory
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }

    /// Snapshot of the overrides in precedence order
    pub fn domain_specific_values(&self) -> Vec<DomainSpecificValue<V>> {
        self.values.read().clone()
    }

    pub(crate) fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.writes.lock()
    }

    pub fn put(&self, value: V, domain_values: &[&str]) -> Result<DomainSpecificValue<V>> {
        self.put_with_change_set(None, value, domain_values)
    }

    /// Add an override or replace the payload of the one in the same slot.
    ///
    /// Returns the override as built from the arguments.
    pub fn put_with_change_set(
        &self,
        change_set: Option<&str>,
        value: V,
        domain_values: &[&str],
    ) -> Result<DomainSpecificValue<V>> {
        let dsv = self.factory.create(value, change_set, domain_values)?;
        self.insert(dsv.clone());
        Ok(dsv)
    }

    /// Insert a prebuilt override, replacing the payload of an occupied slot
    pub fn insert(&self, dsv: DomainSpecificValue<V>) {
        let mut values = self.values.write();
        match values.binary_search_by(|existing| existing.cmp_precedence(&dsv)) {
            Ok(index) => values[index].set_value(dsv.into_value()),
            Err(index) => values.insert(index, dsv),
        }
    }

    /// Resolve the value for the caller's domain values.
    ///
    /// Fails when domains are registered but no resolver is given, or when a
    /// resolved domain value contains the separator. Without a resolver
    /// change-set values are not filtered out.
    pub fn get(
        &self,
        domains: &[String],
        default: Option<V>,
        resolver: Option<&dyn DomainResolver>,
    ) -> Result<Option<V>> {
        let (domain_str, active) = match resolver {
            Some(resolver) => (
                build_domain_string(domains, resolver)?,
                Some(resolver.active_change_sets()),
            ),
            None if domains.is_empty() => (String::new(), None),
            None => {
                return Err(ResolverError::invalid_argument(
                    "a domain resolver is required when domains are registered",
                ))
            }
        };

        let values = self.values.read();
        let found = values
            .iter()
            .find(|dsv| {
                active
                    .as_ref()
                    .map_or(true, |active| dsv.is_in_change_sets(active))
                    && dsv.pattern_matches(&domain_str)
            })
            .map(|dsv| dsv.value().clone());
        Ok(found.or(default))
    }

    /// Most specific overrides for a possibly partial query, in precedence order
    pub fn find_matching_values(
        &self,
        domains: &[String],
        resolver: &dyn DomainResolver,
    ) -> Result<Vec<DomainSpecificValue<V>>> {
        best_matches(&self.values.read(), domains, resolver)
    }

    /// New key values holding the union of the best matches of every resolver
    pub fn copy(&self, domains: &[String], resolvers: &[&dyn DomainResolver]) -> Result<Self> {
        let copy = Self {
            key: self.key.clone(),
            description: self.description.clone(),
            values: RwLock::new(Vec::new()),
            writes: Mutex::new(()),
            factory: Arc::clone(&self.factory),
        };
        let values = self.values.read();
        for resolver in resolvers {
            for dsv in best_matches(&values, domains, *resolver)? {
                copy.insert(dsv);
            }
        }
        Ok(copy)
    }

    /// Remove the best matches of `resolver` and return them
    pub fn remove_all(
        &self,
        domains: &[String],
        resolver: &dyn DomainResolver,
    ) -> Result<Vec<DomainSpecificValue<V>>> {
        let mut values = self.values.write();
        let matched = best_matches(&values, domains, resolver)?;
        values.retain(|dsv| {
            !matched
                .iter()
                .any(|m| m.cmp_precedence(dsv) == Ordering::Equal)
        });
        Ok(matched)
    }

    /// Remove the override stored exactly under these domain values and change set
    pub fn remove(
        &self,
        change_set: Option<&str>,
        domain_values: &[&str],
    ) -> Option<DomainSpecificValue<V>> {
        let pattern = pattern_of(domain_values);
        let mut values = self.values.write();
        let index = values
            .iter()
            .position(|dsv| dsv.change_set_is(change_set) && dsv.pattern() == pattern)?;
        Some(values.remove(index))
    }

    /// Remove every override tagged with `change_set`
    pub fn remove_change_set(&self, change_set: &str) -> Vec<DomainSpecificValue<V>> {
        let mut values = self.values.write();
        let (removed, kept): (Vec<_>, Vec<_>) = values
            .drain(..)
            .partition(|dsv| dsv.change_set_is(Some(change_set)));
        *values = kept;
        removed
    }
}

/// `v1|v2|...|` from the resolver's values; missing values become empty
fn build_domain_string(domains: &[String], resolver: &dyn DomainResolver) -> Result<String> {
    let mut domain_str = String::with_capacity(domains.len() * 8);
    for domain in domains {
        let value = resolver.domain_value(domain).unwrap_or_default();
        if value.contains(DOMAIN_SEPARATOR) {
            return Err(ResolverError::invalid_argument(format!(
                "value '{}' of domain '{}' must not contain '{}'",
                value, domain, DOMAIN_SEPARATOR
            )));
        }
        domain_str.push_str(&value);
        domain_str.push(DOMAIN_SEPARATOR);
    }
    Ok(domain_str)
}

fn pattern_of(domain_values: &[&str]) -> String {
    let mut pattern = String::with_capacity(domain_values.len() * 8);
    for token in domain_values {
        pattern.push_str(if token.trim().is_empty() { WILDCARD } else { token });
        pattern.push(DOMAIN_SEPARATOR);
    }
    pattern
}

/// Whether `candidate` replaces `existing` for the same pattern
fn preferred_over<V: Payload>(
    candidate: &DomainSpecificValue<V>,
    existing: &DomainSpecificValue<V>,
) -> bool {
    match (existing.change_set(), candidate.change_set()) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(current), Some(new)) => new < current,
    }
}

fn best_matches<V: Payload>(
    values: &[DomainSpecificValue<V>],
    domains: &[String],
    resolver: &dyn DomainResolver,
) -> Result<Vec<DomainSpecificValue<V>>> {
    let active = resolver.active_change_sets();
    let tolerant = Matcher::for_query(domains, true, resolver)?;

    // One candidate per pattern
    let mut by_pattern: HashMap<&str, &DomainSpecificValue<V>> = HashMap::new();
    for candidate in values.iter().filter(|dsv| dsv.matches_query(&tolerant, &active)) {
        by_pattern
            .entry(candidate.pattern())
            .and_modify(|existing| {
                if preferred_over(candidate, existing) {
                    *existing = candidate;
                }
            })
            .or_insert(candidate);
    }
    if by_pattern.is_empty() {
        return Ok(Vec::new());
    }

    // A literal beats a wildcard in the same slot: require literal values,
    // dropping domains from the left until something matches.
    for index in 0..=domains.len() {
        let mut narrowed = MapBackedDomainResolver::new();
        for domain in &domains[index..] {
            if let Some(value) = resolver.domain_value(domain) {
                narrowed.set(domain.as_str(), value);
            }
        }
        let strict = Matcher::for_query(domains, false, &narrowed)?;
        let mut found: Vec<DomainSpecificValue<V>> = by_pattern
            .values()
            .filter(|dsv| dsv.matches_query(&strict, &active))
            .map(|dsv| (*dsv).clone())
            .collect();
        if !found.is_empty() {
            found.sort_by(|a, b| a.cmp_precedence(b));
            return Ok(found);
        }
    }
    Ok(Vec::new())
}

impl<V: Payload> PartialEq for KeyValues<V> {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        self.key == other.key
            && self.description() == other.description()
            && *self.values.read() == *other.values.read()
    }
}

impl<V: Payload> fmt::Debug for KeyValues<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyValues")
            .field("key", &self.key)
            .field("description", &self.description)
            .field("values", &*self.values.read())
            .finish()
    }
}

impl<V: Payload> fmt::Display for KeyValues<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "KeyValues{{")?;
        writeln!(f, "\tdescription=\"{}\"", self.description())?;
        for dsv in self.values.read().iter() {
            writeln!(f, "\t{}", dsv)?;
        }
        f.write_str("}")
    }
}
