//! Factories for domain-specific values

use dashmap::DashMap;
use std::sync::Arc;

use crate::domain_value::DomainSpecificValue;
use crate::error::Result;
use crate::Payload;

/// Builds overrides for keys.
///
/// Every `KeyValues` and persistence loader goes through a factory, so an
/// implementation can share allocations between keys.
pub trait DomainSpecificValueFactory<V: Payload>: Send + Sync {
    fn create(
        &self,
        value: V,
        change_set: Option<&str>,
        domain_values: &[&str],
    ) -> Result<DomainSpecificValue<V>>;

    fn create_from_pattern(
        &self,
        value: V,
        change_set: Option<&str>,
        pattern: &str,
    ) -> Result<DomainSpecificValue<V>>;
}

pub type SharedFactory<V> = Arc<dyn DomainSpecificValueFactory<V>>;

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDomainSpecificValueFactory;

impl<V: Payload> DomainSpecificValueFactory<V> for DefaultDomainSpecificValueFactory {
    fn create(
        &self,
        value: V,
        change_set: Option<&str>,
        domain_values: &[&str],
    ) -> Result<DomainSpecificValue<V>> {
        DomainSpecificValue::create(value, change_set, domain_values)
    }

    fn create_from_pattern(
        &self,
        value: V,
        change_set: Option<&str>,
        pattern: &str,
    ) -> Result<DomainSpecificValue<V>> {
        DomainSpecificValue::from_pattern(value, change_set, pattern)
    }
}

/// Factory sharing one allocation per distinct pattern and change set name
#[derive(Debug, Default)]
pub struct InterningDomainSpecificValueFactory {
    strings: DashMap<Arc<str>, ()>,
}

impl InterningDomainSpecificValueFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&self, s: &str) -> Arc<str> {
        if let Some(entry) = self.strings.get(s) {
            return entry.key().clone();
        }
        self.strings.entry(Arc::from(s)).or_insert(()).key().clone()
    }

    /// Number of distinct interned strings
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl<V: Payload> DomainSpecificValueFactory<V> for InterningDomainSpecificValueFactory {
    fn create(
        &self,
        value: V,
        change_set: Option<&str>,
        domain_values: &[&str],
    ) -> Result<DomainSpecificValue<V>> {
        DomainSpecificValue::create(value, change_set, domain_values)
            .map(|dsv| dsv.into_interned(|s| self.intern(s)))
    }

    fn create_from_pattern(
        &self,
        value: V,
        change_set: Option<&str>,
        pattern: &str,
    ) -> Result<DomainSpecificValue<V>> {
        DomainSpecificValue::from_pattern(value, change_set, pattern)
            .map(|dsv| dsv.into_interned(|s| self.intern(s)))
    }
}
