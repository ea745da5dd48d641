//! Domain resolver capability

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Supplies the caller's value for each registered domain.
///
/// Implemented by callers; the engine asks for one value per domain name
/// in registration order.
pub trait DomainResolver: Send + Sync {
    /// Current value of `domain`, `None` when the caller has none
    fn domain_value(&self, domain: &str) -> Option<String>;

    /// Change sets whose overrides are visible to this call
    fn active_change_sets(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Resolver backed by a plain map
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapBackedDomainResolver {
    values: BTreeMap<String, String>,
    change_sets: BTreeSet<String>,
}

impl MapBackedDomainResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zip `domains` with positional values. Extra values are ignored and
    /// `None` leaves the domain unresolved.
    pub fn positional<S: AsRef<str>>(domains: &[String], values: &[Option<S>]) -> Self {
        let mut resolver = Self::new();
        for (domain, value) in domains.iter().zip(values) {
            if let Some(value) = value {
                resolver.set(domain.as_str(), value.as_ref());
            }
        }
        resolver
    }

    /// Builder form of [`set`](Self::set)
    pub fn with_domain_value(mut self, domain: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(domain, value);
        self
    }

    /// Builder form of [`add_active_change_sets`](Self::add_active_change_sets)
    pub fn with_change_sets<I, S>(mut self, change_sets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_active_change_sets(change_sets);
        self
    }

    pub fn set(&mut self, domain: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(domain.into(), value.into());
        self
    }

    pub fn add_active_change_sets<I, S>(&mut self, change_sets: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.change_sets.extend(change_sets.into_iter().map(Into::into));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl DomainResolver for MapBackedDomainResolver {
    fn domain_value(&self, domain: &str) -> Option<String> {
        self.values.get(domain).cloned()
    }

    fn active_change_sets(&self) -> Vec<String> {
        self.change_sets.iter().cloned().collect()
    }
}

impl fmt::Display for MapBackedDomainResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MapBackedDomainResolver with {")?;
        for (i, (domain, value)) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", domain, value)?;
        }
        f.write_str("}")
    }
}
