//! Positional domain values for writes

use std::collections::HashMap;

/// Maps the registered domain names to the values an override is stored under.
pub trait DomainValues {
    /// One entry per domain in `domains` order. Unmapped domains at the end
    /// are dropped; gaps in between stay `None` and are stored as wildcards.
    fn domain_values(&self, domains: &[String]) -> Vec<Option<String>>;
}

#[derive(Debug, Clone, Default)]
pub struct MapBackedDomainValues {
    values: HashMap<String, Option<String>>,
}

impl MapBackedDomainValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `domain` to `value`; `None` leaves the slot open
    pub fn set(mut self, domain: impl Into<String>, value: Option<&str>) -> Self {
        self.values.insert(domain.into(), value.map(str::to_string));
        self
    }
}

impl DomainValues for MapBackedDomainValues {
    fn domain_values(&self, domains: &[String]) -> Vec<Option<String>> {
        let mut result: Vec<Option<String>> = domains
            .iter()
            .map(|domain| self.values.get(domain).cloned().flatten())
            .collect();
        while matches!(result.last(), Some(None)) {
            result.pop();
        }
        result
    }
}
