//! Serialisable records shared by the backends

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use kv_resolver_core::{
    DomainSpecificValue, KeyValues, Payload, PersistenceError, SharedFactory,
};

/// One stored override
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueRecord<V> {
    /// Pattern such as `DE|*|`, empty for the default value
    #[serde(default)]
    pub pattern: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_set: Option<String>,

    pub value: V,
}

impl<V: Payload> ValueRecord<V> {
    pub fn from_value(dsv: &DomainSpecificValue<V>) -> Self {
        Self {
            pattern: dsv.pattern().to_string(),
            change_set: dsv.change_set().map(str::to_string),
            value: dsv.value().clone(),
        }
    }

    fn is_same_slot(&self, dsv: &DomainSpecificValue<V>) -> bool {
        self.pattern == dsv.pattern() && self.change_set.as_deref() == dsv.change_set()
    }
}

/// All stored overrides of one key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValuesRecord<V> {
    pub key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default = "Vec::new")]
    pub values: Vec<ValueRecord<V>>,
}

impl<V: Payload> KeyValuesRecord<V> {
    pub fn from_key_values(key_values: &KeyValues<V>) -> Self {
        let description = Some(key_values.description())
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        Self {
            key: key_values.key().to_string(),
            description,
            values: key_values
                .domain_specific_values()
                .iter()
                .map(ValueRecord::from_value)
                .collect(),
        }
    }

    /// Rebuild the key values through `factory`
    pub fn to_key_values(&self, factory: &SharedFactory<V>) -> Result<KeyValues<V>, PersistenceError> {
        let key_values = KeyValues::new(self.key.as_str(), self.description.as_deref())
            .with_factory(Arc::clone(factory));
        for record in &self.values {
            let dsv = factory
                .create_from_pattern(record.value.clone(), record.change_set.as_deref(), &record.pattern)
                .map_err(|e| {
                    PersistenceError::Serialization(format!("key '{}': {}", self.key, e))
                })?;
            key_values.insert(dsv);
        }
        Ok(key_values)
    }
}

/// Key-ordered table of records
#[derive(Debug, Clone, Default)]
pub struct RecordTable<V> {
    records: BTreeMap<String, KeyValuesRecord<V>>,
}

impl<V: Payload> RecordTable<V> {
    pub fn new() -> Self {
        Self {
            records: BTreeMap::new(),
        }
    }

    pub fn from_records(records: impl IntoIterator<Item = KeyValuesRecord<V>>) -> Self {
        Self {
            records: records.into_iter().map(|r| (r.key.clone(), r)).collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&KeyValuesRecord<V>> {
        self.records.get(key)
    }

    pub fn records(&self) -> impl Iterator<Item = &KeyValuesRecord<V>> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn insert(&mut self, record: KeyValuesRecord<V>) {
        self.records.insert(record.key.clone(), record);
    }

    /// Replace the key's record with the current state of `key_values`
    pub fn store(&mut self, key: &str, key_values: &KeyValues<V>) {
        let mut record = KeyValuesRecord::from_key_values(key_values);
        record.key = key.to_string();
        self.records.insert(key.to_string(), record);
    }

    /// Returns whether the key was present
    pub fn remove_key(&mut self, key: &str) -> bool {
        self.records.remove(key).is_some()
    }

    /// Returns whether a record was removed
    pub fn remove_value(&mut self, key: &str, dsv: &DomainSpecificValue<V>) -> bool {
        let Some(record) = self.records.get_mut(key) else {
            return false;
        };
        let before = record.values.len();
        record.values.retain(|r| !r.is_same_slot(dsv));
        before != record.values.len()
    }

    pub fn load(
        &self,
        key: &str,
        factory: &SharedFactory<V>,
    ) -> Result<Option<KeyValues<V>>, PersistenceError> {
        self.records
            .get(key)
            .map(|record| record.to_key_values(factory))
            .transpose()
    }

    pub fn load_all(&self, factory: &SharedFactory<V>) -> Result<Vec<KeyValues<V>>, PersistenceError> {
        self.records
            .values()
            .map(|record| record.to_key_values(factory))
            .collect()
    }
}
