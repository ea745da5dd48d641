//! Volatile persistence backend
//!
//! Keeps the same records as the file backend in memory. Useful for tests
//! and for processes that want persistence semantics without a disk.

use parking_lot::RwLock;
use std::sync::Arc;

use kv_resolver_core::{
    DomainSpecificValue, KeyValues, Payload, Persistence, PersistenceError, SharedFactory,
};

use crate::record::{KeyValuesRecord, RecordTable};

pub struct InMemoryPersistence<V> {
    table: RwLock<RecordTable<V>>,
}

impl<V: Payload> InMemoryPersistence<V> {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(RecordTable::new()),
        }
    }

    /// Seed with existing records
    pub fn with_records(records: impl IntoIterator<Item = KeyValuesRecord<V>>) -> Self {
        Self {
            table: RwLock::new(RecordTable::from_records(records)),
        }
    }

    /// Put a record in place as if another process had written it
    pub fn insert_record(&self, record: KeyValuesRecord<V>) {
        self.table.write().insert(record);
    }

    pub fn record(&self, key: &str) -> Option<KeyValuesRecord<V>> {
        self.table.read().get(key).cloned()
    }

    pub fn records(&self) -> Vec<KeyValuesRecord<V>> {
        self.table.read().records().cloned().collect()
    }
}

impl<V: Payload> Default for InMemoryPersistence<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Payload> Persistence<V> for InMemoryPersistence<V> {
    fn load(&self, key: &str, factory: &SharedFactory<V>) -> Result<Option<KeyValues<V>>, PersistenceError> {
        self.table.read().load(key, factory)
    }

    fn load_all(&self, factory: &SharedFactory<V>) -> Result<Vec<KeyValues<V>>, PersistenceError> {
        self.table.read().load_all(factory)
    }

    fn reload(
        &self,
        _current: Vec<Arc<KeyValues<V>>>,
        factory: &SharedFactory<V>,
    ) -> Result<Vec<Arc<KeyValues<V>>>, PersistenceError> {
        Ok(self.load_all(factory)?.into_iter().map(Arc::new).collect())
    }

    fn store(
        &self,
        key: &str,
        key_values: &KeyValues<V>,
        _changed: &DomainSpecificValue<V>,
    ) -> Result<(), PersistenceError> {
        self.table.write().store(key, key_values);
        Ok(())
    }

    fn remove_key(&self, key: &str) -> Result<(), PersistenceError> {
        self.table.write().remove_key(key);
        Ok(())
    }

    fn remove_value(&self, key: &str, value: &DomainSpecificValue<V>) -> Result<(), PersistenceError> {
        self.table.write().remove_value(key, value);
        Ok(())
    }
}
