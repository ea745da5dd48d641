//! Persistence collaborator

use std::sync::Arc;

use crate::domain_value::DomainSpecificValue;
use crate::error::PersistenceError;
use crate::key_values::KeyValues;
use crate::traits::SharedFactory;
use crate::Payload;

/// Durable storage behind a [`ValuesStore`](crate::ValuesStore).
///
/// All calls are synchronous and may block. `load` has to be free of side
/// effects: two threads missing the same key may both call it and one
/// result is thrown away.
pub trait Persistence<V: Payload>: Send + Sync {
    /// Stored overrides for `key`, `None` when nothing is stored
    fn load(&self, key: &str, factory: &SharedFactory<V>) -> Result<Option<KeyValues<V>>, PersistenceError>;

    /// Everything stored, used for preloading
    fn load_all(&self, factory: &SharedFactory<V>) -> Result<Vec<KeyValues<V>>, PersistenceError>;

    /// Authoritative collection given the currently known values.
    ///
    /// May hand back the instances from `current` or build new ones.
    fn reload(
        &self,
        current: Vec<Arc<KeyValues<V>>>,
        factory: &SharedFactory<V>,
    ) -> Result<Vec<Arc<KeyValues<V>>>, PersistenceError>;

    /// Called after every successful put with the full key values and the
    /// override that changed
    fn store(
        &self,
        key: &str,
        key_values: &KeyValues<V>,
        changed: &DomainSpecificValue<V>,
    ) -> Result<(), PersistenceError>;

    /// Purge a whole key
    fn remove_key(&self, key: &str) -> Result<(), PersistenceError>;

    /// Purge one override of `key`
    fn remove_value(&self, key: &str, value: &DomainSpecificValue<V>) -> Result<(), PersistenceError>;
}

pub type SharedPersistence<V> = Arc<dyn Persistence<V>>;
