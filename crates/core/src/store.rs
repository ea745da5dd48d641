//! Concurrent key -> `KeyValues` map with persistence load-through
//!
//! Locking:
//! - one `RwLock` guards the map structure only
//! - each `KeyValues` guards its overrides with its own lock
//! - writes to a key hold that key's write mutex for get-or-create, mutate
//!   and persist, then check the instance is still the one in the map
//!
//! Lock order is key mutex before map lock. Persistence I/O runs without
//! the map lock except in `reload` and `remove_change_set`, which
//! serialize with everything else on purpose.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use crate::domain_value::DomainSpecificValue;
use crate::error::Result;
use crate::key_values::KeyValues;
use crate::stats;
use crate::traits::{DomainResolver, MapBackedDomainResolver, SharedFactory, SharedPersistence};
use crate::value::Value;
use crate::Payload;

pub struct ValuesStore<V: Payload = Value> {
    map: RwLock<HashMap<String, Arc<KeyValues<V>>>>,
    factory: SharedFactory<V>,
    persistence: Option<SharedPersistence<V>>,
}

impl<V: Payload> ValuesStore<V> {
    pub fn new(factory: SharedFactory<V>) -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
            factory,
            persistence: None,
        }
    }

    pub fn with_persistence(mut self, persistence: SharedPersistence<V>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn factory(&self) -> &SharedFactory<V> {
        &self.factory
    }

    pub fn persistence(&self) -> Option<&SharedPersistence<V>> {
        self.persistence.as_ref()
    }

    /// Snapshot of the key values currently in memory
    pub fn get_all_values(&self) -> Vec<Arc<KeyValues<V>>> {
        self.map.read().values().cloned().collect()
    }

    /// Filtered copy of every key; keys without a match are left out
    pub fn get_all_values_filtered(
        &self,
        domains: &[String],
        resolvers: &[&dyn DomainResolver],
    ) -> Result<Vec<KeyValues<V>>> {
        let mut filtered = Vec::new();
        for key_values in self.get_all_values() {
            let copy = key_values.copy(domains, resolvers)?;
            if !copy.is_empty() {
                filtered.push(copy);
            }
        }
        Ok(filtered)
    }

    /// Replace the whole map
    pub fn set_all_values<I>(&self, values: I)
    where
        I: IntoIterator<Item = Arc<KeyValues<V>>>,
    {
        let mut map = self.map.write();
        map.clear();
        for key_values in values {
            map.insert(key_values.key().to_string(), key_values);
        }
    }

    /// In-memory lookup only
    pub fn get_values_for(&self, key: &str) -> Option<Arc<KeyValues<V>>> {
        self.map.read().get(key).cloned()
    }

    /// Key values from memory, or loaded from persistence on a miss.
    ///
    /// The load runs without any lock. If another thread inserted the key in
    /// the meantime its instance wins and the loaded one is dropped.
    pub fn get_key_values_from_map_or_persistence(
        &self,
        key: &str,
    ) -> Result<Option<Arc<KeyValues<V>>>> {
        if let Some(key_values) = self.get_values_for(key) {
            stats::record_lookup(true);
            return Ok(Some(key_values));
        }
        stats::record_lookup(false);

        let Some(loaded) = self.load(key)? else {
            return Ok(None);
        };
        let mut map = self.map.write();
        let winner = map
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(loaded));
        Ok(Some(Arc::clone(winner)))
    }

    /// Existing key values, or a new empty entry tagged with `description`
    pub fn get_or_create_key_values(
        &self,
        key: &str,
        description: Option<&str>,
    ) -> Result<Arc<KeyValues<V>>> {
        if let Some(key_values) = self.get_key_values_from_map_or_persistence(key)? {
            return Ok(key_values);
        }
        let mut map = self.map.write();
        let key_values = map.entry(key.to_string()).or_insert_with(|| {
            tracing::debug!(key = %key, "Creating key values");
            Arc::new(KeyValues::new(key, description).with_factory(Arc::clone(&self.factory)))
        });
        Ok(Arc::clone(key_values))
    }

    /// Add or replace an override and hand it to persistence
    pub fn set_with_change_set(
        &self,
        key: &str,
        description: Option<&str>,
        change_set: Option<&str>,
        value: V,
        domain_values: &[&str],
    ) -> Result<DomainSpecificValue<V>> {
        loop {
            let key_values = self.get_or_create_key_values(key, description)?;
            let _writes = key_values.lock_writes();
            if !self.is_current(key, &key_values) {
                continue;
            }
            let dsv = key_values.put_with_change_set(change_set, value, domain_values)?;
            if let Some(persistence) = &self.persistence {
                persistence.store(key, &key_values, &dsv)?;
            }
            stats::record_store();
            tracing::debug!(
                key = %key,
                pattern = %dsv.pattern(),
                change_set = ?change_set,
                "Stored value"
            );
            return Ok(dsv);
        }
    }

    /// Remove the override stored exactly under `domain_values`.
    ///
    /// Drops the key when it becomes empty.
    pub fn remove_with_change_set(
        &self,
        key: &str,
        change_set: Option<&str>,
        domain_values: &[&str],
    ) -> Result<Option<DomainSpecificValue<V>>> {
        loop {
            let Some(key_values) = self.get_key_values_from_map_or_persistence(key)? else {
                return Ok(None);
            };
            let _writes = key_values.lock_writes();
            if !self.is_current(key, &key_values) {
                continue;
            }
            let Some(removed) = key_values.remove(change_set, domain_values) else {
                return Ok(None);
            };
            self.after_removal(key, &key_values, std::slice::from_ref(&removed))?;
            return Ok(Some(removed));
        }
    }

    /// Remove the best matches for the positional `domain_values`.
    ///
    /// `None` leaves a domain open. Drops the key when it becomes empty.
    pub fn remove_all_matching(
        &self,
        key: &str,
        domains: &[String],
        domain_values: &[Option<&str>],
    ) -> Result<Vec<DomainSpecificValue<V>>> {
        let resolver = MapBackedDomainResolver::positional(domains, domain_values);
        loop {
            let Some(key_values) = self.get_key_values_from_map_or_persistence(key)? else {
                return Ok(Vec::new());
            };
            let _writes = key_values.lock_writes();
            if !self.is_current(key, &key_values) {
                continue;
            }
            let removed = key_values.remove_all(domains, &resolver)?;
            if !removed.is_empty() {
                self.after_removal(key, &key_values, &removed)?;
            }
            return Ok(removed);
        }
    }

    /// Drop `key` from memory and persistence.
    ///
    /// Waits for in-flight writes on the key before dropping it.
    pub fn remove(&self, key: &str) -> Result<Option<Arc<KeyValues<V>>>> {
        loop {
            let current = self.map.read().get(key).cloned();
            let writes = current.as_ref().map(|key_values| key_values.lock_writes());
            if let Some(key_values) = &current {
                if !self.is_current(key, key_values) {
                    continue;
                }
                self.map.write().remove(key);
            }
            if let Some(persistence) = &self.persistence {
                persistence.remove_key(key)?;
            }
            drop(writes);
            stats::record_removal("key", 1);
            tracing::debug!(key = %key, found = current.is_some(), "Removed key");
            return Ok(current);
        }
    }

    /// Replace the map with what persistence considers authoritative
    pub fn reload(&self) -> Result<()> {
        let Some(persistence) = &self.persistence else {
            return Ok(());
        };
        let mut map = self.map.write();
        let current: Vec<_> = map.values().cloned().collect();
        let reloaded = persistence.reload(current, &self.factory)?;
        map.clear();
        for key_values in reloaded {
            map.insert(key_values.key().to_string(), key_values);
        }
        stats::record_reload("all");
        tracing::info!(keys = map.len(), "Reloaded values store");
        Ok(())
    }

    /// Reload one key; it disappears when persistence no longer has it
    pub fn reload_key(&self, key: &str) -> Result<()> {
        if self.persistence.is_none() {
            return Ok(());
        }
        let loaded = self.load(key)?;
        let mut map = self.map.write();
        match loaded {
            Some(key_values) => {
                map.insert(key.to_string(), Arc::new(key_values));
            }
            None => {
                map.remove(key);
            }
        }
        stats::record_reload("key");
        tracing::debug!(key = %key, present = map.contains_key(key), "Reloaded key");
        Ok(())
    }

    /// Remove every override of `change_set` from all keys.
    ///
    /// Keys left empty stay in the map; persistence is told to drop them.
    pub fn remove_change_set(&self, change_set: &str) -> Result<()> {
        let map = self.map.write();
        let mut total = 0;
        for key_values in map.values() {
            let removed = key_values.remove_change_set(change_set);
            if removed.is_empty() {
                continue;
            }
            total += removed.len();
            if let Some(persistence) = &self.persistence {
                if key_values.is_empty() {
                    persistence.remove_key(key_values.key())?;
                } else {
                    for dsv in &removed {
                        persistence.remove_value(key_values.key(), dsv)?;
                    }
                }
            }
        }
        stats::record_removal("change_set", total);
        tracing::info!(change_set = %change_set, removed = total, "Removed change set");
        Ok(())
    }

    /// Every key as `\nKeyValues for "<key>": <key values>`, sorted by key
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (key, key_values) in self.sorted_entries() {
            out.push_str(&format!("\nKeyValues for \"{}\": {}", key, key_values));
        }
        out
    }

    pub fn dump_to<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        for (key, key_values) in self.sorted_entries() {
            write!(out, "\nKeyValues for \"{}\": {}", key, key_values)?;
        }
        Ok(())
    }

    fn sorted_entries(&self) -> Vec<(String, Arc<KeyValues<V>>)> {
        let mut entries: Vec<_> = self
            .map
            .read()
            .iter()
            .map(|(key, key_values)| (key.clone(), Arc::clone(key_values)))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    fn load(&self, key: &str) -> Result<Option<KeyValues<V>>> {
        let Some(persistence) = &self.persistence else {
            return Ok(None);
        };
        let loaded = persistence.load(key, &self.factory)?;
        stats::record_load(loaded.is_some());
        tracing::debug!(key = %key, found = loaded.is_some(), "Loaded key from persistence");
        Ok(loaded)
    }

    fn is_current(&self, key: &str, key_values: &Arc<KeyValues<V>>) -> bool {
        self.map
            .read()
            .get(key)
            .map_or(false, |current| Arc::ptr_eq(current, key_values))
    }

    /// Persistence notification and map cleanup after overrides were removed
    fn after_removal(
        &self,
        key: &str,
        key_values: &Arc<KeyValues<V>>,
        removed: &[DomainSpecificValue<V>],
    ) -> Result<()> {
        stats::record_removal("value", removed.len());
        if key_values.is_empty() {
            {
                let mut map = self.map.write();
                if map.get(key).map_or(false, |current| Arc::ptr_eq(current, key_values)) {
                    map.remove(key);
                }
            }
            if let Some(persistence) = &self.persistence {
                persistence.remove_key(key)?;
            }
            tracing::debug!(key = %key, "Removed emptied key");
        } else if let Some(persistence) = &self.persistence {
            for dsv in removed {
                persistence.remove_value(key, dsv)?;
            }
        }
        Ok(())
    }
}
