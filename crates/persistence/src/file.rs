//! Snapshot file persistence
//!
//! The whole record table is kept in memory and rewritten on every change.
//! Writes go to a temp file in the same directory which is then renamed
//! over the snapshot, so readers never see a partial file.

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

use kv_resolver_config::SnapshotFormat;
use kv_resolver_core::{
    DomainSpecificValue, KeyValues, Payload, Persistence, PersistenceError, SharedFactory,
};

use crate::record::{KeyValuesRecord, RecordTable};

/// On-disk layout
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot<V> {
    #[serde(default = "Vec::new")]
    keys: Vec<KeyValuesRecord<V>>,
}

pub struct FilePersistence<V> {
    path: PathBuf,
    format: SnapshotFormat,
    table: RwLock<RecordTable<V>>,
}

impl<V> FilePersistence<V>
where
    V: Payload + Serialize + DeserializeOwned,
{
    /// Open the snapshot at `path`; a missing file starts empty
    pub fn open(path: impl AsRef<Path>, format: SnapshotFormat) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();
        let table = read_snapshot(&path, format)?;
        tracing::info!(path = %path.display(), keys = table.len(), "Opened snapshot file");
        Ok(Self {
            path,
            format,
            table: RwLock::new(table),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> SnapshotFormat {
        self.format
    }

    /// Apply `change` to the table and write the snapshot while still holding the lock
    fn update<F>(&self, change: F) -> Result<(), PersistenceError>
    where
        F: FnOnce(&mut RecordTable<V>) -> bool,
    {
        let mut table = self.table.write();
        if change(&mut table) {
            write_snapshot(&self.path, self.format, &table)?;
        }
        Ok(())
    }
}

impl<V> Persistence<V> for FilePersistence<V>
where
    V: Payload + Serialize + DeserializeOwned,
{
    fn load(&self, key: &str, factory: &SharedFactory<V>) -> Result<Option<KeyValues<V>>, PersistenceError> {
        self.table.read().load(key, factory)
    }

    fn load_all(&self, factory: &SharedFactory<V>) -> Result<Vec<KeyValues<V>>, PersistenceError> {
        self.table.read().load_all(factory)
    }

    /// Re-read the file; changes made by other processes become visible
    fn reload(
        &self,
        _current: Vec<Arc<KeyValues<V>>>,
        factory: &SharedFactory<V>,
    ) -> Result<Vec<Arc<KeyValues<V>>>, PersistenceError> {
        let table = read_snapshot(&self.path, self.format)?;
        let reloaded = table.load_all(factory)?;
        *self.table.write() = table;
        Ok(reloaded.into_iter().map(Arc::new).collect())
    }

    fn store(
        &self,
        key: &str,
        key_values: &KeyValues<V>,
        _changed: &DomainSpecificValue<V>,
    ) -> Result<(), PersistenceError> {
        self.update(|table| {
            table.store(key, key_values);
            true
        })
    }

    fn remove_key(&self, key: &str) -> Result<(), PersistenceError> {
        self.update(|table| table.remove_key(key))
    }

    fn remove_value(&self, key: &str, value: &DomainSpecificValue<V>) -> Result<(), PersistenceError> {
        self.update(|table| table.remove_value(key, value))
    }
}

fn read_snapshot<V>(path: &Path, format: SnapshotFormat) -> Result<RecordTable<V>, PersistenceError>
where
    V: Payload + DeserializeOwned,
{
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(RecordTable::new()),
        Err(e) => return Err(e.into()),
    };
    if content.trim().is_empty() {
        return Ok(RecordTable::new());
    }
    let snapshot: Snapshot<V> = match format {
        SnapshotFormat::Yaml => serde_yaml::from_str(&content)
            .map_err(|e| PersistenceError::Serialization(e.to_string()))?,
        SnapshotFormat::Json => serde_json::from_str(&content)
            .map_err(|e| PersistenceError::Serialization(e.to_string()))?,
    };
    Ok(RecordTable::from_records(snapshot.keys))
}

fn write_snapshot<V>(
    path: &Path,
    format: SnapshotFormat,
    table: &RecordTable<V>,
) -> Result<(), PersistenceError>
where
    V: Payload + Serialize,
{
    let snapshot = Snapshot {
        keys: table.records().cloned().collect(),
    };
    let content = match format {
        SnapshotFormat::Yaml => serde_yaml::to_string(&snapshot)
            .map_err(|e| PersistenceError::Serialization(e.to_string()))?,
        SnapshotFormat::Json => serde_json::to_string_pretty(&snapshot)
            .map_err(|e| PersistenceError::Serialization(e.to_string()))?,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(content.as_bytes())?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| PersistenceError::Io(e.error))?;

    tracing::debug!(path = %path.display(), keys = table.len(), "Wrote snapshot file");
    Ok(())
}
