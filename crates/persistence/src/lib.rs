//! Persistence backends for the key/value resolver
//!
//! Provides implementations of the core `Persistence` trait:
//! - `InMemoryPersistence`: volatile record table, used in tests
//! - `FilePersistence`: YAML or JSON snapshot file, rewritten atomically
//!
//! Both keep the same serialisable records (`KeyValuesRecord`).

pub mod file;
pub mod memory;
pub mod record;

pub use file::FilePersistence;
pub use memory::InMemoryPersistence;
pub use record::{KeyValuesRecord, RecordTable, ValueRecord};

use std::sync::Arc;

use kv_resolver_config::{PersistenceBackend, PersistenceConfig};
use kv_resolver_core::{PersistenceError, SharedPersistence, Value};

/// Build the backend selected in the settings; `None` for in-memory only
pub fn persistence_from_settings(
    config: &PersistenceConfig,
) -> Result<Option<SharedPersistence<Value>>, PersistenceError> {
    match config.backend {
        PersistenceBackend::None => Ok(None),
        PersistenceBackend::Memory => Ok(Some(Arc::new(InMemoryPersistence::new()))),
        PersistenceBackend::File => {
            let path = config.path.as_ref().ok_or_else(|| {
                PersistenceError::Backend("persistence.path is required for the file backend".into())
            })?;
            let persistence = FilePersistence::open(path, config.effective_format())?;
            Ok(Some(Arc::new(persistence)))
        }
    }
}
