//! Persistence backends
//!
//! Exactly one backend is chosen from configuration when the process starts.
//! Both yield the same logical documents for the same collection.

mod file;
mod sqlite;

use std::path::PathBuf;

use crate::collection::Collection;
use crate::config::{BackendKind, StorageConfig};
use crate::error::Result;

pub use file::FileBackend;
pub use sqlite::SqliteBackend;

pub trait Backend {
    /// Read a collection. `None` means nothing was ever stored for it.
    fn load<C: Collection>(&self) -> Result<Option<C::Value>>;

    /// Replace the stored representation of a collection.
    fn save<C: Collection>(&self, value: &C::Value) -> Result<()>;

    /// Human-readable location, for logs and CLI output.
    fn location(&self) -> String;
}

/// The backend selected by configuration.
#[derive(Debug)]
pub enum StoreBackend {
    File(FileBackend),
    Sqlite(SqliteBackend),
}

impl StoreBackend {
    pub fn open(storage: &StorageConfig, data_dir: PathBuf) -> Result<Self> {
        match storage.backend {
            BackendKind::File => Ok(StoreBackend::File(FileBackend::new(data_dir))),
            BackendKind::Sqlite => {
                let path = storage.database_path(&data_dir);
                Ok(StoreBackend::Sqlite(SqliteBackend::open(path)?))
            }
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            StoreBackend::File(_) => BackendKind::File,
            StoreBackend::Sqlite(_) => BackendKind::Sqlite,
        }
    }
}

impl Backend for StoreBackend {
    fn load<C: Collection>(&self) -> Result<Option<C::Value>> {
        match self {
            StoreBackend::File(backend) => backend.load::<C>(),
            StoreBackend::Sqlite(backend) => backend.load::<C>(),
        }
    }

    fn save<C: Collection>(&self, value: &C::Value) -> Result<()> {
        match self {
            StoreBackend::File(backend) => backend.save::<C>(value),
            StoreBackend::Sqlite(backend) => backend.save::<C>(value),
        }
    }

    fn location(&self) -> String {
        match self {
            StoreBackend::File(backend) => backend.location(),
            StoreBackend::Sqlite(backend) => backend.location(),
        }
    }
}
