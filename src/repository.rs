//! Whole-collection load and save on top of a backend
//!
//! There is no cache: every `load` reads the medium again. `update` is a plain
//! load, mutate, save sequence; two processes updating the same collection at
//! once can lose one of the writes unless `[concurrency] lock` is on, in which
//! case the cycle runs under an exclusive lock in the data directory.

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::backend::{Backend, StoreBackend};
use crate::collection::{
    ChecklistTemplates, Clients, Collection, EquipmentBank, Events, Forms, LoadContext, Messages,
    Quotes, Suppliers, TimeTracking,
};
use crate::config::Config;
use crate::error::Result;
use crate::ledger::DEFAULT_STALE_AFTER_HOURS;
use crate::lock::{StoreLock, LOCK_FILE_NAME};
use crate::model::Task;

#[derive(Debug, Clone)]
struct LockSettings {
    path: PathBuf,
    timeout_ms: u64,
}

pub struct Repository<B: Backend = StoreBackend> {
    backend: B,
    stale_after: Duration,
    lock: Option<LockSettings>,
}

/// Per-collection outcome of copying one store into another.
#[derive(Debug, Clone, Serialize)]
pub struct CopiedCollection {
    pub collection: &'static str,
    pub elements: usize,
    pub skipped: bool,
}

impl Repository<StoreBackend> {
    /// Open the backend named by `config`.
    pub fn open(config: &Config) -> Result<Self> {
        let data_dir = config.data_dir().to_path_buf();
        let backend = StoreBackend::open(&config.storage, data_dir.clone())?;
        let mut repo = Repository::new(backend)
            .with_stale_after(config.time_tracking.stale_after()?);
        if config.concurrency.lock {
            repo = repo.with_lock(
                data_dir.join(LOCK_FILE_NAME),
                config.concurrency.lock_timeout_ms,
            );
        }
        info!(
            backend = %repo.backend.kind(),
            location = %repo.backend.location(),
            "store opened"
        );
        Ok(repo)
    }
}

impl<B: Backend> Repository<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            stale_after: Duration::hours(DEFAULT_STALE_AFTER_HOURS),
            lock: None,
        }
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Run every `update` under an exclusive lock on `path`.
    pub fn with_lock(mut self, path: impl Into<PathBuf>, timeout_ms: u64) -> Self {
        self.lock = Some(LockSettings {
            path: path.into(),
            timeout_ms,
        });
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn load<C: Collection>(&self) -> Result<C::Value> {
        self.load_at::<C>(Utc::now())
    }

    /// Load a collection, never returning "nothing".
    ///
    /// A collection that was never stored becomes its seed (persisted right
    /// away) or an empty value. The collection's repair pass then runs, and if
    /// it changed anything the result is written back before returning.
    pub fn load_at<C: Collection>(&self, now: DateTime<Utc>) -> Result<C::Value> {
        let (mut value, mut dirty) = match self.backend.load::<C>()? {
            Some(value) => (value, false),
            None => match C::seed() {
                Some(seed) => {
                    info!(collection = C::NAME, "seeding defaults");
                    (seed, true)
                }
                None => (C::Value::default(), false),
            },
        };

        let ctx = LoadContext {
            now,
            stale_after: self.stale_after,
        };
        if C::repair(&mut value, &ctx) {
            debug!(collection = C::NAME, "repaired on load");
            dirty = true;
        }

        if dirty {
            self.backend.save::<C>(&value)?;
        }
        Ok(value)
    }

    pub fn save<C: Collection>(&self, value: &C::Value) -> Result<()> {
        self.backend.save::<C>(value)
    }

    /// Load, apply `f`, save. Nothing is saved when `f` fails.
    pub fn update<C, T, F>(&self, f: F) -> Result<T>
    where
        C: Collection,
        F: FnOnce(&mut C::Value) -> Result<T>,
    {
        let _guard = self.acquire_lock()?;
        let mut value = self.load::<C>()?;
        let out = f(&mut value)?;
        self.backend.save::<C>(&value)?;
        Ok(out)
    }

    fn acquire_lock(&self) -> Result<Option<StoreLock>> {
        self.lock
            .as_ref()
            .map(|lock| StoreLock::acquire(&lock.path, lock.timeout_ms))
            .transpose()
    }

    /// Soft-remove a task and cancel any time-tracking session running on it.
    /// Returns the removed task and the number of sessions cancelled.
    pub fn remove_task(
        &self,
        client_id: &str,
        project_id: &str,
        task_id: &str,
    ) -> Result<(Task, usize)> {
        let task = self.update::<Clients, _, _>(|clients| {
            crate::clients::ClientBook::new(clients).remove_task(client_id, project_id, task_id)
        })?;
        let cancelled = self.update::<TimeTracking, _, _>(|ledger| {
            Ok(ledger.cancel_for_task(client_id, project_id, task_id))
        })?;
        Ok((task, cancelled))
    }

    /// Copy every collection stored in `source` into this repository.
    /// Collections the source never stored are skipped.
    pub fn copy_from<S: Backend>(&self, source: &S) -> Result<Vec<CopiedCollection>> {
        Ok(vec![
            self.copy_collection::<Clients, S>(source)?,
            self.copy_collection::<Suppliers, S>(source)?,
            self.copy_collection::<Quotes, S>(source)?,
            self.copy_collection::<Messages, S>(source)?,
            self.copy_collection::<Events, S>(source)?,
            self.copy_collection::<Forms, S>(source)?,
            self.copy_collection::<EquipmentBank, S>(source)?,
            self.copy_collection::<ChecklistTemplates, S>(source)?,
            self.copy_collection::<TimeTracking, S>(source)?,
        ])
    }

    fn copy_collection<C: Collection, S: Backend>(&self, source: &S) -> Result<CopiedCollection> {
        let Some(value) = source.load::<C>()? else {
            return Ok(CopiedCollection {
                collection: C::NAME,
                elements: 0,
                skipped: true,
            });
        };

        self.backend.save::<C>(&value)?;
        let elements: usize = C::to_rows(&value)?.iter().map(Vec::len).sum();
        info!(collection = C::NAME, elements, "copied collection");
        Ok(CopiedCollection {
            collection: C::NAME,
            elements,
            skipped: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FileBackend, SqliteBackend};
    use crate::clients::ClientBook;
    use crate::error::Error;
    use crate::ledger::SessionTarget;
    use crate::model::{Client, Project};
    use tempfile::TempDir;

    #[test]
    fn seeds_are_persisted_on_first_load() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::new(FileBackend::new(dir.path()));

        let equipment = repo.load::<EquipmentBank>().unwrap();
        assert_eq!(equipment.len(), 12);
        assert!(dir.path().join("equipment_bank.json").exists());
    }

    #[test]
    fn empty_collections_are_not_written_on_load() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::new(FileBackend::new(dir.path()));
        assert!(repo.load::<Suppliers>().unwrap().is_empty());
        assert!(!dir.path().join("suppliers_db.json").exists());
    }

    #[test]
    fn failed_update_saves_nothing() {
        let repo = Repository::new(SqliteBackend::in_memory().unwrap());
        let result = repo.update::<Clients, (), _>(|clients| {
            clients.push(Client::new("half done"));
            Err(Error::InvalidArgument("nope".into()))
        });
        assert!(result.is_err());
        assert!(repo.load::<Clients>().unwrap().is_empty());
    }

    #[test]
    fn stale_sessions_dropped_and_persisted_on_load() {
        let repo = Repository::new(SqliteBackend::in_memory().unwrap());
        repo.update::<TimeTracking, _, _>(|ledger| {
            ledger.start("u1", SessionTarget::default()).map(|_| ())
        })
        .unwrap();

        let later = Utc::now() + Duration::hours(3);
        let ledger = repo.load_at::<TimeTracking>(later).unwrap();
        assert!(ledger.active_sessions.is_empty());

        // The drop was written back, so a plain load agrees.
        assert!(repo.load::<TimeTracking>().unwrap().active_sessions.is_empty());
    }

    #[test]
    fn remove_task_cancels_sessions_on_it() {
        let repo = Repository::new(SqliteBackend::in_memory().unwrap());
        let (client_id, project_id, task_id) = repo
            .update::<Clients, _, _>(|clients| {
                let mut book = ClientBook::new(clients);
                let client_id = book.add_client(Client::new("Acme")).id.clone();
                let project_id = book.add_project(&client_id, Project::new("p"))?.id.clone();
                let task_id = book
                    .add_task(&client_id, &project_id, Task::new("t"))?
                    .id
                    .clone();
                Ok((client_id, project_id, task_id))
            })
            .unwrap();

        repo.update::<TimeTracking, _, _>(|ledger| {
            let target = SessionTarget {
                client_id: Some(client_id.clone()),
                project_id: Some(project_id.clone()),
                task_id: Some(task_id.clone()),
            };
            ledger.start("u1", target).map(|_| ())
        })
        .unwrap();

        let (task, cancelled) = repo.remove_task(&client_id, &project_id, &task_id).unwrap();
        assert_eq!(task.id, task_id);
        assert_eq!(cancelled, 1);
        assert!(repo.load::<TimeTracking>().unwrap().active("u1").is_none());
    }

    #[test]
    fn locked_updates_use_lock_file() {
        let dir = TempDir::new().unwrap();
        let lock_path = dir.path().join(LOCK_FILE_NAME);
        let repo = Repository::new(FileBackend::new(dir.path())).with_lock(&lock_path, 200);

        let _held = StoreLock::acquire(&lock_path, 200).unwrap();
        let err = repo
            .update::<Clients, _, _>(|clients| {
                clients.push(Client::new("blocked"));
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, Error::LockFailed(_)));
    }

    #[test]
    fn copy_skips_collections_never_stored() {
        let dir = TempDir::new().unwrap();
        let files = FileBackend::new(dir.path());
        files.save::<Clients>(&vec![Client::new("a")]).unwrap();

        let target = Repository::new(SqliteBackend::in_memory().unwrap());
        let report = target.copy_from(&files).unwrap();

        let clients = report.iter().find(|r| r.collection == "clients").unwrap();
        assert_eq!(clients.elements, 1);
        assert!(!clients.skipped);
        assert!(report.iter().find(|r| r.collection == "forms").unwrap().skipped);
    }
}
