//! Advisory locking and atomic file replacement
//!
//! `write_atomic` is how the file backend replaces a collection document:
//! readers see either the previous JSON or the new one, never a torn write.
//! `StoreLock` guards a whole load/mutate/save cycle when
//! `[concurrency] lock = true`; without it concurrent writers race and the last
//! save wins.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;
use tracing::{debug, trace};

use crate::error::{Error, Result};

pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5000;

/// Lock file created inside the data directory.
pub const LOCK_FILE_NAME: &str = "store.lock";

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Exclusive hold on the store lock file, released on drop.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
    path: PathBuf,
}

impl StoreLock {
    /// Poll for the lock until `timeout_ms` elapses.
    pub fn acquire(path: impl AsRef<Path>, timeout_ms: u64) -> Result<Self> {
        let path = path.as_ref();
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);

        loop {
            if let Some(lock) = Self::try_acquire(path)? {
                debug!(path = %path.display(), "store lock acquired");
                return Ok(lock);
            }
            if Instant::now() >= deadline {
                return Err(Error::LockFailed(path.to_path_buf()));
            }
            trace!(path = %path.display(), "store lock busy");
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Take the lock if nobody holds it.
    pub fn try_acquire(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(StoreLock {
                file,
                path: path.to_path_buf(),
            })),
            Err(err) if held_elsewhere(&err) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

fn held_elsewhere(err: &io::Error) -> bool {
    // Windows reports sharing (32) and lock (33) violations instead of WouldBlock.
    err.kind() == io::ErrorKind::WouldBlock
        || (cfg!(windows) && matches!(err.raw_os_error(), Some(32 | 33)))
}

/// Write `data` to a hidden sibling of `path`, sync it, then rename it over
/// `path`.
pub fn write_atomic(path: impl AsRef<Path>, data: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "collection".to_string());
    let staging = dir.join(format!(".{file_name}.{}.tmp", std::process::id()));

    let result = (|| -> Result<()> {
        let mut file = File::create(&staging)?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(&staging, path)?;
        Ok(())
    })();
    if result.is_err() {
        let _ = fs::remove_file(&staging);
    }
    result
}
