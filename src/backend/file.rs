//! One JSON document per collection in a data directory.

use std::fs;
use std::io;
use std::path::PathBuf;

use tracing::debug;

use super::Backend;
use crate::collection::Collection;
use crate::error::Result;
use crate::lock::write_atomic;

#[derive(Debug, Clone)]
pub struct FileBackend {
    data_dir: PathBuf,
}

impl FileBackend {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn path_for<C: Collection>(&self) -> PathBuf {
        self.data_dir.join(C::FILE)
    }
}

impl Backend for FileBackend {
    fn load<C: Collection>(&self) -> Result<Option<C::Value>> {
        let path = self.path_for::<C>();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(collection = C::NAME, path = %path.display(), "no file yet");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        // A zero-length file is an empty collection, not a decode error.
        if content.trim().is_empty() {
            return Ok(Some(C::Value::default()));
        }

        let value = serde_json::from_str(&content)?;
        debug!(collection = C::NAME, bytes = content.len(), "loaded from file");
        Ok(Some(value))
    }

    fn save<C: Collection>(&self, value: &C::Value) -> Result<()> {
        let path = self.path_for::<C>();
        let json = serde_json::to_string_pretty(value)?;
        write_atomic(&path, json.as_bytes())?;
        debug!(collection = C::NAME, bytes = json.len(), "saved to file");
        Ok(())
    }

    fn location(&self) -> String {
        self.data_dir.display().to_string()
    }
}
