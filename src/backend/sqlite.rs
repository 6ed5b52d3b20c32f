//! Relational backend on SQLite.
//!
//! Each collection table holds `(key, position, payload, updated_at)` where
//! `payload` is the element serialized exactly as the file backend writes it.
//! `stored_collections` records which collections were ever saved, so an empty
//! table after a save is told apart from a collection that was never written.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::Backend;
use crate::collection::{Collection, Row, WriteMode};
use crate::error::Result;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub struct SqliteBackend {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteBackend {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        debug!(path = %path.display(), "opened sqlite store");
        let backend = Self { conn, path: Some(path.to_path_buf()) };
        backend.bootstrap()?;
        Ok(backend)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let backend = Self { conn, path: None };
        backend.bootstrap()?;
        Ok(backend)
    }

    fn bootstrap(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS stored_collections (
              name TEXT PRIMARY KEY,
              saved_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    #[cfg(test)]
    fn row_count(&self, table: &str) -> Result<usize> {
        ensure_table(&self.conn, table)?;
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

fn ensure_table(conn: &Connection, table: &str) -> Result<()> {
    conn.execute_batch(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
          key TEXT PRIMARY KEY,
          position INTEGER NOT NULL,
          payload TEXT NOT NULL,
          updated_at TEXT NOT NULL
        );
        "#
    ))?;
    Ok(())
}

fn read_table(conn: &Connection, table: &str) -> Result<Vec<Row>> {
    ensure_table(conn, table)?;
    let mut stmt = conn.prepare(&format!(
        "SELECT key, payload FROM {table} ORDER BY position, key"
    ))?;
    let raw = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    raw.into_iter()
        .map(|(key, payload)| -> Result<Row> {
            Ok(Row {
                key,
                payload: serde_json::from_str(&payload)?,
            })
        })
        .collect()
}

impl Backend for SqliteBackend {
    fn load<C: Collection>(&self) -> Result<Option<C::Value>> {
        let saved_at: Option<String> = self
            .conn
            .query_row(
                "SELECT saved_at FROM stored_collections WHERE name = ?1",
                params![C::NAME],
                |row| row.get(0),
            )
            .optional()?;
        if saved_at.is_none() {
            debug!(collection = C::NAME, "never stored");
            return Ok(None);
        }

        let tables = C::TABLES
            .iter()
            .map(|spec| read_table(&self.conn, spec.name))
            .collect::<Result<Vec<_>>>()?;
        debug!(
            collection = C::NAME,
            rows = tables.iter().map(Vec::len).sum::<usize>(),
            "loaded from database"
        );
        C::from_rows(tables).map(Some)
    }

    fn save<C: Collection>(&self, value: &C::Value) -> Result<()> {
        let tables = C::to_rows(value)?;
        let now = Utc::now().to_rfc3339();

        let tx = self.conn.unchecked_transaction()?;
        for (spec, rows) in C::TABLES.iter().zip(tables.iter()) {
            ensure_table(&tx, spec.name)?;
            if spec.mode == WriteMode::Replace {
                tx.execute(&format!("DELETE FROM {}", spec.name), [])?;
            }

            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} (key, position, payload, updated_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(key) DO UPDATE SET
                   position = excluded.position,
                   payload = excluded.payload,
                   updated_at = excluded.updated_at",
                spec.name
            ))?;
            for (position, row) in rows.iter().enumerate() {
                let payload = serde_json::to_string(&row.payload)?;
                stmt.execute(params![row.key, position as i64, payload, now])?;
            }
            debug!(collection = C::NAME, table = spec.name, rows = rows.len(), "saved rows");
        }

        tx.execute(
            "INSERT INTO stored_collections (name, saved_at) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET saved_at = excluded.saved_at",
            params![C::NAME, now],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn location(&self) -> String {
        match &self.path {
            Some(path) => path.display().to_string(),
            None => ":memory:".to_string(),
        }
    }
}
