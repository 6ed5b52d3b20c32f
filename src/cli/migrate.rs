//! agency-store migrate command implementation
//!
//! Copies every JSON collection file found in the data directory into the
//! SQLite database. Collections without a file are left alone, so running the
//! migration twice only refreshes what the files still hold.

use std::path::PathBuf;

use serde::Serialize;

use crate::backend::{FileBackend, SqliteBackend};
use crate::cli::StoreArgs;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};
use crate::repository::{CopiedCollection, Repository};

#[derive(Serialize)]
struct MigrateReport {
    source: PathBuf,
    database: PathBuf,
    collections: Vec<CopiedCollection>,
}

pub fn run(database: Option<PathBuf>, store: StoreArgs) -> Result<()> {
    let config = store.config()?;
    let data_dir = config.data_dir().to_path_buf();
    let database = database.unwrap_or_else(|| config.storage.database_path(&data_dir));

    let source = FileBackend::new(&data_dir);
    let target = Repository::new(SqliteBackend::open(&database)?);
    let collections = target.copy_from(&source)?;

    let mut human = HumanOutput::new("agency-store migrate: copied JSON files into SQLite");
    human.push_summary("source", data_dir.display().to_string());
    human.push_summary("database", database.display().to_string());
    for copied in &collections {
        if copied.skipped {
            human.push_detail(format!("{}: no file, skipped", copied.collection));
        } else {
            human.push_detail(format!("{}: {} element(s)", copied.collection, copied.elements));
        }
    }
    if collections.iter().all(|c| c.skipped) {
        human.push_warning(format!("no collection files found in {}", data_dir.display()));
    }
    human.push_next_step("set storage.backend = \"sqlite\" in agency.toml");

    let report = MigrateReport {
        source: data_dir,
        database,
        collections,
    };
    emit_success(store.output(), "migrate", &report, Some(&human))
}
