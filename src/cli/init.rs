//! agency-store init command implementation
//!
//! Writes a default agency.toml when none exists, creates the data directory
//! and touches every collection so defaults are seeded and legacy client
//! numbers are backfilled.

use std::path::{Path, PathBuf};

use crate::backend::Backend;
use crate::cli::StoreArgs;
use crate::collection::{ChecklistTemplates, Clients, EquipmentBank, TimeTracking};
use crate::config::{Config, CONFIG_FILE_NAME};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};
use crate::repository::Repository;

#[derive(serde::Serialize)]
struct InitReport {
    config: PathBuf,
    config_created: bool,
    backend: String,
    location: String,
    clients: usize,
    equipment_items: usize,
    checklist_categories: usize,
    active_sessions: usize,
}

pub fn run(store: StoreArgs) -> Result<()> {
    let config_path = store
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
    let config_created = ensure_config(&config_path)?;

    let config = store.config()?;
    std::fs::create_dir_all(config.data_dir())?;
    let repo = Repository::open(&config)?;

    let clients = repo.load::<Clients>()?;
    let equipment = repo.load::<EquipmentBank>()?;
    let templates = repo.load::<ChecklistTemplates>()?;
    let ledger = repo.load::<TimeTracking>()?;

    let report = InitReport {
        config: config_path.clone(),
        config_created,
        backend: config.storage.backend.to_string(),
        location: repo.backend().location(),
        clients: clients.len(),
        equipment_items: equipment.len(),
        checklist_categories: templates.len(),
        active_sessions: ledger.active_sessions.len(),
    };

    let header = if config_created {
        "agency-store init: initialized store"
    } else {
        "agency-store init: store ready"
    };
    let mut human = HumanOutput::new(header);
    human.push_summary("config", config_path.display().to_string());
    human.push_summary("backend", report.backend.clone());
    human.push_summary("location", report.location.clone());
    human.push_summary("clients", report.clients.to_string());
    human.push_summary("equipment items", report.equipment_items.to_string());
    human.push_summary(
        "checklist categories",
        report.checklist_categories.to_string(),
    );
    human.push_next_step("agency-store client add <name>");

    emit_success(store.output(), "init", &report, Some(&human))
}

fn ensure_config(path: &Path) -> Result<bool> {
    if path.exists() {
        if !path.is_file() {
            return Err(Error::InvalidConfig(format!(
                "{} exists but is not a file",
                path.display()
            )));
        }
        return Ok(false);
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Config::default().save(path)?;
    Ok(true)
}
