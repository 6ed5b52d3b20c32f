//! agency-store equipment and collection command implementations.

use serde::Serialize;

use crate::cli::{CollectionName, StoreArgs};
use crate::collection::{
    ChecklistTemplates, Clients, Collection, EquipmentBank, Events, Forms, Messages, Quotes,
    Suppliers, TimeTracking,
};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};
use crate::repository::Repository;

#[derive(Serialize)]
struct EquipmentOutput {
    total: usize,
    items: Vec<String>,
}

pub fn run_equipment_list(store: StoreArgs) -> Result<()> {
    let repo = store.open()?;
    let items = repo.load::<EquipmentBank>()?;
    emit_equipment(&store, "equipment list", "Equipment bank", items)
}

pub fn run_equipment_add(name: String, store: StoreArgs) -> Result<()> {
    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(Error::InvalidArgument("equipment name cannot be empty".to_string()));
    }

    let repo = store.open()?;
    let items = repo.update::<EquipmentBank, _, _>(|items| {
        if items.contains(&name) {
            return Err(Error::InvalidArgument(format!(
                "'{name}' is already in the equipment bank"
            )));
        }
        items.push(name.clone());
        Ok(items.clone())
    })?;
    emit_equipment(&store, "equipment add", &format!("Added {name}"), items)
}

pub fn run_equipment_remove(name: String, store: StoreArgs) -> Result<()> {
    let repo = store.open()?;
    let items = repo.update::<EquipmentBank, _, _>(|items| {
        let before = items.len();
        items.retain(|item| item != &name);
        if items.len() == before {
            return Err(Error::InvalidArgument(format!(
                "'{name}' is not in the equipment bank"
            )));
        }
        Ok(items.clone())
    })?;
    emit_equipment(&store, "equipment remove", &format!("Removed {name}"), items)
}

fn emit_equipment(store: &StoreArgs, command: &str, header: &str, items: Vec<String>) -> Result<()> {
    let mut human = HumanOutput::new(header);
    human.push_summary("Total", items.len().to_string());
    for item in &items {
        human.push_detail(item.clone());
    }
    let output = EquipmentOutput {
        total: items.len(),
        items,
    };
    emit_success(store.output(), command, &output, Some(&human))
}

pub fn run_show(name: CollectionName, store: StoreArgs) -> Result<()> {
    let repo = store.open()?;
    match name {
        CollectionName::Clients => show::<Clients>(&repo, &store),
        CollectionName::Suppliers => show::<Suppliers>(&repo, &store),
        CollectionName::Quotes => show::<Quotes>(&repo, &store),
        CollectionName::Messages => show::<Messages>(&repo, &store),
        CollectionName::Events => show::<Events>(&repo, &store),
        CollectionName::Forms => show::<Forms>(&repo, &store),
        CollectionName::EquipmentBank => show::<EquipmentBank>(&repo, &store),
        CollectionName::ChecklistTemplates => show::<ChecklistTemplates>(&repo, &store),
        CollectionName::TimeTracking => show::<TimeTracking>(&repo, &store),
    }
}

/// Collections are printed as JSON even without `--json`.
fn show<C: Collection>(repo: &Repository, store: &StoreArgs) -> Result<()> {
    let value = repo.load::<C>()?;
    if store.json {
        return emit_success(store.output(), "collection", &value, None);
    }
    if !store.quiet {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}
