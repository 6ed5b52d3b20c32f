//! agency-store charge command implementations.

use chrono::Local;

use crate::cli::StoreArgs;
use crate::clients::ClientBook;
use crate::collection::Clients;
use crate::error::{Error, Result};
use crate::model::{Amount, Charge};
use crate::output::{emit_success, HumanOutput};

pub struct AddOptions {
    pub client: String,
    pub title: String,
    pub amount: Amount,
    pub our_cost: Amount,
    pub date: Option<String>,
    pub store: StoreArgs,
}

/// A single charge on a client.
pub struct TargetOptions {
    pub client: String,
    pub charge: String,
    pub store: StoreArgs,
}

#[derive(serde::Serialize)]
struct ChargeUpdate {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    our_cost: Option<Amount>,
}

pub fn run_add(options: AddOptions) -> Result<()> {
    if options.title.trim().is_empty() {
        return Err(Error::InvalidArgument("charge title cannot be empty".to_string()));
    }
    if options.our_cost.is_negative() {
        return Err(Error::InvalidArgument(format!(
            "our_cost must be a non-negative number, got {}",
            options.our_cost
        )));
    }

    let mut charge = Charge::new(options.title.trim(), options.amount);
    charge.our_cost = options.our_cost;
    charge.date = Some(
        options
            .date
            .unwrap_or_else(|| Local::now().date_naive().to_string()),
    );

    let repo = options.store.open()?;
    let charge = repo.update::<Clients, _, _>(|clients| {
        ClientBook::new(clients)
            .add_charge(&options.client, charge)
            .cloned()
    })?;

    let number = charge.charge_number.clone().unwrap_or_default();
    let mut human = HumanOutput::new(format!("Charge {number} added"));
    human.push_summary("id", charge.id.clone());
    human.push_summary("amount", charge.amount.to_string());

    emit_success(options.store.output(), "charge add", &charge, Some(&human))
}

pub fn run_toggle(options: TargetOptions) -> Result<()> {
    let repo = options.store.open()?;
    let completed = repo.update::<Clients, _, _>(|clients| {
        ClientBook::new(clients).toggle_charge(&options.client, &options.charge)
    })?;

    let state = if completed { "completed" } else { "open" };
    let human = HumanOutput::new(format!("Charge {} is {state}", options.charge));
    let output = ChargeUpdate {
        id: options.charge,
        completed: Some(completed),
        our_cost: None,
    };
    emit_success(options.store.output(), "charge toggle", &output, Some(&human))
}

pub fn run_cost(options: TargetOptions, our_cost: Amount) -> Result<()> {
    let repo = options.store.open()?;
    repo.update::<Clients, _, _>(|clients| {
        ClientBook::new(clients).set_charge_cost(
            &options.client,
            &options.charge,
            our_cost.clone(),
        )
    })?;

    let human = HumanOutput::new(format!("Charge {} cost set to {our_cost}", options.charge));
    let output = ChargeUpdate {
        id: options.charge,
        completed: None,
        our_cost: Some(our_cost),
    };
    emit_success(options.store.output(), "charge cost", &output, Some(&human))
}

pub fn run_remove(options: TargetOptions) -> Result<()> {
    let repo = options.store.open()?;
    let charge = repo.update::<Clients, _, _>(|clients| {
        ClientBook::new(clients).remove_charge(&options.client, &options.charge)
    })?;

    let human = HumanOutput::new(format!("Charge {} archived", charge.title));
    emit_success(options.store.output(), "charge remove", &charge, Some(&human))
}
