//! agency-store client command implementations.

use chrono::Utc;

use crate::cli::StoreArgs;
use crate::clients::ClientBook;
use crate::collection::Clients;
use crate::error::{EntityKind, Error, Result};
use crate::model::{Amount, Client};
use crate::output::{emit_success, HumanOutput};

pub struct AddOptions {
    pub name: String,
    pub retainer: Amount,
    pub assigned_users: Vec<String>,
    pub store: StoreArgs,
}

pub struct ListOptions {
    pub all: bool,
    pub store: StoreArgs,
}

pub struct ShowOptions {
    pub id: String,
    pub store: StoreArgs,
}

#[derive(serde::Serialize)]
struct ClientSummary {
    id: String,
    client_number: Option<u64>,
    name: String,
    archived: bool,
    projects: usize,
    open_charges: usize,
}

impl From<&Client> for ClientSummary {
    fn from(client: &Client) -> Self {
        Self {
            id: client.id.clone(),
            client_number: client.client_number,
            name: client.name.clone(),
            archived: client.archived,
            projects: client.projects.len(),
            open_charges: client.extra_charges.iter().filter(|c| !c.completed).count(),
        }
    }
}

#[derive(serde::Serialize)]
struct ClientListOutput {
    total: usize,
    clients: Vec<ClientSummary>,
}

#[derive(serde::Serialize)]
struct ArchiveOutput {
    id: String,
    archived: bool,
}

pub fn run_add(options: AddOptions) -> Result<()> {
    if options.name.trim().is_empty() {
        return Err(Error::InvalidArgument("client name cannot be empty".to_string()));
    }

    let repo = options.store.open()?;
    let mut client = Client::new(options.name.trim());
    client.retainer = options.retainer;
    client.assigned_user = options.assigned_users;

    let client = repo.update::<Clients, _, _>(|clients| {
        Ok(ClientBook::new(clients).add_client(client).clone())
    })?;

    let number = client.client_number.unwrap_or_default();
    let mut human = HumanOutput::new(format!("Client {} added", client.name));
    human.push_summary("id", client.id.clone());
    human.push_summary("client number", number.to_string());
    human.push_next_step(format!("agency-store project add {} <title>", client.id));

    emit_success(options.store.output(), "client add", &client, Some(&human))
}

pub fn run_list(options: ListOptions) -> Result<()> {
    let repo = options.store.open()?;
    let clients = repo.load::<Clients>()?;

    let summaries: Vec<ClientSummary> = clients
        .iter()
        .filter(|c| options.all || !c.archived)
        .map(ClientSummary::from)
        .collect();
    let output = ClientListOutput {
        total: summaries.len(),
        clients: summaries,
    };

    let mut human = HumanOutput::new("Clients");
    human.push_summary("Total", output.total.to_string());
    for client in &output.clients {
        let number = client
            .client_number
            .map(|n| format!("{n:03}"))
            .unwrap_or_else(|| "---".to_string());
        let mut line = format!("{number} {} ({})", client.name, client.id);
        if client.archived {
            line.push_str(" [archived]");
        }
        human.push_detail(line);
    }

    emit_success(options.store.output(), "client list", &output, Some(&human))
}

pub fn run_show(options: ShowOptions) -> Result<()> {
    let repo = options.store.open()?;
    let clients = repo.load::<Clients>()?;
    let client = clients
        .iter()
        .find(|c| c.id == options.id)
        .ok_or_else(|| Error::not_found(EntityKind::Client, &options.id))?;

    let mut human = HumanOutput::new(format!("Client {}", client.name));
    if let Some(number) = client.client_number {
        human.push_summary("Number", number.to_string());
    }
    human.push_summary("Id", client.id.clone());
    human.push_summary("Retainer", client.retainer.to_string());
    if !client.assigned_user.is_empty() {
        human.push_summary("Assigned", client.assigned_user.join(", "));
    }
    if client.archived {
        human.push_summary("Archived", client.archived_at.clone().unwrap_or_default());
    }

    for project in &client.projects {
        human.push_detail(format!(
            "{} {} ({} tasks)",
            project.project_number.as_deref().unwrap_or("-------"),
            project.title,
            project.tasks.len()
        ));
        for task in &project.tasks {
            human.push_detail(format!(
                "  {} {} [{}]",
                task.task_number.as_deref().unwrap_or("----------"),
                task.title,
                task.status
            ));
        }
    }
    for charge in &client.extra_charges {
        let state = if charge.completed { "done" } else { "open" };
        human.push_detail(format!(
            "charge {} {} {} [{state}]",
            charge.charge_number.as_deref().unwrap_or("-------"),
            charge.title,
            charge.amount
        ));
    }

    emit_success(options.store.output(), "client show", client, Some(&human))
}

pub fn run_set_archived(id: String, archived: bool, store: StoreArgs) -> Result<()> {
    let repo = store.open()?;
    repo.update::<Clients, _, _>(|clients| {
        let mut book = ClientBook::new(clients);
        if archived {
            book.archive_client(&id, Utc::now())
        } else {
            book.restore_client(&id)
        }
    })?;

    let (command, header) = if archived {
        ("client archive", format!("Client {id} archived"))
    } else {
        ("client restore", format!("Client {id} restored"))
    };
    let human = HumanOutput::new(header);
    emit_success(
        store.output(),
        command,
        &ArchiveOutput { id, archived },
        Some(&human),
    )
}
