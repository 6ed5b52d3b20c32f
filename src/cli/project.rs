//! agency-store project command implementations.

use chrono::Utc;

use crate::cli::StoreArgs;
use crate::clients::ClientBook;
use crate::collection::Clients;
use crate::error::{Error, Result};
use crate::model::Project;
use crate::output::{emit_success, HumanOutput};

pub struct AddOptions {
    pub client: String,
    pub title: String,
    pub store: StoreArgs,
}

pub struct RemoveOptions {
    pub client: String,
    pub project: String,
    pub store: StoreArgs,
}

pub fn run_add(options: AddOptions) -> Result<()> {
    if options.title.trim().is_empty() {
        return Err(Error::InvalidArgument("project title cannot be empty".to_string()));
    }

    let repo = options.store.open()?;
    let project = repo.update::<Clients, _, _>(|clients| {
        ClientBook::new(clients)
            .add_project(&options.client, Project::new(options.title.trim()))
            .cloned()
    })?;

    let number = project.project_number.clone().unwrap_or_default();
    let mut human = HumanOutput::new(format!("Project {number} added"));
    human.push_summary("id", project.id.clone());
    human.push_summary("title", project.title.clone());
    human.push_next_step(format!(
        "agency-store task add {} {} <title>",
        options.client, project.id
    ));

    emit_success(options.store.output(), "project add", &project, Some(&human))
}

pub fn run_remove(options: RemoveOptions) -> Result<()> {
    let repo = options.store.open()?;
    let project = repo.update::<Clients, _, _>(|clients| {
        ClientBook::new(clients).remove_project(&options.client, &options.project, Utc::now())
    })?;

    let mut human = HumanOutput::new(format!("Project {} archived", project.title));
    human.push_summary("id", project.id.clone());
    if !project.tasks.is_empty() {
        human.push_summary("tasks kept", project.tasks.len().to_string());
    }

    emit_success(options.store.output(), "project remove", &project, Some(&human))
}
