//! agency-store task command implementations.

use chrono::Utc;

use crate::cli::StoreArgs;
use crate::clients::ClientBook;
use crate::collection::Clients;
use crate::error::{Error, Result};
use crate::model::{Task, TaskStatus};
use crate::output::{emit_success, HumanOutput};

pub struct AddOptions {
    pub client: String,
    pub project: String,
    pub title: String,
    pub status: Option<String>,
    pub deadline: Option<String>,
    pub dependencies: Vec<String>,
    pub store: StoreArgs,
}

pub struct StatusOptions {
    pub client: String,
    pub project: String,
    pub task: String,
    pub status: String,
    pub store: StoreArgs,
}

pub struct RemoveOptions {
    pub client: String,
    pub project: String,
    pub task: String,
    pub store: StoreArgs,
}

#[derive(serde::Serialize)]
struct RemoveOutput {
    task: Task,
    cancelled_sessions: usize,
}

pub fn run_add(options: AddOptions) -> Result<()> {
    if options.title.trim().is_empty() {
        return Err(Error::InvalidArgument("task title cannot be empty".to_string()));
    }

    let mut task = Task::new(options.title.trim());
    if let Some(status) = options.status.as_deref() {
        task.status = TaskStatus::parse(status);
    }
    task.deadline = options.deadline;
    task.dependencies = options.dependencies;

    let repo = options.store.open()?;
    let task = repo.update::<Clients, _, _>(|clients| {
        ClientBook::new(clients)
            .add_task(&options.client, &options.project, task)
            .cloned()
    })?;

    let number = task.task_number.clone().unwrap_or_default();
    let mut human = HumanOutput::new(format!("Task {number} added"));
    human.push_summary("id", task.id.clone());
    human.push_summary("status", task.status.to_string());
    if let Some(deadline) = &task.deadline {
        human.push_summary("deadline", deadline.clone());
    }

    emit_success(options.store.output(), "task add", &task, Some(&human))
}

pub fn run_status(options: StatusOptions) -> Result<()> {
    let status = TaskStatus::parse(&options.status);
    let repo = options.store.open()?;
    let task = repo.update::<Clients, _, _>(|clients| {
        ClientBook::new(clients)
            .set_task_status(
                &options.client,
                &options.project,
                &options.task,
                status,
                Utc::now(),
            )
            .cloned()
    })?;

    let mut human = HumanOutput::new(format!("Task {} is now {}", task.title, task.status));
    if let Some(completed_at) = &task.completed_at {
        human.push_summary("completed at", completed_at.clone());
    }

    emit_success(options.store.output(), "task status", &task, Some(&human))
}

pub fn run_remove(options: RemoveOptions) -> Result<()> {
    let repo = options.store.open()?;
    let (task, cancelled_sessions) =
        repo.remove_task(&options.client, &options.project, &options.task)?;

    let mut human = HumanOutput::new(format!("Task {} archived", task.title));
    if cancelled_sessions > 0 {
        human.push_warning(format!(
            "cancelled {cancelled_sessions} running session(s) on this task"
        ));
    }

    let output = RemoveOutput {
        task,
        cancelled_sessions,
    };
    emit_success(options.store.output(), "task remove", &output, Some(&human))
}
