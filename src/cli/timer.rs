//! agency-store timer command implementations.

use crate::cli::StoreArgs;
use crate::collection::TimeTracking;
use crate::error::{EntityKind, Error, Result};
use crate::ledger::{SessionTarget, TimeEntry};
use crate::output::{emit_success, HumanOutput};

pub struct StartOptions {
    pub user: String,
    pub client: Option<String>,
    pub project: Option<String>,
    pub task: Option<String>,
    pub store: StoreArgs,
}

pub struct StopOptions {
    pub user: String,
    pub note: String,
    pub store: StoreArgs,
}

#[derive(serde::Serialize)]
struct EntriesOutput {
    total: usize,
    total_hours: f64,
    entries: Vec<TimeEntry>,
}

pub fn run_start(options: StartOptions) -> Result<()> {
    let target = SessionTarget {
        client_id: options.client,
        project_id: options.project,
        task_id: options.task,
    };

    let repo = options.store.open()?;
    let session = repo.update::<TimeTracking, _, _>(|ledger| {
        ledger.start(&options.user, target).cloned()
    })?;

    let mut human = HumanOutput::new(format!("Timer started for {}", session.user_id));
    human.push_summary("started", session.start_time.clone());
    if let Some(task) = &session.task_id {
        human.push_summary("task", task.clone());
    }
    human.push_next_step(format!("agency-store timer stop --user {}", session.user_id));

    emit_success(options.store.output(), "timer start", &session, Some(&human))
}

pub fn run_stop(options: StopOptions) -> Result<()> {
    let repo = options.store.open()?;
    let entry = repo.update::<TimeTracking, _, _>(|ledger| {
        ledger.stop(&options.user, &options.note)
    })?;

    let mut human = HumanOutput::new(format!("Timer stopped for {}", entry.user_id));
    human.push_summary("hours", entry.duration_hours.to_string());
    human.push_summary("date", entry.date.clone());

    emit_success(options.store.output(), "timer stop", &entry, Some(&human))
}

pub fn run_cancel(user: String, store: StoreArgs) -> Result<()> {
    let repo = store.open()?;
    let session = repo.update::<TimeTracking, _, _>(|ledger| ledger.cancel(&user))?;

    let human = HumanOutput::new(format!("Timer cancelled for {user}"));
    emit_success(store.output(), "timer cancel", &session, Some(&human))
}

pub fn run_show(user: String, store: StoreArgs) -> Result<()> {
    let repo = store.open()?;
    let ledger = repo.load::<TimeTracking>()?;
    let session = ledger
        .active(&user)
        .ok_or_else(|| Error::not_found(EntityKind::ActiveSession, &user))?;

    let mut human = HumanOutput::new(format!("Timer running for {user}"));
    human.push_summary("started", session.start_time.clone());
    for (label, value) in [
        ("client", &session.client_id),
        ("project", &session.project_id),
        ("task", &session.task_id),
    ] {
        if let Some(value) = value {
            human.push_summary(label, value.clone());
        }
    }

    emit_success(store.output(), "timer show", session, Some(&human))
}

pub fn run_entries(user: Option<String>, store: StoreArgs) -> Result<()> {
    let repo = store.open()?;
    let ledger = repo.load::<TimeTracking>()?;

    let entries: Vec<TimeEntry> = match user.as_deref() {
        Some(user) => ledger.entries_for(user).cloned().collect(),
        None => ledger.entries,
    };
    let total_hours = entries.iter().map(|e| e.duration_hours).sum::<f64>();
    let output = EntriesOutput {
        total: entries.len(),
        total_hours: (total_hours * 100.0).round() / 100.0,
        entries,
    };

    let mut human = HumanOutput::new("Time entries");
    human.push_summary("Total", output.total.to_string());
    human.push_summary("Hours", output.total_hours.to_string());
    for entry in &output.entries {
        let mut line = format!("{} {} {}h", entry.date, entry.user_id, entry.duration_hours);
        if !entry.note.is_empty() {
            line.push_str(&format!(" ({})", entry.note));
        }
        human.push_detail(line);
    }

    emit_success(store.output(), "timer entries", &output, Some(&human))
}
