mod support;

use std::fs;

use agency_store::backend::{Backend, FileBackend, SqliteBackend};
use agency_store::clients::ClientBook;
use agency_store::collection::{Clients, EquipmentBank, Suppliers, TimeTracking};
use agency_store::error::Error;
use agency_store::ledger::{SessionTarget, TimeTrackingLedger};
use agency_store::model::{Client, Project, Task, TaskStatus};
use agency_store::repository::Repository;
use chrono::{Duration, Utc};
use serde_json::json;
use tempfile::TempDir;

use support::{str_field, TestStore};

const LEGACY_CLIENTS: &str = r##"[
  {
    "id": "c-old",
    "name": "Legacy Events Ltd",
    "client_number": "abc",
    "retainer": "2500",
    "assigned_user": "dana",
    "projects": [
      {
        "id": "p-old",
        "title": "Spring gala",
        "project_number": 17,
        "tasks": [
          {"id": "t1", "title": "Venue", "status": null, "dependencies": "t0"},
          {"id": "t2", "title": "Menu", "status": "completed", "task_number": "12"}
        ],
        "color": "#ff0000"
      }
    ],
    "extra_charges": null,
    "notes": "imported from spreadsheet"
  },
  {"id": "c-seven", "name": "Seven", "client_number": 7}
]"##;

#[test]
fn legacy_clients_load_and_backfill_is_persisted() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    fs::write(dir.path().join("agency_db.json"), LEGACY_CLIENTS)?;
    let repo = Repository::new(FileBackend::new(dir.path()));

    let clients = repo.load::<Clients>()?;
    let legacy = &clients[0];
    assert_eq!(legacy.client_number, Some(8));
    assert_eq!(legacy.retainer.as_f64(), 2500.0);
    assert_eq!(legacy.assigned_user, vec!["dana".to_string()]);
    assert!(legacy.extra_charges.is_empty());
    assert_eq!(legacy.extra["notes"], "imported from spreadsheet");

    let project = &legacy.projects[0];
    assert_eq!(project.project_number.as_deref(), Some("17"));
    assert_eq!(project.extra["color"], "#ff0000");
    assert_eq!(project.tasks[0].status, TaskStatus::Todo);
    assert_eq!(project.tasks[0].dependencies, vec!["t0".to_string()]);
    assert!(project.tasks[1].status.is_done());

    // The backfilled number and unknown fields were written back.
    let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(
        dir.path().join("agency_db.json"),
    )?)?;
    assert_eq!(raw[0]["client_number"], 8);
    assert_eq!(raw[0]["notes"], "imported from spreadsheet");
    assert_eq!(raw[0]["projects"][0]["color"], "#ff0000");
    Ok(())
}

#[test]
fn legacy_numbers_do_not_block_new_ones() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    fs::write(dir.path().join("agency_db.json"), LEGACY_CLIENTS)?;
    let repo = Repository::new(FileBackend::new(dir.path()));

    let task = repo.update::<Clients, _, _>(|clients| {
        ClientBook::new(clients)
            .add_task("c-old", "p-old", Task::new("Flowers"))
            .cloned()
    })?;
    // "17" is too short to carry a sequence, so the task starts at 001.
    assert_eq!(task.task_number.as_deref(), Some("17001"));
    Ok(())
}

#[test]
fn fractional_amounts_survive_the_backfill_save() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let stored = json!([{
        "id": "c1",
        "name": "Acme",
        "retainer": 1500,
        "extra_charges": [{"id": "x", "title": "Print", "amount": 99.5, "our_cost": 40}]
    }]);
    fs::write(dir.path().join("agency_db.json"), stored.to_string())?;
    let repo = Repository::new(FileBackend::new(dir.path()));

    let clients = repo.load::<Clients>()?;
    assert_eq!(clients[0].client_number, Some(1));
    assert_eq!(clients[0].extra_charges[0].amount.as_f64(), 99.5);

    let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(
        dir.path().join("agency_db.json"),
    )?)?;
    assert_eq!(raw[0]["client_number"], 1);
    assert_eq!(raw[0]["extra_charges"][0]["amount"], json!(99.5));
    assert_eq!(raw[0]["extra_charges"][0]["our_cost"], json!(40));
    assert!(raw[0]["retainer"].is_i64());
    Ok(())
}

#[test]
fn large_client_numbers_are_not_backfilled() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let stored = json!([
        {"id": "c1", "client_number": 5_000_000_000_u64},
        {"id": "c2", "client_number": 3},
        {"id": "c3"}
    ]);
    fs::write(dir.path().join("agency_db.json"), stored.to_string())?;
    let repo = Repository::new(FileBackend::new(dir.path()));

    let clients = repo.load::<Clients>()?;
    let numbers: Vec<_> = clients.iter().map(|c| c.client_number).collect();
    assert_eq!(
        numbers,
        vec![Some(5_000_000_000), Some(3), Some(5_000_000_001)]
    );

    let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(
        dir.path().join("agency_db.json"),
    )?)?;
    assert_eq!(raw[0]["client_number"], json!(5_000_000_000_u64));
    Ok(())
}

#[test]
fn maximal_stored_sequence_does_not_block_new_projects() -> Result<(), Box<dyn std::error::Error>> {
    let repo = Repository::new(SqliteBackend::in_memory()?);
    let mut client = Client::new("Acme");
    client.client_number = Some(1);
    let mut legacy = Project::new("legacy");
    legacy.project_number = Some("0014294967295".to_string());
    client.projects.push(legacy);
    let client_id = client.id.clone();
    repo.save::<Clients>(&vec![client])?;

    let project = repo.update::<Clients, _, _>(|clients| {
        ClientBook::new(clients)
            .add_project(&client_id, Project::new("next"))
            .cloned()
    })?;
    assert_eq!(project.project_number.as_deref(), Some("0010001"));
    Ok(())
}

#[test]
fn backends_load_the_same_documents() -> Result<(), Box<dyn std::error::Error>> {
    let clients: Vec<Client> = serde_json::from_value(json!([
        {
            "id": "c1",
            "client_number": 4,
            "name": "Acme",
            "retainer": 1200.5,
            "assigned_user": ["dana", "noa"],
            "logo_url": "https://example.invalid/logo.png",
            "contacts": [{"name": "Rina", "phone": "050-1234567"}],
            "projects": [{
                "id": "p1",
                "project_number": "0040001",
                "title": "Launch",
                "is_shared": true,
                "tasks": [{
                    "id": "t1",
                    "task_number": "0040001001",
                    "title": "Venue",
                    "status": "בביצוע",
                    "dependencies": [],
                    "priority": "high"
                }],
                "archived_tasks": [{"id": "t0", "task_number": "0040001000", "title": "old"}]
            }],
            "archived_projects": [{"id": "p0", "project_number": "0040000", "title": "gone"}],
            "extra_charges": [{"id": "x1", "charge_number": "0040001", "amount": 99.5}],
            "archived_charges": [{"id": "x0", "charge_number": "0040000", "amount": 10}]
        },
        {"id": "c2", "client_number": 5, "name": "Globex", "archived": true}
    ]))?;
    let ledger: TimeTrackingLedger = serde_json::from_value(json!({
        "entries": [{
            "id": "e1", "user_id": "dana", "start_time": "2024-05-01T09:00:00Z",
            "end_time": "2024-05-01T10:00:00Z", "duration_seconds": 3600,
            "duration_hours": 1.0, "note": "setup", "date": "2024-05-01",
            "billable": true
        }],
        "active_sessions": {
            "noa": {"id": "s1", "user_id": "noa", "client_id": "c1",
                    "start_time": "2024-05-01T11:00:00Z", "device": "laptop"}
        }
    }))?;

    let dir = TempDir::new()?;
    let files = FileBackend::new(dir.path());
    let sqlite = SqliteBackend::in_memory()?;
    save_both(&files, &clients, &ledger)?;
    save_both(&sqlite, &clients, &ledger)?;

    let from_files = files.load::<Clients>()?.unwrap_or_default();
    let from_sqlite = sqlite.load::<Clients>()?.unwrap_or_default();
    assert_eq!(
        serde_json::to_value(&from_files)?,
        serde_json::to_value(&from_sqlite)?
    );
    assert_eq!(serde_json::to_value(&from_files)?, serde_json::to_value(&clients)?);

    let ledger_files = files.load::<TimeTracking>()?.unwrap_or_default();
    let ledger_sqlite = sqlite.load::<TimeTracking>()?.unwrap_or_default();
    assert_eq!(
        serde_json::to_value(&ledger_files)?,
        serde_json::to_value(&ledger_sqlite)?
    );
    let session = ledger_sqlite.active("noa").expect("session");
    assert_eq!(session.extra["device"], "laptop");
    Ok(())
}

fn save_both<B: Backend>(
    backend: &B,
    clients: &Vec<Client>,
    ledger: &TimeTrackingLedger,
) -> Result<(), Box<dyn std::error::Error>> {
    backend.save::<Clients>(clients)?;
    backend.save::<TimeTracking>(ledger)?;
    Ok(())
}

fn scenario<B: Backend>(repo: &Repository<B>) -> Result<(), Box<dyn std::error::Error>> {
    let numbers = repo.update::<Clients, _, _>(|clients| {
        let mut seven = Client::new("Seven");
        seven.client_number = Some(7);
        clients.push(seven.clone());

        let mut book = ClientBook::new(clients);
        let first = book.add_project(&seven.id, Project::new("one"))?.clone();
        let second = book.add_project(&seven.id, Project::new("two"))?.clone();
        let mut tasks = Vec::new();
        for title in ["a", "b", "c"] {
            tasks.push(book.add_task(&seven.id, &second.id, Task::new(title))?.clone());
        }
        Ok((first, second, tasks))
    })?;

    let (first, second, tasks) = numbers;
    assert_eq!(first.project_number.as_deref(), Some("0070001"));
    assert_eq!(second.project_number.as_deref(), Some("0070002"));
    assert_eq!(tasks[2].task_number.as_deref(), Some("0070002003"));
    Ok(())
}

#[test]
fn both_backends_number_the_same_way() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    scenario(&Repository::new(FileBackend::new(dir.path())))?;
    scenario(&Repository::new(SqliteBackend::in_memory()?))?;

    let files = FileBackend::new(dir.path()).load::<Clients>()?.unwrap_or_default();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].projects[1].tasks.len(), 3);
    Ok(())
}

#[test]
fn sqlite_upserts_keep_rows_missing_from_a_save() -> Result<(), Box<dyn std::error::Error>> {
    let repo = Repository::new(SqliteBackend::in_memory()?);
    repo.save::<Clients>(&vec![Client::new("a"), Client::new("b")])?;

    let mut clients = repo.load::<Clients>()?;
    clients.pop();
    repo.save::<Clients>(&clients)?;
    assert_eq!(repo.load::<Clients>()?.len(), 2);

    // Equipment is replaced wholesale.
    repo.save::<EquipmentBank>(&vec!["Projector".to_string()])?;
    assert_eq!(repo.load::<EquipmentBank>()?, vec!["Projector".to_string()]);
    Ok(())
}

#[test]
fn documents_round_trip_through_sqlite() -> Result<(), Box<dyn std::error::Error>> {
    let backend = SqliteBackend::in_memory()?;
    let docs = serde_json::from_value(json!([
        {"id": 3, "name": "Catering Co", "tags": ["food"]},
        {"id": "s-2", "name": "Lights Inc"},
        {"name": "no id"}
    ]))?;
    backend.save::<Suppliers>(&docs)?;

    let loaded = backend.load::<Suppliers>()?.unwrap_or_default();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].0["tags"], json!(["food"]));
    assert_eq!(loaded[1].key().as_deref(), Some("s-2"));
    Ok(())
}

#[test]
fn stale_session_is_reclaimed_but_fresh_one_stays() -> Result<(), Box<dyn std::error::Error>> {
    let repo = Repository::new(SqliteBackend::in_memory()?);
    let now = Utc::now();
    repo.update::<TimeTracking, _, _>(|ledger| {
        ledger.start_at("old", SessionTarget::default(), now - Duration::hours(3))?;
        ledger.start_at("new", SessionTarget::default(), now - Duration::minutes(30))?;
        Ok(())
    })?;

    let ledger = repo.load_at::<TimeTracking>(now)?;
    assert!(ledger.active("old").is_none());
    assert!(ledger.active("new").is_some());

    let repo = repo.with_stale_after(Duration::minutes(10));
    assert!(repo.load_at::<TimeTracking>(now)?.active("new").is_none());
    Ok(())
}

#[test]
fn session_conflict_carries_existing_session() -> Result<(), Box<dyn std::error::Error>> {
    let repo = Repository::new(SqliteBackend::in_memory()?);
    let first = repo.update::<TimeTracking, _, _>(|ledger| {
        ledger.start("dana", SessionTarget::default()).cloned()
    })?;

    let err = repo
        .update::<TimeTracking, _, _>(|ledger| {
            ledger.start("dana", SessionTarget::default()).map(|_| ())
        })
        .unwrap_err();
    match err {
        Error::SessionConflict { user_id, session } => {
            assert_eq!(user_id, "dana");
            assert_eq!(session.id, first.id);
        }
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}

#[test]
fn corrupt_file_is_storage_unavailable() -> Result<(), Box<dyn std::error::Error>> {
    let store = TestStore::new("file")?;
    store.write_data_file("agency_db.json", "{not json")?;

    let envelope = store.json_err(&["client", "list"], 4)?;
    assert_eq!(envelope["error"]["kind"], "storage_unavailable");
    Ok(())
}

#[test]
fn migrate_copies_files_into_sqlite() -> Result<(), Box<dyn std::error::Error>> {
    let store = TestStore::new("file")?;
    let client = str_field(&store.json(&["client", "add", "Acme"])?, "id");
    store.json(&["project", "add", &client, "Launch"])?;
    store.json(&["timer", "start", "--user", "dana"])?;
    store.write_data_file("quotes_db.json", r#"[{"id": "q1", "total": 1200}]"#)?;

    let report = store.json(&["migrate"])?;
    let collections = report["collections"].as_array().expect("collections");
    let find = |name: &str| {
        collections
            .iter()
            .find(|c| c["collection"] == name)
            .cloned()
            .unwrap_or_default()
    };
    assert_eq!(find("clients")["elements"].as_u64(), Some(1));
    assert_eq!(find("quotes")["elements"].as_u64(), Some(1));
    assert_eq!(find("forms")["skipped"], true);

    let backend = SqliteBackend::open(store.data_dir().join("agency.db"))?;
    let clients = backend.load::<Clients>()?.unwrap_or_default();
    assert_eq!(clients[0].projects[0].project_number.as_deref(), Some("0010001"));
    assert!(backend.load::<TimeTracking>()?.unwrap_or_default().active("dana").is_some());

    // The sqlite backend now serves the same data.
    let listed = support::agency_cmd()
        .current_dir(store.path())
        .args(["--data-dir", "data", "--backend", "sqlite", "client", "list", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let listed: serde_json::Value = serde_json::from_slice(&listed)?;
    assert_eq!(listed["data"]["total"], 1);
    Ok(())
}
