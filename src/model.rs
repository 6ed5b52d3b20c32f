//! Persisted entity shapes
//!
//! Records are read leniently: data written by older deployments carries
//! numbers as strings, single users instead of lists, nulls where lists are
//! expected, and fields this crate does not model. Unknown fields are kept in
//! `extra` and written back untouched.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};

/// Fields carried through without interpretation.
pub type Extra = Map<String, Value>;

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339()
}

// =============================================================================
// Clients
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    #[serde(default)]
    pub id: String,

    /// Missing, null, zero and non-numeric values all read as `None`.
    #[serde(
        default,
        deserialize_with = "lenient::client_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub client_number: Option<u64>,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub retainer: Amount,

    #[serde(default, deserialize_with = "lenient::list")]
    pub extra_charges: Vec<Charge>,

    #[serde(default, deserialize_with = "lenient::list")]
    pub projects: Vec<Project>,

    #[serde(default, deserialize_with = "lenient::string_list")]
    pub assigned_user: Vec<String>,

    #[serde(default, deserialize_with = "lenient::flag")]
    pub archived: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient::list",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub archived_projects: Vec<Project>,

    #[serde(
        default,
        deserialize_with = "lenient::list",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub archived_charges: Vec<Charge>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl Client {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            client_number: None,
            name: name.into(),
            retainer: Amount::default(),
            extra_charges: Vec::new(),
            projects: Vec::new(),
            assigned_user: Vec::new(),
            archived: false,
            archived_at: None,
            archived_projects: Vec::new(),
            archived_charges: Vec::new(),
            extra: Extra::new(),
        }
    }

    pub fn project(&self, project_id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == project_id)
    }

    pub fn project_mut(&mut self, project_id: &str) -> Option<&mut Project> {
        self.projects.iter_mut().find(|p| p.id == project_id)
    }

    pub fn charge_mut(&mut self, charge_id: &str) -> Option<&mut Charge> {
        self.extra_charges.iter_mut().find(|c| c.id == charge_id)
    }

    /// Projects that ever held a number under this client, live or archived.
    pub fn all_projects(&self) -> impl Iterator<Item = &Project> {
        self.projects.iter().chain(self.archived_projects.iter())
    }

    /// Charges that ever held a number under this client, live or archived.
    pub fn all_charges(&self) -> impl Iterator<Item = &Charge> {
        self.extra_charges.iter().chain(self.archived_charges.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub id: String,

    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub project_number: Option<String>,

    #[serde(default)]
    pub title: String,

    #[serde(default, deserialize_with = "lenient::list")]
    pub tasks: Vec<Task>,

    #[serde(
        default,
        deserialize_with = "lenient::list",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub archived_tasks: Vec<Task>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_date: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl Project {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            project_number: None,
            title: title.into(),
            tasks: Vec::new(),
            archived_tasks: Vec::new(),
            archived_date: None,
            extra: Extra::new(),
        }
    }

    pub fn task_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == task_id)
    }

    pub fn all_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().chain(self.archived_tasks.iter())
    }
}

// =============================================================================
// Tasks
// =============================================================================

/// Workflow state of a task. Values outside the known vocabulary round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    #[default]
    Todo,
    Waiting,
    InProgress,
    Done,
    Other(String),
}

impl TaskStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Todo => "לביצוע",
            TaskStatus::Waiting => "ממתין",
            TaskStatus::InProgress => "בביצוע",
            TaskStatus::Done => "הושלם",
            TaskStatus::Other(raw) => raw,
        }
    }

    pub fn is_done(&self) -> bool {
        match self {
            TaskStatus::Done => true,
            TaskStatus::Other(raw) => raw.eq_ignore_ascii_case("completed"),
            _ => false,
        }
    }

    /// Accepts the stored value or an English alias (`todo`, `waiting`,
    /// `in_progress`, `done`).
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "todo" => TaskStatus::Todo,
            "waiting" => TaskStatus::Waiting,
            "in_progress" | "in-progress" => TaskStatus::InProgress,
            "done" => TaskStatus::Done,
            other => TaskStatus::from(other.to_string()),
        }
    }
}

impl From<String> for TaskStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "לביצוע" => TaskStatus::Todo,
            "ממתין" => TaskStatus::Waiting,
            "בביצוע" => TaskStatus::InProgress,
            "הושלם" => TaskStatus::Done,
            "" => TaskStatus::Todo,
            _ => TaskStatus::Other(raw),
        }
    }
}

impl From<TaskStatus> for String {
    fn from(status: TaskStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub id: String,

    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub task_number: Option<String>,

    #[serde(default)]
    pub title: String,

    #[serde(default, deserialize_with = "lenient::status")]
    pub status: TaskStatus,

    #[serde(default)]
    pub deadline: Option<String>,

    #[serde(default, deserialize_with = "lenient::string_list")]
    pub dependencies: Vec<String>,

    #[serde(default, deserialize_with = "lenient::flag")]
    pub done: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl Task {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            task_number: None,
            title: title.into(),
            status: TaskStatus::Todo,
            deadline: None,
            dependencies: Vec::new(),
            done: false,
            completed_at: None,
            extra: Extra::new(),
        }
    }
}

// =============================================================================
// Charges
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Charge {
    #[serde(default)]
    pub id: String,

    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub charge_number: Option<String>,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub amount: Amount,

    #[serde(default)]
    pub our_cost: Amount,

    #[serde(default, deserialize_with = "lenient::flag")]
    pub completed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl Charge {
    pub fn new(title: impl Into<String>, amount: Amount) -> Self {
        Self {
            id: new_id(),
            charge_number: None,
            title: title.into(),
            amount,
            our_cost: Amount::default(),
            completed: false,
            date: None,
            extra: Extra::new(),
        }
    }
}

// =============================================================================
// Money
// =============================================================================

/// A money value written back in the numeric form it was read with, so `1500`
/// stays an integer and `99.5` keeps its fraction.
#[derive(Debug, Clone, PartialEq)]
pub struct Amount(Number);

impl Amount {
    pub fn integer(value: i64) -> Self {
        Amount(Number::from(value))
    }

    pub fn as_f64(&self) -> f64 {
        self.0.as_f64().unwrap_or(0.0)
    }

    pub fn is_negative(&self) -> bool {
        self.as_f64() < 0.0
    }
}

impl Default for Amount {
    fn default() -> Self {
        Amount::integer(0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for Amount {
    type Err = String;

    /// Whole numbers parse as integers, anything else as a finite float.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if let Ok(value) = raw.parse::<i64>() {
            return Ok(Amount::integer(value));
        }
        raw.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Amount)
            .ok_or_else(|| format!("not a number: {raw:?}"))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

/// Numeric strings are accepted; null and anything unparsable read as zero.
impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<Value>::deserialize(deserializer)? {
            Some(Value::Number(n)) => Amount(n),
            Some(Value::String(s)) => s.parse().unwrap_or_default(),
            _ => Amount::default(),
        })
    }
}

// =============================================================================
// Loosely typed documents
// =============================================================================

/// Supplier, quote, message, event and form records. Only `id` is relied on.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(pub Map<String, Value>);

impl Document {
    /// Primary key as text; numeric ids are rendered in decimal.
    pub fn key(&self) -> Option<String> {
        match self.0.get("id")? {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

impl From<Map<String, Value>> for Document {
    fn from(map: Map<String, Value>) -> Self {
        Document(map)
    }
}

/// Deserializers that accept the shapes older data was written with.
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn client_number<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        let number = match value {
            Some(Value::Number(n)) => n.as_u64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f > 0.0 && *f < u64::MAX as f64)
                    .map(|f| f as u64)
            }),
            Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
            _ => None,
        };
        Ok(number.filter(|n| *n > 0))
    }

    pub fn status<'de, D>(deserializer: D) -> Result<super::TaskStatus, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::String(s)) => super::TaskStatus::from(s),
            _ => super::TaskStatus::default(),
        })
    }

    pub fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::String(s)) if !s.is_empty() => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
    }

    pub fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::String(s)) if !s.trim().is_empty() => vec![s],
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        })
    }

    pub fn list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
    }

    pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::Bool(b)) => b,
            Some(Value::Number(n)) => n.as_i64().map(|i| i != 0).unwrap_or(false),
            Some(Value::String(s)) => matches!(s.trim(), "true" | "True" | "1"),
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_reads_legacy_shapes() {
        let client: Client = serde_json::from_value(json!({
            "id": "c1",
            "name": "Acme",
            "client_number": "7",
            "assigned_user": "dana",
            "retainer": "1500",
            "projects": null,
            "documents": [{"name": "contract.pdf"}]
        }))
        .unwrap();

        assert_eq!(client.client_number, Some(7));
        assert_eq!(client.assigned_user, vec!["dana".to_string()]);
        assert_eq!(client.retainer.as_f64(), 1500.0);
        assert!(client.projects.is_empty());
        assert!(client.extra.contains_key("documents"));
    }

    #[test]
    fn zero_or_garbage_client_number_reads_as_missing() {
        for raw in [json!(0), json!(""), json!("abc"), json!(null), json!(-3)] {
            let client: Client =
                serde_json::from_value(json!({"id": "c", "client_number": raw})).unwrap();
            assert_eq!(client.client_number, None, "input {raw}");
        }
    }

    #[test]
    fn unknown_fields_survive_round_trip() {
        let raw = json!({
            "id": "t1",
            "title": "Book venue",
            "status": "ממתין",
            "deadline": null,
            "dependencies": [],
            "priority": "high",
            "estimated_hours": 3
        });
        let task: Task = serde_json::from_value(raw).unwrap();
        assert_eq!(task.status, TaskStatus::Waiting);

        let back = serde_json::to_value(&task).unwrap();
        assert_eq!(back["priority"], "high");
        assert_eq!(back["estimated_hours"], 3);
        assert_eq!(back["status"], "ממתין");
    }

    #[test]
    fn legacy_completed_status_counts_as_done() {
        let status = TaskStatus::from("completed".to_string());
        assert!(status.is_done());
        assert_eq!(status.as_str(), "completed");
        assert!(TaskStatus::parse("done").is_done());
        assert!(!TaskStatus::parse("waiting").is_done());
    }

    #[test]
    fn non_list_dependencies_become_empty() {
        let task: Task =
            serde_json::from_value(json!({"id": "t", "dependencies": {"x": 1}})).unwrap();
        assert!(task.dependencies.is_empty());
    }

    #[test]
    fn amounts_keep_their_stored_form() {
        let charge: Charge = serde_json::from_value(
            json!({"id": "x", "amount": 99.5, "our_cost": 80}),
        )
        .unwrap();
        assert_eq!(charge.amount.as_f64(), 99.5);

        let back = serde_json::to_value(&charge).unwrap();
        assert_eq!(back["amount"], json!(99.5));
        assert_eq!(back["our_cost"], json!(80));
        assert!(back["our_cost"].is_i64());

        let client: Client =
            serde_json::from_value(json!({"id": "c", "retainer": 1500})).unwrap();
        assert_eq!(serde_json::to_value(&client).unwrap()["retainer"], json!(1500));
    }

    #[test]
    fn amount_strings_and_nulls() {
        let charge: Charge =
            serde_json::from_value(json!({"id": "x", "amount": "250.9", "our_cost": null}))
                .unwrap();
        assert_eq!(charge.amount.as_f64(), 250.9);
        assert_eq!(charge.our_cost, Amount::default());

        assert_eq!("400".parse::<Amount>().unwrap(), Amount::integer(400));
        assert_eq!("12.25".parse::<Amount>().unwrap().as_f64(), 12.25);
        assert!("NaN".parse::<Amount>().is_err());
        assert!("abc".parse::<Amount>().is_err());
    }

    #[test]
    fn large_client_numbers_are_kept() {
        let client: Client =
            serde_json::from_value(json!({"id": "c", "client_number": 5_000_000_000_u64}))
                .unwrap();
        assert_eq!(client.client_number, Some(5_000_000_000));
        let back = serde_json::to_value(&client).unwrap();
        assert_eq!(back["client_number"], json!(5_000_000_000_u64));
    }

    #[test]
    fn document_key_handles_numeric_ids() {
        let doc: Document = serde_json::from_value(json!({"id": 42, "name": "x"})).unwrap();
        assert_eq!(doc.key().as_deref(), Some("42"));
        let doc: Document = serde_json::from_value(json!({"name": "no id"})).unwrap();
        assert_eq!(doc.key(), None);
    }
}
