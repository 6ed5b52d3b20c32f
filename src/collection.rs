//! Named collections and how each one is persisted
//!
//! A collection is always loaded and saved whole. The file backend stores the
//! value as one JSON document; the relational backend splits it into rows
//! (one JSON payload per top-level element) across one or more tables.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::backfill::assign_missing_client_numbers;
use crate::error::Result;
use crate::ledger::{ActiveSession, TimeEntry, TimeTrackingLedger, DEFAULT_STALE_AFTER_HOURS};
use crate::model::{Client, Document};

/// One persisted element: its primary key and JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub key: String,
    pub payload: Value,
}

/// How the relational backend applies a save to a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Insert or update every row; rows missing from the save are kept.
    Upsert,
    /// Delete everything, then insert, in one transaction.
    Replace,
}

#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    pub name: &'static str,
    pub mode: WriteMode,
}

/// Inputs to the repair pass that runs on every load.
#[derive(Debug, Clone, Copy)]
pub struct LoadContext {
    pub now: DateTime<Utc>,
    pub stale_after: Duration,
}

impl Default for LoadContext {
    fn default() -> Self {
        Self {
            now: Utc::now(),
            stale_after: Duration::hours(DEFAULT_STALE_AFTER_HOURS),
        }
    }
}

pub trait Collection {
    type Value: Serialize + DeserializeOwned + Default + Clone;

    const NAME: &'static str;
    const FILE: &'static str;
    const TABLES: &'static [TableSpec];

    /// Value persisted on first load when nothing is stored yet.
    fn seed() -> Option<Self::Value> {
        None
    }

    /// Fix up a freshly loaded value. Returns true when it changed and must be
    /// written back.
    fn repair(_value: &mut Self::Value, _ctx: &LoadContext) -> bool {
        false
    }

    /// Split into rows, one list per entry in `TABLES`.
    fn to_rows(value: &Self::Value) -> Result<Vec<Vec<Row>>>;

    /// Rebuild from rows, one list per entry in `TABLES`, each in stored order.
    fn from_rows(tables: Vec<Vec<Row>>) -> Result<Self::Value>;
}

// =============================================================================
// Row helpers
// =============================================================================

/// Serialize keyed elements; elements without a usable key are skipped, as are
/// later duplicates of a key already seen.
fn keyed_rows<'a, T, I, K>(collection: &str, items: I, key: K) -> Result<Vec<Row>>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
    K: Fn(&T) -> Option<String>,
{
    let mut seen = HashSet::new();
    let mut rows = Vec::new();
    for (position, item) in items.into_iter().enumerate() {
        let Some(id) = key(item).filter(|k| !k.trim().is_empty()) else {
            warn!(collection, position, "skipping element without id");
            continue;
        };
        if !seen.insert(id.clone()) {
            warn!(collection, key = %id, "skipping duplicate key");
            continue;
        }
        rows.push(Row {
            key: id,
            payload: serde_json::to_value(item)?,
        });
    }
    Ok(rows)
}

fn from_payloads<T: DeserializeOwned>(rows: Vec<Row>) -> Result<Vec<T>> {
    rows.into_iter()
        .map(|row| -> Result<T> { Ok(serde_json::from_value(row.payload)?) })
        .collect()
}

fn single_table(mut tables: Vec<Vec<Row>>) -> Vec<Row> {
    if tables.is_empty() {
        Vec::new()
    } else {
        tables.swap_remove(0)
    }
}

// =============================================================================
// Clients
// =============================================================================

pub struct Clients;

impl Collection for Clients {
    type Value = Vec<Client>;

    const NAME: &'static str = "clients";
    const FILE: &'static str = "agency_db.json";
    const TABLES: &'static [TableSpec] = &[TableSpec {
        name: "clients",
        mode: WriteMode::Upsert,
    }];

    fn repair(value: &mut Self::Value, _ctx: &LoadContext) -> bool {
        assign_missing_client_numbers(value) > 0
    }

    fn to_rows(value: &Self::Value) -> Result<Vec<Vec<Row>>> {
        Ok(vec![keyed_rows(Self::NAME, value, |c: &Client| {
            Some(c.id.clone())
        })?])
    }

    fn from_rows(tables: Vec<Vec<Row>>) -> Result<Self::Value> {
        from_payloads(single_table(tables))
    }
}

// =============================================================================
// Loosely typed document collections
// =============================================================================

macro_rules! document_collection {
    ($ty:ident, $name:literal, $file:literal) => {
        pub struct $ty;

        impl Collection for $ty {
            type Value = Vec<Document>;

            const NAME: &'static str = $name;
            const FILE: &'static str = $file;
            const TABLES: &'static [TableSpec] = &[TableSpec {
                name: $name,
                mode: WriteMode::Upsert,
            }];

            fn to_rows(value: &Self::Value) -> Result<Vec<Vec<Row>>> {
                Ok(vec![keyed_rows(Self::NAME, value, Document::key)?])
            }

            fn from_rows(tables: Vec<Vec<Row>>) -> Result<Self::Value> {
                from_payloads(single_table(tables))
            }
        }
    };
}

document_collection!(Suppliers, "suppliers", "suppliers_db.json");
document_collection!(Quotes, "quotes", "quotes_db.json");
document_collection!(Messages, "messages", "messages_db.json");
document_collection!(Events, "events", "events_db.json");
document_collection!(Forms, "forms", "forms_db.json");

// =============================================================================
// Equipment bank
// =============================================================================

pub const DEFAULT_EQUIPMENT: [&str; 12] = [
    "מקרן",
    "הגברה",
    "מיקרופון",
    "מסך/פליפ-צ'ארט",
    "שולחן",
    "כסאות",
    "מתנות לאורחים",
    "רול-אפים",
    "באנרים",
    "פלטה/במה",
    "תאורה",
    "שולחן עגול",
];

pub struct EquipmentBank;

impl Collection for EquipmentBank {
    type Value = Vec<String>;

    const NAME: &'static str = "equipment_bank";
    const FILE: &'static str = "equipment_bank.json";
    const TABLES: &'static [TableSpec] = &[TableSpec {
        name: "equipment",
        mode: WriteMode::Replace,
    }];

    fn seed() -> Option<Self::Value> {
        Some(DEFAULT_EQUIPMENT.iter().map(|s| s.to_string()).collect())
    }

    fn to_rows(value: &Self::Value) -> Result<Vec<Vec<Row>>> {
        Ok(vec![keyed_rows(Self::NAME, value, |name: &String| {
            Some(name.clone())
        })?])
    }

    fn from_rows(tables: Vec<Vec<Row>>) -> Result<Self::Value> {
        from_payloads(single_table(tables))
    }
}

// =============================================================================
// Checklist templates
// =============================================================================

pub type ChecklistMap = BTreeMap<String, Vec<String>>;

pub struct ChecklistTemplates;

impl ChecklistTemplates {
    pub const CONFERENCE: &'static str = "כנס";
    pub const WEDDING: &'static str = "חתונה";
    pub const LAUNCH: &'static str = "השקה";

    fn defaults() -> ChecklistMap {
        let conference = [
            "הזמנת קייטרינג",
            "עיצוב רול-אפים",
            "שליחת Save the date",
            "הזמנת הגברה ותאורה",
            "הזמנת מקרן ומסך",
            "הזמנת מקומות ישיבה",
            "אישור מיקום",
            "הזמנת צלמים/וידאו",
            "הכנת מצגות",
            "הזמנת מתנות למשתתפים",
        ];
        let wedding = [
            "אישור אולם",
            "הזמנת קייטרינג",
            "הזמנת הגברה ודי.ג'יי",
            "הזמנת צלמים/וידאו",
            "הזמנת פרחים ועיצוב",
            "הזמנת בוקונז'ה/מתנות לאורחים",
            "הזמנת שולחנות וכסאות",
            "הזמנת מתנות לחתן וכלה",
            "אישור תאריכים עם כל הספקים",
            "שליחת הזמנות",
        ];
        let launch = [
            "אישור מיקום",
            "הזמנת קייטרינג/קפה",
            "עיצוב חומרי שיווק",
            "הזמנת הגברה",
            "הזמנת צלמים/וידאו",
            "שליחת הזמנות",
            "הכנת מצגת/סרטון",
            "הזמנת מתנות למשתתפים",
            "הזמנת פרחים/עיצוב",
            "אישור תאריכים",
        ];

        let to_vec = |items: [&str; 10]| items.iter().map(|s| s.to_string()).collect();
        BTreeMap::from([
            (Self::CONFERENCE.to_string(), to_vec(conference)),
            (Self::WEDDING.to_string(), to_vec(wedding)),
            (Self::LAUNCH.to_string(), to_vec(launch)),
        ])
    }
}

impl Collection for ChecklistTemplates {
    type Value = ChecklistMap;

    const NAME: &'static str = "checklist_templates";
    const FILE: &'static str = "checklist_templates.json";
    const TABLES: &'static [TableSpec] = &[TableSpec {
        name: "checklist_templates",
        mode: WriteMode::Replace,
    }];

    fn seed() -> Option<Self::Value> {
        Some(Self::defaults())
    }

    fn to_rows(value: &Self::Value) -> Result<Vec<Vec<Row>>> {
        let rows = value
            .iter()
            .map(|(category, items)| -> Result<Row> {
                Ok(Row {
                    key: category.clone(),
                    payload: serde_json::to_value(items)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(vec![rows])
    }

    fn from_rows(tables: Vec<Vec<Row>>) -> Result<Self::Value> {
        single_table(tables)
            .into_iter()
            .map(|row| -> Result<(String, Vec<String>)> {
                Ok((row.key, serde_json::from_value(row.payload)?))
            })
            .collect()
    }
}

// =============================================================================
// Time tracking
// =============================================================================

pub struct TimeTracking;

impl Collection for TimeTracking {
    type Value = TimeTrackingLedger;

    const NAME: &'static str = "time_tracking";
    const FILE: &'static str = "time_tracking.json";
    const TABLES: &'static [TableSpec] = &[
        TableSpec {
            name: "time_tracking_entries",
            mode: WriteMode::Upsert,
        },
        TableSpec {
            name: "time_tracking_active_sessions",
            mode: WriteMode::Replace,
        },
    ];

    fn repair(value: &mut Self::Value, ctx: &LoadContext) -> bool {
        value.drop_stale_at(ctx.now, ctx.stale_after) > 0
    }

    fn to_rows(value: &Self::Value) -> Result<Vec<Vec<Row>>> {
        let entries = keyed_rows(Self::NAME, &value.entries, |e: &TimeEntry| {
            Some(e.id.clone())
        })?;
        let sessions = value
            .active_sessions
            .iter()
            .map(|(user_id, session)| -> Result<Row> {
                Ok(Row {
                    key: user_id.clone(),
                    payload: serde_json::to_value(session)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(vec![entries, sessions])
    }

    fn from_rows(mut tables: Vec<Vec<Row>>) -> Result<Self::Value> {
        let sessions = if tables.len() > 1 {
            tables.swap_remove(1)
        } else {
            Vec::new()
        };
        let entries = single_table(tables);

        let active_sessions = sessions
            .into_iter()
            .map(|row| -> Result<(String, ActiveSession)> {
                let session: ActiveSession = serde_json::from_value(row.payload)?;
                Ok((row.key, session))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        Ok(TimeTrackingLedger {
            entries: from_payloads(entries)?,
            active_sessions,
        })
    }
}
