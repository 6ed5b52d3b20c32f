//! Time-tracking session ledger
//!
//! Each user is either idle or has exactly one active session. Stopping a
//! session closes it into an entry; cancelling drops it. Sessions left running
//! past the stale threshold are reclaimed on load without producing an entry.
//!
//! Session start times are stored as text. New sessions use RFC 3339 in UTC;
//! older data has naive local timestamps, which are read as local time.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{EntityKind, Error, Result};
use crate::model::{new_id, Extra};

/// Sessions running at least this long are dropped on load.
pub const DEFAULT_STALE_AFTER_HOURS: i64 = 2;

/// What a session is being tracked against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionTarget {
    pub client_id: Option<String>,
    pub project_id: Option<String>,
    pub task_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveSession {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub start_time: String,
    #[serde(flatten)]
    pub extra: Extra,
}

impl ActiveSession {
    pub fn started_at(&self) -> Option<DateTime<FixedOffset>> {
        parse_timestamp(&self.start_time)
    }

    pub fn is_for_task(&self, client_id: &str, project_id: &str, task_id: &str) -> bool {
        self.client_id.as_deref() == Some(client_id)
            && self.project_id.as_deref() == Some(project_id)
            && self.task_id.as_deref() == Some(task_id)
    }
}

/// A closed session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
    #[serde(default)]
    pub duration_seconds: i64,
    #[serde(default)]
    pub duration_hours: f64,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub date: String,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeTrackingLedger {
    #[serde(default)]
    pub entries: Vec<TimeEntry>,
    #[serde(default)]
    pub active_sessions: BTreeMap<String, ActiveSession>,
}

impl TimeTrackingLedger {
    pub fn active(&self, user_id: &str) -> Option<&ActiveSession> {
        self.active_sessions.get(user_id.trim())
    }

    pub fn entries_for<'a>(&'a self, user_id: &'a str) -> impl Iterator<Item = &'a TimeEntry> {
        let user_id = user_id.trim();
        self.entries.iter().filter(move |e| e.user_id == user_id)
    }

    pub fn start(&mut self, user_id: &str, target: SessionTarget) -> Result<&ActiveSession> {
        self.start_at(user_id, target, Utc::now())
    }

    /// Open a session for `user_id`. Fails with the existing session when the
    /// user already has one.
    pub fn start_at(
        &mut self,
        user_id: &str,
        target: SessionTarget,
        now: DateTime<Utc>,
    ) -> Result<&ActiveSession> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(Error::InvalidArgument("user id cannot be empty".to_string()));
        }
        if let Some(existing) = self.active_sessions.get(user_id) {
            return Err(Error::SessionConflict {
                user_id: user_id.to_string(),
                session: Box::new(existing.clone()),
            });
        }

        let session = ActiveSession {
            id: new_id(),
            user_id: user_id.to_string(),
            client_id: target.client_id,
            project_id: target.project_id,
            task_id: target.task_id,
            start_time: now.to_rfc3339(),
            extra: Extra::new(),
        };
        let session = self
            .active_sessions
            .entry(user_id.to_string())
            .or_insert(session);
        Ok(&*session)
    }

    pub fn stop(&mut self, user_id: &str, note: &str) -> Result<TimeEntry> {
        self.stop_at(user_id, note, Utc::now())
    }

    /// Close the user's session into an entry and return it.
    pub fn stop_at(&mut self, user_id: &str, note: &str, now: DateTime<Utc>) -> Result<TimeEntry> {
        let user_id = user_id.trim();
        let session = self
            .active_sessions
            .get(user_id)
            .ok_or_else(|| Error::not_found(EntityKind::ActiveSession, user_id))?;

        let started = session.started_at().ok_or_else(|| Error::CorruptRecord {
            collection: "time_tracking",
            reason: format!(
                "session {} has unparsable start_time '{}'",
                session.id, session.start_time
            ),
        })?;

        let duration_seconds = (now - started.with_timezone(&Utc)).num_seconds().max(0);
        let entry = TimeEntry {
            id: session.id.clone(),
            user_id: user_id.to_string(),
            client_id: session.client_id.clone(),
            project_id: session.project_id.clone(),
            task_id: session.task_id.clone(),
            start_time: session.start_time.clone(),
            end_time: now.to_rfc3339(),
            duration_seconds,
            duration_hours: round_hours(duration_seconds),
            note: note.to_string(),
            date: started.date_naive().to_string(),
            extra: session.extra.clone(),
        };

        self.active_sessions.remove(user_id);
        self.entries.push(entry.clone());
        Ok(entry)
    }

    /// Drop the user's session without recording anything.
    pub fn cancel(&mut self, user_id: &str) -> Result<ActiveSession> {
        let user_id = user_id.trim();
        self.active_sessions
            .remove(user_id)
            .ok_or_else(|| Error::not_found(EntityKind::ActiveSession, user_id))
    }

    /// Drop every session tracking the given task. Used when the task goes away.
    pub fn cancel_for_task(&mut self, client_id: &str, project_id: &str, task_id: &str) -> usize {
        let before = self.active_sessions.len();
        self.active_sessions
            .retain(|_, s| !s.is_for_task(client_id, project_id, task_id));
        before - self.active_sessions.len()
    }

    /// Remove sessions that have been running for at least `threshold`.
    /// Sessions whose start time cannot be read are left in place.
    pub fn drop_stale_at(&mut self, now: DateTime<Utc>, threshold: Duration) -> usize {
        let before = self.active_sessions.len();
        self.active_sessions.retain(|user_id, session| {
            let Some(started) = session.started_at() else {
                warn!(
                    user_id = %user_id,
                    start_time = %session.start_time,
                    "skipping session with unparsable start time"
                );
                return true;
            };
            now - started.with_timezone(&Utc) < threshold
        });

        let dropped = before - self.active_sessions.len();
        if dropped > 0 {
            info!(dropped, "reclaimed stale time-tracking sessions");
        }
        dropped
    }
}

fn round_hours(seconds: i64) -> f64 {
    (seconds as f64 / 3600.0 * 100.0).round() / 100.0
}

/// Parse RFC 3339, falling back to a naive timestamp read as local time.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed);
    }

    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.fixed_offset())
}
