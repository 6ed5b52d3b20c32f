//! Error types for the entity store
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, bad config, missing entity or session)
//! - 3: Conflict (user already has an active time-tracking session)
//! - 4: Storage unavailable (I/O, decode, database, lock timeout)

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::ledger::ActiveSession;

/// Exit codes for the agency-store CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const CONFLICT: i32 = 3;
    pub const STORAGE_UNAVAILABLE: i32 = 4;
}

/// Kind of record a lookup failed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Client,
    Project,
    Task,
    Charge,
    ActiveSession,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Client => "client",
            EntityKind::Project => "project",
            EntityKind::Task => "task",
            EntityKind::Charge => "charge",
            EntityKind::ActiveSession => "active session",
        };
        f.write_str(name)
    }
}

/// Main error type for store operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    // Conflicts (exit code 3)
    #[error("User {user_id} already has an active session (started {})", .session.start_time)]
    SessionConflict {
        user_id: String,
        session: Box<ActiveSession>,
    },

    // Storage unavailable (exit code 4)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Corrupt record in {collection}: {reason}")]
    CorruptRecord {
        collection: &'static str,
        reason: String,
    },
}

impl Error {
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidConfig(_) | Error::InvalidArgument(_) | Error::NotFound { .. } => {
                exit_codes::USER_ERROR
            }

            Error::SessionConflict { .. } => exit_codes::CONFLICT,

            Error::Io(_)
            | Error::Json(_)
            | Error::Sqlite(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_)
            | Error::CorruptRecord { .. } => exit_codes::STORAGE_UNAVAILABLE,
        }
    }

    /// True when the persistence medium could not be read or written.
    pub fn is_storage_unavailable(&self) -> bool {
        self.exit_code() == exit_codes::STORAGE_UNAVAILABLE
    }

    /// Structured context for JSON error output.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::NotFound { kind, id } => Some(serde_json::json!({
                "kind": kind,
                "id": id,
            })),
            Error::SessionConflict { user_id, session } => Some(serde_json::json!({
                "user_id": user_id,
                "active_session": session,
            })),
            Error::LockFailed(path) => Some(serde_json::json!({ "lock": path })),
            _ => None,
        }
    }
}

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, Error>;
