//! agency-store - entity store for an agency-management app
//!
//! Keeps the app's business records (clients with their projects, tasks and
//! extra charges, plus suppliers, quotes, messages, events, forms, the
//! equipment bank, checklist templates and time tracking) in named
//! collections, persisted either as JSON files or in SQLite.
//!
//! # Module Organization
//!
//! - `model`: record types, tolerant of legacy data
//! - `numbering`: hierarchical client, project, task and charge numbers
//! - `backfill`: assigns numbers to clients stored without one
//! - `clients`: edits to the client book (projects, tasks, charges)
//! - `ledger`: time-tracking sessions and entries
//! - `collection`: the named collections and their row layout
//! - `backend`: JSON file and SQLite persistence
//! - `repository`: whole-collection load, update and migration
//! - `config`: `agency.toml` loading and overrides
//! - `lock`: file locking and atomic writes
//! - `cli`, `output`: the command-line surface

pub mod backend;
pub mod backfill;
pub mod cli;
pub mod clients;
pub mod collection;
pub mod config;
pub mod error;
pub mod ledger;
pub mod lock;
pub mod model;
pub mod numbering;
pub mod output;
pub mod repository;

pub use error::{Error, Result};
