//! Command-line interface for agency-store
//!
//! This module defines the CLI structure using clap derive macros.
//! Each command group is defined in its own submodule.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::{is_truthy, BackendKind, Config, Overrides, LEGACY_DATABASE_ENV};
use crate::error::Result;
use crate::model::Amount;
use crate::output::OutputOptions;
use crate::repository::Repository;

mod charge;
mod client;
mod collection;
mod init;
mod migrate;
mod project;
mod task;
mod timer;

/// agency-store - entity store for an agency-management app
///
/// Keeps clients, projects, tasks, charges, supporting documents and
/// time-tracking sessions in JSON files or SQLite, and hands out
/// hierarchical record numbers.
#[derive(Parser, Debug)]
#[command(name = "agency-store")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to agency.toml
    #[arg(long, global = true, env = "AGENCY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Data directory (overrides storage.data_dir)
    #[arg(long, global = true, env = "AGENCY_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Storage backend (overrides storage.backend)
    #[arg(long, global = true, env = "AGENCY_BACKEND", value_enum)]
    pub backend: Option<BackendKind>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the data directory and seed default collections
    Init,

    /// Client management
    #[command(subcommand)]
    Client(ClientCommands),

    /// Project management
    #[command(subcommand)]
    Project(ProjectCommands),

    /// Task management
    #[command(subcommand)]
    Task(TaskCommands),

    /// Extra charges billed to a client
    #[command(subcommand)]
    Charge(ChargeCommands),

    /// Time tracking
    #[command(subcommand)]
    Timer(TimerCommands),

    /// Equipment bank
    #[command(subcommand)]
    Equipment(EquipmentCommands),

    /// Print a whole collection as JSON
    Collection {
        /// Collection to print
        #[arg(value_enum)]
        name: CollectionName,
    },

    /// Copy the JSON files in the data directory into the SQLite database
    Migrate {
        /// Database file to write (defaults to storage.database)
        #[arg(long)]
        database: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ClientCommands {
    /// Add a client; the next client number is assigned
    Add {
        name: String,

        /// Monthly retainer
        #[arg(long, default_value = "0")]
        retainer: Amount,

        /// Assigned user id (repeatable)
        #[arg(long = "assigned-user")]
        assigned_users: Vec<String>,
    },

    /// List clients
    List {
        /// Include archived clients
        #[arg(long)]
        all: bool,
    },

    /// Show a client with its projects, tasks and charges
    Show { id: String },

    /// Archive a client
    Archive { id: String },

    /// Bring an archived client back
    Restore { id: String },
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommands {
    /// Add a project to a client
    Add { client: String, title: String },

    /// Move a project to the client's archived projects
    Remove { client: String, project: String },
}

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Add a task to a project
    Add {
        client: String,
        project: String,
        title: String,

        /// Initial status (todo, waiting, in_progress, done, or a stored value)
        #[arg(long)]
        status: Option<String>,

        /// Deadline (free text, usually YYYY-MM-DD)
        #[arg(long)]
        deadline: Option<String>,

        /// Task id this task depends on (repeatable)
        #[arg(long = "depends-on")]
        dependencies: Vec<String>,
    },

    /// Change a task's status
    Status {
        client: String,
        project: String,
        task: String,
        status: String,
    },

    /// Remove a task and cancel sessions tracking it
    Remove {
        client: String,
        project: String,
        task: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ChargeCommands {
    /// Add a charge to a client
    Add {
        client: String,
        title: String,
        amount: Amount,

        /// Internal cost of the charge
        #[arg(long, default_value = "0")]
        our_cost: Amount,

        /// Charge date (defaults to today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Flip a charge between open and completed
    Toggle { client: String, charge: String },

    /// Set the internal cost of a charge
    Cost {
        client: String,
        charge: String,
        our_cost: Amount,
    },

    /// Move a charge to the client's archived charges
    Remove { client: String, charge: String },
}

#[derive(Subcommand, Debug)]
pub enum TimerCommands {
    /// Start a session for a user
    Start {
        #[arg(long)]
        user: String,
        #[arg(long)]
        client: Option<String>,
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        task: Option<String>,
    },

    /// Stop the user's session and record an entry
    Stop {
        #[arg(long)]
        user: String,
        #[arg(long, default_value = "")]
        note: String,
    },

    /// Drop the user's session without recording it
    Cancel {
        #[arg(long)]
        user: String,
    },

    /// Show the user's active session
    Show {
        #[arg(long)]
        user: String,
    },

    /// List recorded entries
    Entries {
        /// Only entries for this user
        #[arg(long)]
        user: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum EquipmentCommands {
    /// List the equipment bank
    List,

    /// Add an item to the equipment bank
    Add { name: String },

    /// Remove an item from the equipment bank
    Remove { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum CollectionName {
    Clients,
    Suppliers,
    Quotes,
    Messages,
    Events,
    Forms,
    EquipmentBank,
    ChecklistTemplates,
    TimeTracking,
}

/// Global options every command needs to reach the store.
#[derive(Debug, Clone)]
pub struct StoreArgs {
    pub config: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub backend: Option<BackendKind>,
    pub json: bool,
    pub quiet: bool,
}

impl StoreArgs {
    pub fn output(&self) -> OutputOptions {
        OutputOptions {
            json: self.json,
            quiet: self.quiet,
        }
    }

    pub fn config(&self) -> Result<Config> {
        let mut config = Config::discover(self.config.as_deref())?;
        config.apply_overrides(&Overrides {
            data_dir: self.data_dir.clone(),
            backend: self.backend,
            use_database: std::env::var(LEGACY_DATABASE_ENV)
                .map(|raw| is_truthy(&raw))
                .unwrap_or(false),
        });
        Ok(config)
    }

    pub fn open(&self) -> Result<Repository> {
        Repository::open(&self.config()?)
    }
}

impl Cli {
    fn store_args(&self) -> StoreArgs {
        StoreArgs {
            config: self.config.clone(),
            data_dir: self.data_dir.clone(),
            backend: self.backend,
            json: self.json,
            quiet: self.quiet,
        }
    }

    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let store = self.store_args();
        match self.command {
            Commands::Init => init::run(store),
            Commands::Client(cmd) => match cmd {
                ClientCommands::Add {
                    name,
                    retainer,
                    assigned_users,
                } => client::run_add(client::AddOptions {
                    name,
                    retainer,
                    assigned_users,
                    store,
                }),
                ClientCommands::List { all } => {
                    client::run_list(client::ListOptions { all, store })
                }
                ClientCommands::Show { id } => client::run_show(client::ShowOptions { id, store }),
                ClientCommands::Archive { id } => client::run_set_archived(id, true, store),
                ClientCommands::Restore { id } => client::run_set_archived(id, false, store),
            },
            Commands::Project(cmd) => match cmd {
                ProjectCommands::Add { client, title } => {
                    project::run_add(project::AddOptions {
                        client,
                        title,
                        store,
                    })
                }
                ProjectCommands::Remove { client, project } => {
                    project::run_remove(project::RemoveOptions {
                        client,
                        project,
                        store,
                    })
                }
            },
            Commands::Task(cmd) => match cmd {
                TaskCommands::Add {
                    client,
                    project,
                    title,
                    status,
                    deadline,
                    dependencies,
                } => task::run_add(task::AddOptions {
                    client,
                    project,
                    title,
                    status,
                    deadline,
                    dependencies,
                    store,
                }),
                TaskCommands::Status {
                    client,
                    project,
                    task,
                    status,
                } => task::run_status(task::StatusOptions {
                    client,
                    project,
                    task,
                    status,
                    store,
                }),
                TaskCommands::Remove {
                    client,
                    project,
                    task,
                } => task::run_remove(task::RemoveOptions {
                    client,
                    project,
                    task,
                    store,
                }),
            },
            Commands::Charge(cmd) => match cmd {
                ChargeCommands::Add {
                    client,
                    title,
                    amount,
                    our_cost,
                    date,
                } => charge::run_add(charge::AddOptions {
                    client,
                    title,
                    amount,
                    our_cost,
                    date,
                    store,
                }),
                ChargeCommands::Toggle { client, charge } => {
                    charge::run_toggle(charge::TargetOptions {
                        client,
                        charge,
                        store,
                    })
                }
                ChargeCommands::Cost {
                    client,
                    charge,
                    our_cost,
                } => charge::run_cost(
                    charge::TargetOptions {
                        client,
                        charge,
                        store,
                    },
                    our_cost,
                ),
                ChargeCommands::Remove { client, charge } => {
                    charge::run_remove(charge::TargetOptions {
                        client,
                        charge,
                        store,
                    })
                }
            },
            Commands::Timer(cmd) => match cmd {
                TimerCommands::Start {
                    user,
                    client,
                    project,
                    task,
                } => timer::run_start(timer::StartOptions {
                    user,
                    client,
                    project,
                    task,
                    store,
                }),
                TimerCommands::Stop { user, note } => {
                    timer::run_stop(timer::StopOptions { user, note, store })
                }
                TimerCommands::Cancel { user } => timer::run_cancel(user, store),
                TimerCommands::Show { user } => timer::run_show(user, store),
                TimerCommands::Entries { user } => timer::run_entries(user, store),
            },
            Commands::Equipment(cmd) => match cmd {
                EquipmentCommands::List => collection::run_equipment_list(store),
                EquipmentCommands::Add { name } => collection::run_equipment_add(name, store),
                EquipmentCommands::Remove { name } => {
                    collection::run_equipment_remove(name, store)
                }
            },
            Commands::Collection { name } => collection::run_show(name, store),
            Commands::Migrate { database } => migrate::run(database, store),
        }
    }
}
