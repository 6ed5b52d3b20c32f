//! Configuration loading and management
//!
//! Handles parsing of `agency.toml`. Every field has a default, so a missing
//! file yields a working file-backed store in `./data`.

use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::lock::DEFAULT_LOCK_TIMEOUT_MS;

pub const CONFIG_FILE_NAME: &str = "agency.toml";

/// Environment switch used by older deployments to turn on the database.
pub const LEGACY_DATABASE_ENV: &str = "USE_DATABASE";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub time_tracking: TimeTrackingConfig,

    #[serde(default)]
    pub concurrency: ConcurrencyConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    File,
    Sqlite,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::File => f.write_str("file"),
            BackendKind::Sqlite => f.write_str("sqlite"),
        }
    }
}

/// Where and how collections are persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: BackendKind,

    /// Directory holding the JSON files, the lock file and (by default) the database
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Database file; relative paths resolve against `data_dir`
    #[serde(default = "default_database")]
    pub database: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_database() -> PathBuf {
    PathBuf::from("agency.db")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            data_dir: default_data_dir(),
            database: default_database(),
        }
    }
}

impl StorageConfig {
    pub fn database_path(&self, data_dir: &Path) -> PathBuf {
        if self.database.is_absolute() {
            self.database.clone()
        } else {
            data_dir.join(&self.database)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeTrackingConfig {
    /// Active sessions older than this are dropped on load (e.g. "2h", "90m")
    #[serde(default = "default_stale_after")]
    pub stale_after: String,
}

fn default_stale_after() -> String {
    "2h".to_string()
}

impl Default for TimeTrackingConfig {
    fn default() -> Self {
        Self {
            stale_after: default_stale_after(),
        }
    }
}

impl TimeTrackingConfig {
    pub fn stale_after(&self) -> Result<Duration> {
        parse_duration(&self.stale_after)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    /// Hold an exclusive lock across each load/mutate/save cycle
    #[serde(default)]
    pub lock: bool,

    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            lock: false,
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

/// Values given on the command line or in the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub data_dir: Option<PathBuf>,
    pub backend: Option<BackendKind>,
    pub use_database: bool,
}

impl Config {
    /// Load configuration from an `agency.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Use `explicit` when given, else `./agency.toml`, else the per-user
    /// config directory, else defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        let candidates = [Some(PathBuf::from(CONFIG_FILE_NAME)), user_config_path()];
        for path in candidates.into_iter().flatten() {
            if path.exists() {
                debug!(path = %path.display(), "loading config");
                return Self::load(&path);
            }
        }
        Ok(Self::default())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(dir) = &overrides.data_dir {
            self.storage.data_dir = dir.clone();
        }
        match overrides.backend {
            Some(kind) => self.storage.backend = kind,
            None if overrides.use_database => self.storage.backend = BackendKind::Sqlite,
            None => {}
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.storage.data_dir
    }

    fn validate(&self) -> Result<()> {
        if self.storage.data_dir.as_os_str().is_empty() {
            return Err(Error::InvalidConfig(
                "storage.data_dir cannot be empty".to_string(),
            ));
        }
        if self.storage.database.as_os_str().is_empty() {
            return Err(Error::InvalidConfig(
                "storage.database cannot be empty".to_string(),
            ));
        }

        let stale_after = self.time_tracking.stale_after().map_err(|err| {
            Error::InvalidConfig(format!("time_tracking.stale_after: {err}"))
        })?;
        if stale_after <= Duration::zero() {
            return Err(Error::InvalidConfig(
                "time_tracking.stale_after must be > 0".to_string(),
            ));
        }

        if self.concurrency.lock_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "concurrency.lock_timeout_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "agency-store")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

/// True for the values older deployments used to switch the database on.
pub fn is_truthy(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Parse a duration string like "2h", "30m", "1d"
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();

    if s.is_empty() {
        return Err(Error::InvalidArgument("Duration cannot be empty".to_string()));
    }

    let (num_str, unit) = if let Some(pos) = s.find(|c: char| !c.is_ascii_digit()) {
        (&s[..pos], &s[pos..])
    } else {
        // Bare numbers are minutes
        (s, "m")
    };

    let num: i64 = num_str
        .parse()
        .map_err(|_| Error::InvalidArgument(format!("Invalid duration number: {}", num_str)))?;

    let duration = match unit.trim().to_lowercase().as_str() {
        "s" | "sec" | "second" | "seconds" => Duration::try_seconds(num),
        "m" | "min" | "minute" | "minutes" => Duration::try_minutes(num),
        "h" | "hr" | "hour" | "hours" => Duration::try_hours(num),
        "d" | "day" | "days" => Duration::try_days(num),
        _ => {
            return Err(Error::InvalidArgument(format!(
                "Invalid duration unit '{}'. Expected: s, m, h, d",
                unit
            )));
        }
    };

    duration.ok_or_else(|| Error::InvalidArgument(format!("Duration out of range: {s}")))
}
