#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

/// A scratch working directory with its own data directory.
pub struct TestStore {
    dir: TempDir,
    backend: &'static str,
}

impl TestStore {
    pub fn new(backend: &'static str) -> std::io::Result<Self> {
        let dir = TempDir::new()?;
        fs::create_dir_all(dir.path().join("data"))?;
        Ok(Self { dir, backend })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn data_dir(&self) -> PathBuf {
        self.dir.path().join("data")
    }

    pub fn write_data_file(&self, name: &str, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.data_dir().join(name);
        fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn read_data_file(&self, name: &str) -> Result<Value, Box<dyn std::error::Error>> {
        let raw = fs::read_to_string(self.data_dir().join(name))?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Command running in the scratch directory against its data directory.
    pub fn cmd(&self) -> Command {
        let mut cmd = agency_cmd();
        cmd.current_dir(self.path())
            .args(["--data-dir", "data", "--backend", self.backend]);
        cmd
    }

    /// Run with `--json`, expect success and return the `data` field.
    pub fn json(&self, args: &[&str]) -> Result<Value, Box<dyn std::error::Error>> {
        let output = self
            .cmd()
            .args(args)
            .arg("--json")
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let value: Value = serde_json::from_slice(&output)?;
        assert_eq!(value["status"], "success");
        Ok(value["data"].clone())
    }

    /// Run with `--json`, expect failure with `code` and return the envelope.
    pub fn json_err(&self, args: &[&str], code: i32) -> Result<Value, Box<dyn std::error::Error>> {
        let output = self
            .cmd()
            .args(args)
            .arg("--json")
            .assert()
            .code(code)
            .get_output()
            .stdout
            .clone();
        Ok(serde_json::from_slice(&output)?)
    }
}

pub fn agency_cmd() -> Command {
    let mut cmd = Command::cargo_bin("agency-store").expect("binary");
    for var in [
        "AGENCY_CONFIG",
        "AGENCY_DATA_DIR",
        "AGENCY_BACKEND",
        "USE_DATABASE",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

pub fn str_field(value: &Value, field: &str) -> String {
    value[field]
        .as_str()
        .unwrap_or_else(|| panic!("missing string field {field} in {value}"))
        .to_string()
}
