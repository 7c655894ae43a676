#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

/// Isolated data directory for one test
pub struct TestEnv {
    dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create tempdir"),
        }
    }

    pub fn data_dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_config(&self, contents: &str) -> PathBuf {
        let path = self.dir.path().join("questlog.toml");
        fs::write(&path, contents).expect("write config");
        path
    }

    pub fn read_json(&self, name: &str) -> Value {
        let raw = fs::read_to_string(self.dir.path().join(name)).expect("read data file");
        serde_json::from_str(&raw).expect("parse data file")
    }

    /// `ql` bound to this data directory
    pub fn ql(&self) -> Command {
        let mut cmd = ql_cmd();
        cmd.env("QL_DATA_DIR", self.dir.path());
        cmd
    }

    /// Run `ql --json <args>`, assert success and return the `data` payload
    pub fn json(&self, args: &[&str]) -> Value {
        let output = self
            .ql()
            .arg("--json")
            .args(args)
            .output()
            .expect("run ql");
        assert!(
            output.status.success(),
            "ql {:?} failed: {}{}",
            args,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        let envelope: Value = serde_json::from_slice(&output.stdout).expect("json envelope");
        assert_eq!(envelope["schema_version"], "ql.v1");
        assert_eq!(envelope["status"], "success");
        envelope["data"].clone()
    }

    /// Create a task and return its id
    pub fn add_task(&self, args: &[&str]) -> String {
        let mut full = vec!["task", "add"];
        full.extend_from_slice(args);
        let data = self.json(&full);
        data["id"].as_str().expect("task id").to_string()
    }
}

pub fn ql_cmd() -> Command {
    let mut cmd = Command::cargo_bin("ql").expect("binary");
    cmd.env_remove("RUST_LOG")
        .env_remove("QL_DATA_DIR")
        .env_remove("NOTION_DATABASE_ID");
    cmd
}
