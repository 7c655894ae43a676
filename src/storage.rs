//! Storage layer for questlog
//!
//! All local state lives in one data directory:
//!
//! ```text
//! <data-dir>/
//!   questlog.toml        # Configuration
//!   tasks.json           # Local task store
//!   tasks.json.lock      # Lock guarding task read-modify-write
//!   ledger.json          # Points ledger (points, history, stats)
//!   ledger.json.lock     # Lock guarding ledger read-modify-write
//! ```
//!
//! The data directory defaults to the platform data dir
//! (`directories::ProjectDirs`) and can be overridden with `--data-dir`
//! or `QL_DATA_DIR`.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Error, Result};
use crate::lock;

/// Configuration file name inside the data directory
pub const CONFIG_FILE: &str = "questlog.toml";

/// Local task store file name
pub const TASKS_FILE: &str = "tasks.json";

/// Points ledger file name
pub const LEDGER_FILE: &str = "ledger.json";

/// Handle on an opened data directory
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    /// Open (and create if needed) the data directory at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        tracing::debug!(root = %root.display(), "opened data directory");
        Ok(Self { root })
    }

    /// Open the explicit directory if given, else the platform default.
    pub fn open_default(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::open(path),
            None => Self::open(default_data_dir()?),
        }
    }

    // =========================================================================
    // Path accessors
    // =========================================================================

    /// Root of the data directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to `questlog.toml`
    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    /// Path to the local task store
    pub fn tasks_file(&self) -> PathBuf {
        self.root.join(TASKS_FILE)
    }

    /// Path to the points ledger
    pub fn ledger_file(&self) -> PathBuf {
        self.root.join(LEDGER_FILE)
    }

    // =========================================================================
    // File I/O helpers (atomic writes for safety)
    // =========================================================================

    /// Write JSON atomically (temp file + rename)
    pub fn write_json<T: Serialize>(&self, path: &Path, data: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;
        lock::write_atomic(path, json.as_bytes())
    }

    /// Read JSON, returning `None` when the file does not exist yet
    pub fn read_json_opt<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(None);
        }
        let data: T = serde_json::from_str(&content)?;
        Ok(Some(data))
    }
}

/// Platform data directory for questlog
pub fn default_data_dir() -> Result<PathBuf> {
    ProjectDirs::from("", "", "questlog")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| {
            Error::InvalidConfig(
                "cannot determine a data directory; pass --data-dir".to_string(),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn open_creates_directory() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("a").join("b");
        let storage = Storage::open(&root).unwrap();
        assert!(root.is_dir());
        assert_eq!(storage.tasks_file(), root.join(TASKS_FILE));
        assert_eq!(storage.ledger_file(), root.join(LEDGER_FILE));
        assert_eq!(storage.config_file(), root.join(CONFIG_FILE));
    }

    #[test]
    fn json_round_trip_and_missing_file() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::open(temp.path()).unwrap();
        let path = storage.root().join("data.json");

        let missing: Option<Vec<String>> = storage.read_json_opt(&path).unwrap();
        assert!(missing.is_none());

        storage
            .write_json(&path, &vec!["a".to_string(), "b".to_string()])
            .unwrap();
        let loaded: Option<Vec<String>> = storage.read_json_opt(&path).unwrap();
        assert_eq!(loaded.unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn empty_file_reads_as_none() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::open(temp.path()).unwrap();
        let path = storage.root().join("empty.json");
        fs::write(&path, "  \n").unwrap();
        let loaded: Option<Vec<String>> = storage.read_json_opt(&path).unwrap();
        assert!(loaded.is_none());
    }
}
