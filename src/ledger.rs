//! Points ledger state and its persistence seam.
//!
//! The ledger is stored as ONE document (`ledger.json`) with three sections,
//! `points`, `history` and `stats`, replaced together on every write so
//! the sections can never disagree on disk.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::badges::BadgeDefinition;
use crate::error::{Error, Result};
use crate::lock::{self, FileLock, DEFAULT_LOCK_TIMEOUT_MS};
use crate::storage::Storage;

pub const LEDGER_SCHEMA_VERSION: &str = "ql.ledger.v1";

/// Points per level unit in the square-root curve
pub const LEVEL_BASE_POINTS: i64 = 1000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PointEntry {
    pub id: String,
    pub action: String,
    pub delta: i64,
    pub timestamp: DateTime<Utc>,
}

impl PointEntry {
    pub fn new(action: impl Into<String>, delta: i64, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            action: action.into(),
            delta,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BadgeState {
    pub id: String,
    pub name: String,
    pub description: String,
    pub acquired: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acquired_at: Option<DateTime<Utc>>,
}

impl BadgeState {
    pub fn locked(definition: &BadgeDefinition) -> Self {
        Self {
            id: definition.id.clone(),
            name: definition.name.clone(),
            description: definition.description.clone(),
            acquired: false,
            acquired_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletionStats {
    pub total: u32,
    pub high_priority: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerStats {
    pub level: u32,
    /// Points earned inside the current level band
    pub current_points: i64,
    /// Total points at which the next level starts
    pub next_level_threshold: i64,
    pub streak_days: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity_date: Option<NaiveDate>,
    #[serde(default)]
    pub badges: Vec<BadgeState>,
    #[serde(default)]
    pub completions: CompletionStats,
}

/// Level reached at `total_points` on the square-root curve:
/// `floor(sqrt(total / 1000)) + 1`. Non-positive totals are level 1.
pub fn level_for(total_points: i64) -> u32 {
    if total_points <= 0 {
        return 1;
    }
    let units = (total_points / LEVEL_BASE_POINTS) as u64;
    // sqrt(floor(x)) floors to the same integer as sqrt(x)
    (integer_sqrt(units) + 1) as u32
}

/// Total points at which `level` begins (`(level - 1)^2 * 1000`).
pub fn level_floor(level: u32) -> i64 {
    let below = i64::from(level.saturating_sub(1));
    below * below * LEVEL_BASE_POINTS
}

/// Total points needed to reach the level after `level` (`level^2 * 1000`).
pub fn next_level_threshold(level: u32) -> i64 {
    let level = i64::from(level);
    level * level * LEVEL_BASE_POINTS
}

fn integer_sqrt(value: u64) -> u64 {
    let mut root = (value as f64).sqrt() as u64;
    while root * root > value {
        root -= 1;
    }
    while (root + 1) * (root + 1) <= value {
        root += 1;
    }
    root
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PointsLedger {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    /// Total points; always the sum of `history` deltas
    pub points: i64,
    /// Oldest first, append-only
    pub history: Vec<PointEntry>,
    pub stats: LedgerStats,
}

fn default_schema_version() -> String {
    LEDGER_SCHEMA_VERSION.to_string()
}

impl PointsLedger {
    /// Fresh ledger with every catalog badge locked
    pub fn new(catalog: &[BadgeDefinition]) -> Self {
        Self {
            schema_version: default_schema_version(),
            points: 0,
            history: Vec::new(),
            stats: LedgerStats {
                level: 1,
                current_points: 0,
                next_level_threshold: next_level_threshold(1),
                streak_days: 0,
                last_activity_date: None,
                badges: catalog.iter().map(BadgeState::locked).collect(),
                completions: CompletionStats::default(),
            },
        }
    }

    /// Recompute level fields from `points`
    pub fn refresh_level(&mut self) {
        let level = level_for(self.points);
        self.stats.level = level;
        self.stats.current_points = self.points - level_floor(level);
        self.stats.next_level_threshold = next_level_threshold(level);
    }

    /// Add locked entries for catalog badges this ledger has never seen.
    /// Existing badge states (acquired or not) are kept.
    pub fn sync_badges(&mut self, catalog: &[BadgeDefinition]) {
        for definition in catalog {
            if !self.stats.badges.iter().any(|badge| badge.id == definition.id) {
                self.stats.badges.push(BadgeState::locked(definition));
            }
        }
    }

    pub fn badge(&self, id: &str) -> Option<&BadgeState> {
        self.stats.badges.iter().find(|badge| badge.id == id)
    }

    pub fn has_badge(&self, id: &str) -> bool {
        self.badge(id).map(|badge| badge.acquired).unwrap_or(false)
    }

    /// Sum of all history deltas
    pub fn history_total(&self) -> i64 {
        self.history.iter().map(|entry| entry.delta).sum()
    }

    /// Most recent `limit` entries, newest first
    pub fn recent_history(&self, limit: usize) -> Vec<PointEntry> {
        self.history.iter().rev().take(limit).cloned().collect()
    }
}

/// Persistence seam for the ledger.
///
/// `save` must replace the whole document at once or fail without
/// touching what is stored.
pub trait LedgerStore: Send + Sync {
    fn load(&self) -> Result<Option<PointsLedger>>;

    fn save(&self, ledger: &PointsLedger) -> Result<()>;

    /// Hold exclusive access across a read-modify-persist cycle. The
    /// returned guard releases on drop. Stores without cross-process
    /// sharing return `None`.
    fn lock(&self) -> Result<Option<FileLock>> {
        Ok(None)
    }
}

/// Ledger stored in `<data-dir>/ledger.json`
#[derive(Debug, Clone)]
pub struct FileLedgerStore {
    storage: Storage,
}

impl FileLedgerStore {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }
}

impl LedgerStore for FileLedgerStore {
    fn load(&self) -> Result<Option<PointsLedger>> {
        self.storage.read_json_opt(&self.storage.ledger_file())
    }

    fn save(&self, ledger: &PointsLedger) -> Result<()> {
        let path = self.storage.ledger_file();
        self.storage.write_json(&path, ledger)?;
        tracing::debug!(points = ledger.points, path = %path.display(), "ledger saved");
        Ok(())
    }

    fn lock(&self) -> Result<Option<FileLock>> {
        let path = lock::lock_path_for(&self.storage.ledger_file());
        FileLock::acquire(path, DEFAULT_LOCK_TIMEOUT_MS).map(Some)
    }
}

/// In-process ledger store. `fail_writes` simulates an unreachable store.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    ledger: Mutex<Option<PointsLedger>>,
    fail_writes: AtomicBool,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn load(&self) -> Result<Option<PointsLedger>> {
        let guard = self
            .ledger
            .lock()
            .map_err(|_| Error::StoreUnavailable("memory ledger poisoned".to_string()))?;
        Ok(guard.clone())
    }

    fn save(&self, ledger: &PointsLedger) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::StoreUnavailable("ledger write rejected".to_string()));
        }
        let mut guard = self
            .ledger
            .lock()
            .map_err(|_| Error::StoreUnavailable("memory ledger poisoned".to_string()))?;
        *guard = Some(ledger.clone());
        Ok(())
    }
}
