//! Task model and the task store seam.
//!
//! A [`TaskStore`] is the narrow CRUD interface the rest of questlog talks
//! to. Two backends ship in the crate:
//!
//! - [`LocalTaskStore`]: a JSON array in `<data-dir>/tasks.json`, status
//!   always derived from progress
//! - [`crate::integrations::notion::NotionTaskStore`]: a Notion database,
//!   status stored as its own select property
//!
//! [`MemoryTaskStore`] backs tests.

use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::lock::{self, FileLock, DEFAULT_LOCK_TIMEOUT_MS};
use crate::storage::Storage;
use crate::view::{derive_view, FilterSortSpec};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Priority {
    #[default]
    Low,
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    /// Ordering rank, Low < Medium < High
    pub fn rank(self) -> u8 {
        match self {
            Priority::Low => 0,
            Priority::Medium => 1,
            Priority::High => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" | "med" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(Error::InvalidArgument(format!(
                "unknown priority '{other}' (expected low|medium|high)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    #[default]
    #[serde(rename = "To Do")]
    ToDo,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Done")]
    Done,
}

impl TaskStatus {
    /// Status implied by a progress percentage: 0 is to-do, 100 is done,
    /// anything else is in progress.
    pub fn from_progress(progress: u8) -> Self {
        match progress {
            0 => TaskStatus::ToDo,
            100 => TaskStatus::Done,
            _ => TaskStatus::InProgress,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::ToDo => "To Do",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Done => "Done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        let normalized: String = raw
            .trim()
            .chars()
            .filter(|ch| !matches!(ch, ' ' | '-' | '_'))
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "todo" => Ok(TaskStatus::ToDo),
            "inprogress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            _ => Err(Error::InvalidArgument(format!(
                "unknown status '{}' (expected todo|in-progress|done)",
                raw.trim()
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<NaiveDate>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub progress: u8,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Build a fresh task from creation input: progress 0, status to-do.
    pub fn from_input(id: impl Into<String>, input: TaskCreateInput, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            title: input.title,
            description: input.description,
            priority: input.priority,
            status: TaskStatus::ToDo,
            deadline: input.deadline,
            tags: input.tags,
            progress: 0,
            created_at: now,
            updated_at: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.status == TaskStatus::Done
    }

    /// Apply a partial update. A progress change re-derives the status.
    pub fn apply_patch(&mut self, patch: TaskPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(deadline) = patch.deadline {
            self.deadline = Some(deadline);
        }
        if let Some(tags) = patch.tags {
            self.tags = tags;
        }
        if let Some(progress) = patch.progress {
            self.set_progress(progress);
        }
    }

    pub fn set_progress(&mut self, progress: u8) {
        self.progress = progress;
        self.status = TaskStatus::from_progress(progress);
    }
}

/// Fields supplied when creating a task; the store assigns the rest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskCreateInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<NaiveDate>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Partial update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.deadline.is_none()
            && self.tags.is_none()
            && self.progress.is_none()
    }
}

/// CRUD seam over a task backend.
///
/// Unknown ids are not errors: `update`/`update_progress` return `None` and
/// `delete` returns `false`. Updates are last-write-wins; there is no
/// version check.
pub trait TaskStore: Send + Sync {
    /// Short backend name for output ("local", "notion", "memory")
    fn backend(&self) -> &'static str;

    fn list(&self) -> Result<Vec<Task>>;

    fn create(&self, input: TaskCreateInput) -> Result<Task>;

    fn update(&self, id: &str, patch: TaskPatch) -> Result<Option<Task>>;

    /// Set progress and re-derive status from it.
    fn update_progress(&self, id: &str, progress: u8) -> Result<Option<Task>>;

    /// Remove (or archive) a task. Returns whether the id was known.
    fn delete(&self, id: &str) -> Result<bool>;

    /// Remove (or archive) every task, returning how many went away.
    fn clear(&self) -> Result<usize>;

    fn get(&self, id: &str) -> Result<Option<Task>> {
        Ok(self.list()?.into_iter().find(|task| task.id == id))
    }

    /// Filtered and sorted listing. Backends with a query capability may
    /// push the filters down instead of filtering locally.
    fn query_filtered(&self, spec: &FilterSortSpec) -> Result<Vec<Task>> {
        Ok(derive_view(&self.list()?, spec))
    }
}

/// Task store backed by `<data-dir>/tasks.json`.
#[derive(Debug, Clone)]
pub struct LocalTaskStore {
    storage: Storage,
}

impl LocalTaskStore {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    fn load(&self) -> Result<Vec<Task>> {
        Ok(self
            .storage
            .read_json_opt(&self.storage.tasks_file())?
            .unwrap_or_default())
    }

    /// Run `mutate` over the task list while holding the store lock and
    /// persist the result in one atomic write. Nothing is written when the
    /// list comes back unchanged.
    fn modify<T>(&self, mutate: impl FnOnce(&mut Vec<Task>) -> T) -> Result<T> {
        let path = self.storage.tasks_file();
        let _lock = FileLock::acquire(lock::lock_path_for(&path), DEFAULT_LOCK_TIMEOUT_MS)?;
        let original = self.load()?;
        let mut tasks = original.clone();
        let outcome = mutate(&mut tasks);
        if tasks != original {
            self.storage.write_json(&path, &tasks)?;
        }
        Ok(outcome)
    }
}

impl TaskStore for LocalTaskStore {
    fn backend(&self) -> &'static str {
        "local"
    }

    fn list(&self) -> Result<Vec<Task>> {
        self.load()
    }

    fn create(&self, input: TaskCreateInput) -> Result<Task> {
        let task = Task::from_input(Uuid::new_v4().to_string(), input, Utc::now());
        let created = task.clone();
        self.modify(move |tasks| tasks.push(task))?;
        tracing::debug!(id = %created.id, "created local task");
        Ok(created)
    }

    fn update(&self, id: &str, patch: TaskPatch) -> Result<Option<Task>> {
        self.modify(|tasks| {
            tasks.iter_mut().find(|task| task.id == id).map(|task| {
                task.apply_patch(patch);
                task.updated_at = Some(Utc::now());
                task.clone()
            })
        })
    }

    fn update_progress(&self, id: &str, progress: u8) -> Result<Option<Task>> {
        self.update(
            id,
            TaskPatch {
                progress: Some(progress),
                ..TaskPatch::default()
            },
        )
    }

    fn delete(&self, id: &str) -> Result<bool> {
        self.modify(|tasks| {
            let before = tasks.len();
            tasks.retain(|task| task.id != id);
            tasks.len() != before
        })
    }

    fn clear(&self) -> Result<usize> {
        self.modify(|tasks| {
            let removed = tasks.len();
            tasks.clear();
            removed
        })
    }
}

/// In-process task store.
#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    tasks: Mutex<Vec<Task>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            tasks: Mutex::new(tasks),
        }
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, Vec<Task>>> {
        self.tasks
            .lock()
            .map_err(|_| Error::StoreUnavailable("memory store poisoned".to_string()))
    }
}

impl TaskStore for MemoryTaskStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn list(&self) -> Result<Vec<Task>> {
        Ok(self.guard()?.clone())
    }

    fn create(&self, input: TaskCreateInput) -> Result<Task> {
        let task = Task::from_input(Uuid::new_v4().to_string(), input, Utc::now());
        self.guard()?.push(task.clone());
        Ok(task)
    }

    fn update(&self, id: &str, patch: TaskPatch) -> Result<Option<Task>> {
        let mut tasks = self.guard()?;
        Ok(tasks.iter_mut().find(|task| task.id == id).map(|task| {
            task.apply_patch(patch);
            task.updated_at = Some(Utc::now());
            task.clone()
        }))
    }

    fn update_progress(&self, id: &str, progress: u8) -> Result<Option<Task>> {
        self.update(
            id,
            TaskPatch {
                progress: Some(progress),
                ..TaskPatch::default()
            },
        )
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let mut tasks = self.guard()?;
        let before = tasks.len();
        tasks.retain(|task| task.id != id);
        Ok(tasks.len() != before)
    }

    fn clear(&self) -> Result<usize> {
        let mut tasks = self.guard()?;
        let removed = tasks.len();
        tasks.clear();
        Ok(removed)
    }
}

/// Resolve a full id or a unique id prefix against the current tasks.
pub fn resolve_task_id(tasks: &[Task], input: &str) -> Result<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidArgument("task id cannot be empty".to_string()));
    }

    if let Some(task) = tasks.iter().find(|task| task.id == trimmed) {
        return Ok(task.id.clone());
    }

    let needle = trimmed.to_ascii_lowercase();
    let mut matches: Vec<&str> = tasks
        .iter()
        .filter(|task| task.id.to_ascii_lowercase().starts_with(&needle))
        .map(|task| task.id.as_str())
        .collect();
    matches.sort_unstable();
    matches.dedup();

    match matches.as_slice() {
        [] => Err(Error::TaskNotFound(trimmed.to_string())),
        [only] => Ok((*only).to_string()),
        many => Err(Error::InvalidArgument(format!(
            "ambiguous task id '{}': {}",
            trimmed,
            many.join(", ")
        ))),
    }
}
