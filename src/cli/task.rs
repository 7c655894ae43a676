//! ql task command implementations.

use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

use crate::cli::context::{parse_optional_date, Context};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::points::LedgerUpdate;
use crate::task::{resolve_task_id, Priority, Task, TaskCreateInput, TaskPatch, TaskStore};
use crate::view::{FilterSortSpec, StatusTab};

pub struct AddOptions {
    pub title: String,
    pub description: String,
    pub priority: Option<String>,
    pub deadline: Option<String>,
    pub tags: Vec<String>,
    pub data_dir: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub struct ListOptions {
    pub priority: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub desc: bool,
    pub tab: String,
    pub data_dir: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub struct ShowOptions {
    pub id: String,
    pub data_dir: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub struct EditOptions {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub deadline: Option<String>,
    pub tags: Vec<String>,
    pub data_dir: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub struct ProgressOptions {
    pub id: String,
    pub progress: u8,
    pub data_dir: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub struct RmOptions {
    pub id: String,
    pub data_dir: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub struct ClearOptions {
    pub yes: bool,
    pub data_dir: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

#[derive(Serialize)]
struct TaskListOutput {
    backend: &'static str,
    tab: StatusTab,
    total: usize,
    tasks: Vec<Task>,
}

#[derive(Serialize)]
struct ProgressOutput {
    task: Task,
    completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    rewards: Option<LedgerUpdate>,
}

#[derive(Serialize)]
struct RemovedOutput {
    removed: usize,
}

fn parse_priority(raw: Option<&str>) -> Result<Option<Priority>> {
    raw.map(Priority::from_str).transpose()
}

fn require_title(raw: &str) -> Result<String> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(Error::InvalidArgument("title cannot be empty".to_string()));
    }
    Ok(title.to_string())
}

fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect()
}

/// Resolve a user-supplied id or prefix against the store's current tasks.
fn resolve(store: &dyn TaskStore, input: &str) -> Result<Task> {
    let tasks = store.list()?;
    let id = resolve_task_id(&tasks, input)?;
    tasks
        .into_iter()
        .find(|task| task.id == id)
        .ok_or(Error::TaskNotFound(id))
}

fn describe(human: &mut HumanOutput, task: &Task) {
    human.push_summary("ID", task.id.clone());
    human.push_summary("Title", task.title.clone());
    human.push_summary("Status", task.status.to_string());
    human.push_summary("Priority", task.priority.to_string());
    human.push_summary("Progress", format!("{}%", task.progress));
    if let Some(deadline) = task.deadline {
        human.push_summary("Deadline", deadline.to_string());
    }
    if !task.tags.is_empty() {
        human.push_summary("Tags", task.tags.join(", "));
    }
    if !task.description.is_empty() {
        human.push_detail(task.description.clone());
    }
}

fn list_line(task: &Task) -> String {
    let mut line = format!(
        "[{}][{}] {} {} ({}%)",
        task.status, task.priority, task.id, task.title, task.progress
    );
    if let Some(deadline) = task.deadline {
        line.push_str(&format!(" due {deadline}"));
    }
    if !task.tags.is_empty() {
        line.push_str(&format!(" #{}", task.tags.join(" #")));
    }
    line
}

pub fn run_add(options: AddOptions) -> Result<()> {
    let ctx = Context::load(options.data_dir)?;
    let input = TaskCreateInput {
        title: require_title(&options.title)?,
        description: options.description,
        priority: parse_priority(options.priority.as_deref())?.unwrap_or_default(),
        deadline: parse_optional_date("deadline", options.deadline.as_deref())?,
        tags: normalize_tags(options.tags),
    };

    let store = ctx.task_store()?;
    let task = store.create(input)?;

    let mut human = HumanOutput::new("Task created");
    describe(&mut human, &task);
    human.push_next_step(format!("ql task progress {} <0-100>", task.id));

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "task add",
        &task,
        Some(&human),
    )
}

pub fn run_list(options: ListOptions) -> Result<()> {
    let ctx = Context::load(options.data_dir)?;
    let tab = StatusTab::from_str(&options.tab)?;

    let mut params: Vec<(&str, &str)> = Vec::new();
    if let Some(priority) = options.priority.as_deref() {
        params.push(("priority", priority));
    }
    if let Some(status) = options.status.as_deref() {
        params.push(("status", status));
    }
    if let Some(search) = options.search.as_deref() {
        params.push(("search", search));
    }
    if let Some(sort) = options.sort.as_deref() {
        params.push(("sortField", sort));
    }
    if options.desc {
        params.push(("sortDirection", "descending"));
    }
    let spec = FilterSortSpec::from_params(params)?;

    let store = ctx.task_store()?;
    let tasks = tab.apply(&store.query_filtered(&spec)?);

    let mut human = HumanOutput::new("Tasks");
    human.push_summary("Total", tasks.len().to_string());
    if tab != StatusTab::All {
        human.push_summary("Tab", tab.to_string());
    }
    for task in &tasks {
        human.push_detail(list_line(task));
    }
    if tasks.is_empty() && spec == FilterSortSpec::default() && tab == StatusTab::All {
        human.push_next_step("ql task add \"<title>\"");
    }

    let output = TaskListOutput {
        backend: store.backend(),
        tab,
        total: tasks.len(),
        tasks,
    };

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "task list",
        &output,
        Some(&human),
    )
}

pub fn run_show(options: ShowOptions) -> Result<()> {
    let ctx = Context::load(options.data_dir)?;
    let store = ctx.task_store()?;
    let task = resolve(store.as_ref(), &options.id)?;

    let mut human = HumanOutput::new(format!("Task {}", task.id));
    describe(&mut human, &task);
    human.push_summary("Created", task.created_at.to_rfc3339());

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "task show",
        &task,
        Some(&human),
    )
}

pub fn run_edit(options: EditOptions) -> Result<()> {
    let ctx = Context::load(options.data_dir)?;
    let patch = TaskPatch {
        title: options.title.as_deref().map(require_title).transpose()?,
        description: options.description,
        priority: parse_priority(options.priority.as_deref())?,
        deadline: parse_optional_date("deadline", options.deadline.as_deref())?,
        tags: if options.tags.is_empty() {
            None
        } else {
            Some(normalize_tags(options.tags))
        },
        progress: None,
    };
    if patch.is_empty() {
        return Err(Error::InvalidArgument(
            "nothing to change (pass --title, --description, --priority, --deadline or --tag)"
                .to_string(),
        ));
    }

    let store = ctx.task_store()?;
    let target = resolve(store.as_ref(), &options.id)?;
    let task = store
        .update(&target.id, patch)?
        .ok_or_else(|| Error::TaskNotFound(target.id.clone()))?;

    let mut human = HumanOutput::new("Task updated");
    describe(&mut human, &task);

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "task edit",
        &task,
        Some(&human),
    )
}

pub fn run_progress(options: ProgressOptions) -> Result<()> {
    let ctx = Context::load(options.data_dir)?;
    let store = ctx.task_store()?;
    let before = resolve(store.as_ref(), &options.id)?;
    let task = store
        .update_progress(&before.id, options.progress)?
        .ok_or_else(|| Error::TaskNotFound(before.id.clone()))?;

    let completed = !before.is_done() && task.is_done();
    let mut human = HumanOutput::new(if completed {
        "Task completed"
    } else {
        "Progress updated"
    });
    describe(&mut human, &task);

    let mut rewards = None;
    if completed {
        // The task change is already stored; a ledger failure only loses the reward.
        match ctx
            .points_engine()
            .and_then(|mut engine| engine.record_completion(&task))
        {
            Ok(update) => {
                let earned: i64 = update.entries.iter().map(|entry| entry.delta).sum();
                human.push_summary("Points earned", earned.to_string());
                human.push_summary("Total points", update.ledger.points.to_string());
                if let Some(level) = update.level_up {
                    human.push_detail(format!("Level up! You reached level {level}"));
                }
                for badge in &update.unlocked {
                    human.push_detail(format!("Badge earned: {}", badge.name));
                }
                rewards = Some(update);
            }
            Err(err) => {
                tracing::warn!(error = %err, task = %task.id, "completion reward not recorded");
                human.push_warning(format!("points not recorded: {err}"));
            }
        }
    }

    let output = ProgressOutput {
        task,
        completed,
        rewards,
    };

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "task progress",
        &output,
        Some(&human),
    )
}

pub fn run_rm(options: RmOptions) -> Result<()> {
    let ctx = Context::load(options.data_dir)?;
    let store = ctx.task_store()?;
    let target = resolve(store.as_ref(), &options.id)?;
    if !store.delete(&target.id)? {
        return Err(Error::TaskNotFound(target.id));
    }

    let mut human = HumanOutput::new("Task removed");
    human.push_summary("ID", target.id.clone());
    human.push_summary("Title", target.title.clone());

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "task rm",
        &target,
        Some(&human),
    )
}

pub fn run_clear(options: ClearOptions) -> Result<()> {
    if !options.yes {
        return Err(Error::InvalidArgument(
            "refusing to remove every task without --yes".to_string(),
        ));
    }
    let ctx = Context::load(options.data_dir)?;
    let store = ctx.task_store()?;
    let removed = store.clear()?;

    let mut human = HumanOutput::new("Tasks cleared");
    human.push_summary("Removed", removed.to_string());
    human.push_summary("Backend", store.backend());

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "task clear",
        &RemovedOutput { removed },
        Some(&human),
    )
}
