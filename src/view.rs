//! Derived task views: filter, search, sort and status tabs.
//!
//! Everything here is a pure function of its inputs; nothing is persisted.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::task::{Priority, Task, TaskStatus};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    Deadline,
    Priority,
    Progress,
}

impl SortField {
    pub fn as_str(self) -> &'static str {
        match self {
            SortField::Deadline => "deadline",
            SortField::Priority => "priority",
            SortField::Progress => "progress",
        }
    }
}

impl FromStr for SortField {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "deadline" => Ok(SortField::Deadline),
            "priority" => Ok(SortField::Priority),
            "progress" => Ok(SortField::Progress),
            other => Err(Error::InvalidArgument(format!(
                "unknown sort field '{other}' (expected deadline|priority|progress)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Ascending => "ascending",
            SortDirection::Descending => "descending",
        }
    }
}

impl FromStr for SortDirection {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ascending" | "asc" => Ok(SortDirection::Ascending),
            "descending" | "desc" => Ok(SortDirection::Descending),
            other => Err(Error::InvalidArgument(format!(
                "unknown sort direction '{other}' (expected ascending|descending)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SortSpec {
    pub field: SortField,
    #[serde(default)]
    pub direction: SortDirection,
}

/// Typed filter/sort request. Unset fields do not constrain the view.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FilterSortSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortSpec>,
}

impl FilterSortSpec {
    /// Build a spec from untyped key/value parameters (`priority`, `status`,
    /// `search`, `sortField`, `sortDirection`).
    ///
    /// Empty values are treated as absent. A sort field without a direction
    /// sorts ascending; a direction without a field is rejected.
    pub fn from_params<'a, I>(params: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut spec = FilterSortSpec::default();
        let mut sort_field = None;
        let mut sort_direction = None;

        for (key, value) in params {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key {
                "priority" => spec.priority = Some(value.parse()?),
                "status" => spec.status = Some(value.parse()?),
                "search" => spec.search = Some(value.to_string()),
                "sortField" | "sort_field" | "sort" => sort_field = Some(value.parse()?),
                "sortDirection" | "sort_direction" => sort_direction = Some(value.parse()?),
                other => {
                    return Err(Error::InvalidArgument(format!(
                        "unknown filter parameter '{other}'"
                    )))
                }
            }
        }

        spec.sort = match (sort_field, sort_direction) {
            (Some(field), direction) => Some(SortSpec {
                field,
                direction: direction.unwrap_or_default(),
            }),
            (None, Some(_)) => {
                return Err(Error::InvalidArgument(
                    "sortDirection requires sortField".to_string(),
                ))
            }
            (None, None) => None,
        };

        Ok(spec)
    }

    /// Search text with surrounding whitespace removed, if any remains
    pub fn search_text(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }

    /// Whether a task passes every filter that is set
    pub fn matches(&self, task: &Task) -> bool {
        if let Some(priority) = self.priority {
            if task.priority != priority {
                return false;
            }
        }
        if let Some(status) = self.status {
            if task.status != status {
                return false;
            }
        }
        if let Some(text) = self.search_text() {
            let needle = text.to_lowercase();
            let in_title = task.title.to_lowercase().contains(&needle);
            let in_description = task.description.to_lowercase().contains(&needle);
            if !in_title && !in_description {
                return false;
            }
        }
        true
    }
}

/// Filter then stably sort `tasks` according to `spec`.
pub fn derive_view(tasks: &[Task], spec: &FilterSortSpec) -> Vec<Task> {
    let mut view: Vec<Task> = tasks
        .iter()
        .filter(|task| spec.matches(task))
        .cloned()
        .collect();
    if let Some(sort) = spec.sort {
        sort_tasks(&mut view, sort);
    }
    view
}

/// Stable sort. Tasks without a deadline stay after dated ones in both
/// directions.
pub fn sort_tasks(tasks: &mut [Task], sort: SortSpec) {
    tasks.sort_by(|left, right| compare(left, right, sort));
}

fn compare(left: &Task, right: &Task, sort: SortSpec) -> Ordering {
    let directed = |ordering: Ordering| match sort.direction {
        SortDirection::Ascending => ordering,
        SortDirection::Descending => ordering.reverse(),
    };

    match sort.field {
        SortField::Deadline => match (left.deadline, right.deadline) {
            (Some(a), Some(b)) => directed(a.cmp(&b)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        SortField::Priority => directed(left.priority.rank().cmp(&right.priority.rank())),
        SortField::Progress => directed(left.progress.cmp(&right.progress)),
    }
}

/// Display bucket by status, applied on top of the primary filter
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StatusTab {
    #[default]
    All,
    Todo,
    InProgress,
    Done,
}

impl StatusTab {
    pub fn includes(self, task: &Task) -> bool {
        match self {
            StatusTab::All => true,
            StatusTab::Todo => task.status == TaskStatus::ToDo,
            StatusTab::InProgress => task.status == TaskStatus::InProgress,
            StatusTab::Done => task.status == TaskStatus::Done,
        }
    }

    pub fn apply(self, tasks: &[Task]) -> Vec<Task> {
        tasks
            .iter()
            .filter(|task| self.includes(task))
            .cloned()
            .collect()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StatusTab::All => "all",
            StatusTab::Todo => "todo",
            StatusTab::InProgress => "inprogress",
            StatusTab::Done => "done",
        }
    }
}

impl fmt::Display for StatusTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusTab {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "all" => Ok(StatusTab::All),
            "todo" => Ok(StatusTab::Todo),
            "inprogress" => Ok(StatusTab::InProgress),
            "done" => Ok(StatusTab::Done),
            other => Err(Error::InvalidArgument(format!(
                "unknown tab '{other}' (expected all|todo|inprogress|done)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn task(id: &str, title: &str, priority: Priority, progress: u8, deadline: Option<u32>) -> Task {
        Task {
            id: id.to_string(),
            title: title.to_string(),
            description: format!("notes for {title}"),
            priority,
            status: TaskStatus::from_progress(progress),
            deadline: deadline.and_then(|day| NaiveDate::from_ymd_opt(2026, 10, day)),
            tags: Vec::new(),
            progress,
            created_at: Utc.with_ymd_and_hms(2026, 10, 1, 9, 0, 0).unwrap(),
            updated_at: None,
        }
    }

    fn sample() -> Vec<Task> {
        vec![
            task("1", "Buy milk", Priority::Low, 0, Some(21)),
            task("2", "Write Report", Priority::High, 50, Some(19)),
            task("3", "Call plumber", Priority::Medium, 100, None),
            task("4", "Review report draft", Priority::High, 0, Some(25)),
        ]
    }

    fn ids(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|task| task.id.as_str()).collect()
    }

    #[test]
    fn empty_spec_keeps_everything_in_order() {
        let tasks = sample();
        let view = derive_view(&tasks, &FilterSortSpec::default());
        assert_eq!(ids(&view), vec!["1", "2", "3", "4"]);
    }

    #[test]
    fn filters_are_conjunctive() {
        let tasks = sample();
        let spec = FilterSortSpec {
            priority: Some(Priority::High),
            status: Some(TaskStatus::ToDo),
            ..FilterSortSpec::default()
        };
        assert_eq!(ids(&derive_view(&tasks, &spec)), vec!["4"]);
    }

    #[test]
    fn search_is_case_insensitive_over_title_and_description() {
        let tasks = sample();
        let spec = FilterSortSpec {
            search: Some("REPORT".to_string()),
            ..FilterSortSpec::default()
        };
        assert_eq!(ids(&derive_view(&tasks, &spec)), vec!["2", "4"]);

        let by_description = FilterSortSpec {
            search: Some("notes for buy".to_string()),
            ..FilterSortSpec::default()
        };
        assert_eq!(ids(&derive_view(&tasks, &by_description)), vec!["1"]);
    }

    #[test]
    fn blank_search_does_not_filter() {
        let tasks = sample();
        let spec = FilterSortSpec {
            search: Some("   ".to_string()),
            ..FilterSortSpec::default()
        };
        assert_eq!(derive_view(&tasks, &spec).len(), 4);
    }

    #[test]
    fn sorts_by_deadline_with_undated_last() {
        let tasks = sample();
        let asc = FilterSortSpec {
            sort: Some(SortSpec {
                field: SortField::Deadline,
                direction: SortDirection::Ascending,
            }),
            ..FilterSortSpec::default()
        };
        assert_eq!(ids(&derive_view(&tasks, &asc)), vec!["2", "1", "4", "3"]);

        let desc = FilterSortSpec {
            sort: Some(SortSpec {
                field: SortField::Deadline,
                direction: SortDirection::Descending,
            }),
            ..FilterSortSpec::default()
        };
        assert_eq!(ids(&derive_view(&tasks, &desc)), vec!["4", "1", "2", "3"]);
    }

    #[test]
    fn priority_sort_is_stable() {
        let tasks = sample();
        let desc = FilterSortSpec {
            sort: Some(SortSpec {
                field: SortField::Priority,
                direction: SortDirection::Descending,
            }),
            ..FilterSortSpec::default()
        };
        assert_eq!(ids(&derive_view(&tasks, &desc)), vec!["2", "4", "3", "1"]);

        let asc = FilterSortSpec {
            sort: Some(SortSpec {
                field: SortField::Priority,
                direction: SortDirection::Ascending,
            }),
            ..FilterSortSpec::default()
        };
        assert_eq!(ids(&derive_view(&tasks, &asc)), vec!["1", "3", "2", "4"]);
    }

    #[test]
    fn sorts_by_progress() {
        let tasks = sample();
        let spec = FilterSortSpec {
            sort: Some(SortSpec {
                field: SortField::Progress,
                direction: SortDirection::Descending,
            }),
            ..FilterSortSpec::default()
        };
        assert_eq!(ids(&derive_view(&tasks, &spec)), vec!["3", "2", "1", "4"]);
    }

    #[test]
    fn derive_view_is_idempotent() {
        let tasks = sample();
        let spec = FilterSortSpec {
            search: Some("r".to_string()),
            sort: Some(SortSpec {
                field: SortField::Priority,
                direction: SortDirection::Ascending,
            }),
            ..FilterSortSpec::default()
        };
        let first = derive_view(&tasks, &spec);
        let second = derive_view(&tasks, &spec);
        assert_eq!(first, second);
        assert_eq!(derive_view(&first, &spec), first);
    }

    #[test]
    fn tabs_compose_with_filter() {
        let tasks = sample();
        let spec = FilterSortSpec {
            priority: Some(Priority::High),
            ..FilterSortSpec::default()
        };
        let view = derive_view(&tasks, &spec);
        assert_eq!(ids(&StatusTab::Todo.apply(&view)), vec!["4"]);
        assert_eq!(ids(&StatusTab::InProgress.apply(&view)), vec!["2"]);
        assert!(StatusTab::Done.apply(&view).is_empty());
        assert_eq!(StatusTab::All.apply(&view).len(), 2);
    }

    #[test]
    fn from_params_validates_values() {
        let spec = FilterSortSpec::from_params([
            ("priority", "High"),
            ("status", "In Progress"),
            ("search", "report"),
            ("sortField", "deadline"),
        ])
        .unwrap();
        assert_eq!(spec.priority, Some(Priority::High));
        assert_eq!(spec.status, Some(TaskStatus::InProgress));
        assert_eq!(spec.search.as_deref(), Some("report"));
        assert_eq!(
            spec.sort,
            Some(SortSpec {
                field: SortField::Deadline,
                direction: SortDirection::Ascending
            })
        );

        assert!(FilterSortSpec::from_params([("priority", "urgent")]).is_err());
        assert!(FilterSortSpec::from_params([("sortDirection", "descending")]).is_err());
        assert!(FilterSortSpec::from_params([("colour", "red")]).is_err());
        assert_eq!(
            FilterSortSpec::from_params([("priority", "")]).unwrap(),
            FilterSortSpec::default()
        );
    }

    #[test]
    fn tab_parsing_accepts_variants() {
        assert_eq!("in-progress".parse::<StatusTab>().unwrap(), StatusTab::InProgress);
        assert_eq!("ALL".parse::<StatusTab>().unwrap(), StatusTab::All);
        assert!("later".parse::<StatusTab>().is_err());
    }
}
