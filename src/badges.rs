//! Badge catalog and unlock rules.
//!
//! A badge is data: an id, display text, a point reward and a [`BadgeRule`].
//! The default catalog can be replaced wholesale from `[[points.badges]]`
//! in `questlog.toml`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ledger::PointsLedger;
use crate::task::Task;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BadgeRule {
    /// First time badges are checked at all
    FirstCompletion,
    /// Task finished within `hours` of its creation
    CompletedWithin { hours: u32 },
    /// Streak of at least `days` consecutive days
    Streak { days: u32 },
    /// At least `count` tasks completed overall
    TotalCompleted { count: u32 },
    /// At least `count` high-priority tasks completed
    HighPriorityCompleted { count: u32 },
}

/// Inputs a rule can look at
#[derive(Debug, Clone, Copy)]
pub struct BadgeContext<'a> {
    pub task: &'a Task,
    pub ledger: &'a PointsLedger,
    pub now: DateTime<Utc>,
}

impl BadgeRule {
    pub fn is_satisfied(&self, ctx: &BadgeContext<'_>) -> bool {
        match *self {
            BadgeRule::FirstCompletion => true,
            BadgeRule::CompletedWithin { hours } => {
                ctx.now - ctx.task.created_at <= Duration::hours(i64::from(hours))
            }
            BadgeRule::Streak { days } => ctx.ledger.stats.streak_days >= days,
            BadgeRule::TotalCompleted { count } => ctx.ledger.stats.completions.total >= count,
            BadgeRule::HighPriorityCompleted { count } => {
                ctx.ledger.stats.completions.high_priority >= count
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BadgeDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub reward: i64,
    pub rule: BadgeRule,
}

impl BadgeDefinition {
    fn new(id: &str, name: &str, description: &str, reward: i64, rule: BadgeRule) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            reward,
            rule,
        }
    }
}

pub fn default_catalog() -> Vec<BadgeDefinition> {
    vec![
        BadgeDefinition::new(
            "first-task",
            "First Step",
            "Complete your first task",
            100,
            BadgeRule::FirstCompletion,
        ),
        BadgeDefinition::new(
            "speed-runner",
            "Speed Runner",
            "Complete a task within 24 hours of creating it",
            200,
            BadgeRule::CompletedWithin { hours: 24 },
        ),
        BadgeDefinition::new(
            "perfect-week",
            "Perfect Week",
            "Complete tasks 7 days in a row",
            300,
            BadgeRule::Streak { days: 7 },
        ),
        BadgeDefinition::new(
            "task-master",
            "Task Master",
            "Complete 10 tasks",
            500,
            BadgeRule::TotalCompleted { count: 10 },
        ),
        BadgeDefinition::new(
            "high-achiever",
            "High Achiever",
            "Complete 5 high-priority tasks",
            300,
            BadgeRule::HighPriorityCompleted { count: 5 },
        ),
    ]
}

/// Reject catalogs with blank or duplicate ids
pub fn validate_catalog(catalog: &[BadgeDefinition]) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for badge in catalog {
        let id = badge.id.trim();
        if id.is_empty() {
            return Err(Error::InvalidConfig(
                "points.badges: id cannot be empty".to_string(),
            ));
        }
        if !seen.insert(id) {
            return Err(Error::InvalidConfig(format!(
                "points.badges: duplicate id '{id}'"
            )));
        }
    }
    Ok(())
}
