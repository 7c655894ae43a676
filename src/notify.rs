//! Deadline reminders.
//!
//! [`compute_notifications`] is the pure derivation. [`DeadlineNotifier`]
//! re-runs it on a tokio task whenever the watched task collection changes
//! and on a fixed interval, publishing each result set through a `watch`
//! channel.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::task::{Task, TaskStatus};

/// Deadlines up to this many days ahead produce a reminder
pub const DEFAULT_WINDOW_DAYS: u32 = 3;

/// Scheduled recomputation period
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Deadline,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Notification {
    pub task_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub due: NaiveDate,
    pub days_until: i64,
}

impl Notification {
    fn deadline(task: &Task, due: NaiveDate, days_until: i64) -> Self {
        let when = match days_until {
            0 => "today".to_string(),
            1 => "tomorrow".to_string(),
            n => format!("in {n} days"),
        };
        Self {
            task_id: task.id.clone(),
            kind: NotificationKind::Deadline,
            title: format!("{} Priority Task", task.priority),
            message: format!("\"{}\" is due {when}", task.title),
            due,
            days_until,
        }
    }
}

/// Reminders for open tasks due between `today` and `today + 3 days`.
pub fn compute_notifications(tasks: &[Task], today: NaiveDate) -> Vec<Notification> {
    compute_notifications_within(tasks, today, DEFAULT_WINDOW_DAYS)
}

/// Reminders for open tasks due within `window_days` of `today`, inclusive,
/// in input order. Overdue, undated and Done tasks are skipped.
pub fn compute_notifications_within(
    tasks: &[Task],
    today: NaiveDate,
    window_days: u32,
) -> Vec<Notification> {
    let window = i64::from(window_days);
    tasks
        .iter()
        .filter(|task| task.status != TaskStatus::Done)
        .filter_map(|task| {
            let due = task.deadline?;
            let days_until = (due - today).num_days();
            (0..=window)
                .contains(&days_until)
                .then(|| Notification::deadline(task, due, days_until))
        })
        .collect()
}

/// Source of "today" for the notifier
pub type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// Local calendar date
pub fn local_clock() -> Clock {
    Arc::new(|| Local::now().date_naive())
}

/// Background deadline watcher. Aborted by [`cancel`](Self::cancel) or on
/// drop.
pub struct DeadlineNotifier {
    handle: JoinHandle<()>,
    notifications: watch::Receiver<Vec<Notification>>,
}

impl DeadlineNotifier {
    /// Start watching `tasks`. The first computation happens immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        mut tasks: watch::Receiver<Vec<Task>>,
        interval: Duration,
        window_days: u32,
        clock: Clock,
    ) -> Self {
        let (tx, notifications) = watch::channel(Vec::new());
        let handle = tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut source_open = true;
            loop {
                tokio::select! {
                    _ = tick.tick() => {}
                    changed = tasks.changed(), if source_open => {
                        if changed.is_err() {
                            // Collection can no longer change; keep the timer.
                            source_open = false;
                            continue;
                        }
                    }
                }

                let today = clock();
                let computed = {
                    let current = tasks.borrow_and_update();
                    compute_notifications_within(&current, today, window_days)
                };
                tracing::debug!(count = computed.len(), %today, "deadline notifications recomputed");
                tx.send_replace(computed);
            }
        });

        Self {
            handle,
            notifications,
        }
    }

    /// Receiver that observes every published set
    pub fn subscribe(&self) -> watch::Receiver<Vec<Notification>> {
        self.notifications.clone()
    }

    /// Most recently published set
    pub fn current(&self) -> Vec<Notification> {
        self.notifications.borrow().clone()
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }
}

impl Drop for DeadlineNotifier {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
