//! ql notify command implementation.
//!
//! One-shot mode prints the reminders for a date. Watch mode runs the
//! [`DeadlineNotifier`] on a tokio runtime, reloading the task store on its
//! own interval, until interrupted.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use serde::Serialize;
use tokio::sync::watch;

use crate::cli::context::{parse_optional_date, Context};
use crate::error::{Error, Result};
use crate::notify::{compute_notifications_within, local_clock, DeadlineNotifier, Notification};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::task::{Task, TaskStore};

pub struct NotifyOptions {
    pub today: Option<String>,
    pub watch: bool,
    pub data_dir: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

#[derive(Serialize)]
struct NotifyOutput<'a> {
    today: NaiveDate,
    window_days: u32,
    total: usize,
    notifications: &'a [Notification],
}

pub fn run(options: NotifyOptions) -> Result<()> {
    let ctx = Context::load(options.data_dir.clone())?;
    let store = ctx.task_store()?;
    let output = OutputOptions {
        json: options.json,
        quiet: options.quiet,
    };

    if options.watch {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        return runtime.block_on(watch_loop(ctx, store, output));
    }

    let today = parse_optional_date("today", options.today.as_deref())?
        .unwrap_or_else(|| Local::now().date_naive());
    let window_days = ctx.config.notifier.window_days;
    let notifications = compute_notifications_within(&store.list()?, today, window_days);
    emit(output, today, window_days, &notifications)
}

fn emit(
    options: OutputOptions,
    today: NaiveDate,
    window_days: u32,
    notifications: &[Notification],
) -> Result<()> {
    let mut human = HumanOutput::new(match notifications.len() {
        0 => "No upcoming deadlines".to_string(),
        1 => "1 upcoming deadline".to_string(),
        n => format!("{n} upcoming deadlines"),
    });
    human.push_summary("Today", today.to_string());
    for note in notifications {
        human.push_detail(format!("[{}] {} ({})", note.title, note.message, note.task_id));
    }

    let data = NotifyOutput {
        today,
        window_days,
        total: notifications.len(),
        notifications,
    };
    emit_success(options, "notify", &data, Some(&human))
}

async fn load_tasks(store: Arc<dyn TaskStore>) -> Result<Vec<Task>> {
    tokio::task::spawn_blocking(move || store.list())
        .await
        .map_err(|err| Error::StoreUnavailable(format!("task reload aborted: {err}")))?
}

async fn watch_loop(ctx: Context, store: Arc<dyn TaskStore>, output: OutputOptions) -> Result<()> {
    let settings = &ctx.config.notifier;
    let initial = load_tasks(Arc::clone(&store)).await?;
    let (tasks_tx, tasks_rx) = watch::channel(initial);

    let notifier = DeadlineNotifier::spawn(
        tasks_rx,
        Duration::from_secs(settings.interval_secs),
        settings.window_days,
        local_clock(),
    );
    let mut published = notifier.subscribe();

    let mut reload = tokio::time::interval(Duration::from_secs(settings.reload_secs));
    reload.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately; the initial load already happened.
    reload.tick().await;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    tracing::info!(
        backend = store.backend(),
        interval_secs = settings.interval_secs,
        reload_secs = settings.reload_secs,
        "watching deadlines"
    );

    let mut last_shown: Option<Vec<Notification>> = None;
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = reload.tick() => {
                match load_tasks(Arc::clone(&store)).await {
                    Ok(tasks) => {
                        tasks_tx.send_if_modified(|current| {
                            if *current == tasks {
                                return false;
                            }
                            *current = tasks;
                            true
                        });
                    }
                    Err(err) => tracing::warn!(error = %err, "task reload failed"),
                }
            }
            changed = published.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = published.borrow_and_update().clone();
                if last_shown.as_ref() == Some(&current) {
                    continue;
                }
                emit(output, Local::now().date_naive(), settings.window_days, &current)?;
                last_shown = Some(current);
            }
        }
    }

    notifier.cancel();
    Ok(())
}
