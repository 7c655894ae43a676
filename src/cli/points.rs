//! ql points command implementations.

use std::path::PathBuf;

use serde::Serialize;

use crate::cli::context::Context;
use crate::error::{Error, Result};
use crate::ledger::{BadgeState, PointEntry, PointsLedger};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::points::LedgerUpdate;

pub struct PointsOptions {
    pub data_dir: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

impl PointsOptions {
    fn output(&self) -> OutputOptions {
        OutputOptions {
            json: self.json,
            quiet: self.quiet,
        }
    }
}

#[derive(Serialize)]
struct HistoryOutput {
    total: usize,
    entries: Vec<PointEntry>,
}

#[derive(Serialize)]
struct BadgesOutput {
    acquired: usize,
    badges: Vec<BadgeState>,
}

fn push_level(human: &mut HumanOutput, ledger: &PointsLedger) {
    let stats = &ledger.stats;
    human.push_summary("Points", ledger.points.to_string());
    human.push_summary("Level", stats.level.to_string());
    human.push_summary(
        "Next level",
        format!(
            "{} more ({} / {})",
            stats.next_level_threshold - ledger.points,
            ledger.points,
            stats.next_level_threshold
        ),
    );
    human.push_summary("Streak", format!("{} day(s)", stats.streak_days));
}

fn push_update(human: &mut HumanOutput, update: &LedgerUpdate) {
    for entry in &update.entries {
        human.push_detail(format!("{:+} {}", entry.delta, entry.action));
    }
    if let Some(level) = update.level_up {
        human.push_detail(format!("Level up! You reached level {level}"));
    }
    for badge in &update.unlocked {
        human.push_detail(format!("Badge earned: {}", badge.name));
    }
}

pub fn run_show(options: PointsOptions) -> Result<()> {
    let ctx = Context::load(options.data_dir.clone())?;
    let engine = ctx.points_engine()?;
    let ledger = engine.ledger();

    let mut human = HumanOutput::new("Points");
    push_level(&mut human, ledger);
    let acquired = ledger.stats.badges.iter().filter(|badge| badge.acquired).count();
    human.push_summary(
        "Badges",
        format!("{acquired} / {}", ledger.stats.badges.len()),
    );
    if let Some(last) = ledger.stats.last_activity_date {
        human.push_summary("Last activity", last.to_string());
    }

    emit_success(options.output(), "points show", ledger, Some(&human))
}

pub fn run_history(options: PointsOptions, limit: usize) -> Result<()> {
    let ctx = Context::load(options.data_dir.clone())?;
    let engine = ctx.points_engine()?;
    let entries = engine.ledger().recent_history(limit);

    let mut human = HumanOutput::new("Point history");
    human.push_summary("Showing", entries.len().to_string());
    for entry in &entries {
        human.push_detail(format!(
            "{} {:+} {}",
            entry.timestamp.format("%Y-%m-%d %H:%M"),
            entry.delta,
            entry.action
        ));
    }

    let output = HistoryOutput {
        total: engine.ledger().history.len(),
        entries,
    };
    emit_success(options.output(), "points history", &output, Some(&human))
}

pub fn run_badges(options: PointsOptions) -> Result<()> {
    let ctx = Context::load(options.data_dir.clone())?;
    let engine = ctx.points_engine()?;
    let badges = engine.ledger().stats.badges.clone();
    let acquired = badges.iter().filter(|badge| badge.acquired).count();

    let mut human = HumanOutput::new("Badges");
    human.push_summary("Earned", format!("{acquired} / {}", badges.len()));
    for badge in &badges {
        let mark = if badge.acquired { "x" } else { " " };
        let mut line = format!("[{mark}] {} - {}", badge.name, badge.description);
        if let Some(at) = badge.acquired_at {
            line.push_str(&format!(" (earned {})", at.format("%Y-%m-%d")));
        }
        human.push_detail(line);
    }

    emit_success(
        options.output(),
        "points badges",
        &BadgesOutput { acquired, badges },
        Some(&human),
    )
}

pub fn run_add(options: PointsOptions, action: &str, delta: i64) -> Result<()> {
    let action = action.trim();
    if action.is_empty() {
        return Err(Error::InvalidArgument("action cannot be empty".to_string()));
    }
    let ctx = Context::load(options.data_dir.clone())?;
    let mut engine = ctx.points_engine()?;
    let update = engine.add_points(action, delta)?;

    let mut human = HumanOutput::new("Points recorded");
    push_level(&mut human, &update.ledger);
    push_update(&mut human, &update);

    emit_success(options.output(), "points add", &update, Some(&human))
}

pub fn run_checkin(options: PointsOptions) -> Result<()> {
    let ctx = Context::load(options.data_dir.clone())?;
    let mut engine = ctx.points_engine()?;
    let update = engine.update_streak()?;

    let mut human = HumanOutput::new("Checked in");
    push_level(&mut human, &update.ledger);
    push_update(&mut human, &update);

    emit_success(options.output(), "points checkin", &update, Some(&human))
}
