//! Points engine: awards, level-ups, streaks and badges.
//!
//! Every operation runs against a draft copy of the ledger. The draft is
//! persisted with a single [`LedgerStore::save`] and only then replaces the
//! engine's in-memory ledger, so a failed write leaves the engine exactly as
//! it was. File-backed stores also hold a lock across the whole
//! read-modify-persist cycle.

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::Serialize;

use crate::badges::{BadgeContext, BadgeDefinition};
use crate::config::PointsConfig;
use crate::error::{Error, Result};
use crate::ledger::{level_for, BadgeState, LedgerStore, PointEntry, PointsLedger};
use crate::task::{Priority, Task};

/// Bonus per level reached: reaching level N pays N * 100
pub const LEVEL_UP_BONUS_PER_LEVEL: i64 = 100;

/// Streak bonus per day and its cap
pub const STREAK_BONUS_PER_DAY: i64 = 10;
pub const STREAK_BONUS_CAP: i64 = 100;

/// Largest magnitude the running total may reach (level 317)
pub const MAX_TOTAL_POINTS: i64 = 100_000_000;

/// Points paid for completing a task, by priority
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionRewards {
    pub low: i64,
    pub medium: i64,
    pub high: i64,
}

impl CompletionRewards {
    pub fn for_priority(&self, priority: Priority) -> i64 {
        match priority {
            Priority::Low => self.low,
            Priority::Medium => self.medium,
            Priority::High => self.high,
        }
    }
}

impl Default for CompletionRewards {
    fn default() -> Self {
        Self {
            low: 50,
            medium: 100,
            high: 150,
        }
    }
}

/// Result of one engine operation
#[derive(Debug, Clone, Serialize)]
pub struct LedgerUpdate {
    /// Ledger after the operation
    pub ledger: PointsLedger,
    /// History entries appended by this operation, oldest first
    pub entries: Vec<PointEntry>,
    /// Badges acquired by this operation
    pub unlocked: Vec<BadgeState>,
    /// Highest level newly reached, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level_up: Option<u32>,
}

#[derive(Debug, Default)]
struct Changes {
    entries: Vec<PointEntry>,
    unlocked: Vec<BadgeState>,
}

pub struct PointsEngine<S: LedgerStore> {
    store: S,
    ledger: PointsLedger,
    catalog: Vec<BadgeDefinition>,
    rewards: CompletionRewards,
}

impl<S: LedgerStore> PointsEngine<S> {
    /// Load the ledger from `store`, or start a fresh one.
    pub fn open(store: S, catalog: Vec<BadgeDefinition>, rewards: CompletionRewards) -> Result<Self> {
        let mut ledger = store
            .load()?
            .unwrap_or_else(|| PointsLedger::new(&catalog));
        ledger.sync_badges(&catalog);
        Ok(Self {
            store,
            ledger,
            catalog,
            rewards,
        })
    }

    /// Open with catalog and rewards taken from configuration
    pub fn from_config(store: S, config: &PointsConfig) -> Result<Self> {
        Self::open(store, config.catalog(), config.rewards())
    }

    pub fn ledger(&self) -> &PointsLedger {
        &self.ledger
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn catalog(&self) -> &[BadgeDefinition] {
        &self.catalog
    }

    /// Record a signed point change, paying level-up bonuses for every level
    /// boundary crossed.
    pub fn add_points(&mut self, action: &str, delta: i64) -> Result<LedgerUpdate> {
        let now = Utc::now();
        self.commit(|ledger, _, changes| {
            changes.entries.extend(apply_points(ledger, action, delta, now)?);
            Ok(())
        })
    }

    /// Unlock every badge whose rule now holds for `task`.
    pub fn check_badges(&mut self, task: &Task) -> Result<LedgerUpdate> {
        self.check_badges_at(task, Utc::now())
    }

    pub fn check_badges_at(&mut self, task: &Task, now: DateTime<Utc>) -> Result<LedgerUpdate> {
        self.commit(|ledger, catalog, changes| {
            apply_badges(ledger, catalog, task, now, changes)
        })
    }

    /// Advance the daily streak for today's local date.
    pub fn update_streak(&mut self) -> Result<LedgerUpdate> {
        self.update_streak_on(Local::now().date_naive())
    }

    pub fn update_streak_on(&mut self, today: NaiveDate) -> Result<LedgerUpdate> {
        let now = Utc::now();
        self.commit(|ledger, _, changes| {
            changes.entries.extend(apply_streak(ledger, today, now)?);
            Ok(())
        })
    }

    /// Reward flow for a task that just reached Done: completion points,
    /// completion counters, streak, then badges. Persisted as one write.
    pub fn record_completion(&mut self, task: &Task) -> Result<LedgerUpdate> {
        self.record_completion_at(task, Utc::now(), Local::now().date_naive())
    }

    pub fn record_completion_at(
        &mut self,
        task: &Task,
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> Result<LedgerUpdate> {
        let reward = self.rewards.for_priority(task.priority);
        self.commit(|ledger, catalog, changes| {
            let action = format!("Completed: {}", task.title);
            changes.entries.extend(apply_points(ledger, &action, reward, now)?);

            ledger.stats.completions.total += 1;
            if task.priority == Priority::High {
                ledger.stats.completions.high_priority += 1;
            }

            changes.entries.extend(apply_streak(ledger, today, now)?);
            apply_badges(ledger, catalog, task, now, changes)
        })
    }

    fn commit(
        &mut self,
        mutate: impl FnOnce(&mut PointsLedger, &[BadgeDefinition], &mut Changes) -> Result<()>,
    ) -> Result<LedgerUpdate> {
        let _guard = self.store.lock()?;

        // Another process may have written since we loaded.
        let mut draft = match self.store.load()? {
            Some(stored) => stored,
            None => self.ledger.clone(),
        };
        draft.sync_badges(&self.catalog);
        let level_before = level_for(draft.points);

        let mut changes = Changes::default();
        mutate(&mut draft, &self.catalog, &mut changes)?;
        draft.refresh_level();

        self.store.save(&draft)?;

        let level_after = draft.stats.level;
        if level_after > level_before {
            tracing::info!(level = level_after, points = draft.points, "level up");
        }
        self.ledger = draft;

        Ok(LedgerUpdate {
            ledger: self.ledger.clone(),
            entries: changes.entries,
            unlocked: changes.unlocked,
            level_up: (level_after > level_before).then_some(level_after),
        })
    }
}

/// Append `delta` and any level-up bonuses; returns the new entries.
///
/// Each level above the starting one is paid once, including levels that
/// the bonuses themselves reach. A total outside `±MAX_TOTAL_POINTS` is
/// rejected before anything is appended.
fn apply_points(
    ledger: &mut PointsLedger,
    action: &str,
    delta: i64,
    now: DateTime<Utc>,
) -> Result<Vec<PointEntry>> {
    let total = ledger
        .points
        .checked_add(delta)
        .filter(|total| (-MAX_TOTAL_POINTS..=MAX_TOTAL_POINTS).contains(total))
        .ok_or_else(|| {
            Error::InvalidArgument(format!(
                "{delta:+} points would move the total outside +/-{MAX_TOTAL_POINTS}"
            ))
        })?;

    let mut entries = Vec::new();
    let mut paid_level = level_for(ledger.points);

    let entry = PointEntry::new(action, delta, now);
    ledger.points = total;
    ledger.history.push(entry.clone());
    entries.push(entry);

    loop {
        let reached = level_for(ledger.points);
        if reached <= paid_level {
            break;
        }
        for level in paid_level + 1..=reached {
            let bonus = i64::from(level) * LEVEL_UP_BONUS_PER_LEVEL;
            let entry = PointEntry::new(format!("Level {level} bonus"), bonus, now);
            ledger.points = ledger.points.checked_add(bonus).ok_or_else(|| {
                Error::InvalidArgument(format!("level {level} bonus overflows the total"))
            })?;
            ledger.history.push(entry.clone());
            entries.push(entry);
        }
        paid_level = reached;
    }

    ledger.refresh_level();
    Ok(entries)
}

/// Same day or an earlier date: nothing. Next day: extend and pay a capped
/// bonus. Longer gap, or no activity yet: restart at 1.
fn apply_streak(
    ledger: &mut PointsLedger,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Result<Vec<PointEntry>> {
    let gap = ledger
        .stats
        .last_activity_date
        .map(|last| (today - last).num_days());

    match gap {
        Some(days) if days <= 0 => Ok(Vec::new()),
        Some(1) => {
            ledger.stats.streak_days += 1;
            ledger.stats.last_activity_date = Some(today);
            let streak = ledger.stats.streak_days;
            let bonus = (i64::from(streak) * STREAK_BONUS_PER_DAY).min(STREAK_BONUS_CAP);
            apply_points(ledger, &format!("{streak}-day streak bonus"), bonus, now)
        }
        _ => {
            ledger.stats.streak_days = 1;
            ledger.stats.last_activity_date = Some(today);
            Ok(Vec::new())
        }
    }
}

fn apply_badges(
    ledger: &mut PointsLedger,
    catalog: &[BadgeDefinition],
    task: &Task,
    now: DateTime<Utc>,
    changes: &mut Changes,
) -> Result<()> {
    let earned: Vec<&BadgeDefinition> = {
        let ctx = BadgeContext {
            task,
            ledger: &*ledger,
            now,
        };
        catalog
            .iter()
            .filter(|badge| !ledger.has_badge(&badge.id) && badge.rule.is_satisfied(&ctx))
            .collect()
    };

    for badge in earned {
        if let Some(state) = ledger
            .stats
            .badges
            .iter_mut()
            .find(|state| state.id == badge.id)
        {
            state.acquired = true;
            state.acquired_at = Some(now);
            changes.unlocked.push(state.clone());
        }
        tracing::info!(badge = %badge.id, reward = badge.reward, "badge unlocked");
        let action = format!("Badge earned: {}", badge.name);
        changes
            .entries
            .extend(apply_points(ledger, &action, badge.reward, now)?);
    }
    Ok(())
}
