//! questlog - personal task tracking with points and badges
//!
//! This library provides the core of the `ql` CLI: a task store seam with
//! local and Notion backends, a pure filter/sort engine, a points engine
//! that rewards completed work, and a deadline notifier.
//!
//! # Core Concepts
//!
//! - **Tasks**: titled work items whose status follows their progress
//! - **Ledger**: total points, append-only history and derived stats,
//!   persisted as one document
//! - **Levels**: square-root curve over total points, with a bonus for
//!   every level reached
//! - **Streaks**: consecutive days of activity, with a capped daily bonus
//! - **Badges**: data-driven unlock rules, each awarded at most once
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `questlog.toml`
//! - `error`: Error types and result aliases
//! - `task`: Task model, `TaskStore` trait, local and in-memory stores
//! - `integrations`: Notion-backed task store
//! - `view`: Filtering, sorting, search and status tabs
//! - `ledger`: Points ledger state and `LedgerStore` persistence
//! - `badges`: Badge catalog and unlock rules
//! - `points`: Points engine (awards, level-ups, streaks, badges)
//! - `notify`: Deadline reminders and the background notifier
//! - `output`: Human and JSON rendering
//! - `storage`: Data directory layout
//! - `lock`: File locking and atomic writes

pub mod badges;
pub mod cli;
pub mod config;
pub mod error;
pub mod integrations;
pub mod ledger;
pub mod lock;
pub mod notify;
pub mod output;
pub mod points;
pub mod storage;
pub mod task;
pub mod view;

pub use error::{Error, Result};
