//! Command-line interface for ql
//!
//! This module defines the CLI structure using clap derive macros.
//! Each command group is implemented in its own submodule.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::Result;

mod context;
mod init;
mod notify;
mod points;
mod task;

/// ql - a personal task tracker with points, levels and badges
#[derive(Parser, Debug)]
#[command(name = "ql")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Data directory (defaults to the platform data dir)
    #[arg(long, global = true, env = "QL_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the data directory and a default questlog.toml
    Init,

    /// Task management
    #[command(subcommand)]
    Task(TaskCommands),

    /// Points, levels, streaks and badges
    #[command(subcommand)]
    Points(PointsCommands),

    /// Show deadline reminders
    Notify {
        /// Evaluate as of this date (YYYY-MM-DD) instead of today
        #[arg(long)]
        today: Option<String>,

        /// Keep running and print reminders whenever they change
        #[arg(long, conflicts_with = "today")]
        watch: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Create a task
    Add {
        /// Task title
        title: String,

        /// Longer description
        #[arg(short, long, default_value = "")]
        description: String,

        /// Priority: low, medium, high
        #[arg(short, long)]
        priority: Option<String>,

        /// Deadline (YYYY-MM-DD)
        #[arg(long)]
        deadline: Option<String>,

        /// Tag (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },

    /// List tasks with optional filters and sorting
    #[command(alias = "ls")]
    List {
        /// Only this priority
        #[arg(long)]
        priority: Option<String>,

        /// Only this status: todo, in-progress, done
        #[arg(long)]
        status: Option<String>,

        /// Case-insensitive text in title or description
        #[arg(long)]
        search: Option<String>,

        /// Sort by deadline, priority or progress
        #[arg(long)]
        sort: Option<String>,

        /// Sort descending
        #[arg(long)]
        desc: bool,

        /// Status tab: all, todo, inprogress, done
        #[arg(long, default_value = "all")]
        tab: String,
    },

    /// Show one task
    Show {
        /// Task id or unique prefix
        id: String,
    },

    /// Change task fields
    Edit {
        /// Task id or unique prefix
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(short, long)]
        priority: Option<String>,

        /// Deadline (YYYY-MM-DD)
        #[arg(long)]
        deadline: Option<String>,

        /// Replace tags (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },

    /// Set progress (0-100); reaching 100 awards completion points
    Progress {
        /// Task id or unique prefix
        id: String,

        /// Percent complete
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        progress: u8,
    },

    /// Remove a task
    Rm {
        /// Task id or unique prefix
        id: String,
    },

    /// Remove every task
    Clear {
        /// Confirm removal
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum PointsCommands {
    /// Points, level and streak summary
    Show,

    /// Recent point history, newest first
    History {
        /// Maximum entries to show
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },

    /// Badge catalog and what has been earned
    Badges,

    /// Record a manual point change
    Add {
        /// What the points are for
        action: String,

        /// Signed point delta
        #[arg(allow_hyphen_values = true)]
        delta: i64,
    },

    /// Record today's activity for the streak
    Checkin,
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let data_dir = self.data_dir;
        let json = self.json;
        let quiet = self.quiet;
        match self.command {
            Commands::Init => init::run(init::InitOptions {
                data_dir,
                json,
                quiet,
            }),
            Commands::Task(cmd) => match cmd {
                TaskCommands::Add {
                    title,
                    description,
                    priority,
                    deadline,
                    tags,
                } => task::run_add(task::AddOptions {
                    title,
                    description,
                    priority,
                    deadline,
                    tags,
                    data_dir,
                    json,
                    quiet,
                }),
                TaskCommands::List {
                    priority,
                    status,
                    search,
                    sort,
                    desc,
                    tab,
                } => task::run_list(task::ListOptions {
                    priority,
                    status,
                    search,
                    sort,
                    desc,
                    tab,
                    data_dir,
                    json,
                    quiet,
                }),
                TaskCommands::Show { id } => task::run_show(task::ShowOptions {
                    id,
                    data_dir,
                    json,
                    quiet,
                }),
                TaskCommands::Edit {
                    id,
                    title,
                    description,
                    priority,
                    deadline,
                    tags,
                } => task::run_edit(task::EditOptions {
                    id,
                    title,
                    description,
                    priority,
                    deadline,
                    tags,
                    data_dir,
                    json,
                    quiet,
                }),
                TaskCommands::Progress { id, progress } => {
                    task::run_progress(task::ProgressOptions {
                        id,
                        progress,
                        data_dir,
                        json,
                        quiet,
                    })
                }
                TaskCommands::Rm { id } => task::run_rm(task::RmOptions {
                    id,
                    data_dir,
                    json,
                    quiet,
                }),
                TaskCommands::Clear { yes } => task::run_clear(task::ClearOptions {
                    yes,
                    data_dir,
                    json,
                    quiet,
                }),
            },
            Commands::Points(cmd) => {
                let options = points::PointsOptions {
                    data_dir,
                    json,
                    quiet,
                };
                match cmd {
                    PointsCommands::Show => points::run_show(options),
                    PointsCommands::History { limit } => points::run_history(options, limit),
                    PointsCommands::Badges => points::run_badges(options),
                    PointsCommands::Add { action, delta } => {
                        points::run_add(options, &action, delta)
                    }
                    PointsCommands::Checkin => points::run_checkin(options),
                }
            }
            Commands::Notify { today, watch } => notify::run(notify::NotifyOptions {
                today,
                watch,
                data_dir,
                json,
                quiet,
            }),
        }
    }
}
