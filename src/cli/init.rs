//! ql init command implementation
//!
//! Creates the data directory and a default `questlog.toml`.

use std::path::PathBuf;

use crate::config::Config;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::storage::Storage;

pub struct InitOptions {
    pub data_dir: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

#[derive(serde::Serialize)]
struct InitReport {
    data_dir: PathBuf,
    config: PathBuf,
    created_config: bool,
}

pub fn run(options: InitOptions) -> Result<()> {
    let storage = Storage::open_default(options.data_dir.as_deref())?;
    let config_path = storage.config_file();

    let created_config = if config_path.exists() {
        // Refuse to report success over a broken file.
        Config::load(&config_path)?;
        false
    } else {
        Config::default().save(&config_path)?;
        tracing::info!(path = %config_path.display(), "wrote default config");
        true
    };

    let report = InitReport {
        data_dir: storage.root().to_path_buf(),
        config: config_path.clone(),
        created_config,
    };

    let header = if created_config {
        "ql init: initialized data directory"
    } else {
        "ql init: nothing to do"
    };
    let mut human = HumanOutput::new(header);
    human.push_summary("data dir", storage.root().display().to_string());
    human.push_summary(
        "created",
        if created_config {
            config_path.display().to_string()
        } else {
            "none".to_string()
        },
    );
    human.push_next_step("ql task add \"<title>\"");

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "init",
        &report,
        Some(&human),
    )
}
