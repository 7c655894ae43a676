//! Configuration loading and management
//!
//! Handles parsing of `questlog.toml` in the data directory.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::badges::{self, BadgeDefinition};
use crate::points::CompletionRewards;
use crate::storage::CONFIG_FILE;

/// Environment variable that overrides `notion.database_id`
pub const NOTION_DATABASE_ID_ENV: &str = "NOTION_DATABASE_ID";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Task store selection
    #[serde(default)]
    pub store: StoreConfig,

    /// Notion backend settings
    #[serde(default)]
    pub notion: NotionConfig,

    /// Deadline notifier settings
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Point rewards and badge catalog
    #[serde(default)]
    pub points: PointsConfig,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Local,
    Notion,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
}

/// Notion-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotionConfig {
    /// Database holding the task pages
    #[serde(default)]
    pub database_id: String,

    /// Name of the environment variable carrying the integration token
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// API root
    #[serde(default = "default_notion_base_url")]
    pub base_url: String,
}

fn default_api_key_env() -> String {
    "NOTION_API_KEY".to_string()
}

fn default_notion_base_url() -> String {
    "https://api.notion.com/v1".to_string()
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            database_id: String::new(),
            api_key_env: default_api_key_env(),
            base_url: default_notion_base_url(),
        }
    }
}

impl NotionConfig {
    /// Database id with `NOTION_DATABASE_ID` taking precedence
    pub fn resolved_database_id(&self) -> Option<String> {
        std::env::var(NOTION_DATABASE_ID_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .or_else(|| Some(self.database_id.clone()).filter(|id| !id.trim().is_empty()))
    }
}

/// Deadline notifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Days ahead of today that still produce a reminder
    #[serde(default = "default_window_days")]
    pub window_days: u32,

    /// Seconds between scheduled recomputations in watch mode
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Seconds between task store reloads in watch mode
    #[serde(default = "default_reload_secs")]
    pub reload_secs: u64,
}

fn default_window_days() -> u32 {
    crate::notify::DEFAULT_WINDOW_DAYS
}

fn default_interval_secs() -> u64 {
    crate::notify::DEFAULT_INTERVAL.as_secs()
}

fn default_reload_secs() -> u64 {
    60
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
            interval_secs: default_interval_secs(),
            reload_secs: default_reload_secs(),
        }
    }
}

/// Points configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointsConfig {
    #[serde(default = "default_completion_low")]
    pub completion_low: i64,

    #[serde(default = "default_completion_medium")]
    pub completion_medium: i64,

    #[serde(default = "default_completion_high")]
    pub completion_high: i64,

    /// Replaces the built-in catalog when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badges: Option<Vec<BadgeDefinition>>,
}

fn default_completion_low() -> i64 {
    CompletionRewards::default().low
}

fn default_completion_medium() -> i64 {
    CompletionRewards::default().medium
}

fn default_completion_high() -> i64 {
    CompletionRewards::default().high
}

impl Default for PointsConfig {
    fn default() -> Self {
        Self {
            completion_low: default_completion_low(),
            completion_medium: default_completion_medium(),
            completion_high: default_completion_high(),
            badges: None,
        }
    }
}

impl PointsConfig {
    pub fn rewards(&self) -> CompletionRewards {
        CompletionRewards {
            low: self.completion_low,
            medium: self.completion_medium,
            high: self.completion_high,
        }
    }

    /// Configured catalog, or the built-in one
    pub fn catalog(&self) -> Vec<BadgeDefinition> {
        self.badges.clone().unwrap_or_else(badges::default_catalog)
    }

    fn validate(&self) -> crate::error::Result<()> {
        for (field, value) in [
            ("points.completion_low", self.completion_low),
            ("points.completion_medium", self.completion_medium),
            ("points.completion_high", self.completion_high),
        ] {
            if value < 0 {
                return Err(crate::error::Error::InvalidConfig(format!(
                    "{field} must be >= 0"
                )));
            }
        }
        if let Some(catalog) = &self.badges {
            badges::validate_catalog(catalog)?;
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from a `questlog.toml` file
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the data directory, or return defaults when
    /// the file does not exist. A present but invalid file is an error.
    pub fn load_from_dir(data_dir: &Path) -> crate::error::Result<Self> {
        let config_path = data_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> crate::error::Result<()> {
        let content = toml::to_string_pretty(self)?;
        crate::lock::write_atomic(path, content.as_bytes())?;
        Ok(())
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        if self.notifier.interval_secs == 0 {
            return Err(crate::error::Error::InvalidConfig(
                "notifier.interval_secs must be > 0".to_string(),
            ));
        }
        if self.notifier.reload_secs == 0 {
            return Err(crate::error::Error::InvalidConfig(
                "notifier.reload_secs must be > 0".to_string(),
            ));
        }
        if self.notion.api_key_env.trim().is_empty() {
            return Err(crate::error::Error::InvalidConfig(
                "notion.api_key_env cannot be empty".to_string(),
            ));
        }
        if !self.notion.base_url.starts_with("http://")
            && !self.notion.base_url.starts_with("https://")
        {
            return Err(crate::error::Error::InvalidConfig(format!(
                "notion.base_url must be an http(s) URL, got '{}'",
                self.notion.base_url
            )));
        }
        self.points.validate()?;
        Ok(())
    }
}
