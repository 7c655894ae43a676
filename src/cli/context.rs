//! Per-invocation wiring: data dir, config, stores and engines.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::config::{Config, StoreBackend};
use crate::error::{Error, Result};
use crate::integrations::notion::NotionTaskStore;
use crate::ledger::FileLedgerStore;
use crate::points::PointsEngine;
use crate::storage::Storage;
use crate::task::{LocalTaskStore, TaskStore};

pub(crate) struct Context {
    pub storage: Storage,
    pub config: Config,
}

impl Context {
    pub fn load(data_dir: Option<PathBuf>) -> Result<Self> {
        let storage = Storage::open_default(data_dir.as_deref())?;
        let config = Config::load_from_dir(storage.root())?;
        Ok(Self { storage, config })
    }

    /// Task store selected by `store.backend`
    pub fn task_store(&self) -> Result<Arc<dyn TaskStore>> {
        let store: Arc<dyn TaskStore> = match self.config.store.backend {
            StoreBackend::Local => Arc::new(LocalTaskStore::new(self.storage.clone())),
            StoreBackend::Notion => Arc::new(NotionTaskStore::from_config(&self.config.notion)?),
        };
        tracing::debug!(backend = store.backend(), "task store ready");
        Ok(store)
    }

    pub fn points_engine(&self) -> Result<PointsEngine<FileLedgerStore>> {
        PointsEngine::from_config(
            FileLedgerStore::new(self.storage.clone()),
            &self.config.points,
        )
    }
}

pub(crate) fn parse_date(flag: &str, raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        Error::InvalidArgument(format!("--{flag}: expected YYYY-MM-DD, got '{raw}'"))
    })
}

pub(crate) fn parse_optional_date(flag: &str, raw: Option<&str>) -> Result<Option<NaiveDate>> {
    raw.map(|value| parse_date(flag, value)).transpose()
}
