//! Schedule persistence
//!
//! The manager mirrors every successful in-memory mutation into a
//! `ScheduleStore` so a restart can rebuild the schedule index
//! identically. The bundled implementation is a JSON flat file.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use crate::rule::SlowmodeRule;

/// Wire shape of one persisted schedule definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedRule {
    pub id: String,
    pub owner_id: String,
    pub target_id: String,
    pub start_time: String,
    pub end_time: String,
    pub active_value: u32,
    pub restore_value: u32,
    pub timezone: String,
    pub days: Vec<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl PersistedRule {
    pub fn from_rule(rule: &SlowmodeRule) -> Self {
        Self {
            id: rule.id.clone(),
            owner_id: rule.owner_id.clone(),
            target_id: rule.target_id.clone(),
            start_time: rule.start_time.to_string(),
            end_time: rule.end_time.to_string(),
            active_value: rule.active_value,
            restore_value: rule.restore_value,
            timezone: rule.timezone.name().to_string(),
            days: rule.days.iter().map(|d| d.tag().to_string()).collect(),
            enabled: rule.enabled,
        }
    }
}

/// Storage interface for schedule persistence.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Load every persisted schedule, keyed by rule id. Read once at
    /// startup.
    async fn list_persisted_rules(&self) -> Result<HashMap<String, PersistedRule>>;

    /// Create or update one schedule (upsert semantics).
    async fn persist_add(&self, rule: &PersistedRule) -> Result<()>;

    /// Delete one schedule. No-op if the id is absent.
    async fn persist_remove(&self, id: &str) -> Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    schedules: HashMap<String, PersistedRule>,
}

/// JSON flat-file `ScheduleStore`.
///
/// Writes go through a temp file plus rename so a crash mid-write never
/// leaves a truncated store behind. A missing file reads as empty.
pub struct FileScheduleStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileScheduleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()) }
    }

    async fn read_file(&self) -> Result<StoreFile> {
        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(StoreFile::default());
        }

        let content = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read schedule store {}", self.path.display()))?;

        serde_json::from_str(&content)
            .map_err(|e| anyhow!("Invalid JSON in schedule store {}: {}", self.path.display(), e))
    }

    async fn write_file(&self, file: &StoreFile) -> Result<()> {
        let tmp_path = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(file)?;

        fs::write(&tmp_path, content)
            .await
            .with_context(|| format!("Failed to write schedule store {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path)
            .await
            .with_context(|| format!("Failed to replace schedule store {}", self.path.display()))?;

        Ok(())
    }
}

#[async_trait]
impl ScheduleStore for FileScheduleStore {
    async fn list_persisted_rules(&self) -> Result<HashMap<String, PersistedRule>> {
        let _guard = self.write_lock.lock().await;
        Ok(self.read_file().await?.schedules)
    }

    async fn persist_add(&self, rule: &PersistedRule) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut file = self.read_file().await?;
        file.schedules.insert(rule.id.clone(), rule.clone());
        self.write_file(&file).await?;
        debug!("Persisted schedule {} to {}", rule.id, self.path.display());
        Ok(())
    }

    async fn persist_remove(&self, id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut file = self.read_file().await?;
        if file.schedules.remove(id).is_none() {
            debug!("Schedule {} not present in {}", id, self.path.display());
            return Ok(());
        }
        self.write_file(&file).await?;
        debug!("Removed schedule {} from {}", id, self.path.display());
        Ok(())
    }
}
