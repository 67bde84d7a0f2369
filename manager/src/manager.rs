//! Slowmode schedule orchestration
//!
//! `SlowmodeManager` owns the rule index and the job registry. It
//! validates incoming definitions, arms the start/end job pair for each
//! rule, dispatches activate/restore firings to the action executor, and
//! mirrors every successful in-memory mutation into the schedule store so
//! a restart rebuilds the same index.
//!
//! One instance per process; the command front end holds it by reference.
//! Running two instances against the same persisted store produces
//! duplicate activations - there is no cross-process coordination.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::constants::slowmode;
use crate::errors::{ManagerError, RegistrationError, ValidationError};
use crate::executor::SlowmodeExecutor;
use crate::registry::{end_key, start_key, JobCallback, JobRegistry};
use crate::rule::{parse_day_set, validate_slowmode_seconds, SlowmodeRule, TimeOfDay};
use crate::store::{PersistedRule, ScheduleStore};
use crate::trigger::{compute_trigger, RecurrenceSpec};

/// What to restore at the end of the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreTo {
    /// Resolve to the target's live value once, at add time
    Current,
    /// Restore to a fixed number of seconds
    Fixed(u32),
}

impl Default for RestoreTo {
    fn default() -> Self {
        RestoreTo::Current
    }
}

/// Parameters of `add_schedule`. `days` defaults to every day, `restore`
/// to the target's current value, `timezone` to UTC.
#[derive(Debug, Clone)]
pub struct AddScheduleRequest {
    pub owner_id: String,
    pub target_id: String,
    pub start_time: String,
    pub end_time: String,
    pub active_value: u32,
    pub days: Option<Vec<String>>,
    pub restore: RestoreTo,
    pub timezone: String,
}

impl AddScheduleRequest {
    pub fn new(
        owner_id: impl Into<String>,
        target_id: impl Into<String>,
        start_time: impl Into<String>,
        end_time: impl Into<String>,
        active_value: u32,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            target_id: target_id.into(),
            start_time: start_time.into(),
            end_time: end_time.into(),
            active_value,
            days: None,
            restore: RestoreTo::Current,
            timezone: "UTC".to_string(),
        }
    }

    pub fn with_days(mut self, days: &[&str]) -> Self {
        self.days = Some(days.iter().map(|d| d.to_string()).collect());
        self
    }

    pub fn with_restore(mut self, restore: RestoreTo) -> Self {
        self.restore = restore;
        self
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }
}

/// Successful `add_schedule` outcome.
#[derive(Debug, Clone)]
pub struct ScheduleAdded {
    pub id: String,
    /// Set for accepted-but-suspect definitions (start == end)
    pub warning: Option<String>,
}

/// Next wall-clock instants of a rule's two jobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NextRunTimes {
    pub next_start: Option<DateTime<Utc>>,
    pub next_end: Option<DateTime<Utc>>,
}

pub struct SlowmodeManager {
    executor: Arc<dyn SlowmodeExecutor>,
    store: Arc<dyn ScheduleStore>,
    registry: JobRegistry,
    rules: RwLock<HashMap<String, SlowmodeRule>>,
}

impl SlowmodeManager {
    pub fn new(executor: Arc<dyn SlowmodeExecutor>, store: Arc<dyn ScheduleStore>) -> Self {
        Self {
            executor,
            store,
            registry: JobRegistry::new(),
            rules: RwLock::new(HashMap::new()),
        }
    }

    /// Start the recurrence clock and rebuild the index from the store.
    pub async fn start(&self) -> usize {
        self.registry.start().await;
        self.load_persisted().await
    }

    /// Stop the clock cleanly. In-flight firings complete naturally.
    pub async fn shutdown(&self) {
        self.registry.shutdown().await;
    }

    /// Validate a new schedule, arm its job pair and index it.
    ///
    /// A rule with a colliding id replaces the prior one atomically: both
    /// jobs are re-armed together. Nothing is registered if any validation
    /// step fails.
    pub async fn add_schedule(
        &self,
        request: AddScheduleRequest,
    ) -> Result<ScheduleAdded, ManagerError> {
        let days = parse_day_set(request.days.as_deref())?;
        validate_slowmode_seconds(request.active_value)?;

        let start_spec = compute_trigger(&request.start_time, &days, &request.timezone)?;
        let end_spec = compute_trigger(&request.end_time, &days, &request.timezone)?;

        let restore_value = match request.restore {
            RestoreTo::Fixed(value) => {
                validate_slowmode_seconds(value)?;
                value
            }
            RestoreTo::Current => self.resolve_current_value(&request.target_id).await,
        };

        let start_time = start_spec.time_of_day();
        let end_time = end_spec.time_of_day();
        let id = SlowmodeRule::derive_id(
            &request.owner_id,
            &request.target_id,
            start_time,
            end_time,
            &days,
        );

        let rule = SlowmodeRule {
            id: id.clone(),
            owner_id: request.owner_id,
            target_id: request.target_id,
            start_time,
            end_time,
            active_value: request.active_value,
            restore_value,
            days,
            timezone: start_spec.timezone,
            enabled: true,
        };

        let warning = rule.is_degenerate().then(|| {
            format!(
                "Start and end are both {}; the restore job wins at that instant",
                rule.start_time
            )
        });
        if let Some(ref warning) = warning {
            warn!("Schedule {}: {}", id, warning);
        }

        {
            let mut rules = self.rules.write().await;
            self.arm_rule(&rule, start_spec, end_spec).await?;
            rules.insert(id.clone(), rule.clone());
        }

        if let Err(e) = self.store.persist_add(&PersistedRule::from_rule(&rule)).await {
            warn!("Failed to persist schedule {}: {}", id, e);
        }

        info!(
            "Added slowmode schedule {}: target {}, {}-{} ({}s slowmode, restore {}s, days {})",
            id,
            rule.target_id,
            rule.start_time,
            rule.end_time,
            rule.active_value,
            rule.restore_value,
            rule.day_summary()
        );

        Ok(ScheduleAdded { id, warning })
    }

    /// Remove every owned rule matching the `(target, start, end)` triple,
    /// across day-sets. Returns whether anything was removed.
    ///
    /// Removal is all-or-nothing per rule: disarm failures are logged and
    /// the index entry is dropped regardless, so a broken job never leaves
    /// a queryable-but-dead rule behind.
    pub async fn remove_schedule(
        &self,
        owner_id: &str,
        target_id: &str,
        start_time: &str,
        end_time: &str,
    ) -> Result<bool, ManagerError> {
        let start: TimeOfDay = start_time.parse()?;
        let end: TimeOfDay = end_time.parse()?;

        let mut removed_ids = Vec::new();
        {
            let mut rules = self.rules.write().await;
            rules.retain(|id, rule| {
                let matches = rule.owner_id == owner_id
                    && rule.target_id == target_id
                    && rule.start_time == start
                    && rule.end_time == end;
                if matches {
                    removed_ids.push(id.clone());
                }
                !matches
            });

            for id in &removed_ids {
                self.registry.remove_pair(id).await;
            }
        }

        if removed_ids.is_empty() {
            warn!(
                "No schedule matched target {} ({} - {}) for owner {}",
                target_id, start, end, owner_id
            );
            return Ok(false);
        }

        for id in &removed_ids {
            if let Err(e) = self.store.persist_remove(id).await {
                warn!("Failed to remove persisted schedule {}: {}", id, e);
            }
            info!("Removed slowmode schedule {}", id);
        }

        Ok(true)
    }

    /// Enabled rules of one owner, keyed by id.
    pub async fn list_schedules(&self, owner_id: &str) -> HashMap<String, SlowmodeRule> {
        let rules = self.rules.read().await;
        rules
            .iter()
            .filter(|(_, rule)| rule.enabled && rule.owner_id == owner_id)
            .map(|(id, rule)| (id.clone(), rule.clone()))
            .collect()
    }

    /// Toggle a rule without dropping it from the store. Disabling disarms
    /// both jobs; enabling re-arms them. Returns whether the rule exists.
    pub async fn set_enabled(&self, id: &str, enabled: bool) -> bool {
        let snapshot = {
            let mut rules = self.rules.write().await;
            let Some(rule) = rules.get_mut(id) else {
                warn!("Schedule {} not found", id);
                return false;
            };
            if rule.enabled == enabled {
                return true;
            }
            rule.enabled = enabled;
            let snapshot = rule.clone();

            if enabled {
                let start_spec = RecurrenceSpec::new(
                    snapshot.start_time,
                    snapshot.days.clone(),
                    snapshot.timezone,
                );
                let end_spec =
                    RecurrenceSpec::new(snapshot.end_time, snapshot.days.clone(), snapshot.timezone);
                if let Err(e) = self.arm_rule(&snapshot, start_spec, end_spec).await {
                    error!("Failed to re-arm schedule {}: {}", id, e);
                }
            } else {
                self.registry.remove_pair(id).await;
            }
            snapshot
        };

        if let Err(e) = self.store.persist_add(&PersistedRule::from_rule(&snapshot)).await {
            warn!("Failed to persist schedule {}: {}", id, e);
        }
        info!("Schedule {} {}", id, if enabled { "enabled" } else { "disabled" });
        true
    }

    /// Next fire times of a rule's start and end jobs.
    pub async fn next_run_times(&self, id: &str) -> NextRunTimes {
        NextRunTimes {
            next_start: self.registry.next_fire_time(&start_key(id)).await,
            next_end: self.registry.next_fire_time(&end_key(id)).await,
        }
    }

    /// Apply a slowmode value immediately, outside any schedule.
    pub async fn apply_now(&self, target_id: &str, seconds: u32) -> Result<bool, ManagerError> {
        validate_slowmode_seconds(seconds)?;
        let accepted = self.executor.set_slowmode(target_id, seconds).await?;
        if accepted {
            info!("Set slowmode to {} for channel {}", slowmode_text(seconds), target_id);
        } else {
            warn!("Platform rejected slowmode update for channel {}", target_id);
        }
        Ok(accepted)
    }

    /// Activation callback body: apply `active_value`, log, never touch
    /// the index.
    pub async fn activate(&self, target_id: &str, seconds: u32) {
        run_activate(self.executor.clone(), target_id.to_string(), seconds).await;
    }

    /// Restoration callback body: apply `restore_value`, log, never touch
    /// the index.
    pub async fn restore(&self, target_id: &str, seconds: u32) {
        run_restore(self.executor.clone(), target_id.to_string(), seconds).await;
    }

    /// Job registry access for next-fire queries beyond `next_run_times`.
    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Rebuild the index from the store. Invalid records are logged and
    /// skipped, never fatal; disabled rules are indexed without arming.
    async fn load_persisted(&self) -> usize {
        let records = match self.store.list_persisted_rules().await {
            Ok(records) => records,
            Err(e) => {
                warn!("Failed to load persisted schedules: {}", e);
                return 0;
            }
        };

        let mut loaded = 0;
        for (id, record) in records {
            let rule = match self.rule_from_record(record) {
                Ok(rule) => rule,
                Err(e) => {
                    warn!("Skipping persisted schedule {}: {}", id, e);
                    continue;
                }
            };

            let mut rules = self.rules.write().await;
            if rule.enabled {
                let start_spec =
                    RecurrenceSpec::new(rule.start_time, rule.days.clone(), rule.timezone);
                let end_spec = RecurrenceSpec::new(rule.end_time, rule.days.clone(), rule.timezone);
                if let Err(e) = self.arm_rule(&rule, start_spec, end_spec).await {
                    error!("Failed to arm persisted schedule {}: {}", id, e);
                    continue;
                }
            }
            rules.insert(rule.id.clone(), rule);
            loaded += 1;
        }

        info!("Loaded {} slowmode schedules from store", loaded);
        loaded
    }

    fn rule_from_record(&self, record: PersistedRule) -> Result<SlowmodeRule, ValidationError> {
        let days = parse_day_set(Some(&record.days))?;
        validate_slowmode_seconds(record.active_value)?;
        validate_slowmode_seconds(record.restore_value)?;

        let start_spec = compute_trigger(&record.start_time, &days, &record.timezone)?;
        let end_spec = compute_trigger(&record.end_time, &days, &record.timezone)?;

        Ok(SlowmodeRule {
            id: record.id,
            owner_id: record.owner_id,
            target_id: record.target_id,
            start_time: start_spec.time_of_day(),
            end_time: end_spec.time_of_day(),
            active_value: record.active_value,
            restore_value: record.restore_value,
            days,
            timezone: start_spec.timezone,
            enabled: record.enabled,
        })
    }

    /// Arm the rule's start/end pair. Callbacks capture only the target id
    /// and value; they never read the rule index.
    async fn arm_rule(
        &self,
        rule: &SlowmodeRule,
        start_spec: RecurrenceSpec,
        end_spec: RecurrenceSpec,
    ) -> Result<(), RegistrationError> {
        let activate = activation_callback(
            self.executor.clone(),
            rule.target_id.clone(),
            rule.active_value,
        );
        let restore = restoration_callback(
            self.executor.clone(),
            rule.target_id.clone(),
            rule.restore_value,
        );

        self.registry
            .arm_pair(&rule.id, (start_spec, activate), (end_spec, restore))
            .await
    }

    /// Single read of the target's live value for restore-to-current. A
    /// failed read falls back to "no restriction" rather than aborting the
    /// add - explicit, logged policy.
    async fn resolve_current_value(&self, target_id: &str) -> u32 {
        match self.executor.current_slowmode(target_id).await {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    "Could not read current slowmode of channel {}: {}; restoring to 0",
                    target_id, e
                );
                slowmode::NO_RESTRICTION
            }
        }
    }
}

fn slowmode_text(seconds: u32) -> String {
    if seconds > 0 {
        format!("{} seconds", seconds)
    } else {
        "disabled".to_string()
    }
}

fn activation_callback(
    executor: Arc<dyn SlowmodeExecutor>,
    target_id: String,
    seconds: u32,
) -> JobCallback {
    Arc::new(move || {
        let executor = executor.clone();
        let target_id = target_id.clone();
        Box::pin(run_activate(executor, target_id, seconds))
    })
}

fn restoration_callback(
    executor: Arc<dyn SlowmodeExecutor>,
    target_id: String,
    seconds: u32,
) -> JobCallback {
    Arc::new(move || {
        let executor = executor.clone();
        let target_id = target_id.clone();
        Box::pin(run_restore(executor, target_id, seconds))
    })
}

/// One activation firing. Failures are logged and absorbed: the rule
/// stays armed and the next weekly occurrence self-heals.
async fn run_activate(executor: Arc<dyn SlowmodeExecutor>, target_id: String, seconds: u32) {
    match executor.set_slowmode(&target_id, seconds).await {
        Ok(true) => info!("Enabled {}s slowmode for channel {}", seconds, target_id),
        Ok(false) => error!("Failed to enable slowmode for channel {}", target_id),
        Err(e) => error!("Error enabling slowmode for channel {}: {}", target_id, e),
    }
}

/// One restoration firing. Same absorption policy as activation.
async fn run_restore(executor: Arc<dyn SlowmodeExecutor>, target_id: String, seconds: u32) {
    match executor.set_slowmode(&target_id, seconds).await {
        Ok(true) => info!(
            "Restored slowmode to {} for channel {}",
            slowmode_text(seconds),
            target_id
        ),
        Ok(false) => error!("Failed to restore slowmode for channel {}", target_id),
        Err(e) => error!("Error restoring slowmode for channel {}: {}", target_id, e),
    }
}
