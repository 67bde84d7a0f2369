//! Job registry and the recurrence clock that drives it
//!
//! The registry keeps a keyed map of armed jobs (recurrence spec plus
//! callback) and owns a single background task that sleeps until the
//! earliest armed instant, fires every due job, and re-arms it for its
//! next occurrence. Each firing runs as its own spawned task so a hung
//! callback cannot delay other jobs, and a per-key in-flight flag prevents
//! overlapping invocations of the same job.
//!
//! Occurrences that pass while no process is running are skipped: triggers
//! are always computed forward from "now", never backfilled.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::constants::clock;
use crate::errors::RegistrationError;
use crate::trigger::RecurrenceSpec;

pub type JobFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
pub type JobCallback = Arc<dyn Fn() -> JobFuture + Send + Sync>;

/// Key of the job that applies `active_value` at `start_time`
pub fn start_key(rule_id: &str) -> String {
    format!("{}_start", rule_id)
}

/// Key of the job that applies `restore_value` at `end_time`
pub fn end_key(rule_id: &str) -> String {
    format!("{}_end", rule_id)
}

struct JobEntry {
    spec: RecurrenceSpec,
    next_fire: Option<DateTime<Utc>>,
    callback: JobCallback,
    in_flight: Arc<AtomicBool>,
}

struct ClockShared {
    jobs: Mutex<HashMap<String, JobEntry>>,
    rearm: Notify,
    stopped: AtomicBool,
}

pub struct JobRegistry {
    shared: Arc<ClockShared>,
    clock_task: Mutex<Option<JoinHandle<()>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(ClockShared {
                jobs: Mutex::new(HashMap::new()),
                rearm: Notify::new(),
                stopped: AtomicBool::new(false),
            }),
            clock_task: Mutex::new(None),
        }
    }

    /// Spawn the clock task. Jobs armed before `start` are picked up on
    /// the first tick.
    pub async fn start(&self) {
        let mut task = self.clock_task.lock().await;
        if task.is_some() {
            warn!("Recurrence clock already running");
            return;
        }
        *task = Some(tokio::spawn(run_clock(self.shared.clone())));
    }

    /// Stop the clock cleanly: no further firings, in-flight callbacks
    /// complete naturally.
    pub async fn shutdown(&self) {
        self.shared.stopped.store(true, Ordering::SeqCst);
        self.shared.rearm.notify_one();

        let task = self.clock_task.lock().await.take();
        if let Some(task) = task {
            let _ = task.await;
        }
        info!("Slowmode scheduler stopped");
    }

    /// Arm a single job, replacing any job already registered under `key`.
    pub async fn add_or_replace(
        &self,
        key: String,
        spec: RecurrenceSpec,
        callback: JobCallback,
    ) -> Result<(), RegistrationError> {
        self.arm_all(vec![(key, spec, callback)]).await
    }

    /// Arm a rule's start/end pair under one lock acquisition so a replace
    /// is never observable half-updated.
    pub async fn arm_pair(
        &self,
        rule_id: &str,
        start: (RecurrenceSpec, JobCallback),
        end: (RecurrenceSpec, JobCallback),
    ) -> Result<(), RegistrationError> {
        self.arm_all(vec![
            (start_key(rule_id), start.0, start.1),
            (end_key(rule_id), end.0, end.1),
        ])
        .await
    }

    async fn arm_all(
        &self,
        armings: Vec<(String, RecurrenceSpec, JobCallback)>,
    ) -> Result<(), RegistrationError> {
        let mut jobs = self.shared.jobs.lock().await;

        if self.shared.stopped.load(Ordering::SeqCst) {
            let key = armings
                .first()
                .map(|(key, _, _)| key.clone())
                .unwrap_or_default();
            return Err(RegistrationError::ClockStopped { key });
        }

        let now = Utc::now();
        for (key, spec, callback) in armings {
            let next_fire = spec.next_occurrence(now);
            debug!("Armed job {} (next fire: {:?})", key, next_fire);
            jobs.insert(
                key,
                JobEntry {
                    spec,
                    next_fire,
                    callback,
                    in_flight: Arc::new(AtomicBool::new(false)),
                },
            );
        }
        drop(jobs);

        self.shared.rearm.notify_one();
        Ok(())
    }

    /// Disarm one job. Removing an absent key is a no-op, not an error.
    pub async fn remove(&self, key: &str) -> bool {
        let removed = self.shared.jobs.lock().await.remove(key).is_some();
        if removed {
            debug!("Disarmed job {}", key);
            self.shared.rearm.notify_one();
        } else {
            debug!("Job {} was not armed, nothing to disarm", key);
        }
        removed
    }

    /// Disarm a rule's start/end pair under one lock acquisition.
    /// Returns how many of the two were actually armed.
    pub async fn remove_pair(&self, rule_id: &str) -> usize {
        let mut jobs = self.shared.jobs.lock().await;
        let mut removed = 0;
        for key in [start_key(rule_id), end_key(rule_id)] {
            if jobs.remove(&key).is_some() {
                removed += 1;
            } else {
                debug!("Job {} was not armed, nothing to disarm", key);
            }
        }
        drop(jobs);

        if removed > 0 {
            self.shared.rearm.notify_one();
        }
        removed
    }

    pub async fn next_fire_time(&self, key: &str) -> Option<DateTime<Utc>> {
        self.shared.jobs.lock().await.get(key).and_then(|entry| entry.next_fire)
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.shared.jobs.lock().await.contains_key(key)
    }

    pub async fn job_count(&self) -> usize {
        self.shared.jobs.lock().await.len()
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_clock(shared: Arc<ClockShared>) {
    info!("Slowmode scheduler started");

    loop {
        if shared.stopped.load(Ordering::SeqCst) {
            break;
        }

        let now = Utc::now();
        let mut earliest: Option<DateTime<Utc>> = None;
        {
            let mut jobs = shared.jobs.lock().await;
            for (key, entry) in jobs.iter_mut() {
                let Some(due) = entry.next_fire else { continue };

                if due <= now {
                    fire(key, entry);
                    entry.next_fire = entry.spec.next_occurrence(now);
                }

                if let Some(next) = entry.next_fire {
                    earliest = Some(match earliest {
                        Some(current) if current <= next => current,
                        _ => next,
                    });
                }
            }
        }

        let sleep_for = match earliest {
            Some(at) => (at - Utc::now()).to_std().unwrap_or(std::time::Duration::ZERO),
            None => clock::IDLE_SLEEP,
        };

        tokio::select! {
            _ = shared.rearm.notified() => {}
            _ = tokio::time::sleep(sleep_for) => {}
        }
    }

    info!("Recurrence clock stopped");
}

/// Dispatch one due job on its own task. At weekly granularity a previous
/// invocation still running is close to impossible, but the in-flight
/// guard keeps a slow callback from ever overlapping itself.
fn fire(key: &str, entry: &JobEntry) {
    if entry.in_flight.swap(true, Ordering::SeqCst) {
        warn!("Skipping firing of job {}: previous invocation still running", key);
        return;
    }

    debug!("Firing job {}", key);
    let callback = entry.callback.clone();
    let in_flight = entry.in_flight.clone();
    tokio::spawn(async move {
        callback().await;
        in_flight.store(false, Ordering::SeqCst);
    });
}
