//! In-memory slowmode executor for tests

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use slowmode_manager::errors::ActionExecutionError;
use slowmode_manager::executor::SlowmodeExecutor;

/// One recorded `set_slowmode` invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub target_id: String,
    pub seconds: u32,
}

/// Scriptable executor: tracks live values per target, records every set
/// call, and can be told to fail reads or writes.
pub struct MockExecutor {
    live_values: Mutex<HashMap<String, u32>>,
    calls: Mutex<Vec<RecordedCall>>,
    fail_writes: Mutex<bool>,
    fail_reads: Mutex<bool>,
}

impl MockExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            live_values: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            fail_writes: Mutex::new(false),
            fail_reads: Mutex::new(false),
        })
    }

    pub async fn set_live_value(&self, target_id: &str, seconds: u32) {
        self.live_values.lock().await.insert(target_id.to_string(), seconds);
    }

    pub async fn live_value(&self, target_id: &str) -> u32 {
        self.live_values.lock().await.get(target_id).copied().unwrap_or(0)
    }

    pub async fn fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().await = fail;
    }

    pub async fn fail_reads(&self, fail: bool) {
        *self.fail_reads.lock().await = fail;
    }

    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }
}

#[async_trait]
impl SlowmodeExecutor for MockExecutor {
    async fn set_slowmode(
        &self,
        target_id: &str,
        seconds: u32,
    ) -> Result<bool, ActionExecutionError> {
        if *self.fail_writes.lock().await {
            return Err(ActionExecutionError::RequestFailed {
                target_id: target_id.to_string(),
                reason: "scripted failure".to_string(),
            });
        }

        self.calls.lock().await.push(RecordedCall {
            target_id: target_id.to_string(),
            seconds,
        });
        self.live_values.lock().await.insert(target_id.to_string(), seconds);
        Ok(true)
    }

    async fn current_slowmode(&self, target_id: &str) -> Result<u32, ActionExecutionError> {
        if *self.fail_reads.lock().await {
            return Err(ActionExecutionError::TargetUnavailable {
                target_id: target_id.to_string(),
            });
        }
        Ok(self.live_value(target_id).await)
    }
}
