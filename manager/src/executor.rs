//! Action executor capability
//!
//! The command front end supplies this at construction time; the manager
//! never probes for optional capabilities at runtime.

use async_trait::async_trait;

use crate::errors::ActionExecutionError;

/// Slowmode mutation interface to the chat platform.
#[async_trait]
pub trait SlowmodeExecutor: Send + Sync {
    /// Apply `seconds` of slowmode to a channel. `0` removes the
    /// restriction and must be safe to send. Returns whether the platform
    /// accepted the update.
    async fn set_slowmode(
        &self,
        target_id: &str,
        seconds: u32,
    ) -> Result<bool, ActionExecutionError>;

    /// Read the channel's current slowmode. Used once at add time to
    /// resolve a restore-to-current request, never per occurrence.
    async fn current_slowmode(&self, target_id: &str) -> Result<u32, ActionExecutionError>;
}
