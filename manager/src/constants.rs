//! Application-wide constants for platform limits and clock tuning

/// Platform slowmode bounds
pub mod slowmode {
    /// Maximum slowmode duration the platform accepts, in seconds (6 hours)
    pub const MAX_SLOWMODE_SECONDS: u32 = 21600;

    /// Slowmode value that removes the restriction entirely
    pub const NO_RESTRICTION: u32 = 0;
}

/// Recurrence clock tuning
pub mod clock {
    use std::time::Duration;

    /// How long the clock sleeps when no jobs are armed
    pub const IDLE_SLEEP: Duration = Duration::from_secs(300);
}
