//! Custom error types for the slowmode manager
//!
//! Splits "reject the request" failures from "log and continue" failures so
//! callers can tell them apart.

use std::fmt;

/// Main error type for the slowmode manager
#[derive(Debug)]
pub enum ManagerError {
    /// Bad input, rejected synchronously before any state change
    Validation(ValidationError),

    /// Job-arming failure inside the registry (rare, internal)
    Registration(RegistrationError),

    /// External resource update failed
    Action(ActionExecutionError),

    /// Other errors with context
    Other(String),
}

/// Validation error variants
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Time string is not parseable as HH:MM
    MalformedTime { input: String },

    /// Hour or minute component outside its valid range
    TimeOutOfRange { component: &'static str, value: u32, max: u32 },

    /// Day tag outside mon..sun
    InvalidDayTag { tag: String },

    /// Day set resolved to nothing
    EmptyDays,

    /// Slowmode value above the platform maximum
    SlowmodeOutOfRange { value: u32, max: u32 },

    /// Timezone name not found in the IANA database
    UnknownTimezone { name: String },
}

/// Job registration error variants
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// The recurrence clock has been shut down, no further arming possible
    ClockStopped { key: String },
}

/// Action execution error variants
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionExecutionError {
    /// Target resource missing or not reachable
    TargetUnavailable { target_id: String },

    /// Caller lacks permission to mutate the target
    Unauthorized { target_id: String },

    /// Platform rejected or failed the update
    RequestFailed { target_id: String, reason: String },
}

impl fmt::Display for ManagerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManagerError::Validation(e) => write!(f, "Validation error: {}", e),
            ManagerError::Registration(e) => write!(f, "Registration error: {}", e),
            ManagerError::Action(e) => write!(f, "Action execution error: {}", e),
            ManagerError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MalformedTime { input } => {
                write!(f, "Invalid time '{}': expected HH:MM", input)
            }
            ValidationError::TimeOutOfRange { component, value, max } => {
                write!(f, "{} {} is outside valid range 0-{}", component, value, max)
            }
            ValidationError::InvalidDayTag { tag } => {
                write!(f, "Invalid day '{}': use mon,tue,wed,thu,fri,sat,sun", tag)
            }
            ValidationError::EmptyDays => {
                write!(f, "Schedule needs at least one day")
            }
            ValidationError::SlowmodeOutOfRange { value, max } => {
                write!(f, "Slowmode {}s is above the platform maximum of {}s", value, max)
            }
            ValidationError::UnknownTimezone { name } => {
                write!(f, "Unknown timezone '{}'", name)
            }
        }
    }
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationError::ClockStopped { key } => {
                write!(f, "Cannot arm job '{}': recurrence clock is stopped", key)
            }
        }
    }
}

impl fmt::Display for ActionExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionExecutionError::TargetUnavailable { target_id } => {
                write!(f, "Target '{}' not found or unreachable", target_id)
            }
            ActionExecutionError::Unauthorized { target_id } => {
                write!(f, "Not authorized to modify target '{}'", target_id)
            }
            ActionExecutionError::RequestFailed { target_id, reason } => {
                write!(f, "Update of target '{}' failed: {}", target_id, reason)
            }
        }
    }
}

impl std::error::Error for ManagerError {}
impl std::error::Error for ValidationError {}
impl std::error::Error for RegistrationError {}
impl std::error::Error for ActionExecutionError {}

impl From<anyhow::Error> for ManagerError {
    fn from(err: anyhow::Error) -> Self {
        ManagerError::Other(err.to_string())
    }
}

impl From<ValidationError> for ManagerError {
    fn from(err: ValidationError) -> Self {
        ManagerError::Validation(err)
    }
}

impl From<RegistrationError> for ManagerError {
    fn from(err: RegistrationError) -> Self {
        ManagerError::Registration(err)
    }
}

impl From<ActionExecutionError> for ManagerError {
    fn from(err: ActionExecutionError) -> Self {
        ManagerError::Action(err)
    }
}
