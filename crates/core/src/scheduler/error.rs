//! Scheduler error types

use beacon_domain::BeaconError;
use thiserror::Error;

/// Scheduler-specific errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// The task was refused (scheduler shut down or pre-init queue full)
    #[error("Task was not launched")]
    NotLaunched,

    /// A test task did not run within the deadlock guard
    #[error("Test task did not complete within {millis}ms")]
    Timeout { millis: u64 },
}

impl From<SchedulerError> for BeaconError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::NotLaunched => Self::InvalidInput(err.to_string()),
            SchedulerError::Timeout { .. } => Self::Internal(err.to_string()),
        }
    }
}

/// Convenience type alias for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;
