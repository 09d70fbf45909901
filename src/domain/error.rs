//! Scheduler error taxonomy module
//!
//! Error kinds carry their propagation policy: fatal kinds abort the
//! whole scheduling call, non-fatal kinds are recorded against the stage
//! that raised them and the path continues.

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulingError>;

/// Errors raised by the scheduling engine
#[derive(Debug, Error)]
pub enum SchedulingError {
    /// The job has no stage instances to schedule
    #[error("no workflow stages found for job {job_id}")]
    WorkflowNotFound { job_id: String },

    /// No working day exists in a full scan window; the shift schedule or
    /// holiday table is misconfigured
    #[error("no working day found within {span_days} days after {after}")]
    NoWorkingDayFound { after: NaiveDate, span_days: u32 },

    /// A persistence read or write failed
    #[error("persistence failure during {operation}: {source}")]
    Persistence {
        operation: String,
        #[source]
        source: anyhow::Error,
    },

    /// A committed slot did not read back; concurrent external mutation
    #[error(
        "capacity readback mismatch for stage {stage_id} on {date}: expected queue end {expected}, found {found}"
    )]
    Inconsistency {
        stage_id: String,
        date: NaiveDate,
        expected: DateTime<Utc>,
        found: DateTime<Utc>,
    },

    /// A reorder request referenced instances with no slot on the date
    #[error("{missing} requested stage(s) have no time slot on {date}")]
    StagesNotAllOnDate { date: NaiveDate, missing: usize },

    /// The caller cancelled the run between stages
    #[error("scheduling run was cancelled")]
    Cancelled,

    /// Working-hours configuration could not be read
    #[error("working hours configuration unavailable: {reason}")]
    ConfigUnavailable { reason: String },
}

impl SchedulingError {
    /// Wraps a persistence failure with the operation that hit it
    pub fn persistence(operation: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Persistence {
            operation: operation.into(),
            source,
        }
    }

    /// Fatal errors abort the whole call (and the batch, for recomputes)
    /// instead of being recorded against a single stage
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NoWorkingDayFound { .. } | Self::Inconsistency { .. } | Self::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let cancelled = SchedulingError::Cancelled;
        assert!(cancelled.is_fatal());

        let persistence =
            SchedulingError::persistence("insert slot", anyhow::anyhow!("disk full"));
        assert!(!persistence.is_fatal());

        let not_found = SchedulingError::WorkflowNotFound {
            job_id: "job-1".to_string(),
        };
        assert!(!not_found.is_fatal());
    }

    #[test]
    fn test_display_carries_context() {
        let err = SchedulingError::persistence("insert slot", anyhow::anyhow!("disk full"));
        let msg = err.to_string();
        assert!(msg.contains("insert slot"));
        assert!(msg.contains("persistence failure"));
    }
}
