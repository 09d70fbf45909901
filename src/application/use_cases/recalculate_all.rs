//! Recalculate all use case module
//!
//! Batch recompute: clears the capacity baseline, then reschedules every
//! candidate job strictly serially in a deterministic order. Two runs on
//! the same input state produce identical schedules.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

use crate::application::services::{
    CancellationToken, CapacityTracker, StageLockRegistry, WorkingCalendar,
};
use crate::application::use_cases::ScheduleJob;
use crate::domain::error::{SchedulerResult, SchedulingError};
use crate::domain::repositories::SchedulerRepository;

/// Per-job outcome inside a batch recompute
#[derive(Debug, Clone, Serialize)]
pub struct JobRecalcResult {
    pub job_id: String,
    pub success: bool,
    pub scheduled_completion_date: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// Aggregate outcome of a batch recompute
#[derive(Debug, Clone, Serialize)]
pub struct RecalculateSummary {
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<JobRecalcResult>,
}

/// Type alias for batch progress callback
pub type ProgressCallback = Box<dyn Fn(usize, usize, &str)>;

/// Reschedules a set of jobs (or all active jobs) from a clean baseline
pub struct RecalculateAll<'a> {
    repo: &'a dyn SchedulerRepository,
    locks: &'a StageLockRegistry,
    cancel: CancellationToken,
    progress_callback: Option<ProgressCallback>,
}

impl<'a> RecalculateAll<'a> {
    pub fn new(repo: &'a dyn SchedulerRepository, locks: &'a StageLockRegistry) -> Self {
        Self {
            repo,
            locks,
            cancel: CancellationToken::new(),
            progress_callback: None,
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Adds a progress callback invoked once per job
    pub fn with_progress_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(usize, usize, &str) + 'static,
    {
        self.progress_callback = Some(Box::new(callback));
        self
    }

    /// Runs the batch recompute
    ///
    /// Candidate jobs are the supplied ids, or every job not yet
    /// completed. Expedited jobs are scheduled first; within each class
    /// the order is `(created_at, job_id)` ascending. The whole run holds
    /// the process-wide recompute lock.
    pub fn execute(
        &self,
        job_ids: Option<&[String]>,
        now: DateTime<Utc>,
    ) -> SchedulerResult<RecalculateSummary> {
        let _recalc_guard = self.locks.lock_recalculate();

        let calendar = WorkingCalendar::load(self.repo);
        CapacityTracker::new(self.repo, &calendar).reset()?;

        let mut jobs = match job_ids {
            Some(ids) => self
                .repo
                .jobs_by_ids(ids)
                .map_err(|e| SchedulingError::persistence("read jobs by ids", e))?,
            None => self
                .repo
                .active_jobs()
                .map_err(|e| SchedulingError::persistence("read active jobs", e))?,
        };
        // Stable sort keeps (created_at, id) order within each class
        jobs.sort_by_key(|job| !job.is_expedited);

        info!(count = jobs.len(), "starting batch recompute");

        let total = jobs.len();
        let mut results = Vec::with_capacity(total);
        let mut successful = 0;
        let mut failed = 0;

        for (index, job) in jobs.iter().enumerate() {
            self.cancel.check()?;
            if let Some(callback) = &self.progress_callback {
                callback(index + 1, total, &job.id);
            }

            let schedule = ScheduleJob::new(self.repo, self.locks)
                .with_cancellation(self.cancel.clone());
            match schedule.execute(&job.id, now) {
                Ok(result) => {
                    if result.success {
                        successful += 1;
                    } else {
                        failed += 1;
                    }
                    results.push(JobRecalcResult {
                        job_id: job.id.clone(),
                        success: result.success,
                        scheduled_completion_date: result.scheduled_completion_date,
                        error: if result.errors.is_empty() {
                            None
                        } else {
                            Some(result.errors.join("; "))
                        },
                    });
                }
                Err(e) if e.is_fatal() => {
                    error!(job_id = %job.id, error = %e, "fatal error, aborting batch");
                    return Err(e);
                }
                Err(e) => {
                    error!(job_id = %job.id, error = %e, "job failed, continuing batch");
                    failed += 1;
                    results.push(JobRecalcResult {
                        job_id: job.id.clone(),
                        success: false,
                        scheduled_completion_date: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        info!(successful, failed, "batch recompute finished");
        Ok(RecalculateSummary {
            successful,
            failed,
            results,
        })
    }
}
