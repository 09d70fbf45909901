//! Production job entity module
//!
//! A job is one customer order moving through the shop. The scheduler
//! reads jobs for ordering and proof-approval state; it only writes the
//! tentative due date.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::JobTable;

/// A production job
///
/// One job owns many stage instances (see `StageInstance`). The batch
/// recomputer orders jobs by `(created_at, id)` ascending, expedited jobs
/// first, so the schedule is deterministic for a given input state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductionJob {
    /// Unique job identifier
    pub id: String,
    /// Work order number shown to operators
    pub work_order_number: String,
    /// Which product line the job belongs to
    pub job_table: JobTable,
    /// Product category, when categorized
    pub category_id: Option<String>,
    /// Customer-facing due date
    pub due_date: Option<NaiveDate>,
    /// Lifecycle status ("queued", "in_production", "completed", ...)
    pub status: String,
    /// Whether the job uses a manually edited workflow
    pub has_custom_workflow: bool,
    /// Expedited jobs are scheduled ahead of the FIFO order
    pub is_expedited: bool,
    /// When the customer approved the proof, if they have
    pub proof_approved_at: Option<DateTime<Utc>>,
    /// Projected completion for jobs still awaiting proof approval
    pub tentative_due_date: Option<NaiveDate>,
    /// Submission timestamp, the FIFO ordering key
    pub created_at: DateTime<Utc>,
}

impl ProductionJob {
    /// Creates a job with minimal required fields
    pub fn new(
        id: impl Into<String>,
        work_order_number: impl Into<String>,
        job_table: JobTable,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            work_order_number: work_order_number.into(),
            job_table,
            category_id: None,
            due_date: None,
            status: "queued".to_string(),
            has_custom_workflow: false,
            is_expedited: false,
            proof_approved_at: None,
            tentative_due_date: None,
            created_at,
        }
    }

    /// Whether the job has finished production
    pub fn is_completed(&self) -> bool {
        self.status == "completed"
    }

    /// Whether the job is still waiting on customer proof approval
    pub fn awaiting_proof_approval(&self) -> bool {
        self.proof_approved_at.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_new_job() {
        let created = Utc.with_ymd_and_hms(2025, 6, 2, 7, 0, 0).unwrap();
        let job = ProductionJob::new("job-1", "WO-1001", JobTable::Flyers, created);
        assert_eq!(job.status, "queued");
        assert!(!job.is_completed());
        assert!(job.awaiting_proof_approval());
    }
}
