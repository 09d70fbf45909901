//! Stage instance entity module
//!
//! A stage instance is one production stage applied to one job: the unit
//! the scheduler assigns a concrete `(start, end)` window to. Instances
//! that do not fit the remainder of a working day are split into a chain
//! of sequential instances sharing a parent id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{JobTable, PartAssignment};

/// Lifecycle status of a stage instance
///
/// Only `Pending` instances are (re)scheduled; `Active` work is never
/// preempted and `Completed` work only anchors later stages.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Pending,
    Active,
    Completed,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }

    /// Parses a status column value; unknown values read as pending
    pub fn parse(value: &str) -> Self {
        match value {
            "active" => Self::Active,
            "completed" => Self::Completed,
            _ => Self::Pending,
        }
    }
}

/// One production stage applied to one job
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageInstance {
    /// Unique instance identifier
    pub id: String,
    /// Owning job
    pub job_id: String,
    /// Product line the owning job belongs to
    pub job_table: JobTable,
    /// The production stage this instance runs on
    pub stage_id: String,
    /// 1-based position within the job's workflow
    pub stage_order: u32,
    /// Cover, text, or (when absent) a convergence stage
    pub part_assignment: Option<PartAssignment>,
    /// Estimated runtime in minutes
    pub estimated_duration_minutes: i64,
    /// Lifecycle status
    pub status: StageStatus,
    /// Scheduled window start, once the scheduler has placed the instance
    pub scheduled_start: Option<DateTime<Utc>>,
    /// Scheduled window end
    pub scheduled_end: Option<DateTime<Utc>>,
    /// Position within a split chain (1 when unsplit)
    pub split_sequence: u32,
    /// Chain length (1 when unsplit)
    pub total_splits: u32,
    /// Whether this instance is part of a multi-day split chain
    pub is_split: bool,
    /// First instance of the chain, for continuation instances
    pub parent_split_id: Option<String>,
    /// Stable key: `{job_id}-{stage_id}-{split_sequence}`
    pub unique_stage_key: String,
}

/// Default estimate when a stage has not been quoted
pub const DEFAULT_STAGE_DURATION_MINUTES: i64 = 60;

impl StageInstance {
    /// Creates a pending, unsplit instance with the default duration
    pub fn new(
        id: impl Into<String>,
        job_id: impl Into<String>,
        job_table: JobTable,
        stage_id: impl Into<String>,
        stage_order: u32,
    ) -> Self {
        let id = id.into();
        let job_id = job_id.into();
        let stage_id = stage_id.into();
        let unique_stage_key = Self::stage_key(&job_id, &stage_id, 1);
        Self {
            id,
            job_id,
            job_table,
            stage_id,
            stage_order,
            part_assignment: None,
            estimated_duration_minutes: DEFAULT_STAGE_DURATION_MINUTES,
            status: StageStatus::Pending,
            scheduled_start: None,
            scheduled_end: None,
            split_sequence: 1,
            total_splits: 1,
            is_split: false,
            parent_split_id: None,
            unique_stage_key,
        }
    }

    /// Builds the stable key shared by a split chain position
    pub fn stage_key(job_id: &str, stage_id: &str, split_sequence: u32) -> String {
        format!("{}-{}-{}", job_id, stage_id, split_sequence)
    }

    /// Sets the part assignment (builder pattern)
    pub fn part(mut self, part: PartAssignment) -> Self {
        self.part_assignment = Some(part);
        self
    }

    /// Sets the estimated duration (builder pattern)
    pub fn duration(mut self, minutes: i64) -> Self {
        self.estimated_duration_minutes = minutes;
        self
    }

    /// Whether this instance is a continuation created by splitting
    pub fn is_split_continuation(&self) -> bool {
        self.split_sequence > 1
    }

    /// Creates the continuation instance for one split part
    ///
    /// Continuations share the job, stage, order, and part assignment of
    /// the original and carry `parent_split_id` back to it. Ids are
    /// deterministic so repeated recomputes produce identical rows.
    pub fn continuation(&self, sequence: u32, total: u32, minutes: i64) -> Self {
        let mut next = self.clone();
        next.id = format!("{}-s{}", self.id, sequence);
        next.estimated_duration_minutes = minutes;
        next.status = StageStatus::Pending;
        next.scheduled_start = None;
        next.scheduled_end = None;
        next.split_sequence = sequence;
        next.total_splits = total;
        next.is_split = true;
        next.parent_split_id = Some(self.id.clone());
        next.unique_stage_key = Self::stage_key(&self.job_id, &self.stage_id, sequence);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_instance_defaults() {
        let instance = StageInstance::new("si-1", "job-1", JobTable::Flyers, "stage-1", 1);
        assert_eq!(instance.estimated_duration_minutes, 60);
        assert_eq!(instance.status, StageStatus::Pending);
        assert_eq!(instance.split_sequence, 1);
        assert_eq!(instance.unique_stage_key, "job-1-stage-1-1");
        assert!(!instance.is_split_continuation());
    }

    #[test]
    fn test_continuation_metadata() {
        let original = StageInstance::new("si-1", "job-1", JobTable::Flyers, "stage-1", 2)
            .part(PartAssignment::Cover)
            .duration(300);
        let cont = original.continuation(2, 3, 90);

        assert_eq!(cont.id, "si-1-s2");
        assert_eq!(cont.parent_split_id.as_deref(), Some("si-1"));
        assert_eq!(cont.split_sequence, 2);
        assert_eq!(cont.total_splits, 3);
        assert_eq!(cont.estimated_duration_minutes, 90);
        assert_eq!(cont.stage_order, 2);
        assert_eq!(cont.part_assignment, Some(PartAssignment::Cover));
        assert_eq!(cont.unique_stage_key, "job-1-stage-1-2");
        assert!(cont.is_split_continuation());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(StageStatus::parse("completed"), StageStatus::Completed);
        assert_eq!(StageStatus::parse("active"), StageStatus::Active);
        assert_eq!(StageStatus::parse("anything-else"), StageStatus::Pending);
    }
}
