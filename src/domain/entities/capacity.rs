//! Capacity tracking entities module
//!
//! Per-stage per-day workload is tracked as ordered time slots plus a
//! derived capacity record. Slots are the source of truth: the record is
//! recomputed from them on every commit.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One scheduled interval on a stage's daily queue
///
/// A stage instance owns one slot when it fits in a single day, or one
/// slot per split part otherwise. Slots are persisted so the queue can be
/// reconstructed after a restart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageTimeSlot {
    /// Row id; zero until the slot is persisted
    pub id: i64,
    /// Stage whose queue this slot occupies
    pub stage_id: String,
    /// Local calendar day the slot falls on
    pub date: NaiveDate,
    /// Interval start
    pub slot_start: DateTime<Utc>,
    /// Interval end
    pub slot_end: DateTime<Utc>,
    /// Interval length in minutes
    pub duration_minutes: i64,
    /// Owning job
    pub job_id: String,
    /// Owning stage instance
    pub instance_id: String,
}

impl StageTimeSlot {
    pub fn new(
        stage_id: impl Into<String>,
        date: NaiveDate,
        slot_start: DateTime<Utc>,
        slot_end: DateTime<Utc>,
        job_id: impl Into<String>,
        instance_id: impl Into<String>,
    ) -> Self {
        let duration_minutes = (slot_end - slot_start).num_minutes();
        Self {
            id: 0,
            stage_id: stage_id.into(),
            date,
            slot_start,
            slot_end,
            duration_minutes,
            job_id: job_id.into(),
            instance_id: instance_id.into(),
        }
    }
}

/// Derived workload summary for one `(stage, date)` pair
///
/// Created lazily on first commit and kept consistent with the slot table
/// for reporting: `committed_minutes` equals the sum of slot durations and
/// `queue_ends_at` the latest slot end.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageCapacityRecord {
    pub stage_id: String,
    pub date: NaiveDate,
    /// Minutes already committed on this day
    pub committed_minutes: i64,
    /// Working minutes still open (never negative)
    pub available_minutes: i64,
    /// Queue length, equal to committed minutes under FIFO
    pub queue_length_minutes: i64,
    /// When the last queued slot ends; start of day when the queue is empty
    pub queue_ends_at: DateTime<Utc>,
    /// Distinct jobs with pending work queued on this day
    pub pending_jobs_count: i64,
    /// Distinct jobs with active work queued on this day
    pub active_jobs_count: i64,
    /// When this record was last recomputed
    pub calculated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_slot_duration_derived_from_interval() {
        let start = Utc.with_ymd_and_hms(2025, 6, 2, 7, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 6, 2, 8, 30, 0).unwrap();
        let slot = StageTimeSlot::new(
            "stage-1",
            NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            start,
            end,
            "job-1",
            "si-1",
        );
        assert_eq!(slot.duration_minutes, 90);
        assert_eq!(slot.id, 0);
    }
}
