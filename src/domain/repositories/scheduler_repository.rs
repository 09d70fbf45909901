//! Scheduler repository trait module
//!
//! The persistence surface the scheduling engine runs against. Queries
//! and writes only; no scheduling logic lives behind this trait.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;

use crate::domain::entities::{
    ProductionJob, ProductionStage, PublicHoliday, ShiftSchedule, StageCapacityRecord,
    StageInstance, StageTimeSlot,
};

/// Persistence adapter for the scheduling engine
///
/// Implementations must be safe to share across handler threads; the
/// engine itself serializes commits per stage, but reads may interleave.
#[cfg_attr(test, mockall::automock)]
pub trait SchedulerRepository: Send + Sync {
    // --- jobs ---

    fn job(&self, job_id: &str) -> Result<Option<ProductionJob>>;

    /// All jobs not yet completed, ordered by `(created_at, id)` ascending
    fn active_jobs(&self) -> Result<Vec<ProductionJob>>;

    fn jobs_by_ids(&self, ids: &[String]) -> Result<Vec<ProductionJob>>;

    /// Jobs with a pending proofing stage and no proof approval yet
    fn jobs_awaiting_proof(&self) -> Result<Vec<ProductionJob>>;

    fn set_tentative_due_date(&self, job_id: &str, date: NaiveDate) -> Result<()>;

    // --- stages ---

    fn production_stages(&self) -> Result<Vec<ProductionStage>>;

    // --- stage instances ---

    /// A job's instances ordered by `(stage_order, split_sequence)`
    fn stage_instances_for_job(&self, job_id: &str) -> Result<Vec<StageInstance>>;

    fn stage_instance(&self, instance_id: &str) -> Result<Option<StageInstance>>;

    fn insert_stage_instance(&self, instance: &StageInstance) -> Result<()>;

    fn update_stage_instance(&self, instance: &StageInstance) -> Result<()>;

    /// Removes split continuation rows (`split_sequence > 1`) for a job
    fn delete_split_continuations(&self, job_id: &str) -> Result<()>;

    /// Removes the continuation rows chained to one parent instance
    fn delete_split_continuations_of(&self, parent_instance_id: &str) -> Result<()>;

    // --- time slots ---

    /// Inserts a slot and returns its row id
    fn insert_time_slot(&self, slot: &StageTimeSlot) -> Result<i64>;

    /// A stage's slots in insertion order
    fn time_slots_for_stage(&self, stage_id: &str) -> Result<Vec<StageTimeSlot>>;

    fn time_slots_for_stage_on(&self, stage_id: &str, date: NaiveDate)
        -> Result<Vec<StageTimeSlot>>;

    /// Slots on a date restricted to the given instances
    fn time_slots_for_instances_on(
        &self,
        date: NaiveDate,
        instance_ids: &[String],
    ) -> Result<Vec<StageTimeSlot>>;

    /// Deletes a job's slots, returning them so capacity can be rebuilt
    fn delete_time_slots_for_job(&self, job_id: &str) -> Result<Vec<StageTimeSlot>>;

    /// Deletes one instance's slots, returning them so capacity can be rebuilt
    fn delete_time_slots_for_instance(&self, instance_id: &str) -> Result<Vec<StageTimeSlot>>;

    fn update_time_slot_times(
        &self,
        slot_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        date: NaiveDate,
    ) -> Result<()>;

    // --- capacity ---

    fn capacity_record(
        &self,
        stage_id: &str,
        date: NaiveDate,
    ) -> Result<Option<StageCapacityRecord>>;

    fn upsert_capacity_record(&self, record: &StageCapacityRecord) -> Result<()>;

    fn capacity_records_on(&self, date: NaiveDate) -> Result<Vec<StageCapacityRecord>>;

    fn delete_capacity_record(&self, stage_id: &str, date: NaiveDate) -> Result<()>;

    /// Clears all slots and capacity records in one transaction
    fn reset_workload(&self) -> Result<()>;

    // --- calendar configuration ---

    fn shift_schedules(&self) -> Result<Vec<ShiftSchedule>>;

    fn public_holidays(&self) -> Result<Vec<PublicHoliday>>;

    fn app_settings(&self) -> Result<HashMap<String, String>>;
}
