//! Capacity tracker service module
//!
//! Maintains per-stage per-day queues: where a stage's queue ends, where
//! a new duration can start, and the committed time slots backing both.
//! The slot table is the source of truth; the capacity record for a
//! `(stage, date)` pair is recomputed from slots on every commit so it
//! stays consistent under deletion and reordering.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::BTreeSet;

use crate::application::services::WorkingCalendar;
use crate::domain::entities::{StageCapacityRecord, StageInstance, StageStatus, StageTimeSlot};
use crate::domain::error::{SchedulerResult, SchedulingError};
use crate::domain::repositories::SchedulerRepository;

/// Upper bound on the day walk when looking for a start slot; hitting it
/// means the calendar configuration cannot hold the duration at all
const MAX_DAY_WALK: u32 = 366;

/// Per-stage per-day queue and capacity bookkeeping
pub struct CapacityTracker<'a> {
    repo: &'a dyn SchedulerRepository,
    calendar: &'a WorkingCalendar,
}

impl<'a> CapacityTracker<'a> {
    pub fn new(repo: &'a dyn SchedulerRepository, calendar: &'a WorkingCalendar) -> Self {
        Self { repo, calendar }
    }

    /// When the stage's queue ends on a date: the latest committed slot
    /// end, or the working day's start when nothing is queued
    pub fn queue_end_time(
        &self,
        stage_id: &str,
        date: NaiveDate,
    ) -> SchedulerResult<DateTime<Utc>> {
        let slots = self
            .repo
            .time_slots_for_stage_on(stage_id, date)
            .map_err(|e| SchedulingError::persistence("read stage time slots", e))?;
        Ok(slots
            .iter()
            .map(|s| s.slot_end)
            .max()
            .unwrap_or_else(|| self.calendar.working_day_start(date)))
    }

    /// Earliest time `minutes` of work can start on the stage at or after
    /// `earliest`, walking forward day by day behind the FIFO queue
    ///
    /// This is the non-splitting path: the whole duration must fit in the
    /// remainder of the chosen day.
    pub fn next_start_time(
        &self,
        stage_id: &str,
        minutes: i64,
        earliest: DateTime<Utc>,
    ) -> SchedulerResult<DateTime<Utc>> {
        let mut cursor = self.calendar.snap_forward(earliest)?;
        for _ in 0..MAX_DAY_WALK {
            let date = self.calendar.local_date(cursor);
            let start = self.queue_end_time(stage_id, date)?.max(cursor);
            if self.calendar.fits_in_working_day(start, minutes) {
                return Ok(start);
            }
            let next = self.calendar.next_working_day(date)?;
            cursor = self.calendar.working_day_start(next);
        }
        Err(SchedulingError::NoWorkingDayFound {
            after: self.calendar.local_date(earliest),
            span_days: MAX_DAY_WALK,
        })
    }

    /// Schedules an unsplit instance FIFO and commits its slot
    ///
    /// Returns the committed `(start, end)` window.
    pub fn schedule_simple(
        &self,
        instance: &StageInstance,
        earliest: DateTime<Utc>,
    ) -> SchedulerResult<(DateTime<Utc>, DateTime<Utc>)> {
        let minutes = instance.estimated_duration_minutes;
        let start = self.next_start_time(&instance.stage_id, minutes, earliest)?;
        let end = start + Duration::minutes(minutes);
        let date = self.calendar.local_date(start);

        let slot = StageTimeSlot::new(
            &instance.stage_id,
            date,
            start,
            end,
            &instance.job_id,
            &instance.id,
        );
        self.commit(&slot, end)?;
        Ok((start, end))
    }

    /// Commits the slots of a pre-split chain, one per part
    ///
    /// Capacity is rebuilt for every day touched; the readback check runs
    /// against the final part's day.
    pub fn commit_split(&self, stage_id: &str, slots: &[StageTimeSlot]) -> SchedulerResult<()> {
        let Some(last) = slots.last() else {
            return Ok(());
        };
        for slot in slots {
            self.repo
                .insert_time_slot(slot)
                .map_err(|e| SchedulingError::persistence("insert split time slot", e))?;
        }
        let dates: BTreeSet<NaiveDate> = slots.iter().map(|s| s.date).collect();
        for date in dates {
            self.rebuild(stage_id, date)?;
        }
        self.verify_queue_end(stage_id, last.date, last.slot_end)
    }

    /// Commits a single slot that may land inside the queue (gap fill)
    ///
    /// The readback expectation is the maximum of the pre-commit queue
    /// end and this slot's end.
    pub fn commit_gap_slot(&self, slot: &StageTimeSlot) -> SchedulerResult<()> {
        let expected = self
            .queue_end_time(&slot.stage_id, slot.date)?
            .max(slot.slot_end);
        self.commit(slot, expected)
    }

    /// Earliest interval of `minutes` inside one working window that does
    /// not overlap any committed slot for the stage
    ///
    /// Optional optimization: `None` means no usable gap, and callers
    /// fall back to the FIFO append path.
    pub fn find_gap(
        &self,
        stage_id: &str,
        minutes: i64,
        earliest: DateTime<Utc>,
    ) -> SchedulerResult<Option<(DateTime<Utc>, DateTime<Utc>)>> {
        let mut slots = self
            .repo
            .time_slots_for_stage(stage_id)
            .map_err(|e| SchedulingError::persistence("read stage time slots", e))?;
        if slots.is_empty() {
            return Ok(None);
        }
        slots.sort_by_key(|s| s.slot_start);

        let mut candidates = vec![self.calendar.snap_forward(earliest)?];
        for slot in &slots {
            if slot.slot_end >= earliest {
                candidates.push(self.calendar.snap_forward(slot.slot_end)?);
            }
        }
        candidates.sort();

        for candidate in candidates {
            if !self.calendar.fits_in_working_day(candidate, minutes) {
                continue;
            }
            let end = candidate + Duration::minutes(minutes);
            let overlaps = slots
                .iter()
                .any(|s| s.slot_start < end && s.slot_end > candidate);
            if !overlaps {
                return Ok(Some((candidate, end)));
            }
        }
        Ok(None)
    }

    /// Recomputes the capacity record for a `(stage, date)` from its
    /// slots; removes the record when no slots remain
    pub fn rebuild(&self, stage_id: &str, date: NaiveDate) -> SchedulerResult<()> {
        let slots = self
            .repo
            .time_slots_for_stage_on(stage_id, date)
            .map_err(|e| SchedulingError::persistence("read stage time slots", e))?;

        if slots.is_empty() {
            self.repo
                .delete_capacity_record(stage_id, date)
                .map_err(|e| SchedulingError::persistence("delete capacity record", e))?;
            return Ok(());
        }

        let committed: i64 = slots.iter().map(|s| s.duration_minutes).sum();
        let queue_ends_at = slots
            .iter()
            .map(|s| s.slot_end)
            .max()
            .unwrap_or_else(|| self.calendar.working_day_start(date));

        let (pending_jobs, active_jobs) = self.job_counts(&slots)?;

        let record = StageCapacityRecord {
            stage_id: stage_id.to_string(),
            date,
            committed_minutes: committed,
            available_minutes: (self.calendar.daily_working_minutes() - committed).max(0),
            queue_length_minutes: committed,
            queue_ends_at,
            pending_jobs_count: pending_jobs,
            active_jobs_count: active_jobs,
            calculated_at: Utc::now(),
        };
        self.repo
            .upsert_capacity_record(&record)
            .map_err(|e| SchedulingError::persistence("upsert capacity record", e))
    }

    /// Clears every slot and capacity record; batch recompute baseline
    pub fn reset(&self) -> SchedulerResult<()> {
        self.repo
            .reset_workload()
            .map_err(|e| SchedulingError::persistence("reset workload", e))
    }

    fn commit(&self, slot: &StageTimeSlot, expected_queue_end: DateTime<Utc>) -> SchedulerResult<()> {
        self.repo
            .insert_time_slot(slot)
            .map_err(|e| SchedulingError::persistence("insert time slot", e))?;
        self.rebuild(&slot.stage_id, slot.date)?;
        self.verify_queue_end(&slot.stage_id, slot.date, expected_queue_end)
    }

    /// Readback check: a commit that does not show up in the very next
    /// queue read means something else is mutating the tables
    fn verify_queue_end(
        &self,
        stage_id: &str,
        date: NaiveDate,
        expected: DateTime<Utc>,
    ) -> SchedulerResult<()> {
        let found = self.queue_end_time(stage_id, date)?;
        if found != expected {
            return Err(SchedulingError::Inconsistency {
                stage_id: stage_id.to_string(),
                date,
                expected,
                found,
            });
        }
        Ok(())
    }

    fn job_counts(&self, slots: &[StageTimeSlot]) -> SchedulerResult<(i64, i64)> {
        let mut pending = BTreeSet::new();
        let mut active = BTreeSet::new();
        let instance_ids: BTreeSet<&str> = slots.iter().map(|s| s.instance_id.as_str()).collect();
        for instance_id in instance_ids {
            let instance = self
                .repo
                .stage_instance(instance_id)
                .map_err(|e| SchedulingError::persistence("read stage instance", e))?;
            if let Some(instance) = instance {
                match instance.status {
                    StageStatus::Active => {
                        active.insert(instance.job_id);
                    }
                    StageStatus::Pending => {
                        pending.insert(instance.job_id);
                    }
                    StageStatus::Completed => {}
                }
            }
        }
        Ok((pending.len() as i64, active.len() as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::WorkingHoursConfig;
    use crate::domain::value_objects::JobTable;
    use crate::infrastructure::repositories::InMemorySchedulerRepository;
    use chrono::TimeZone;

    fn calendar() -> WorkingCalendar {
        WorkingCalendar::new(WorkingHoursConfig::default(), Vec::new(), Vec::new())
    }

    fn jhb(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        chrono_tz::Africa::Johannesburg
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn instance(id: &str, stage: &str, minutes: i64) -> StageInstance {
        let mut si = StageInstance::new(id, format!("job-{}", id), JobTable::Flyers, stage, 1);
        si.estimated_duration_minutes = minutes;
        si
    }

    #[test]
    fn test_queue_end_defaults_to_day_start() {
        let repo = InMemorySchedulerRepository::new();
        let cal = calendar();
        let tracker = CapacityTracker::new(&repo, &cal);
        let monday = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();

        assert_eq!(
            tracker.queue_end_time("stage-x", monday).unwrap(),
            jhb(2025, 6, 2, 8, 0)
        );
    }

    #[test]
    fn test_fifo_queue_on_one_stage() {
        let repo = InMemorySchedulerRepository::new();
        let cal = calendar();
        let tracker = CapacityTracker::new(&repo, &cal);
        let monday = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let now = jhb(2025, 6, 2, 8, 0);

        let a = instance("a", "stage-x", 60);
        let b = instance("b", "stage-x", 60);
        repo.insert_stage_instance(&a).unwrap();
        repo.insert_stage_instance(&b).unwrap();

        let (start_a, end_a) = tracker.schedule_simple(&a, now).unwrap();
        let (start_b, end_b) = tracker.schedule_simple(&b, now).unwrap();

        assert_eq!(start_a, jhb(2025, 6, 2, 8, 0));
        assert_eq!(end_a, jhb(2025, 6, 2, 9, 0));
        assert_eq!(start_b, jhb(2025, 6, 2, 9, 0));
        assert_eq!(end_b, jhb(2025, 6, 2, 10, 0));
        assert_eq!(
            tracker.queue_end_time("stage-x", monday).unwrap(),
            jhb(2025, 6, 2, 10, 0)
        );
    }

    #[test]
    fn test_overflowing_queue_moves_to_next_day() {
        let repo = InMemorySchedulerRepository::new();
        let cal = calendar();
        let tracker = CapacityTracker::new(&repo, &cal);
        let now = jhb(2025, 6, 2, 8, 0);

        // Fill Monday up to 15:00, then ask for 180 minutes unsplit
        let filler = instance("fill", "stage-x", 420);
        repo.insert_stage_instance(&filler).unwrap();
        tracker.schedule_simple(&filler, now).unwrap();

        let big = instance("big", "stage-x", 180);
        repo.insert_stage_instance(&big).unwrap();
        let (start, end) = tracker.schedule_simple(&big, now).unwrap();

        assert_eq!(start, jhb(2025, 6, 3, 8, 0));
        assert_eq!(end, jhb(2025, 6, 3, 11, 0));
    }

    #[test]
    fn test_capacity_record_tracks_slots() {
        let repo = InMemorySchedulerRepository::new();
        let cal = calendar();
        let tracker = CapacityTracker::new(&repo, &cal);
        let monday = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let now = jhb(2025, 6, 2, 8, 0);

        let a = instance("a", "stage-x", 90);
        repo.insert_stage_instance(&a).unwrap();
        tracker.schedule_simple(&a, now).unwrap();

        let record = repo.capacity_record("stage-x", monday).unwrap().unwrap();
        assert_eq!(record.committed_minutes, 90);
        assert_eq!(record.available_minutes, 420);
        assert_eq!(record.queue_ends_at, jhb(2025, 6, 2, 9, 30));
        assert_eq!(record.pending_jobs_count, 1);
        assert_eq!(record.active_jobs_count, 0);
    }

    #[test]
    fn test_find_gap_between_slots() {
        let repo = InMemorySchedulerRepository::new();
        let cal = calendar();
        let tracker = CapacityTracker::new(&repo, &cal);
        let monday = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();

        // Two committed slots with a 60-minute hole between them
        let s1 = StageTimeSlot::new(
            "stage-x",
            monday,
            jhb(2025, 6, 2, 8, 0),
            jhb(2025, 6, 2, 9, 0),
            "job-1",
            "si-1",
        );
        let s2 = StageTimeSlot::new(
            "stage-x",
            monday,
            jhb(2025, 6, 2, 10, 0),
            jhb(2025, 6, 2, 11, 0),
            "job-2",
            "si-2",
        );
        repo.insert_time_slot(&s1).unwrap();
        repo.insert_time_slot(&s2).unwrap();

        let gap = tracker
            .find_gap("stage-x", 45, jhb(2025, 6, 2, 8, 0))
            .unwrap();
        assert_eq!(
            gap,
            Some((jhb(2025, 6, 2, 9, 0), jhb(2025, 6, 2, 9, 45)))
        );

        // A 90-minute request does not fit the hole and lands after the queue
        let gap = tracker
            .find_gap("stage-x", 90, jhb(2025, 6, 2, 8, 0))
            .unwrap();
        assert_eq!(
            gap,
            Some((jhb(2025, 6, 2, 11, 0), jhb(2025, 6, 2, 12, 30)))
        );
    }

    #[test]
    fn test_find_gap_empty_stage_returns_none() {
        let repo = InMemorySchedulerRepository::new();
        let cal = calendar();
        let tracker = CapacityTracker::new(&repo, &cal);
        let gap = tracker
            .find_gap("stage-x", 30, jhb(2025, 6, 2, 8, 0))
            .unwrap();
        assert!(gap.is_none());
    }

    #[test]
    fn test_reset_clears_slots_and_records() {
        let repo = InMemorySchedulerRepository::new();
        let cal = calendar();
        let tracker = CapacityTracker::new(&repo, &cal);
        let monday = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let now = jhb(2025, 6, 2, 8, 0);

        let a = instance("a", "stage-x", 60);
        repo.insert_stage_instance(&a).unwrap();
        tracker.schedule_simple(&a, now).unwrap();
        tracker.reset().unwrap();

        assert!(repo.capacity_record("stage-x", monday).unwrap().is_none());
        assert_eq!(
            tracker.queue_end_time("stage-x", monday).unwrap(),
            jhb(2025, 6, 2, 8, 0)
        );
    }
}
