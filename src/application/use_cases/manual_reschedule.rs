//! Manual reschedule use case module
//!
//! Operator override: move one stage instance to a target date. The
//! instance's previous slots (and any split chain) are removed, a gap on
//! the target day is preferred, and otherwise the instance re-enters the
//! stage's FIFO queue at the target day, splitting across days when the
//! duration overflows a working day.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeSet, HashMap};
use tracing::info;

use crate::application::services::{
    CancellationToken, CapacityTracker, PathProcessor, StageLockRegistry, WorkingCalendar,
};
use crate::domain::entities::StageTimeSlot;
use crate::domain::error::{SchedulerResult, SchedulingError};
use crate::domain::repositories::SchedulerRepository;

/// Moves one stage instance to a target date
pub struct ManualRescheduleStage<'a> {
    repo: &'a dyn SchedulerRepository,
    locks: &'a StageLockRegistry,
}

impl<'a> ManualRescheduleStage<'a> {
    pub fn new(repo: &'a dyn SchedulerRepository, locks: &'a StageLockRegistry) -> Self {
        Self { repo, locks }
    }

    /// Reschedules the instance onto `target_date` (or the next working
    /// day when the target is not workable) and returns the new window
    pub fn execute(
        &self,
        instance_id: &str,
        target_date: NaiveDate,
    ) -> SchedulerResult<(DateTime<Utc>, DateTime<Utc>)> {
        info!(instance_id, target_date = %target_date, "manual reschedule");
        let calendar = WorkingCalendar::load(self.repo);
        let tracker = CapacityTracker::new(self.repo, &calendar);

        let instance = self
            .repo
            .stage_instance(instance_id)
            .map_err(|e| SchedulingError::persistence("read stage instance", e))?
            .ok_or_else(|| {
                SchedulingError::persistence(
                    "read stage instance",
                    anyhow::anyhow!("stage instance {} not found", instance_id),
                )
            })?;

        if instance.is_split_continuation() {
            return Err(SchedulingError::persistence(
                "manual reschedule",
                anyhow::anyhow!(
                    "instance {} is a split continuation; reschedule its parent instead",
                    instance_id
                ),
            ));
        }

        self.clear_chain(&instance.id, &instance.job_id, &tracker)?;

        // Reset split metadata; the chain will be rebuilt if still needed
        let mut instance = instance;
        instance.split_sequence = 1;
        instance.total_splits = 1;
        instance.is_split = false;
        instance.parent_split_id = None;

        let earliest = calendar.snap_forward(calendar.working_day_start(target_date))?;
        let minutes = instance.estimated_duration_minutes;

        // Prefer a hole on the target day before appending to the queue
        let lock = self.locks.stage_lock(&instance.stage_id);
        {
            let _guard = lock.lock().unwrap();
            if let Some((start, end)) = tracker.find_gap(&instance.stage_id, minutes, earliest)? {
                if calendar.local_date(start) == calendar.local_date(earliest) {
                    let slot = StageTimeSlot::new(
                        &instance.stage_id,
                        calendar.local_date(start),
                        start,
                        end,
                        &instance.job_id,
                        &instance.id,
                    );
                    tracker.commit_gap_slot(&slot)?;
                    instance.scheduled_start = Some(start);
                    instance.scheduled_end = Some(end);
                    self.repo
                        .update_stage_instance(&instance)
                        .map_err(|e| SchedulingError::persistence("update stage instance", e))?;
                    return Ok((start, end));
                }
            }
        }

        let stage_names: HashMap<String, String> = self
            .repo
            .production_stages()
            .map_err(|e| SchedulingError::persistence("read production stages", e))?
            .into_iter()
            .map(|s| (s.id, s.name))
            .collect();
        let cancel = CancellationToken::new();
        let processor =
            PathProcessor::new(self.repo, &calendar, self.locks, &stage_names, &cancel);
        let completion = processor.schedule_stage(&instance, earliest)?;
        Ok((completion.start, completion.end))
    }

    /// Removes the instance's slots and any continuation chain, then
    /// rebuilds capacity for the days the removal touched
    fn clear_chain(
        &self,
        instance_id: &str,
        job_id: &str,
        tracker: &CapacityTracker<'_>,
    ) -> SchedulerResult<()> {
        let chain: Vec<String> = std::iter::once(instance_id.to_string())
            .chain(
                self.repo
                    .stage_instances_for_job(job_id)
                    .map_err(|e| SchedulingError::persistence("read stage instances", e))?
                    .into_iter()
                    .filter(|si| si.parent_split_id.as_deref() == Some(instance_id))
                    .map(|si| si.id),
            )
            .collect();

        let mut touched: BTreeSet<(String, NaiveDate)> = BTreeSet::new();
        for member in &chain {
            let removed = self
                .repo
                .delete_time_slots_for_instance(member)
                .map_err(|e| SchedulingError::persistence("delete time slots", e))?;
            for slot in removed {
                touched.insert((slot.stage_id, slot.date));
            }
        }
        self.repo
            .delete_split_continuations_of(instance_id)
            .map_err(|e| SchedulingError::persistence("delete split continuations", e))?;

        for (stage_id, date) in touched {
            tracker.rebuild(&stage_id, date)?;
        }
        Ok(())
    }
}
