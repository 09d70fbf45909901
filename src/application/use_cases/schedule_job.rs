//! Schedule job use case module
//!
//! Top-level entry point for scheduling one job end to end: analyze the
//! workflow, schedule the cover and text paths from "now", schedule the
//! convergence path from the later of the two path ends, and report the
//! aggregate result.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

use crate::application::services::{
    CancellationToken, CapacityTracker, PathProcessor, StageLockRegistry, WorkflowAnalyzer,
    WorkingCalendar,
};
use crate::domain::error::{SchedulerResult, SchedulingError};
use crate::domain::repositories::SchedulerRepository;

/// Path completion times for a scheduled job
#[derive(Debug, Clone, Default, Serialize)]
pub struct PathEnds {
    pub cover_end: Option<DateTime<Utc>>,
    pub text_end: Option<DateTime<Utc>>,
    pub convergence_end: Option<DateTime<Utc>>,
}

/// Aggregate outcome of scheduling one job
#[derive(Debug, Clone, Serialize)]
pub struct SchedulingResult {
    pub success: bool,
    pub job_id: String,
    pub scheduled_completion_date: Option<DateTime<Utc>>,
    pub total_minutes: i64,
    pub errors: Vec<String>,
    pub path_results: PathEnds,
}

/// Schedules a single job against the live capacity state
pub struct ScheduleJob<'a> {
    repo: &'a dyn SchedulerRepository,
    locks: &'a StageLockRegistry,
    cancel: CancellationToken,
}

impl<'a> ScheduleJob<'a> {
    pub fn new(repo: &'a dyn SchedulerRepository, locks: &'a StageLockRegistry) -> Self {
        Self {
            repo,
            locks,
            cancel: CancellationToken::new(),
        }
    }

    /// Attaches a cancellation token observed between stages
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Schedules every pending stage of the job starting from `now`
    pub fn execute(&self, job_id: &str, now: DateTime<Utc>) -> SchedulerResult<SchedulingResult> {
        info!(job_id, "scheduling job");
        let calendar = WorkingCalendar::load(self.repo);

        self.clear_previous_schedule(job_id, &calendar)?;

        let instances = self
            .repo
            .stage_instances_for_job(job_id)
            .map_err(|e| SchedulingError::persistence("read stage instances", e))?;
        let workflow = WorkflowAnalyzer::new().analyze(job_id, instances)?;

        let stage_names: HashMap<String, String> = self
            .repo
            .production_stages()
            .map_err(|e| SchedulingError::persistence("read production stages", e))?
            .into_iter()
            .map(|s| (s.id, s.name))
            .collect();

        let processor = PathProcessor::new(
            self.repo,
            &calendar,
            self.locks,
            &stage_names,
            &self.cancel,
        );

        let mut errors = Vec::new();
        let mut total_minutes = 0;
        let mut ends = PathEnds::default();

        let cover_end = if workflow.cover.is_empty() {
            None
        } else {
            let result = processor.process_path(&workflow.cover, now)?;
            total_minutes += result.total_minutes;
            errors.extend(result.errors);
            ends.cover_end = Some(result.completion_time);
            ends.cover_end
        };

        let text_end = if workflow.text.is_empty() {
            None
        } else {
            let result = processor.process_path(&workflow.text, now)?;
            total_minutes += result.total_minutes;
            errors.extend(result.errors);
            ends.text_end = Some(result.completion_time);
            ends.text_end
        };

        // Convergence waits for whichever feeding paths exist; a job with
        // neither starts from "now".
        let convergence_start = match (cover_end, text_end) {
            (Some(c), Some(t)) => c.max(t),
            (Some(c), None) => c,
            (None, Some(t)) => t,
            (None, None) => now,
        };

        if !workflow.convergence.is_empty() {
            let result = processor.process_convergence(
                &workflow.convergence,
                convergence_start,
                cover_end,
                text_end,
            )?;
            total_minutes += result.total_minutes;
            errors.extend(result.errors);
            ends.convergence_end = Some(result.completion_time);
        }

        let completion = ends
            .convergence_end
            .or(text_end)
            .or(cover_end)
            .unwrap_or(now);

        let result = SchedulingResult {
            success: errors.is_empty(),
            job_id: job_id.to_string(),
            scheduled_completion_date: Some(completion),
            total_minutes,
            errors,
            path_results: ends,
        };
        info!(
            job_id,
            completion = %completion,
            total_minutes,
            success = result.success,
            "job scheduled"
        );
        Ok(result)
    }

    /// Removes the job's previous slots and split continuations so a
    /// re-schedule does not double-commit its load
    fn clear_previous_schedule(
        &self,
        job_id: &str,
        calendar: &WorkingCalendar,
    ) -> SchedulerResult<()> {
        let removed = self
            .repo
            .delete_time_slots_for_job(job_id)
            .map_err(|e| SchedulingError::persistence("delete previous time slots", e))?;
        self.repo
            .delete_split_continuations(job_id)
            .map_err(|e| SchedulingError::persistence("delete split continuations", e))?;

        if removed.is_empty() {
            return Ok(());
        }
        debug!(job_id, count = removed.len(), "cleared previous schedule");

        let tracker = CapacityTracker::new(self.repo, calendar);
        let touched: BTreeSet<(String, chrono::NaiveDate)> = removed
            .into_iter()
            .map(|slot| (slot.stage_id, slot.date))
            .collect();
        for (stage_id, date) in touched {
            tracker.rebuild(&stage_id, date)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{ProductionStage, StageInstance};
    use crate::domain::value_objects::{JobTable, PartAssignment};
    use crate::infrastructure::repositories::InMemorySchedulerRepository;
    use chrono::TimeZone;

    fn jhb(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        chrono_tz::Africa::Johannesburg
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn seed_stage(repo: &InMemorySchedulerRepository, id: &str, name: &str) {
        repo.add_stage(ProductionStage::new(id, name));
    }

    fn seed_instance(
        repo: &InMemorySchedulerRepository,
        id: &str,
        stage: &str,
        order: u32,
        minutes: i64,
        part: Option<PartAssignment>,
    ) {
        let mut si = StageInstance::new(id, "job-1", JobTable::Covers, stage, order).duration(minutes);
        si.part_assignment = part;
        repo.insert_stage_instance(&si).unwrap();
    }

    #[test]
    fn test_parallel_paths_converge_at_later_end() {
        // Cover 240m and text 300m both start Monday 08:00; the 60m
        // convergence stage starts at the text end, 13:00.
        let repo = InMemorySchedulerRepository::new();
        let locks = StageLockRegistry::new();
        seed_stage(&repo, "stage-c", "Cover press");
        seed_stage(&repo, "stage-t", "Text press");
        seed_stage(&repo, "stage-f", "Finishing");
        seed_instance(&repo, "si-c", "stage-c", 1, 240, Some(PartAssignment::Cover));
        seed_instance(&repo, "si-t", "stage-t", 1, 300, Some(PartAssignment::Text));
        seed_instance(&repo, "si-f", "stage-f", 2, 60, Some(PartAssignment::Both));

        let result = ScheduleJob::new(&repo, &locks)
            .execute("job-1", jhb(2025, 6, 2, 8, 0))
            .unwrap();

        assert!(result.success, "errors: {:?}", result.errors);
        assert_eq!(result.path_results.cover_end, Some(jhb(2025, 6, 2, 12, 0)));
        assert_eq!(result.path_results.text_end, Some(jhb(2025, 6, 2, 13, 0)));
        assert_eq!(
            result.path_results.convergence_end,
            Some(jhb(2025, 6, 2, 14, 0))
        );
        assert_eq!(result.scheduled_completion_date, Some(jhb(2025, 6, 2, 14, 0)));
        assert_eq!(result.total_minutes, 600);

        let conv = repo.stage_instance("si-f").unwrap().unwrap();
        assert_eq!(conv.scheduled_start, Some(jhb(2025, 6, 2, 13, 0)));
    }

    #[test]
    fn test_text_only_job_completes_at_text_end() {
        let repo = InMemorySchedulerRepository::new();
        let locks = StageLockRegistry::new();
        seed_stage(&repo, "stage-t", "Text press");
        seed_instance(&repo, "si-t", "stage-t", 1, 120, Some(PartAssignment::Text));

        let result = ScheduleJob::new(&repo, &locks)
            .execute("job-1", jhb(2025, 6, 2, 8, 0))
            .unwrap();

        assert_eq!(result.scheduled_completion_date, Some(jhb(2025, 6, 2, 10, 0)));
        assert!(result.path_results.cover_end.is_none());
        assert!(result.path_results.convergence_end.is_none());
    }

    #[test]
    fn test_job_without_stages_is_workflow_not_found() {
        let repo = InMemorySchedulerRepository::new();
        let locks = StageLockRegistry::new();
        let err = ScheduleJob::new(&repo, &locks)
            .execute("job-1", jhb(2025, 6, 2, 8, 0))
            .unwrap_err();
        assert!(matches!(err, SchedulingError::WorkflowNotFound { .. }));
    }

    #[test]
    fn test_reschedule_does_not_double_commit() {
        let repo = InMemorySchedulerRepository::new();
        let locks = StageLockRegistry::new();
        seed_stage(&repo, "stage-t", "Text press");
        seed_instance(&repo, "si-t", "stage-t", 1, 480, None);

        let now = jhb(2025, 6, 2, 8, 0);
        let first = ScheduleJob::new(&repo, &locks).execute("job-1", now).unwrap();
        let second = ScheduleJob::new(&repo, &locks).execute("job-1", now).unwrap();

        assert_eq!(
            first.scheduled_completion_date,
            second.scheduled_completion_date
        );
        let slots = repo.time_slots_for_stage("stage-t").unwrap();
        assert_eq!(slots.iter().map(|s| s.duration_minutes).sum::<i64>(), 480);
    }

    #[test]
    fn test_split_chain_rescheduled_cleanly() {
        // 700 minutes splits over two days; rescheduling must not leave
        // stale continuations or slots behind.
        let repo = InMemorySchedulerRepository::new();
        let locks = StageLockRegistry::new();
        seed_stage(&repo, "stage-t", "Text press");
        seed_instance(&repo, "si-t", "stage-t", 1, 700, None);

        let now = jhb(2025, 6, 2, 8, 0);
        ScheduleJob::new(&repo, &locks).execute("job-1", now).unwrap();
        let result = ScheduleJob::new(&repo, &locks).execute("job-1", now).unwrap();

        assert!(result.success);
        let slots = repo.time_slots_for_stage("stage-t").unwrap();
        assert_eq!(slots.iter().map(|s| s.duration_minutes).sum::<i64>(), 700);
        assert_eq!(slots.len(), 2);

        let instances = repo.stage_instances_for_job("job-1").unwrap();
        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].total_splits, 2);
    }
}
