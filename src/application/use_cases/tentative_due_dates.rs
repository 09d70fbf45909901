//! Tentative due date use case module
//!
//! Jobs still waiting on customer proof approval cannot be committed to
//! the schedule, but the shop still quotes a projected completion date.
//! This use case dry-runs the path scheduling against the live queues
//! without committing anything, adds the SLA buffer, and persists the
//! projected date on the job.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{info, warn};

use crate::application::services::{
    CapacityTracker, DurationSplitter, WorkflowAnalyzer, WorkingCalendar,
};
use crate::domain::entities::{StageInstance, StageStatus};
use crate::domain::error::{SchedulerResult, SchedulingError};
use crate::domain::repositories::SchedulerRepository;

/// Projected completion for one proof-waiting job
#[derive(Debug, Clone, Serialize)]
pub struct TentativeDueDate {
    pub job_id: String,
    pub tentative_due_date: NaiveDate,
}

/// Computes projected due dates for jobs awaiting proof approval
pub struct RecalcTentativeDueDates<'a> {
    repo: &'a dyn SchedulerRepository,
}

impl<'a> RecalcTentativeDueDates<'a> {
    pub fn new(repo: &'a dyn SchedulerRepository) -> Self {
        Self { repo }
    }

    /// Dry-runs every proof-waiting job and persists the projected dates
    ///
    /// Reads the real queues so existing workload pushes projections out,
    /// but commits no slots and no capacity records. Idempotent while the
    /// workload is quiet.
    pub fn execute(&self, now: DateTime<Utc>) -> SchedulerResult<Vec<TentativeDueDate>> {
        let calendar = WorkingCalendar::load(self.repo);
        let tracker = CapacityTracker::new(self.repo, &calendar);
        let splitter = DurationSplitter::new(&calendar);
        let analyzer = WorkflowAnalyzer::new();

        let jobs = self
            .repo
            .jobs_awaiting_proof()
            .map_err(|e| SchedulingError::persistence("read proof-waiting jobs", e))?;
        info!(count = jobs.len(), "estimating tentative due dates");

        let buffer_minutes =
            calendar.config().sla_buffer_working_days * calendar.daily_working_minutes();

        let mut results = Vec::with_capacity(jobs.len());
        for job in jobs {
            let instances = self
                .repo
                .stage_instances_for_job(&job.id)
                .map_err(|e| SchedulingError::persistence("read stage instances", e))?;
            let workflow = match analyzer.analyze(&job.id, instances) {
                Ok(workflow) => workflow,
                Err(e) => {
                    warn!(job_id = %job.id, error = %e, "skipping job with no workflow");
                    continue;
                }
            };

            // Call-local overlay so successive simulated stages queue
            // behind each other without touching the store
            let mut overlay: HashMap<(String, NaiveDate), DateTime<Utc>> = HashMap::new();

            let cover_end = self.simulate_path(
                &calendar,
                &tracker,
                &splitter,
                &workflow.cover.stages,
                now,
                &mut overlay,
            )?;
            let text_end = self.simulate_path(
                &calendar,
                &tracker,
                &splitter,
                &workflow.text.stages,
                now,
                &mut overlay,
            )?;

            let convergence_start = match (cover_end, text_end) {
                (Some(c), Some(t)) => c.max(t),
                (Some(c), None) => c,
                (None, Some(t)) => t,
                (None, None) => now,
            };
            let convergence_end = self.simulate_path(
                &calendar,
                &tracker,
                &splitter,
                &workflow.convergence.stages,
                convergence_start,
                &mut overlay,
            )?;

            let completion = convergence_end
                .or(text_end)
                .or(cover_end)
                .unwrap_or(now);

            let buffered = if buffer_minutes > 0 {
                splitter
                    .split(completion, buffer_minutes)?
                    .last()
                    .map(|p| p.end)
                    .unwrap_or(completion)
            } else {
                completion
            };

            let due = calendar.local_date(buffered);
            self.repo
                .set_tentative_due_date(&job.id, due)
                .map_err(|e| SchedulingError::persistence("write tentative due date", e))?;
            results.push(TentativeDueDate {
                job_id: job.id.clone(),
                tentative_due_date: due,
            });
        }

        Ok(results)
    }

    /// Simulates one path without committing: each stage queues behind
    /// the later of the committed queue end and the overlay
    fn simulate_path(
        &self,
        calendar: &WorkingCalendar,
        tracker: &CapacityTracker<'_>,
        splitter: &DurationSplitter<'_>,
        stages: &[StageInstance],
        start: DateTime<Utc>,
        overlay: &mut HashMap<(String, NaiveDate), DateTime<Utc>>,
    ) -> SchedulerResult<Option<DateTime<Utc>>> {
        if stages.is_empty() {
            return Ok(None);
        }

        let mut last_end = start;
        for stage in stages {
            if stage.status != StageStatus::Pending {
                if let Some(end) = stage.scheduled_end {
                    last_end = last_end.max(end);
                }
                continue;
            }

            let snapped = calendar.snap_forward(last_end)?;
            let date = calendar.local_date(snapped);
            let committed = tracker.queue_end_time(&stage.stage_id, date)?;
            let simulated = overlay
                .get(&(stage.stage_id.clone(), date))
                .copied()
                .unwrap_or(committed);
            let anchor = snapped.max(committed).max(simulated);

            let parts = splitter.split(anchor, stage.estimated_duration_minutes)?;
            for part in &parts {
                let key = (stage.stage_id.clone(), calendar.local_date(part.start));
                let entry = overlay.entry(key).or_insert(part.end);
                if *entry < part.end {
                    *entry = part.end;
                }
            }
            if let Some(last) = parts.last() {
                last_end = last.end;
            }
        }
        Ok(Some(last_end))
    }
}
