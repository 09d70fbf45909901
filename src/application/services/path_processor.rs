//! Path processor service module
//!
//! Schedules every stage of one workflow path sequentially: each stage
//! starts no earlier than the previous stage's end, joins its stage's
//! FIFO queue, and is split across working days when it does not fit the
//! remainder of a day. The convergence path runs the same loop, anchored
//! at the later of the cover and text path ends snapped into working
//! hours.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::application::services::{
    CancellationToken, CapacityTracker, DurationSplitter, StageLockRegistry, WorkingCalendar,
};
use crate::domain::entities::{StageInstance, StageStatus, StageTimeSlot};
use crate::domain::error::{SchedulerResult, SchedulingError};
use crate::domain::repositories::SchedulerRepository;
use crate::domain::value_objects::{PathKind, WorkflowPath};

/// One scheduled stage in a path result
#[derive(Debug, Clone)]
pub struct StageCompletion {
    pub instance_id: String,
    pub stage_id: String,
    pub stage_name: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub was_split: bool,
}

/// Outcome of scheduling one path
#[derive(Debug, Clone)]
pub struct PathResult {
    pub kind: PathKind,
    /// When the last stage on the path ends; the input start when empty
    pub completion_time: DateTime<Utc>,
    /// Sum of stage estimates, not elapsed wall-clock
    pub total_minutes: i64,
    pub stage_completions: Vec<StageCompletion>,
    /// Per-stage failures that did not abort the path
    pub errors: Vec<String>,
}

/// Schedules the stages of a single path in order
pub struct PathProcessor<'a> {
    repo: &'a dyn SchedulerRepository,
    calendar: &'a WorkingCalendar,
    locks: &'a StageLockRegistry,
    stage_names: &'a HashMap<String, String>,
    cancel: &'a CancellationToken,
}

impl<'a> PathProcessor<'a> {
    pub fn new(
        repo: &'a dyn SchedulerRepository,
        calendar: &'a WorkingCalendar,
        locks: &'a StageLockRegistry,
        stage_names: &'a HashMap<String, String>,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            repo,
            calendar,
            locks,
            stage_names,
            cancel,
        }
    }

    /// Schedules a cover or text path starting from `now`
    pub fn process_path(
        &self,
        path: &WorkflowPath,
        now: DateTime<Utc>,
    ) -> SchedulerResult<PathResult> {
        self.process_from(path, now)
    }

    /// Schedules the convergence path starting no earlier than
    /// `convergence_start` snapped into working hours
    pub fn process_convergence(
        &self,
        path: &WorkflowPath,
        convergence_start: DateTime<Utc>,
        cover_end: Option<DateTime<Utc>>,
        text_end: Option<DateTime<Utc>>,
    ) -> SchedulerResult<PathResult> {
        let mut timing_errors = validate_convergence_timing(convergence_start, cover_end, text_end);
        let snapped = self.calendar.snap_forward(convergence_start)?;
        let mut result = self.process_from(path, snapped)?;
        timing_errors.append(&mut result.errors);
        result.errors = timing_errors;
        Ok(result)
    }

    fn process_from(
        &self,
        path: &WorkflowPath,
        start: DateTime<Utc>,
    ) -> SchedulerResult<PathResult> {
        let mut result = PathResult {
            kind: path.kind,
            completion_time: start,
            total_minutes: path.total_minutes(),
            stage_completions: Vec::new(),
            errors: Vec::new(),
        };
        if path.is_empty() {
            return Ok(result);
        }

        let mut last_end = start;
        for stage in &path.stages {
            self.cancel.check()?;

            // Active and completed work is never rescheduled; it only
            // anchors where the next stage may start.
            if stage.status != StageStatus::Pending {
                if let Some(end) = stage.scheduled_end {
                    last_end = last_end.max(end);
                }
                continue;
            }

            match self.schedule_stage(stage, last_end) {
                Ok(completion) => {
                    last_end = completion.end;
                    result.stage_completions.push(completion);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(
                        instance_id = %stage.id,
                        stage_id = %stage.stage_id,
                        error = %e,
                        "stage scheduling failed, continuing path"
                    );
                    result
                        .errors
                        .push(format!("stage {} ({}): {}", stage.stage_id, stage.id, e));
                }
            }
        }

        result.completion_time = last_end;
        Ok(result)
    }

    /// Schedules one stage instance no earlier than `earliest`, splitting
    /// across days when needed
    ///
    /// The stage's capacity lock is held for the duration of the commit
    /// so concurrent calls against the same stage queue in order.
    pub fn schedule_stage(
        &self,
        stage: &StageInstance,
        earliest: DateTime<Utc>,
    ) -> SchedulerResult<StageCompletion> {
        let lock = self.locks.stage_lock(&stage.stage_id);
        let _guard = lock.lock().unwrap();

        let tracker = CapacityTracker::new(self.repo, self.calendar);
        let splitter = DurationSplitter::new(self.calendar);
        let minutes = stage.estimated_duration_minutes;

        let (start, end, was_split) = if splitter.needs_splitting(earliest, minutes) {
            self.schedule_split(&tracker, &splitter, stage, earliest)?
        } else {
            let (start, end) = tracker.schedule_simple(stage, earliest)?;
            let mut updated = stage.clone();
            updated.scheduled_start = Some(start);
            updated.scheduled_end = Some(end);
            updated.split_sequence = 1;
            updated.total_splits = 1;
            updated.is_split = false;
            updated.parent_split_id = None;
            self.repo
                .update_stage_instance(&updated)
                .map_err(|e| SchedulingError::persistence("update stage instance", e))?;
            (start, end, false)
        };

        debug!(
            instance_id = %stage.id,
            stage_id = %stage.stage_id,
            %start,
            %end,
            was_split,
            "stage scheduled"
        );

        Ok(StageCompletion {
            instance_id: stage.id.clone(),
            stage_id: stage.stage_id.clone(),
            stage_name: self
                .stage_names
                .get(&stage.stage_id)
                .cloned()
                .unwrap_or_else(|| stage.stage_id.clone()),
            start,
            end,
            was_split,
        })
    }

    /// Splits a stage across working days and commits one slot per part
    ///
    /// Parts are anchored behind the stage's queue on the first day so
    /// the FIFO ordering holds on the splitting path too. The original
    /// instance becomes part 1 and keeps its full duration estimate;
    /// continuation instances carry their part minutes.
    fn schedule_split(
        &self,
        tracker: &CapacityTracker<'_>,
        splitter: &DurationSplitter<'_>,
        stage: &StageInstance,
        earliest: DateTime<Utc>,
    ) -> SchedulerResult<(DateTime<Utc>, DateTime<Utc>, bool)> {
        let snapped = self.calendar.snap_forward(earliest)?;
        let queue_end = tracker.queue_end_time(&stage.stage_id, self.calendar.local_date(snapped))?;
        let anchor = snapped.max(queue_end);

        let parts = splitter.split(anchor, stage.estimated_duration_minutes)?;
        let total = parts.len() as u32;
        let mut slots = Vec::with_capacity(parts.len());

        for part in &parts {
            let instance_id = if part.sequence == 1 {
                stage.id.clone()
            } else {
                let mut continuation = stage.continuation(part.sequence, total, part.minutes);
                continuation.scheduled_start = Some(part.start);
                continuation.scheduled_end = Some(part.end);
                let id = continuation.id.clone();
                self.repo
                    .insert_stage_instance(&continuation)
                    .map_err(|e| SchedulingError::persistence("insert split continuation", e))?;
                id
            };
            slots.push(StageTimeSlot::new(
                &stage.stage_id,
                self.calendar.local_date(part.start),
                part.start,
                part.end,
                &stage.job_id,
                instance_id,
            ));
        }

        tracker.commit_split(&stage.stage_id, &slots)?;

        let first = &parts[0];
        let last = parts.last().unwrap_or(first);
        let mut updated = stage.clone();
        updated.scheduled_start = Some(first.start);
        updated.scheduled_end = Some(first.end);
        updated.split_sequence = 1;
        updated.total_splits = total;
        updated.is_split = total > 1;
        updated.parent_split_id = None;
        self.repo
            .update_stage_instance(&updated)
            .map_err(|e| SchedulingError::persistence("update stage instance", e))?;

        Ok((first.start, last.end, total > 1))
    }
}

/// Flags a convergence start that precedes either feeding path's end
pub fn validate_convergence_timing(
    convergence_start: DateTime<Utc>,
    cover_end: Option<DateTime<Utc>>,
    text_end: Option<DateTime<Utc>>,
) -> Vec<String> {
    let mut errors = Vec::new();
    if let Some(cover_end) = cover_end {
        if convergence_start < cover_end {
            errors.push(format!(
                "convergence start {} precedes cover path end {}",
                convergence_start, cover_end
            ));
        }
    }
    if let Some(text_end) = text_end {
        if convergence_start < text_end {
            errors.push(format!(
                "convergence start {} precedes text path end {}",
                convergence_start, text_end
            ));
        }
    }
    errors
}
