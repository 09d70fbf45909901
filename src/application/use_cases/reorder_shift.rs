//! Reorder shift use case module
//!
//! Rewrites the start/end times of a day's (or shift's) stage instances
//! to match an operator-supplied ordering. Durations are preserved, jobs
//! with multiple supplied stages stay contiguous (cover before text),
//! and split instances sink to the tail of the order.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{info, warn};

use crate::application::services::{CapacityTracker, WorkingCalendar};
use crate::domain::entities::{StageInstance, StageTimeSlot};
use crate::domain::error::{SchedulerResult, SchedulingError};
use crate::domain::repositories::SchedulerRepository;

/// Operator request to reorder a day or shift
#[derive(Debug, Clone)]
pub struct ReorderRequest {
    pub date: NaiveDate,
    /// Desired ordering; every listed instance must own a slot on `date`
    pub stage_instance_ids: Vec<String>,
    pub shift_start: NaiveTime,
    pub shift_end: NaiveTime,
    /// Whether the request covers the whole day rather than one shift
    pub day_wide: bool,
    pub grouping_type: Option<String>,
}

/// One rewritten stage instance
#[derive(Debug, Clone, Serialize)]
pub struct UpdatedStage {
    pub instance_id: String,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
}

/// Outcome of a reorder
#[derive(Debug, Clone, Serialize)]
pub struct ReorderOutcome {
    pub updated_stages: Vec<UpdatedStage>,
    /// Whether the rewritten sequence still ends inside the shift window;
    /// the reorder is applied either way
    pub fits_within_shift: bool,
}

/// Applies an operator-supplied ordering to one day's slots
pub struct ReorderShift<'a> {
    repo: &'a dyn SchedulerRepository,
}

impl<'a> ReorderShift<'a> {
    pub fn new(repo: &'a dyn SchedulerRepository) -> Self {
        Self { repo }
    }

    /// Rewrites slot times to match the requested order
    ///
    /// Fails with `StagesNotAllOnDate` before any write when a listed
    /// instance has no slot on the date. Applying the same request twice
    /// produces identical output.
    pub fn execute(&self, request: &ReorderRequest) -> SchedulerResult<ReorderOutcome> {
        info!(
            date = %request.date,
            count = request.stage_instance_ids.len(),
            day_wide = request.day_wide,
            "reordering shift"
        );

        let calendar = WorkingCalendar::load(self.repo);

        let slots = self
            .repo
            .time_slots_for_instances_on(request.date, &request.stage_instance_ids)
            .map_err(|e| SchedulingError::persistence("read day time slots", e))?;

        let mut slots_by_instance: HashMap<String, Vec<StageTimeSlot>> = HashMap::new();
        for slot in slots {
            slots_by_instance
                .entry(slot.instance_id.clone())
                .or_default()
                .push(slot);
        }
        for slots in slots_by_instance.values_mut() {
            slots.sort_by_key(|s| s.slot_start);
        }

        let missing = request
            .stage_instance_ids
            .iter()
            .filter(|id| !slots_by_instance.contains_key(*id))
            .count();
        if missing > 0 {
            return Err(SchedulingError::StagesNotAllOnDate {
                date: request.date,
                missing,
            });
        }

        let instances = self.load_instances(&request.stage_instance_ids)?;
        let order = expand_order(&request.stage_instance_ids, &instances);

        // Walk the final order, laying slots head to tail from the shift start
        let mut cursor = calendar.instant_at(request.date, request.shift_start);
        let mut updated_stages = Vec::with_capacity(order.len());
        let mut touched: BTreeSet<(String, NaiveDate)> = BTreeSet::new();

        for instance_id in &order {
            let slots = &slots_by_instance[instance_id];
            let first_start = cursor;
            for slot in slots {
                let end = cursor + chrono::Duration::minutes(slot.duration_minutes);
                self.repo
                    .update_time_slot_times(slot.id, cursor, end, request.date)
                    .map_err(|e| SchedulingError::persistence("update time slot", e))?;
                touched.insert((slot.stage_id.clone(), slot.date));
                touched.insert((slot.stage_id.clone(), request.date));
                cursor = end;
            }

            let mut instance = instances[instance_id].clone();
            instance.scheduled_start = Some(first_start);
            instance.scheduled_end = Some(cursor);
            self.repo
                .update_stage_instance(&instance)
                .map_err(|e| SchedulingError::persistence("update stage instance", e))?;

            updated_stages.push(UpdatedStage {
                instance_id: instance_id.clone(),
                scheduled_start: first_start,
                scheduled_end: cursor,
            });
        }

        let tracker = CapacityTracker::new(self.repo, &calendar);
        for (stage_id, date) in touched {
            tracker.rebuild(&stage_id, date)?;
        }

        let shift_close = calendar.instant_at(request.date, request.shift_end);
        let fits_within_shift = cursor <= shift_close;
        if !fits_within_shift {
            warn!(
                date = %request.date,
                overrun_minutes = (cursor - shift_close).num_minutes(),
                "reordered sequence overruns the shift window"
            );
        }

        Ok(ReorderOutcome {
            updated_stages,
            fits_within_shift,
        })
    }

    fn load_instances(
        &self,
        ids: &[String],
    ) -> SchedulerResult<HashMap<String, StageInstance>> {
        let mut instances = HashMap::with_capacity(ids.len());
        for id in ids {
            let instance = self
                .repo
                .stage_instance(id)
                .map_err(|e| SchedulingError::persistence("read stage instance", e))?
                .ok_or_else(|| {
                    SchedulingError::persistence(
                        "read stage instance",
                        anyhow::anyhow!("stage instance {} not found", id),
                    )
                })?;
            instances.insert(id.clone(), instance);
        }
        Ok(instances)
    }
}

/// Expands the requested order so each job's supplied stages run
/// contiguously in `stage_order` (cover before text), with split
/// instances pushed to the tail
fn expand_order(
    requested: &[String],
    instances: &HashMap<String, StageInstance>,
) -> Vec<String> {
    let mut placed: HashSet<&str> = HashSet::new();
    let mut ordered = Vec::with_capacity(requested.len());

    for id in requested {
        if placed.contains(id.as_str()) {
            continue;
        }
        let Some(instance) = instances.get(id) else {
            continue;
        };
        let mut job_group: Vec<&StageInstance> = requested
            .iter()
            .filter_map(|other| instances.get(other))
            .filter(|other| other.job_id == instance.job_id && !placed.contains(other.id.as_str()))
            .collect();
        job_group.sort_by_key(|si| (si.stage_order, si.split_sequence));
        for member in job_group {
            placed.insert(member.id.as_str());
            ordered.push(member.id.clone());
        }
    }

    // Split work runs after everything that fits a single day
    let (split, whole): (Vec<String>, Vec<String>) = ordered
        .into_iter()
        .partition(|id| instances.get(id).map(|si| si.is_split).unwrap_or(false));
    let mut final_order = whole;
    final_order.extend(split);
    final_order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{JobTable, PartAssignment};
    use crate::infrastructure::repositories::InMemorySchedulerRepository;
    use chrono::TimeZone;

    fn jhb(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        chrono_tz::Africa::Johannesburg
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
    }

    fn seed(
        repo: &InMemorySchedulerRepository,
        id: &str,
        job: &str,
        order: u32,
        start: DateTime<Utc>,
        minutes: i64,
    ) {
        let si = StageInstance::new(id, job, JobTable::Flyers, format!("stage-{}", id), order)
            .duration(minutes);
        repo.insert_stage_instance(&si).unwrap();
        let slot = StageTimeSlot::new(
            format!("stage-{}", id),
            monday(),
            start,
            start + chrono::Duration::minutes(minutes),
            job,
            id,
        );
        repo.insert_time_slot(&slot).unwrap();
    }

    fn request(ids: &[&str]) -> ReorderRequest {
        ReorderRequest {
            date: monday(),
            stage_instance_ids: ids.iter().map(|s| s.to_string()).collect(),
            shift_start: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            shift_end: NaiveTime::from_hms_opt(16, 30, 0).unwrap(),
            day_wide: false,
            grouping_type: None,
        }
    }

    #[test]
    fn test_swap_preserves_durations() {
        // [A(60), B(90), C(30)] from 08:00 reordered to [C, A, B]
        let repo = InMemorySchedulerRepository::new();
        seed(&repo, "a", "job-a", 1, jhb(2025, 6, 2, 8, 0), 60);
        seed(&repo, "b", "job-b", 1, jhb(2025, 6, 2, 9, 0), 90);
        seed(&repo, "c", "job-c", 1, jhb(2025, 6, 2, 10, 30), 30);

        let outcome = ReorderShift::new(&repo)
            .execute(&request(&["c", "a", "b"]))
            .unwrap();

        assert!(outcome.fits_within_shift);
        let by_id: HashMap<&str, &UpdatedStage> = outcome
            .updated_stages
            .iter()
            .map(|u| (u.instance_id.as_str(), u))
            .collect();

        assert_eq!(by_id["c"].scheduled_start, jhb(2025, 6, 2, 8, 0));
        assert_eq!(by_id["c"].scheduled_end, jhb(2025, 6, 2, 8, 30));
        assert_eq!(by_id["a"].scheduled_start, jhb(2025, 6, 2, 8, 30));
        assert_eq!(by_id["a"].scheduled_end, jhb(2025, 6, 2, 9, 30));
        assert_eq!(by_id["b"].scheduled_start, jhb(2025, 6, 2, 9, 30));
        assert_eq!(by_id["b"].scheduled_end, jhb(2025, 6, 2, 11, 0));
    }

    #[test]
    fn test_reorder_is_idempotent() {
        let repo = InMemorySchedulerRepository::new();
        seed(&repo, "a", "job-a", 1, jhb(2025, 6, 2, 8, 0), 60);
        seed(&repo, "b", "job-b", 1, jhb(2025, 6, 2, 9, 0), 90);

        let req = request(&["b", "a"]);
        let first = ReorderShift::new(&repo).execute(&req).unwrap();
        let second = ReorderShift::new(&repo).execute(&req).unwrap();

        for (x, y) in first.updated_stages.iter().zip(second.updated_stages.iter()) {
            assert_eq!(x.instance_id, y.instance_id);
            assert_eq!(x.scheduled_start, y.scheduled_start);
            assert_eq!(x.scheduled_end, y.scheduled_end);
        }
    }

    #[test]
    fn test_same_job_stages_stay_contiguous() {
        // job-x has cover (order 1) and text (order 2); requesting the
        // text stage first still runs cover before text, ahead of job-y.
        let repo = InMemorySchedulerRepository::new();
        let mut cover = StageInstance::new("x-cover", "job-x", JobTable::Covers, "stage-c", 1)
            .duration(60)
            .part(PartAssignment::Cover);
        cover.scheduled_start = Some(jhb(2025, 6, 2, 8, 0));
        repo.insert_stage_instance(&cover).unwrap();
        repo.insert_time_slot(&StageTimeSlot::new(
            "stage-c",
            monday(),
            jhb(2025, 6, 2, 8, 0),
            jhb(2025, 6, 2, 9, 0),
            "job-x",
            "x-cover",
        ))
        .unwrap();

        let text = StageInstance::new("x-text", "job-x", JobTable::Covers, "stage-t", 2)
            .duration(30)
            .part(PartAssignment::Text);
        repo.insert_stage_instance(&text).unwrap();
        repo.insert_time_slot(&StageTimeSlot::new(
            "stage-t",
            monday(),
            jhb(2025, 6, 2, 9, 0),
            jhb(2025, 6, 2, 9, 30),
            "job-x",
            "x-text",
        ))
        .unwrap();

        seed(&repo, "y", "job-y", 1, jhb(2025, 6, 2, 9, 30), 45);

        let outcome = ReorderShift::new(&repo)
            .execute(&request(&["x-text", "y", "x-cover"]))
            .unwrap();

        let order: Vec<&str> = outcome
            .updated_stages
            .iter()
            .map(|u| u.instance_id.as_str())
            .collect();
        assert_eq!(order, vec!["x-cover", "x-text", "y"]);
        assert_eq!(
            outcome.updated_stages[0].scheduled_start,
            jhb(2025, 6, 2, 8, 0)
        );
    }

    #[test]
    fn test_split_instances_sink_to_tail() {
        let repo = InMemorySchedulerRepository::new();
        seed(&repo, "a", "job-a", 1, jhb(2025, 6, 2, 8, 0), 60);
        let mut split = StageInstance::new("s", "job-s", JobTable::Flyers, "stage-s", 1)
            .duration(120);
        split.is_split = true;
        split.total_splits = 2;
        repo.insert_stage_instance(&split).unwrap();
        repo.insert_time_slot(&StageTimeSlot::new(
            "stage-s",
            monday(),
            jhb(2025, 6, 2, 9, 0),
            jhb(2025, 6, 2, 10, 0),
            "job-s",
            "s",
        ))
        .unwrap();

        let outcome = ReorderShift::new(&repo)
            .execute(&request(&["s", "a"]))
            .unwrap();

        let order: Vec<&str> = outcome
            .updated_stages
            .iter()
            .map(|u| u.instance_id.as_str())
            .collect();
        assert_eq!(order, vec!["a", "s"]);
    }

    #[test]
    fn test_missing_slot_rejects_without_writes() {
        let repo = InMemorySchedulerRepository::new();
        seed(&repo, "a", "job-a", 1, jhb(2025, 6, 2, 8, 0), 60);

        let err = ReorderShift::new(&repo)
            .execute(&request(&["a", "ghost"]))
            .unwrap_err();
        assert!(matches!(
            err,
            SchedulingError::StagesNotAllOnDate { missing: 1, .. }
        ));

        // Original slot untouched
        let slots = repo.time_slots_for_stage("stage-a").unwrap();
        assert_eq!(slots[0].slot_start, jhb(2025, 6, 2, 8, 0));
    }

    #[test]
    fn test_overrun_is_reported_but_applied() {
        let repo = InMemorySchedulerRepository::new();
        seed(&repo, "a", "job-a", 1, jhb(2025, 6, 2, 8, 0), 500);
        seed(&repo, "b", "job-b", 1, jhb(2025, 6, 2, 8, 0), 60);

        let outcome = ReorderShift::new(&repo)
            .execute(&request(&["a", "b"]))
            .unwrap();
        assert!(!outcome.fits_within_shift);
        assert_eq!(outcome.updated_stages.len(), 2);
    }
}
