//! In-memory scheduler repository implementation
//!
//! HashMap-backed implementation of the SchedulerRepository trait.
//! Suitable for tests and dry-run tooling; nothing survives the process.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::entities::{
    ProductionJob, ProductionStage, PublicHoliday, ShiftSchedule, StageCapacityRecord,
    StageInstance, StageStatus, StageTimeSlot,
};
use crate::domain::repositories::SchedulerRepository;

#[derive(Default)]
struct State {
    jobs: HashMap<String, ProductionJob>,
    stages: HashMap<String, ProductionStage>,
    instances: HashMap<String, StageInstance>,
    slots: Vec<StageTimeSlot>,
    next_slot_id: i64,
    capacity: HashMap<(String, NaiveDate), StageCapacityRecord>,
    shifts: Vec<ShiftSchedule>,
    holidays: Vec<PublicHoliday>,
    settings: HashMap<String, String>,
}

/// In-memory implementation of the SchedulerRepository trait
pub struct InMemorySchedulerRepository {
    state: Mutex<State>,
}

impl InMemorySchedulerRepository {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_slot_id: 1,
                ..State::default()
            }),
        }
    }

    /// Seeds a job (test/demo convenience, not part of the trait)
    pub fn add_job(&self, job: ProductionJob) {
        self.state.lock().unwrap().jobs.insert(job.id.clone(), job);
    }

    /// Seeds a production stage definition
    pub fn add_stage(&self, stage: ProductionStage) {
        self.state
            .lock()
            .unwrap()
            .stages
            .insert(stage.id.clone(), stage);
    }

    /// Seeds shift schedule rows
    pub fn set_shifts(&self, shifts: Vec<ShiftSchedule>) {
        self.state.lock().unwrap().shifts = shifts;
    }

    /// Seeds public holidays
    pub fn set_holidays(&self, holidays: Vec<PublicHoliday>) {
        self.state.lock().unwrap().holidays = holidays;
    }

    /// Seeds app settings key/value rows
    pub fn set_settings(&self, settings: HashMap<String, String>) {
        self.state.lock().unwrap().settings = settings;
    }

    /// All slots currently committed (test inspection)
    pub fn all_time_slots(&self) -> Vec<StageTimeSlot> {
        self.state.lock().unwrap().slots.clone()
    }
}

impl Default for InMemorySchedulerRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerRepository for InMemorySchedulerRepository {
    fn job(&self, job_id: &str) -> Result<Option<ProductionJob>> {
        Ok(self.state.lock().unwrap().jobs.get(job_id).cloned())
    }

    fn active_jobs(&self) -> Result<Vec<ProductionJob>> {
        let state = self.state.lock().unwrap();
        let mut jobs: Vec<ProductionJob> = state
            .jobs
            .values()
            .filter(|j| !j.is_completed())
            .cloned()
            .collect();
        jobs.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        Ok(jobs)
    }

    fn jobs_by_ids(&self, ids: &[String]) -> Result<Vec<ProductionJob>> {
        let state = self.state.lock().unwrap();
        let mut jobs: Vec<ProductionJob> = ids
            .iter()
            .filter_map(|id| state.jobs.get(id))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        Ok(jobs)
    }

    fn jobs_awaiting_proof(&self) -> Result<Vec<ProductionJob>> {
        let state = self.state.lock().unwrap();
        let mut jobs: Vec<ProductionJob> = state
            .jobs
            .values()
            .filter(|job| {
                if job.proof_approved_at.is_some() || job.is_completed() {
                    return false;
                }
                state.instances.values().any(|si| {
                    si.job_id == job.id
                        && si.status == StageStatus::Pending
                        && state
                            .stages
                            .get(&si.stage_id)
                            .map(|s| s.is_proof_stage())
                            .unwrap_or_else(|| si.stage_id.to_lowercase().contains("proof"))
                })
            })
            .cloned()
            .collect();
        jobs.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        Ok(jobs)
    }

    fn set_tentative_due_date(&self, job_id: &str, date: NaiveDate) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(job) = state.jobs.get_mut(job_id) {
            job.tentative_due_date = Some(date);
        }
        Ok(())
    }

    fn production_stages(&self) -> Result<Vec<ProductionStage>> {
        let mut stages: Vec<ProductionStage> =
            self.state.lock().unwrap().stages.values().cloned().collect();
        stages.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(stages)
    }

    fn stage_instances_for_job(&self, job_id: &str) -> Result<Vec<StageInstance>> {
        let state = self.state.lock().unwrap();
        let mut instances: Vec<StageInstance> = state
            .instances
            .values()
            .filter(|si| si.job_id == job_id)
            .cloned()
            .collect();
        instances.sort_by_key(|si| (si.stage_order, si.split_sequence));
        Ok(instances)
    }

    fn stage_instance(&self, instance_id: &str) -> Result<Option<StageInstance>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .instances
            .get(instance_id)
            .cloned())
    }

    fn insert_stage_instance(&self, instance: &StageInstance) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .instances
            .insert(instance.id.clone(), instance.clone());
        Ok(())
    }

    fn update_stage_instance(&self, instance: &StageInstance) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .instances
            .insert(instance.id.clone(), instance.clone());
        Ok(())
    }

    fn delete_split_continuations(&self, job_id: &str) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .instances
            .retain(|_, si| !(si.job_id == job_id && si.is_split_continuation()));
        Ok(())
    }

    fn delete_split_continuations_of(&self, parent_instance_id: &str) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .instances
            .retain(|_, si| si.parent_split_id.as_deref() != Some(parent_instance_id));
        Ok(())
    }

    fn insert_time_slot(&self, slot: &StageTimeSlot) -> Result<i64> {
        let mut state = self.state.lock().unwrap();
        let id = state.next_slot_id;
        state.next_slot_id += 1;
        let mut slot = slot.clone();
        slot.id = id;
        state.slots.push(slot);
        Ok(id)
    }

    fn time_slots_for_stage(&self, stage_id: &str) -> Result<Vec<StageTimeSlot>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .slots
            .iter()
            .filter(|s| s.stage_id == stage_id)
            .cloned()
            .collect())
    }

    fn time_slots_for_stage_on(
        &self,
        stage_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<StageTimeSlot>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .slots
            .iter()
            .filter(|s| s.stage_id == stage_id && s.date == date)
            .cloned()
            .collect())
    }

    fn time_slots_for_instances_on(
        &self,
        date: NaiveDate,
        instance_ids: &[String],
    ) -> Result<Vec<StageTimeSlot>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .slots
            .iter()
            .filter(|s| s.date == date && instance_ids.contains(&s.instance_id))
            .cloned()
            .collect())
    }

    fn delete_time_slots_for_job(&self, job_id: &str) -> Result<Vec<StageTimeSlot>> {
        let mut state = self.state.lock().unwrap();
        let (removed, kept): (Vec<StageTimeSlot>, Vec<StageTimeSlot>) =
            state.slots.drain(..).partition(|s| s.job_id == job_id);
        state.slots = kept;
        Ok(removed)
    }

    fn delete_time_slots_for_instance(&self, instance_id: &str) -> Result<Vec<StageTimeSlot>> {
        let mut state = self.state.lock().unwrap();
        let (removed, kept): (Vec<StageTimeSlot>, Vec<StageTimeSlot>) = state
            .slots
            .drain(..)
            .partition(|s| s.instance_id == instance_id);
        state.slots = kept;
        Ok(removed)
    }

    fn update_time_slot_times(
        &self,
        slot_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        date: NaiveDate,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(slot) = state.slots.iter_mut().find(|s| s.id == slot_id) {
            slot.slot_start = start;
            slot.slot_end = end;
            slot.date = date;
            slot.duration_minutes = (end - start).num_minutes();
        }
        Ok(())
    }

    fn capacity_record(
        &self,
        stage_id: &str,
        date: NaiveDate,
    ) -> Result<Option<StageCapacityRecord>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .capacity
            .get(&(stage_id.to_string(), date))
            .cloned())
    }

    fn upsert_capacity_record(&self, record: &StageCapacityRecord) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .capacity
            .insert((record.stage_id.clone(), record.date), record.clone());
        Ok(())
    }

    fn capacity_records_on(&self, date: NaiveDate) -> Result<Vec<StageCapacityRecord>> {
        let mut records: Vec<StageCapacityRecord> = self
            .state
            .lock()
            .unwrap()
            .capacity
            .values()
            .filter(|r| r.date == date)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.stage_id.cmp(&b.stage_id));
        Ok(records)
    }

    fn delete_capacity_record(&self, stage_id: &str, date: NaiveDate) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .capacity
            .remove(&(stage_id.to_string(), date));
        Ok(())
    }

    fn reset_workload(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.slots.clear();
        state.capacity.clear();
        Ok(())
    }

    fn shift_schedules(&self) -> Result<Vec<ShiftSchedule>> {
        Ok(self.state.lock().unwrap().shifts.clone())
    }

    fn public_holidays(&self) -> Result<Vec<PublicHoliday>> {
        Ok(self.state.lock().unwrap().holidays.clone())
    }

    fn app_settings(&self) -> Result<HashMap<String, String>> {
        Ok(self.state.lock().unwrap().settings.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::JobTable;
    use chrono::TimeZone;

    #[test]
    fn test_active_jobs_ordering() {
        let repo = InMemorySchedulerRepository::new();
        let t0 = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2025, 6, 2, 8, 0, 0).unwrap();

        let mut done = ProductionJob::new("job-a", "WO-1", JobTable::Flyers, t0);
        done.status = "completed".to_string();
        repo.add_job(done);
        repo.add_job(ProductionJob::new("job-c", "WO-3", JobTable::Flyers, t1));
        repo.add_job(ProductionJob::new("job-b", "WO-2", JobTable::Flyers, t1));
        repo.add_job(ProductionJob::new("job-d", "WO-4", JobTable::Flyers, t0));

        let jobs = repo.active_jobs().unwrap();
        let ids: Vec<&str> = jobs.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["job-d", "job-b", "job-c"]);
    }

    #[test]
    fn test_delete_time_slots_for_job_returns_removed() {
        let repo = InMemorySchedulerRepository::new();
        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let t = Utc.with_ymd_and_hms(2025, 6, 2, 6, 0, 0).unwrap();

        let slot_a = StageTimeSlot::new("stage-1", date, t, t, "job-a", "si-a");
        let slot_b = StageTimeSlot::new("stage-1", date, t, t, "job-b", "si-b");
        repo.insert_time_slot(&slot_a).unwrap();
        repo.insert_time_slot(&slot_b).unwrap();

        let removed = repo.delete_time_slots_for_job("job-a").unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].job_id, "job-a");
        assert_eq!(repo.time_slots_for_stage("stage-1").unwrap().len(), 1);
    }

    #[test]
    fn test_jobs_awaiting_proof_filters() {
        let repo = InMemorySchedulerRepository::new();
        let t = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
        repo.add_stage(ProductionStage::new("stage-proof", "Digital Proofing"));
        repo.add_stage(ProductionStage::new("stage-print", "HP 12000 printing"));

        let waiting = ProductionJob::new("job-1", "WO-1", JobTable::Flyers, t);
        let mut approved = ProductionJob::new("job-2", "WO-2", JobTable::Flyers, t);
        approved.proof_approved_at = Some(t);
        repo.add_job(waiting);
        repo.add_job(approved);

        let si1 = StageInstance::new("si-1", "job-1", JobTable::Flyers, "stage-proof", 1);
        let si2 = StageInstance::new("si-2", "job-2", JobTable::Flyers, "stage-proof", 1);
        repo.insert_stage_instance(&si1).unwrap();
        repo.insert_stage_instance(&si2).unwrap();

        let jobs = repo.jobs_awaiting_proof().unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, "job-1");
    }
}
