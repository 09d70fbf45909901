//! SQLite scheduler repository implementation
//!
//! Persists jobs, stage instances, time slots, capacity records, and the
//! calendar configuration in a SQLite database. Configured for WAL mode
//! with indexes on the queue-reconstruction paths. Timestamps are stored
//! as RFC 3339 UTC strings and dates as `YYYY-MM-DD`.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::domain::entities::{
    ProductionJob, ProductionStage, PublicHoliday, ShiftSchedule, StageCapacityRecord,
    StageInstance, StageStatus, StageTimeSlot,
};
use crate::domain::repositories::SchedulerRepository;
use crate::domain::value_objects::{JobTable, PartAssignment};

/// SQLite implementation of the SchedulerRepository trait
pub struct SqliteSchedulerRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSchedulerRepository {
    /// Opens (or creates) the database at `path` and ensures the schema
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open scheduler database")?;
        Self::from_connection(conn)
    }

    /// Opens an in-memory database; used by tests and dry-run tooling
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            "#,
        )?;
        let repo = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        repo.create_schema()?;
        Ok(repo)
    }

    /// Creates all scheduler tables and indexes
    fn create_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS production_jobs (
                id TEXT PRIMARY KEY,
                work_order_number TEXT NOT NULL,
                job_table TEXT NOT NULL,
                category_id TEXT,
                due_date TEXT,
                status TEXT NOT NULL DEFAULT 'queued',
                has_custom_workflow INTEGER NOT NULL DEFAULT 0,
                is_expedited INTEGER NOT NULL DEFAULT 0,
                proof_approved_at TEXT,
                tentative_due_date TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS production_stages (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                running_speed_per_hour REAL,
                make_ready_minutes INTEGER,
                stage_group_id TEXT,
                parallel_enabled INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS job_stage_instances (
                id TEXT PRIMARY KEY,
                job_id TEXT NOT NULL,
                job_table TEXT NOT NULL,
                stage_id TEXT NOT NULL,
                stage_order INTEGER NOT NULL,
                part_assignment TEXT,
                estimated_duration_minutes INTEGER NOT NULL DEFAULT 60,
                status TEXT NOT NULL DEFAULT 'pending',
                scheduled_start TEXT,
                scheduled_end TEXT,
                split_sequence INTEGER NOT NULL DEFAULT 1,
                total_splits INTEGER NOT NULL DEFAULT 1,
                is_split INTEGER NOT NULL DEFAULT 0,
                parent_split_id TEXT,
                unique_stage_key TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_instances_job
                ON job_stage_instances(job_id, stage_order, split_sequence);
            CREATE INDEX IF NOT EXISTS idx_instances_parent
                ON job_stage_instances(parent_split_id);

            CREATE TABLE IF NOT EXISTS stage_time_slots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                stage_id TEXT NOT NULL,
                slot_date TEXT NOT NULL,
                slot_start TEXT NOT NULL,
                slot_end TEXT NOT NULL,
                duration_minutes INTEGER NOT NULL,
                job_id TEXT NOT NULL,
                instance_id TEXT NOT NULL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_slots_stage_date
                ON stage_time_slots(stage_id, slot_date);
            CREATE INDEX IF NOT EXISTS idx_slots_instance
                ON stage_time_slots(instance_id);
            CREATE INDEX IF NOT EXISTS idx_slots_job
                ON stage_time_slots(job_id);

            CREATE TABLE IF NOT EXISTS stage_workload_tracking (
                stage_id TEXT NOT NULL,
                track_date TEXT NOT NULL,
                committed_minutes INTEGER NOT NULL,
                available_minutes INTEGER NOT NULL,
                queue_length_minutes INTEGER NOT NULL,
                queue_ends_at TEXT NOT NULL,
                pending_jobs_count INTEGER NOT NULL,
                active_jobs_count INTEGER NOT NULL,
                calculated_at TEXT NOT NULL,
                PRIMARY KEY (stage_id, track_date)
            );

            CREATE TABLE IF NOT EXISTS shift_schedules (
                day_of_week INTEGER PRIMARY KEY,
                shift_start TEXT NOT NULL,
                shift_end TEXT NOT NULL,
                is_working_day INTEGER NOT NULL DEFAULT 1,
                is_active INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS public_holidays (
                holiday_date TEXT PRIMARY KEY,
                description TEXT,
                is_active INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS app_settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// Inserts or replaces a job row (seeding/import convenience)
    pub fn upsert_job(&self, job: &ProductionJob) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT OR REPLACE INTO production_jobs
                (id, work_order_number, job_table, category_id, due_date, status,
                 has_custom_workflow, is_expedited, proof_approved_at,
                 tentative_due_date, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                job.id,
                job.work_order_number,
                job.job_table.table_name(),
                job.category_id,
                job.due_date.map(date_str),
                job.status,
                job.has_custom_workflow as i64,
                job.is_expedited as i64,
                job.proof_approved_at.map(|t| ts_str(&t)),
                job.tentative_due_date.map(date_str),
                ts_str(&job.created_at),
            ],
        )?;
        Ok(())
    }

    /// Inserts or replaces a stage definition (seeding/import convenience)
    pub fn upsert_stage(&self, stage: &ProductionStage) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT OR REPLACE INTO production_stages
                (id, name, running_speed_per_hour, make_ready_minutes,
                 stage_group_id, parallel_enabled)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                stage.id,
                stage.name,
                stage.running_speed_per_hour,
                stage.make_ready_minutes,
                stage.stage_group_id,
                stage.parallel_enabled as i64,
            ],
        )?;
        Ok(())
    }

    /// Inserts or replaces a shift schedule row (seeding convenience)
    pub fn upsert_shift(&self, shift: &ShiftSchedule) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT OR REPLACE INTO shift_schedules
                (day_of_week, shift_start, shift_end, is_working_day, is_active)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                shift.day_of_week as i64,
                shift.shift_start.format("%H:%M:%S").to_string(),
                shift.shift_end.format("%H:%M:%S").to_string(),
                shift.is_working_day as i64,
                shift.is_active as i64,
            ],
        )?;
        Ok(())
    }

    /// Inserts or replaces a holiday row (seeding convenience)
    pub fn upsert_holiday(&self, holiday: &PublicHoliday) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT OR REPLACE INTO public_holidays (holiday_date, description, is_active)
            VALUES (?1, ?2, ?3)
            "#,
            params![
                date_str(holiday.date),
                holiday.description,
                holiday.is_active as i64,
            ],
        )?;
        Ok(())
    }

    /// Writes one app setting (seeding convenience)
    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO app_settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    fn job_from_row(row: &Row<'_>) -> rusqlite::Result<RawJob> {
        Ok(RawJob {
            id: row.get(0)?,
            work_order_number: row.get(1)?,
            job_table: row.get(2)?,
            category_id: row.get(3)?,
            due_date: row.get(4)?,
            status: row.get(5)?,
            has_custom_workflow: row.get(6)?,
            is_expedited: row.get(7)?,
            proof_approved_at: row.get(8)?,
            tentative_due_date: row.get(9)?,
            created_at: row.get(10)?,
        })
    }

    fn instance_from_row(row: &Row<'_>) -> rusqlite::Result<RawInstance> {
        Ok(RawInstance {
            id: row.get(0)?,
            job_id: row.get(1)?,
            job_table: row.get(2)?,
            stage_id: row.get(3)?,
            stage_order: row.get(4)?,
            part_assignment: row.get(5)?,
            estimated_duration_minutes: row.get(6)?,
            status: row.get(7)?,
            scheduled_start: row.get(8)?,
            scheduled_end: row.get(9)?,
            split_sequence: row.get(10)?,
            total_splits: row.get(11)?,
            is_split: row.get(12)?,
            parent_split_id: row.get(13)?,
            unique_stage_key: row.get(14)?,
        })
    }

    fn slot_from_row(row: &Row<'_>) -> rusqlite::Result<RawSlot> {
        Ok(RawSlot {
            id: row.get(0)?,
            stage_id: row.get(1)?,
            slot_date: row.get(2)?,
            slot_start: row.get(3)?,
            slot_end: row.get(4)?,
            duration_minutes: row.get(5)?,
            job_id: row.get(6)?,
            instance_id: row.get(7)?,
        })
    }

    fn query_jobs(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<ProductionJob>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, Self::job_from_row)?;
        let mut jobs = Vec::new();
        for row in rows {
            jobs.push(row?.into_job()?);
        }
        Ok(jobs)
    }

    fn query_instances(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<StageInstance>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, Self::instance_from_row)?;
        let mut instances = Vec::new();
        for row in rows {
            instances.push(row?.into_instance()?);
        }
        Ok(instances)
    }

    fn query_slots(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<StageTimeSlot>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, Self::slot_from_row)?;
        let mut slots = Vec::new();
        for row in rows {
            slots.push(row?.into_slot()?);
        }
        Ok(slots)
    }
}

const JOB_COLUMNS: &str = "id, work_order_number, job_table, category_id, due_date, status, \
     has_custom_workflow, is_expedited, proof_approved_at, tentative_due_date, created_at";

const INSTANCE_COLUMNS: &str = "id, job_id, job_table, stage_id, stage_order, part_assignment, \
     estimated_duration_minutes, status, scheduled_start, scheduled_end, split_sequence, \
     total_splits, is_split, parent_split_id, unique_stage_key";

const SLOT_COLUMNS: &str =
    "id, stage_id, slot_date, slot_start, slot_end, duration_minutes, job_id, instance_id";

impl SchedulerRepository for SqliteSchedulerRepository {
    fn job(&self, job_id: &str) -> Result<Option<ProductionJob>> {
        let jobs = self.query_jobs(
            &format!("SELECT {} FROM production_jobs WHERE id = ?1", JOB_COLUMNS),
            &[&job_id],
        )?;
        Ok(jobs.into_iter().next())
    }

    fn active_jobs(&self) -> Result<Vec<ProductionJob>> {
        self.query_jobs(
            &format!(
                "SELECT {} FROM production_jobs WHERE status != 'completed' \
                 ORDER BY created_at ASC, id ASC",
                JOB_COLUMNS
            ),
            &[],
        )
    }

    fn jobs_by_ids(&self, ids: &[String]) -> Result<Vec<ProductionJob>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM production_jobs WHERE id IN ({}) ORDER BY created_at ASC, id ASC",
            JOB_COLUMNS, placeholders
        );
        let params: Vec<&dyn rusqlite::ToSql> =
            ids.iter().map(|id| id as &dyn rusqlite::ToSql).collect();
        self.query_jobs(&sql, &params)
    }

    fn jobs_awaiting_proof(&self) -> Result<Vec<ProductionJob>> {
        self.query_jobs(
            &format!(
                "SELECT DISTINCT j.{} FROM production_jobs j \
                 JOIN job_stage_instances si ON si.job_id = j.id \
                 JOIN production_stages ps ON ps.id = si.stage_id \
                 WHERE si.status = 'pending' \
                   AND LOWER(ps.name) LIKE '%proof%' \
                   AND j.proof_approved_at IS NULL \
                   AND j.status != 'completed' \
                 ORDER BY j.created_at ASC, j.id ASC",
                JOB_COLUMNS.replace(", ", ", j.")
            ),
            &[],
        )
    }

    fn set_tentative_due_date(&self, job_id: &str, date: NaiveDate) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE production_jobs SET tentative_due_date = ?1 WHERE id = ?2",
            params![date_str(date), job_id],
        )?;
        Ok(())
    }

    fn production_stages(&self) -> Result<Vec<ProductionStage>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, name, running_speed_per_hour, make_ready_minutes, \
             stage_group_id, parallel_enabled FROM production_stages ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ProductionStage {
                id: row.get(0)?,
                name: row.get(1)?,
                running_speed_per_hour: row.get(2)?,
                make_ready_minutes: row.get(3)?,
                stage_group_id: row.get(4)?,
                parallel_enabled: row.get::<_, i64>(5)? != 0,
            })
        })?;
        let mut stages = Vec::new();
        for row in rows {
            stages.push(row?);
        }
        Ok(stages)
    }

    fn stage_instances_for_job(&self, job_id: &str) -> Result<Vec<StageInstance>> {
        self.query_instances(
            &format!(
                "SELECT {} FROM job_stage_instances WHERE job_id = ?1 \
                 ORDER BY stage_order ASC, split_sequence ASC",
                INSTANCE_COLUMNS
            ),
            &[&job_id],
        )
    }

    fn stage_instance(&self, instance_id: &str) -> Result<Option<StageInstance>> {
        let instances = self.query_instances(
            &format!(
                "SELECT {} FROM job_stage_instances WHERE id = ?1",
                INSTANCE_COLUMNS
            ),
            &[&instance_id],
        )?;
        Ok(instances.into_iter().next())
    }

    fn insert_stage_instance(&self, instance: &StageInstance) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO job_stage_instances
                (id, job_id, job_table, stage_id, stage_order, part_assignment,
                 estimated_duration_minutes, status, scheduled_start, scheduled_end,
                 split_sequence, total_splits, is_split, parent_split_id, unique_stage_key)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
            instance_params(instance),
        )?;
        Ok(())
    }

    fn update_stage_instance(&self, instance: &StageInstance) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT OR REPLACE INTO job_stage_instances
                (id, job_id, job_table, stage_id, stage_order, part_assignment,
                 estimated_duration_minutes, status, scheduled_start, scheduled_end,
                 split_sequence, total_splits, is_split, parent_split_id, unique_stage_key)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
            instance_params(instance),
        )?;
        Ok(())
    }

    fn delete_split_continuations(&self, job_id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM job_stage_instances WHERE job_id = ?1 AND split_sequence > 1",
            params![job_id],
        )?;
        Ok(())
    }

    fn delete_split_continuations_of(&self, parent_instance_id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM job_stage_instances WHERE parent_split_id = ?1",
            params![parent_instance_id],
        )?;
        Ok(())
    }

    fn insert_time_slot(&self, slot: &StageTimeSlot) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO stage_time_slots
                (stage_id, slot_date, slot_start, slot_end, duration_minutes, job_id, instance_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                slot.stage_id,
                date_str(slot.date),
                ts_str(&slot.slot_start),
                ts_str(&slot.slot_end),
                slot.duration_minutes,
                slot.job_id,
                slot.instance_id,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn time_slots_for_stage(&self, stage_id: &str) -> Result<Vec<StageTimeSlot>> {
        self.query_slots(
            &format!(
                "SELECT {} FROM stage_time_slots WHERE stage_id = ?1 ORDER BY id ASC",
                SLOT_COLUMNS
            ),
            &[&stage_id],
        )
    }

    fn time_slots_for_stage_on(
        &self,
        stage_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<StageTimeSlot>> {
        self.query_slots(
            &format!(
                "SELECT {} FROM stage_time_slots WHERE stage_id = ?1 AND slot_date = ?2 \
                 ORDER BY id ASC",
                SLOT_COLUMNS
            ),
            &[&stage_id, &date_str(date)],
        )
    }

    fn time_slots_for_instances_on(
        &self,
        date: NaiveDate,
        instance_ids: &[String],
    ) -> Result<Vec<StageTimeSlot>> {
        if instance_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; instance_ids.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM stage_time_slots WHERE slot_date = ? AND instance_id IN ({}) \
             ORDER BY id ASC",
            SLOT_COLUMNS, placeholders
        );
        let date = date_str(date);
        let mut params: Vec<&dyn rusqlite::ToSql> = vec![&date];
        params.extend(instance_ids.iter().map(|id| id as &dyn rusqlite::ToSql));
        self.query_slots(&sql, &params)
    }

    fn delete_time_slots_for_job(&self, job_id: &str) -> Result<Vec<StageTimeSlot>> {
        let removed = self.query_slots(
            &format!(
                "SELECT {} FROM stage_time_slots WHERE job_id = ?1",
                SLOT_COLUMNS
            ),
            &[&job_id],
        )?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM stage_time_slots WHERE job_id = ?1",
            params![job_id],
        )?;
        Ok(removed)
    }

    fn delete_time_slots_for_instance(&self, instance_id: &str) -> Result<Vec<StageTimeSlot>> {
        let removed = self.query_slots(
            &format!(
                "SELECT {} FROM stage_time_slots WHERE instance_id = ?1",
                SLOT_COLUMNS
            ),
            &[&instance_id],
        )?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM stage_time_slots WHERE instance_id = ?1",
            params![instance_id],
        )?;
        Ok(removed)
    }

    fn update_time_slot_times(
        &self,
        slot_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        date: NaiveDate,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            UPDATE stage_time_slots
            SET slot_start = ?1, slot_end = ?2, slot_date = ?3, duration_minutes = ?4
            WHERE id = ?5
            "#,
            params![
                ts_str(&start),
                ts_str(&end),
                date_str(date),
                (end - start).num_minutes(),
                slot_id,
            ],
        )?;
        Ok(())
    }

    fn capacity_record(
        &self,
        stage_id: &str,
        date: NaiveDate,
    ) -> Result<Option<StageCapacityRecord>> {
        let conn = self.conn.lock().unwrap();
        let raw = conn
            .query_row(
                "SELECT stage_id, track_date, committed_minutes, available_minutes, \
                 queue_length_minutes, queue_ends_at, pending_jobs_count, active_jobs_count, \
                 calculated_at FROM stage_workload_tracking \
                 WHERE stage_id = ?1 AND track_date = ?2",
                params![stage_id, date_str(date)],
                capacity_from_row,
            )
            .optional()?;
        raw.map(RawCapacity::into_record).transpose()
    }

    fn upsert_capacity_record(&self, record: &StageCapacityRecord) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO stage_workload_tracking
                (stage_id, track_date, committed_minutes, available_minutes,
                 queue_length_minutes, queue_ends_at, pending_jobs_count,
                 active_jobs_count, calculated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(stage_id, track_date) DO UPDATE SET
                committed_minutes = excluded.committed_minutes,
                available_minutes = excluded.available_minutes,
                queue_length_minutes = excluded.queue_length_minutes,
                queue_ends_at = excluded.queue_ends_at,
                pending_jobs_count = excluded.pending_jobs_count,
                active_jobs_count = excluded.active_jobs_count,
                calculated_at = excluded.calculated_at
            "#,
            params![
                record.stage_id,
                date_str(record.date),
                record.committed_minutes,
                record.available_minutes,
                record.queue_length_minutes,
                ts_str(&record.queue_ends_at),
                record.pending_jobs_count,
                record.active_jobs_count,
                ts_str(&record.calculated_at),
            ],
        )?;
        Ok(())
    }

    fn capacity_records_on(&self, date: NaiveDate) -> Result<Vec<StageCapacityRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT stage_id, track_date, committed_minutes, available_minutes, \
             queue_length_minutes, queue_ends_at, pending_jobs_count, active_jobs_count, \
             calculated_at FROM stage_workload_tracking WHERE track_date = ?1 \
             ORDER BY stage_id ASC",
        )?;
        let rows = stmt.query_map(params![date_str(date)], capacity_from_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record()?);
        }
        Ok(records)
    }

    fn delete_capacity_record(&self, stage_id: &str, date: NaiveDate) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM stage_workload_tracking WHERE stage_id = ?1 AND track_date = ?2",
            params![stage_id, date_str(date)],
        )?;
        Ok(())
    }

    fn reset_workload(&self) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM stage_time_slots", [])?;
        tx.execute("DELETE FROM stage_workload_tracking", [])?;
        tx.commit()?;
        Ok(())
    }

    fn shift_schedules(&self) -> Result<Vec<ShiftSchedule>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT day_of_week, shift_start, shift_end, is_working_day, is_active \
             FROM shift_schedules ORDER BY day_of_week",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?;
        let mut shifts = Vec::new();
        for row in rows {
            let (day, start, end, working, active) = row?;
            shifts.push(ShiftSchedule {
                day_of_week: day as u8,
                shift_start: parse_time(&start)?,
                shift_end: parse_time(&end)?,
                is_working_day: working != 0,
                is_active: active != 0,
            });
        }
        Ok(shifts)
    }

    fn public_holidays(&self) -> Result<Vec<PublicHoliday>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT holiday_date, description, is_active FROM public_holidays ORDER BY holiday_date",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;
        let mut holidays = Vec::new();
        for row in rows {
            let (date, description, active) = row?;
            holidays.push(PublicHoliday {
                date: parse_date(&date)?,
                description,
                is_active: active != 0,
            });
        }
        Ok(holidays)
    }

    fn app_settings(&self) -> Result<HashMap<String, String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT key, value FROM app_settings")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut settings = HashMap::new();
        for row in rows {
            let (key, value) = row?;
            settings.insert(key, value);
        }
        Ok(settings)
    }
}

// --- row conversion helpers ---

struct RawJob {
    id: String,
    work_order_number: String,
    job_table: String,
    category_id: Option<String>,
    due_date: Option<String>,
    status: String,
    has_custom_workflow: i64,
    is_expedited: i64,
    proof_approved_at: Option<String>,
    tentative_due_date: Option<String>,
    created_at: String,
}

impl RawJob {
    fn into_job(self) -> Result<ProductionJob> {
        Ok(ProductionJob {
            id: self.id,
            work_order_number: self.work_order_number,
            job_table: JobTable::parse(&self.job_table),
            category_id: self.category_id,
            due_date: self.due_date.as_deref().map(parse_date).transpose()?,
            status: self.status,
            has_custom_workflow: self.has_custom_workflow != 0,
            is_expedited: self.is_expedited != 0,
            proof_approved_at: self.proof_approved_at.as_deref().map(parse_ts).transpose()?,
            tentative_due_date: self
                .tentative_due_date
                .as_deref()
                .map(parse_date)
                .transpose()?,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

struct RawInstance {
    id: String,
    job_id: String,
    job_table: String,
    stage_id: String,
    stage_order: i64,
    part_assignment: Option<String>,
    estimated_duration_minutes: i64,
    status: String,
    scheduled_start: Option<String>,
    scheduled_end: Option<String>,
    split_sequence: i64,
    total_splits: i64,
    is_split: i64,
    parent_split_id: Option<String>,
    unique_stage_key: String,
}

impl RawInstance {
    fn into_instance(self) -> Result<StageInstance> {
        Ok(StageInstance {
            id: self.id,
            job_id: self.job_id,
            job_table: JobTable::parse(&self.job_table),
            stage_id: self.stage_id,
            stage_order: self.stage_order as u32,
            part_assignment: self
                .part_assignment
                .as_deref()
                .and_then(PartAssignment::parse),
            estimated_duration_minutes: self.estimated_duration_minutes,
            status: StageStatus::parse(&self.status),
            scheduled_start: self.scheduled_start.as_deref().map(parse_ts).transpose()?,
            scheduled_end: self.scheduled_end.as_deref().map(parse_ts).transpose()?,
            split_sequence: self.split_sequence as u32,
            total_splits: self.total_splits as u32,
            is_split: self.is_split != 0,
            parent_split_id: self.parent_split_id,
            unique_stage_key: self.unique_stage_key,
        })
    }
}

struct RawSlot {
    id: i64,
    stage_id: String,
    slot_date: String,
    slot_start: String,
    slot_end: String,
    duration_minutes: i64,
    job_id: String,
    instance_id: String,
}

impl RawSlot {
    fn into_slot(self) -> Result<StageTimeSlot> {
        Ok(StageTimeSlot {
            id: self.id,
            stage_id: self.stage_id,
            date: parse_date(&self.slot_date)?,
            slot_start: parse_ts(&self.slot_start)?,
            slot_end: parse_ts(&self.slot_end)?,
            duration_minutes: self.duration_minutes,
            job_id: self.job_id,
            instance_id: self.instance_id,
        })
    }
}

struct RawCapacity {
    stage_id: String,
    track_date: String,
    committed_minutes: i64,
    available_minutes: i64,
    queue_length_minutes: i64,
    queue_ends_at: String,
    pending_jobs_count: i64,
    active_jobs_count: i64,
    calculated_at: String,
}

impl RawCapacity {
    fn into_record(self) -> Result<StageCapacityRecord> {
        Ok(StageCapacityRecord {
            stage_id: self.stage_id,
            date: parse_date(&self.track_date)?,
            committed_minutes: self.committed_minutes,
            available_minutes: self.available_minutes,
            queue_length_minutes: self.queue_length_minutes,
            queue_ends_at: parse_ts(&self.queue_ends_at)?,
            pending_jobs_count: self.pending_jobs_count,
            active_jobs_count: self.active_jobs_count,
            calculated_at: parse_ts(&self.calculated_at)?,
        })
    }
}

fn capacity_from_row(row: &Row<'_>) -> rusqlite::Result<RawCapacity> {
    Ok(RawCapacity {
        stage_id: row.get(0)?,
        track_date: row.get(1)?,
        committed_minutes: row.get(2)?,
        available_minutes: row.get(3)?,
        queue_length_minutes: row.get(4)?,
        queue_ends_at: row.get(5)?,
        pending_jobs_count: row.get(6)?,
        active_jobs_count: row.get(7)?,
        calculated_at: row.get(8)?,
    })
}

type InstanceParams<'a> = (
    &'a str,
    &'a str,
    &'static str,
    &'a str,
    i64,
    Option<&'static str>,
    i64,
    &'static str,
    Option<String>,
    Option<String>,
    i64,
    i64,
    i64,
    Option<&'a str>,
    &'a str,
);

fn instance_params(instance: &StageInstance) -> InstanceParams<'_> {
    (
        instance.id.as_str(),
        instance.job_id.as_str(),
        instance.job_table.table_name(),
        instance.stage_id.as_str(),
        instance.stage_order as i64,
        instance.part_assignment.map(|p| p.as_str()),
        instance.estimated_duration_minutes,
        instance.status.as_str(),
        instance.scheduled_start.map(|t| ts_str(&t)),
        instance.scheduled_end.map(|t| ts_str(&t)),
        instance.split_sequence as i64,
        instance.total_splits as i64,
        instance.is_split as i64,
        instance.parent_split_id.as_deref(),
        instance.unique_stage_key.as_str(),
    )
}

fn ts_str(t: &DateTime<Utc>) -> String {
    t.to_rfc3339()
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("invalid timestamp: {}", s))?
        .with_timezone(&Utc))
}

fn date_str(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date: {}", s))
}

fn parse_time(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .with_context(|| format!("invalid time: {}", s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn jhb(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        chrono_tz::Africa::Johannesburg
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_job_round_trip() {
        let repo = SqliteSchedulerRepository::in_memory().unwrap();
        let mut job = ProductionJob::new(
            "job-1",
            "WO-1001",
            JobTable::BusinessCards,
            jhb(2025, 6, 1, 8, 0),
        );
        job.due_date = NaiveDate::from_ymd_opt(2025, 6, 20);
        job.is_expedited = true;
        repo.upsert_job(&job).unwrap();

        let loaded = repo.job("job-1").unwrap().unwrap();
        assert_eq!(loaded, job);
        assert!(repo.job("missing").unwrap().is_none());
    }

    #[test]
    fn test_instance_round_trip_with_split_metadata() {
        let repo = SqliteSchedulerRepository::in_memory().unwrap();
        let mut si = StageInstance::new("si-1", "job-1", JobTable::Posters, "stage-1", 2)
            .part(PartAssignment::Cover)
            .duration(240);
        si.scheduled_start = Some(jhb(2025, 6, 2, 8, 0));
        si.scheduled_end = Some(jhb(2025, 6, 2, 12, 0));
        si.is_split = true;
        si.total_splits = 2;
        repo.insert_stage_instance(&si).unwrap();

        let cont = si.continuation(2, 2, 90);
        repo.insert_stage_instance(&cont).unwrap();

        let instances = repo.stage_instances_for_job("job-1").unwrap();
        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0], si);
        assert_eq!(instances[1].parent_split_id.as_deref(), Some("si-1"));

        repo.delete_split_continuations("job-1").unwrap();
        assert_eq!(repo.stage_instances_for_job("job-1").unwrap().len(), 1);
    }

    #[test]
    fn test_slot_queries_and_reset() {
        let repo = SqliteSchedulerRepository::in_memory().unwrap();
        let monday = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let slot = StageTimeSlot::new(
            "stage-1",
            monday,
            jhb(2025, 6, 2, 8, 0),
            jhb(2025, 6, 2, 9, 0),
            "job-1",
            "si-1",
        );
        let id = repo.insert_time_slot(&slot).unwrap();
        assert!(id > 0);

        let on_day = repo.time_slots_for_stage_on("stage-1", monday).unwrap();
        assert_eq!(on_day.len(), 1);
        assert_eq!(on_day[0].slot_start, jhb(2025, 6, 2, 8, 0));
        assert_eq!(on_day[0].duration_minutes, 60);

        let record = StageCapacityRecord {
            stage_id: "stage-1".to_string(),
            date: monday,
            committed_minutes: 60,
            available_minutes: 450,
            queue_length_minutes: 60,
            queue_ends_at: jhb(2025, 6, 2, 9, 0),
            pending_jobs_count: 1,
            active_jobs_count: 0,
            calculated_at: jhb(2025, 6, 2, 9, 0),
        };
        repo.upsert_capacity_record(&record).unwrap();
        assert!(repo.capacity_record("stage-1", monday).unwrap().is_some());

        repo.reset_workload().unwrap();
        assert!(repo.time_slots_for_stage("stage-1").unwrap().is_empty());
        assert!(repo.capacity_record("stage-1", monday).unwrap().is_none());
    }

    #[test]
    fn test_calendar_configuration_round_trip() {
        let repo = SqliteSchedulerRepository::in_memory().unwrap();
        repo.upsert_shift(&ShiftSchedule {
            day_of_week: 1,
            shift_start: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            shift_end: NaiveTime::from_hms_opt(16, 30, 0).unwrap(),
            is_working_day: true,
            is_active: true,
        })
        .unwrap();
        repo.upsert_holiday(&PublicHoliday {
            date: NaiveDate::from_ymd_opt(2025, 6, 16).unwrap(),
            description: Some("Youth Day".to_string()),
            is_active: true,
        })
        .unwrap();
        repo.set_setting("work_start_hour", "7").unwrap();

        let shifts = repo.shift_schedules().unwrap();
        assert_eq!(shifts.len(), 1);
        assert_eq!(shifts[0].shift_end, NaiveTime::from_hms_opt(16, 30, 0).unwrap());

        let holidays = repo.public_holidays().unwrap();
        assert_eq!(holidays[0].description.as_deref(), Some("Youth Day"));

        let settings = repo.app_settings().unwrap();
        assert_eq!(settings.get("work_start_hour").map(String::as_str), Some("7"));
    }

    #[test]
    fn test_jobs_awaiting_proof_query() {
        let repo = SqliteSchedulerRepository::in_memory().unwrap();
        repo.upsert_stage(&ProductionStage::new("stage-proof", "Proofing"))
            .unwrap();
        repo.upsert_job(&ProductionJob::new(
            "job-1",
            "WO-1",
            JobTable::Flyers,
            jhb(2025, 6, 1, 8, 0),
        ))
        .unwrap();
        let si = StageInstance::new("si-1", "job-1", JobTable::Flyers, "stage-proof", 1);
        repo.insert_stage_instance(&si).unwrap();

        let waiting = repo.jobs_awaiting_proof().unwrap();
        assert_eq!(waiting.len(), 1);

        let mut approved = repo.job("job-1").unwrap().unwrap();
        approved.proof_approved_at = Some(jhb(2025, 6, 1, 9, 0));
        repo.upsert_job(&approved).unwrap();
        assert!(repo.jobs_awaiting_proof().unwrap().is_empty());
    }
}
