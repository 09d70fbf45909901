//! CLI Commands module
//!
//! Command implementations for the CLI interface: database setup and
//! seeding, single-job scheduling, batch recompute with progress
//! reporting, and tentative due date recalculation.

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tracing::info;

use crate::application::services::StageLockRegistry;
use crate::application::use_cases::{
    RecalcTentativeDueDates, RecalculateAll, ScheduleJob, SchedulingResult,
};
use crate::domain::entities::{PublicHoliday, ShiftSchedule};
use crate::infrastructure::repositories::SqliteSchedulerRepository;

/// Command for creating (and optionally seeding) the scheduler database
pub struct InitDbCommand;

impl InitDbCommand {
    pub fn execute<P: AsRef<Path>>(database: P, seed: bool) -> Result<()> {
        info!("Creating scheduler database: {:?}", database.as_ref());
        let repo = SqliteSchedulerRepository::new(&database)
            .context("Failed to create scheduler database")?;

        if seed {
            Self::seed_calendar(&repo)?;
            println!("✓ Seeded demo calendar (Mon-Fri 08:00-16:30, sample holidays)");
        }

        println!("✓ Database ready at {:?}", database.as_ref());
        Ok(())
    }

    /// Seeds a Mon-Fri shift table, a sample of South African public
    /// holidays, and the default working-hours settings
    fn seed_calendar(repo: &SqliteSchedulerRepository) -> Result<()> {
        let start = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        let end = NaiveTime::from_hms_opt(16, 30, 0).unwrap();
        for day in 1..=5u8 {
            repo.upsert_shift(&ShiftSchedule {
                day_of_week: day,
                shift_start: start,
                shift_end: end,
                is_working_day: true,
                is_active: true,
            })?;
        }

        let holidays = [
            (2025, 1, 1, "New Year's Day"),
            (2025, 3, 21, "Human Rights Day"),
            (2025, 4, 28, "Freedom Day (observed)"),
            (2025, 5, 1, "Workers' Day"),
            (2025, 6, 16, "Youth Day"),
            (2025, 8, 9, "National Women's Day"),
            (2025, 9, 24, "Heritage Day"),
            (2025, 12, 16, "Day of Reconciliation"),
            (2025, 12, 25, "Christmas Day"),
            (2025, 12, 26, "Day of Goodwill"),
        ];
        for (y, m, d, name) in holidays {
            if let Some(date) = NaiveDate::from_ymd_opt(y, m, d) {
                repo.upsert_holiday(&PublicHoliday {
                    date,
                    description: Some(name.to_string()),
                    is_active: true,
                })?;
            }
        }

        repo.set_setting("work_start_hour", "8")?;
        repo.set_setting("work_end_hour", "16")?;
        repo.set_setting("work_end_minute", "30")?;
        repo.set_setting("timezone", "Africa/Johannesburg")?;
        repo.set_setting("sla_buffer_working_days", "1")?;
        Ok(())
    }
}

/// Command for scheduling one job and printing its completion summary
pub struct ScheduleCommand;

impl ScheduleCommand {
    pub fn execute<P: AsRef<Path>>(database: P, job_id: &str) -> Result<()> {
        let repo = SqliteSchedulerRepository::new(&database)
            .context("Failed to open scheduler database")?;
        let locks = StageLockRegistry::new();

        info!("Scheduling job {}", job_id);
        let result = ScheduleJob::new(&repo, &locks)
            .execute(job_id, Utc::now())
            .with_context(|| format!("Failed to schedule job {}", job_id))?;

        Self::print_summary(&result);
        Ok(())
    }

    fn print_summary(result: &SchedulingResult) {
        println!("\n{}", "=".repeat(80));
        println!("📋 SCHEDULING RESULT — {}", result.job_id);
        println!("{}", "=".repeat(80));
        println!("  • Success:            {}", result.success);
        println!("  • Total minutes:      {}", result.total_minutes);
        if let Some(completion) = result.scheduled_completion_date {
            println!("  • Completion:         {}", completion);
        }
        if let Some(cover_end) = result.path_results.cover_end {
            println!("  • Cover path ends:    {}", cover_end);
        }
        if let Some(text_end) = result.path_results.text_end {
            println!("  • Text path ends:     {}", text_end);
        }
        if let Some(conv_end) = result.path_results.convergence_end {
            println!("  • Convergence ends:   {}", conv_end);
        }
        if !result.errors.is_empty() {
            println!("  ⚠️  Stage errors:");
            for error in &result.errors {
                println!("     - {}", error);
            }
        }
        println!("{}", "=".repeat(80));
    }
}

/// Command for the batch recompute with a progress bar
pub struct RecalculateCommand;

impl RecalculateCommand {
    pub fn execute<P: AsRef<Path>>(database: P, job_ids: &[String]) -> Result<()> {
        let repo = SqliteSchedulerRepository::new(&database)
            .context("Failed to open scheduler database")?;
        let locks = StageLockRegistry::new();

        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("█▓▒░ "),
        );

        let pb_clone = pb.clone();
        let recalculate = RecalculateAll::new(&repo, &locks).with_progress_callback(
            move |current, total, job_id| {
                pb_clone.set_length(total as u64);
                pb_clone.set_position(current as u64);
                pb_clone.set_message(format!("job {}", job_id));
            },
        );

        let ids = if job_ids.is_empty() {
            None
        } else {
            Some(job_ids)
        };
        let summary = recalculate
            .execute(ids.map(|v| &v[..]), Utc::now())
            .context("Batch recompute failed")?;
        pb.finish_with_message("done");

        println!("\n{}", "=".repeat(80));
        println!("🔄 BATCH RECOMPUTE COMPLETED");
        println!("{}", "=".repeat(80));
        println!("  • Jobs scheduled:     {}", summary.successful);
        println!("  • Jobs failed:        {}", summary.failed);
        for result in summary.results.iter().filter(|r| !r.success) {
            println!(
                "  ⚠️  {}: {}",
                result.job_id,
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
        println!("{}", "=".repeat(80));
        Ok(())
    }
}

/// Command for recomputing tentative due dates
pub struct TentativeDueDatesCommand;

impl TentativeDueDatesCommand {
    pub fn execute<P: AsRef<Path>>(database: P) -> Result<()> {
        let repo = SqliteSchedulerRepository::new(&database)
            .context("Failed to open scheduler database")?;

        let results = RecalcTentativeDueDates::new(&repo)
            .execute(Utc::now())
            .context("Tentative due date recalculation failed")?;

        println!("\n{}", "=".repeat(80));
        println!("🗓  TENTATIVE DUE DATES — {} job(s)", results.len());
        println!("{}", "=".repeat(80));
        for result in &results {
            println!("  • {:<24} {}", result.job_id, result.tentative_due_date);
        }
        println!("{}", "=".repeat(80));
        Ok(())
    }
}
