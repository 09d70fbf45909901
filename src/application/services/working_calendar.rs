//! Working calendar service module
//!
//! The calendar answers every working-time question the scheduler asks:
//! whether a day is workable, where its working window starts and ends,
//! how many working minutes remain after a given instant, and where the
//! next working day is.
//!
//! All public instants are UTC. Wall-clock comparisons happen in the
//! configured IANA timezone so the window survives DST transitions.

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::collections::{HashMap, HashSet};
use tracing::warn;

use crate::domain::entities::{PublicHoliday, ShiftSchedule, WorkingHoursConfig};
use crate::domain::error::{SchedulerResult, SchedulingError};
use crate::domain::repositories::SchedulerRepository;

/// Days scanned before `next_working_day` gives up; a full week without
/// a single working day means the shift schedule is misconfigured
const WORKING_DAY_SCAN_SPAN: u32 = 7;

/// Working-day and working-hours oracle for one scheduling call
///
/// Loaded once at call entry and read-only afterwards.
pub struct WorkingCalendar {
    config: WorkingHoursConfig,
    tz: Tz,
    shifts: HashMap<u8, ShiftSchedule>,
    holidays: HashSet<NaiveDate>,
}

impl WorkingCalendar {
    /// Builds a calendar from already-loaded configuration rows
    ///
    /// An unparseable timezone name falls back to the default zone with a
    /// warning rather than failing the call.
    pub fn new(
        config: WorkingHoursConfig,
        shifts: Vec<ShiftSchedule>,
        holidays: Vec<PublicHoliday>,
    ) -> Self {
        let tz = match config.timezone.parse::<Tz>() {
            Ok(tz) => tz,
            Err(_) => {
                warn!(
                    timezone = %config.timezone,
                    "unrecognized timezone, falling back to Africa/Johannesburg"
                );
                chrono_tz::Africa::Johannesburg
            }
        };
        let shifts = shifts
            .into_iter()
            .filter(|s| s.is_active)
            .map(|s| (s.day_of_week, s))
            .collect();
        let holidays = holidays
            .into_iter()
            .filter(|h| h.is_active)
            .map(|h| h.date)
            .collect();
        Self {
            config,
            tz,
            shifts,
            holidays,
        }
    }

    /// Loads calendar configuration through the persistence adapter
    ///
    /// Read failures recover with defaults (08:00–16:30, Mon–Fri, no
    /// holidays) so a broken settings table degrades the schedule rather
    /// than blocking it.
    pub fn load(repo: &dyn SchedulerRepository) -> Self {
        let settings = match repo.app_settings() {
            Ok(settings) => settings,
            Err(e) => {
                let err = SchedulingError::ConfigUnavailable {
                    reason: e.to_string(),
                };
                warn!(error = %err, "using default working hours");
                HashMap::new()
            }
        };
        let config = WorkingHoursConfig::from_settings(&settings);

        let shifts = repo.shift_schedules().unwrap_or_else(|e| {
            warn!(error = %e, "shift schedule unavailable, assuming Mon-Fri");
            Vec::new()
        });
        let holidays = repo.public_holidays().unwrap_or_else(|e| {
            warn!(error = %e, "holiday table unavailable, assuming none");
            Vec::new()
        });

        Self::new(config, shifts, holidays)
    }

    pub fn config(&self) -> &WorkingHoursConfig {
        &self.config
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Length of the working window in minutes
    pub fn daily_working_minutes(&self) -> i64 {
        self.config.daily_working_minutes()
    }

    /// The calendar day an instant falls on, in the configured zone
    pub fn local_date(&self, t: DateTime<Utc>) -> NaiveDate {
        t.with_timezone(&self.tz).date_naive()
    }

    /// Whether the date is a working day
    ///
    /// Weekends are never working days; an active holiday or a shift row
    /// marked non-working excludes the day; a weekday with no shift row
    /// counts as working.
    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        let weekday = date.weekday().num_days_from_sunday() as u8;
        if weekday == 0 || weekday == 6 {
            return false;
        }
        if self.holidays.contains(&date) {
            return false;
        }
        match self.shifts.get(&weekday) {
            Some(shift) => shift.is_working_day,
            None => true,
        }
    }

    /// The smallest working day strictly after `from`
    pub fn next_working_day(&self, from: NaiveDate) -> SchedulerResult<NaiveDate> {
        for offset in 1..=WORKING_DAY_SCAN_SPAN {
            if let Some(candidate) = from.checked_add_days(Days::new(offset as u64)) {
                if self.is_working_day(candidate) {
                    return Ok(candidate);
                }
            }
        }
        Err(SchedulingError::NoWorkingDayFound {
            after: from,
            span_days: WORKING_DAY_SCAN_SPAN,
        })
    }

    /// Start of the working window on a date
    pub fn working_day_start(&self, date: NaiveDate) -> DateTime<Utc> {
        self.instant_at(date, self.wall_time(self.config.work_start_hour, 0))
    }

    /// End of the working window on a date
    pub fn working_day_end(&self, date: NaiveDate) -> DateTime<Utc> {
        self.instant_at(
            date,
            self.wall_time(self.config.work_end_hour, self.config.work_end_minute),
        )
    }

    fn wall_time(&self, hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
    }

    /// Whole working minutes from `t` to the end of its day's window
    ///
    /// Zero on non-working days and after the window closes.
    pub fn remaining_working_minutes(&self, t: DateTime<Utc>) -> i64 {
        let date = self.local_date(t);
        if !self.is_working_day(date) {
            return 0;
        }
        let end = self.working_day_end(date);
        if t >= end {
            return 0;
        }
        let start = self.working_day_start(date).max(t);
        (end - start).num_minutes()
    }

    /// Whether `minutes` of work fit between `t` and its day's end
    pub fn fits_in_working_day(&self, t: DateTime<Utc>, minutes: i64) -> bool {
        self.remaining_working_minutes(t) >= minutes
    }

    /// Moves an instant forward into the nearest working window
    ///
    /// Instants on non-working days or at/after a window's end land on
    /// the next working day's start; instants before a window's start
    /// land on that start; instants inside a window pass through.
    pub fn snap_forward(&self, t: DateTime<Utc>) -> SchedulerResult<DateTime<Utc>> {
        let mut cursor = t;
        loop {
            let date = self.local_date(cursor);
            if self.is_working_day(date) {
                let start = self.working_day_start(date);
                if cursor < start {
                    return Ok(start);
                }
                if cursor < self.working_day_end(date) {
                    return Ok(cursor);
                }
            }
            cursor = self.working_day_start(self.next_working_day(date)?);
        }
    }

    /// Resolves an arbitrary local wall-clock time on a date to UTC
    ///
    /// Ambiguous times (fall-back) take the earlier offset; nonexistent
    /// times (spring-forward gap) shift one hour later.
    pub fn instant_at(&self, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
        let naive = date.and_time(time);
        match self.tz.from_local_datetime(&naive).earliest() {
            Some(dt) => dt.with_timezone(&Utc),
            None => self
                .tz
                .from_local_datetime(&(naive + chrono::Duration::hours(1)))
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|| Utc.from_utc_datetime(&naive)),
        }
    }
}
