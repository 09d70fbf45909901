//! Duration splitter service module
//!
//! Breaks a stage duration into day-sized parts: each part fits inside
//! one working window, and consecutive parts jump from a day's end to the
//! next working day's start.

use chrono::{DateTime, Duration, Utc};

use crate::application::services::WorkingCalendar;
use crate::domain::error::SchedulerResult;
use crate::domain::value_objects::SplitPart;

/// Splits durations across working days
pub struct DurationSplitter<'a> {
    calendar: &'a WorkingCalendar,
}

impl<'a> DurationSplitter<'a> {
    pub fn new(calendar: &'a WorkingCalendar) -> Self {
        Self { calendar }
    }

    /// Whether a duration starting at `start` spills past the end of its
    /// working day
    pub fn needs_splitting(&self, start: DateTime<Utc>, minutes: i64) -> bool {
        !self.calendar.fits_in_working_day(start, minutes)
    }

    /// Cuts `total_minutes` of work into ordered day-sized parts
    ///
    /// The first part's start is the input start snapped forward into the
    /// working window. The parts' minutes sum to the input, every part
    /// lies inside one working window, and the part count is the minimum
    /// number of working days that can hold the duration from that start.
    pub fn split(
        &self,
        start: DateTime<Utc>,
        total_minutes: i64,
    ) -> SchedulerResult<Vec<SplitPart>> {
        let mut cursor = self.calendar.snap_forward(start)?;

        if total_minutes <= 0 {
            return Ok(vec![SplitPart {
                sequence: 1,
                total_parts: 1,
                start: cursor,
                end: cursor,
                minutes: 0,
                is_partial: false,
            }]);
        }

        let mut remaining = total_minutes;
        let mut sequence = 1;
        let mut parts = Vec::new();

        while remaining > 0 {
            let available = self.calendar.remaining_working_minutes(cursor);
            if available == 0 {
                // Sub-minute sliver left in the day; move to the next one
                let next = self.calendar.next_working_day(self.calendar.local_date(cursor))?;
                cursor = self.calendar.working_day_start(next);
                continue;
            }

            let take = remaining.min(available);
            let end = cursor + Duration::minutes(take);
            parts.push(SplitPart {
                sequence,
                total_parts: 0,
                start: cursor,
                end,
                minutes: take,
                is_partial: take < remaining,
            });

            remaining -= take;
            sequence += 1;
            if remaining > 0 {
                let next = self.calendar.next_working_day(self.calendar.local_date(cursor))?;
                cursor = self.calendar.working_day_start(next);
            }
        }

        let total_parts = parts.len() as u32;
        for part in &mut parts {
            part.total_parts = total_parts;
        }
        Ok(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::WorkingHoursConfig;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn calendar() -> WorkingCalendar {
        WorkingCalendar::new(WorkingHoursConfig::default(), Vec::new(), Vec::new())
    }

    fn jhb(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        chrono_tz::Africa::Johannesburg
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_fitting_duration_yields_single_part() {
        let cal = calendar();
        let splitter = DurationSplitter::new(&cal);
        let parts = splitter.split(jhb(2025, 6, 2, 9, 0), 60).unwrap();

        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].start, jhb(2025, 6, 2, 9, 0));
        assert_eq!(parts[0].end, jhb(2025, 6, 2, 10, 0));
        assert!(!parts[0].is_partial);
        assert_eq!(parts[0].total_parts, 1);
    }

    #[test]
    fn test_overflow_splits_into_two_days() {
        // 180 minutes starting Monday 15:00: 90 today, 90 tomorrow
        let cal = calendar();
        let splitter = DurationSplitter::new(&cal);
        let parts = splitter.split(jhb(2025, 6, 2, 15, 0), 180).unwrap();

        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].start, jhb(2025, 6, 2, 15, 0));
        assert_eq!(parts[0].end, jhb(2025, 6, 2, 16, 30));
        assert_eq!(parts[0].minutes, 90);
        assert!(parts[0].is_partial);

        assert_eq!(parts[1].start, jhb(2025, 6, 3, 8, 0));
        assert_eq!(parts[1].end, jhb(2025, 6, 3, 9, 30));
        assert_eq!(parts[1].minutes, 90);
        assert!(!parts[1].is_partial);

        assert_eq!(parts.iter().map(|p| p.minutes).sum::<i64>(), 180);
    }

    #[test]
    fn test_weekend_jump() {
        // Friday 16:00, 120 minutes: 30 on Friday, 90 on Monday
        let cal = calendar();
        let splitter = DurationSplitter::new(&cal);
        let parts = splitter.split(jhb(2025, 6, 6, 16, 0), 120).unwrap();

        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].end, jhb(2025, 6, 6, 16, 30));
        assert_eq!(parts[0].minutes, 30);
        assert_eq!(parts[1].start, jhb(2025, 6, 9, 8, 0));
        assert_eq!(parts[1].end, jhb(2025, 6, 9, 9, 30));
    }

    #[test]
    fn test_start_on_weekend_snaps_to_monday() {
        let cal = calendar();
        let splitter = DurationSplitter::new(&cal);
        let parts = splitter.split(jhb(2025, 6, 7, 12, 0), 60).unwrap();

        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].start, jhb(2025, 6, 9, 8, 0));
    }

    #[test]
    fn test_needs_splitting_matches_fit() {
        let cal = calendar();
        let splitter = DurationSplitter::new(&cal);
        assert!(!splitter.needs_splitting(jhb(2025, 6, 2, 15, 0), 90));
        assert!(splitter.needs_splitting(jhb(2025, 6, 2, 15, 0), 91));
        // Non-working day has zero remaining minutes
        assert!(splitter.needs_splitting(jhb(2025, 6, 7, 9, 0), 1));
    }

    #[test]
    fn test_zero_duration_yields_empty_part_at_snap() {
        let cal = calendar();
        let splitter = DurationSplitter::new(&cal);
        let parts = splitter.split(jhb(2025, 6, 7, 12, 0), 0).unwrap();

        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].minutes, 0);
        assert_eq!(parts[0].start, parts[0].end);
        assert_eq!(parts[0].start, jhb(2025, 6, 9, 8, 0));
    }

    #[test]
    fn test_multi_week_duration() {
        // 2550 minutes = 5 full days from a Monday morning
        let cal = calendar();
        let splitter = DurationSplitter::new(&cal);
        let parts = splitter.split(jhb(2025, 6, 2, 8, 0), 2550).unwrap();

        assert_eq!(parts.len(), 5);
        assert!(parts.iter().all(|p| p.minutes == 510));
        assert_eq!(parts[4].end, jhb(2025, 6, 6, 16, 30));
    }

    proptest! {
        #[test]
        fn prop_split_minutes_sum_to_input(
            minutes in 1i64..4000,
            start_hour in 0u32..24,
            start_min in 0u32..60,
            day in 1u32..28,
        ) {
            let cal = calendar();
            let splitter = DurationSplitter::new(&cal);
            let start = jhb(2025, 6, day, start_hour, start_min);
            let parts = splitter.split(start, minutes).unwrap();

            prop_assert_eq!(parts.iter().map(|p| p.minutes).sum::<i64>(), minutes);
            // Every part inside one working window
            for part in &parts {
                let date = cal.local_date(part.start);
                prop_assert!(cal.is_working_day(date));
                prop_assert!(part.start >= cal.working_day_start(date));
                prop_assert!(part.end <= cal.working_day_end(date));
                prop_assert_eq!(cal.local_date(part.end.max(part.start)), date);
            }
            // Parts are ordered and non-overlapping
            for pair in parts.windows(2) {
                prop_assert!(pair[0].end <= pair[1].start);
            }
            // Minimum day count: all but the last part fill their window
            let daily = cal.daily_working_minutes();
            for (i, part) in parts.iter().enumerate() {
                if i + 1 < parts.len() {
                    let date = cal.local_date(part.start);
                    prop_assert_eq!(part.end, cal.working_day_end(date));
                }
                prop_assert!(part.minutes <= daily);
            }
        }
    }
}
