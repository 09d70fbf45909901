pub mod manual_reschedule;
pub mod recalculate_all;
pub mod reorder_shift;
pub mod schedule_job;
pub mod tentative_due_dates;

pub use manual_reschedule::ManualRescheduleStage;
pub use recalculate_all::{JobRecalcResult, RecalculateAll, RecalculateSummary};
pub use reorder_shift::{ReorderOutcome, ReorderRequest, ReorderShift, UpdatedStage};
pub use schedule_job::{PathEnds, ScheduleJob, SchedulingResult};
pub use tentative_due_dates::{RecalcTentativeDueDates, TentativeDueDate};
