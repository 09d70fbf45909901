pub mod calendar;
pub mod capacity;
pub mod job;
pub mod stage;
pub mod stage_instance;

pub use calendar::{PublicHoliday, ShiftSchedule, WorkingHoursConfig};
pub use capacity::{StageCapacityRecord, StageTimeSlot};
pub use job::ProductionJob;
pub use stage::ProductionStage;
pub use stage_instance::{StageInstance, StageStatus, DEFAULT_STAGE_DURATION_MINUTES};
