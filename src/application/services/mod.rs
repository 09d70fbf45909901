pub mod cancellation;
pub mod capacity_tracker;
pub mod duration_splitter;
pub mod locks;
pub mod path_processor;
pub mod workflow_analyzer;
pub mod working_calendar;

pub use cancellation::CancellationToken;
pub use capacity_tracker::CapacityTracker;
pub use duration_splitter::DurationSplitter;
pub use locks::StageLockRegistry;
pub use path_processor::{validate_convergence_timing, PathProcessor, PathResult, StageCompletion};
pub use workflow_analyzer::WorkflowAnalyzer;
pub use working_calendar::WorkingCalendar;
