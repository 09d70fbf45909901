pub mod job_table;
pub mod part_assignment;
pub mod split;
pub mod workflow;

pub use job_table::JobTable;
pub use part_assignment::PartAssignment;
pub use split::SplitPart;
pub use workflow::{PathKind, Workflow, WorkflowPath};
