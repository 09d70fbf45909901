//! Workflow analyzer service module
//!
//! Pure transformation from a job's persisted stage instances to the
//! three-path workflow view (cover, text, convergence) the processors
//! schedule against.

use crate::domain::entities::StageInstance;
use crate::domain::error::{SchedulerResult, SchedulingError};
use crate::domain::value_objects::{PathKind, Workflow, WorkflowPath};

/// Groups a job's stage instances into workflow paths
pub struct WorkflowAnalyzer;

impl WorkflowAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Builds the workflow for a job from its stage instances
    ///
    /// Instances are expected in `(stage_order, split_sequence)` order,
    /// which the repository guarantees. A job with no instances has no
    /// workflow to schedule.
    pub fn analyze(
        &self,
        job_id: &str,
        instances: Vec<StageInstance>,
    ) -> SchedulerResult<Workflow> {
        if instances.is_empty() {
            return Err(SchedulingError::WorkflowNotFound {
                job_id: job_id.to_string(),
            });
        }

        let mut workflow = Workflow {
            job_id: job_id.to_string(),
            cover: WorkflowPath::new(PathKind::Cover),
            text: WorkflowPath::new(PathKind::Text),
            convergence: WorkflowPath::new(PathKind::Convergence),
        };

        for instance in instances {
            match PathKind::of(instance.part_assignment) {
                PathKind::Cover => workflow.cover.stages.push(instance),
                PathKind::Text => workflow.text.stages.push(instance),
                PathKind::Convergence => workflow.convergence.stages.push(instance),
            }
        }

        Ok(workflow)
    }
}

impl Default for WorkflowAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
