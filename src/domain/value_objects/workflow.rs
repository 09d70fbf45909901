//! Workflow value object module
//!
//! A workflow is the per-call view of one job's stage instances grouped
//! into cover, text, and convergence paths. It is rebuilt on every
//! scheduling call and never persisted.

use serde::{Deserialize, Serialize};

use crate::domain::entities::{StageInstance, StageStatus};
use crate::domain::value_objects::PartAssignment;

/// Which of the three workflow paths a stage belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PathKind {
    Cover,
    Text,
    Convergence,
}

impl PathKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cover => "cover",
            Self::Text => "text",
            Self::Convergence => "convergence",
        }
    }

    /// Classifies a part assignment into its path
    pub fn of(part: Option<PartAssignment>) -> Self {
        match part {
            Some(PartAssignment::Cover) => Self::Cover,
            Some(PartAssignment::Text) => Self::Text,
            Some(PartAssignment::Both) | None => Self::Convergence,
        }
    }
}

/// An ordered sequence of stage instances on one path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowPath {
    pub kind: PathKind,
    pub stages: Vec<StageInstance>,
}

impl WorkflowPath {
    pub fn new(kind: PathKind) -> Self {
        Self {
            kind,
            stages: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Total estimated minutes across the path
    pub fn total_minutes(&self) -> i64 {
        self.stages
            .iter()
            .map(|s| s.estimated_duration_minutes)
            .sum()
    }
}

/// One job's stage instances decomposed into the three paths
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub job_id: String,
    pub cover: WorkflowPath,
    pub text: WorkflowPath,
    pub convergence: WorkflowPath,
}

impl Workflow {
    /// Whether the given stage instance may start now
    ///
    /// A convergence stage may start only when every cover and text stage
    /// is completed; within a path, every earlier-ordered stage must be
    /// completed. Returns the blocking instance ids alongside the flag.
    pub fn can_stage_start(&self, instance_id: &str) -> (bool, Vec<String>) {
        let mut blocked_by = Vec::new();

        let Some((kind, target)) = self.find(instance_id) else {
            return (false, blocked_by);
        };

        if kind == PathKind::Convergence {
            for stage in self.cover.stages.iter().chain(self.text.stages.iter()) {
                if stage.status != StageStatus::Completed {
                    blocked_by.push(stage.id.clone());
                }
            }
        }

        let path = match kind {
            PathKind::Cover => &self.cover,
            PathKind::Text => &self.text,
            PathKind::Convergence => &self.convergence,
        };
        for stage in &path.stages {
            if stage.id == target.id {
                break;
            }
            if stage.status != StageStatus::Completed {
                blocked_by.push(stage.id.clone());
            }
        }

        (blocked_by.is_empty(), blocked_by)
    }

    fn find(&self, instance_id: &str) -> Option<(PathKind, &StageInstance)> {
        for path in [&self.cover, &self.text, &self.convergence] {
            if let Some(stage) = path.stages.iter().find(|s| s.id == instance_id) {
                return Some((path.kind, stage));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::JobTable;

    fn instance(id: &str, order: u32, part: Option<PartAssignment>) -> StageInstance {
        let mut si = StageInstance::new(id, "job-1", JobTable::Covers, format!("stage-{}", id), order);
        si.part_assignment = part;
        si
    }

    fn workflow(stages: Vec<StageInstance>) -> Workflow {
        let mut wf = Workflow {
            job_id: "job-1".to_string(),
            cover: WorkflowPath::new(PathKind::Cover),
            text: WorkflowPath::new(PathKind::Text),
            convergence: WorkflowPath::new(PathKind::Convergence),
        };
        for stage in stages {
            match PathKind::of(stage.part_assignment) {
                PathKind::Cover => wf.cover.stages.push(stage),
                PathKind::Text => wf.text.stages.push(stage),
                PathKind::Convergence => wf.convergence.stages.push(stage),
            }
        }
        wf
    }

    #[test]
    fn test_path_kind_classification() {
        assert_eq!(PathKind::of(Some(PartAssignment::Cover)), PathKind::Cover);
        assert_eq!(PathKind::of(Some(PartAssignment::Both)), PathKind::Convergence);
        assert_eq!(PathKind::of(None), PathKind::Convergence);
    }

    #[test]
    fn test_convergence_blocked_by_incomplete_paths() {
        let wf = workflow(vec![
            instance("c1", 1, Some(PartAssignment::Cover)),
            instance("t1", 1, Some(PartAssignment::Text)),
            instance("f1", 2, Some(PartAssignment::Both)),
        ]);

        let (can_start, blocked_by) = wf.can_stage_start("f1");
        assert!(!can_start);
        assert_eq!(blocked_by.len(), 2);
    }

    #[test]
    fn test_within_path_ordering() {
        let mut first = instance("c1", 1, Some(PartAssignment::Cover));
        first.status = StageStatus::Completed;
        let wf = workflow(vec![first, instance("c2", 2, Some(PartAssignment::Cover))]);

        let (can_start, blocked_by) = wf.can_stage_start("c2");
        assert!(can_start);
        assert!(blocked_by.is_empty());
    }

    #[test]
    fn test_unknown_instance_cannot_start() {
        let wf = workflow(vec![instance("c1", 1, Some(PartAssignment::Cover))]);
        let (can_start, _) = wf.can_stage_start("missing");
        assert!(!can_start);
    }
}
