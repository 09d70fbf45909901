//! Production stage entity module
//!
//! A production stage is a physical or logical station on the shop floor
//! (prepress, a printing press, lamination, finishing, batch allocation)
//! with its own daily queue and capacity.

use serde::{Deserialize, Serialize};

/// A production stage definition
///
/// Stages are configuration data: they are loaded at the start of a
/// scheduling run and never mutated by the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductionStage {
    /// Unique stage identifier
    pub id: String,
    /// Human-readable stage name (e.g. "HP 12000 printing")
    pub name: String,
    /// Throughput in sheets per hour, when the stage is speed-rated
    pub running_speed_per_hour: Option<f64>,
    /// Fixed setup time charged before running, in minutes
    pub make_ready_minutes: Option<i64>,
    /// Group this stage belongs to (presses, finishing, ...)
    pub stage_group_id: Option<String>,
    /// Whether the stage can run cover and text work in parallel
    pub parallel_enabled: bool,
}

impl ProductionStage {
    /// Creates a stage with only the required fields set
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            running_speed_per_hour: None,
            make_ready_minutes: None,
            stage_group_id: None,
            parallel_enabled: false,
        }
    }

    /// Whether this stage is a proofing stage
    ///
    /// Proof stages gate tentative-due-date estimation: jobs whose proof
    /// has not been approved yet only receive a projected completion date.
    pub fn is_proof_stage(&self) -> bool {
        self.name.to_lowercase().contains("proof")
    }
}
