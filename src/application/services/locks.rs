//! Scheduling lock registry module
//!
//! Concurrency control for the scheduler: a per-stage mutex held across
//! each capacity commit, and a process-wide mutex serializing batch
//! recomputes. Two calls that reach the same stage lock in order see each
//! other's commits in queue reads.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Process-wide lock registry shared by all scheduling entry points
pub struct StageLockRegistry {
    stages: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    recalculate: Mutex<()>,
}

impl StageLockRegistry {
    pub fn new() -> Self {
        Self {
            stages: Mutex::new(HashMap::new()),
            recalculate: Mutex::new(()),
        }
    }

    /// The mutex guarding commits against one stage's queue
    pub fn stage_lock(&self, stage_id: &str) -> Arc<Mutex<()>> {
        let mut stages = self.stages.lock().unwrap();
        stages
            .entry(stage_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Serializes batch recomputes; held for the whole run
    pub fn lock_recalculate(&self) -> MutexGuard<'_, ()> {
        self.recalculate.lock().unwrap()
    }
}

impl Default for StageLockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_stage_returns_same_lock() {
        let registry = StageLockRegistry::new();
        let a = registry.stage_lock("stage-1");
        let b = registry.stage_lock("stage-1");
        assert!(Arc::ptr_eq(&a, &b));

        let c = registry.stage_lock("stage-2");
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
