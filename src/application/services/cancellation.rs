//! Cancellation token module
//!
//! Cooperative cancellation for long scheduling calls. The flag is
//! observed between stages and between batch jobs; each stage commit is
//! atomic at the persistence layer, so cancelling never leaves a
//! half-committed stage behind.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::domain::error::{SchedulerResult, SchedulingError};

/// Shared cancellation flag
#[derive(Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation; observed at the next stage boundary
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Errors with `Cancelled` once the flag is set
    pub fn check(&self) -> SchedulerResult<()> {
        if self.is_cancelled() {
            Err(SchedulingError::Cancelled)
        } else {
            Ok(())
        }
    }
}
