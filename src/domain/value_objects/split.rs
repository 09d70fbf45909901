//! Split part value object module

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One day-sized piece of a split stage duration
///
/// Produced by the duration splitter; each part lies entirely inside one
/// working window and consecutive parts are separated by the jump from a
/// day's end to the next working day's start.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SplitPart {
    /// 1-based position in the chain
    pub sequence: u32,
    /// Chain length, backfilled once the walk completes
    pub total_parts: u32,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub minutes: i64,
    /// Whether work remained after this part was cut
    pub is_partial: bool,
}
