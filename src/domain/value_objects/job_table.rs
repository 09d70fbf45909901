//! Job table value object module
//!
//! Jobs are partitioned by product line. The scheduler only needs the
//! partition to address a job's storage; the mapping is a pure function.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Product-line partition a job lives in
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobTable {
    BusinessCards,
    Flyers,
    Postcards,
    Posters,
    Sleeves,
    Stickers,
    Covers,
    Boxes,
}

impl JobTable {
    /// Storage partition name for this product line
    pub fn table_name(&self) -> &'static str {
        match self {
            Self::BusinessCards => "business_cards",
            Self::Flyers => "flyers",
            Self::Postcards => "postcards",
            Self::Posters => "posters",
            Self::Sleeves => "sleeves",
            Self::Stickers => "stickers",
            Self::Covers => "covers",
            Self::Boxes => "boxes",
        }
    }

    /// Parses a partition name, defaulting to `Flyers` for legacy rows
    /// that predate product-line tagging
    pub fn parse(value: &str) -> Self {
        match value {
            "business_cards" => Self::BusinessCards,
            "postcards" => Self::Postcards,
            "posters" => Self::Posters,
            "sleeves" => Self::Sleeves,
            "stickers" => Self::Stickers,
            "covers" => Self::Covers,
            "boxes" => Self::Boxes,
            _ => Self::Flyers,
        }
    }

    pub fn all() -> [JobTable; 8] {
        [
            Self::BusinessCards,
            Self::Flyers,
            Self::Postcards,
            Self::Posters,
            Self::Sleeves,
            Self::Stickers,
            Self::Covers,
            Self::Boxes,
        ]
    }
}

impl fmt::Display for JobTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name_round_trip() {
        for table in JobTable::all() {
            assert_eq!(JobTable::parse(table.table_name()), table);
        }
    }

    #[test]
    fn test_unknown_partition_defaults() {
        assert_eq!(JobTable::parse("not-a-table"), JobTable::Flyers);
    }
}
