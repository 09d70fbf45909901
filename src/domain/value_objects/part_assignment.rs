//! Part assignment value object module
//!
//! Print jobs with a separate cover (e.g. perfect-bound books) run two
//! parallel workflow paths that converge for finishing. The part
//! assignment records which path a stage instance belongs to.

use serde::{Deserialize, Serialize};

/// Which workflow part a stage instance works on
///
/// Instances with no assignment at all are convergence stages, the same
/// as `Both`: they depend on cover and text being complete.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PartAssignment {
    Cover,
    Text,
    Both,
}

impl PartAssignment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cover => "cover",
            Self::Text => "text",
            Self::Both => "both",
        }
    }

    /// Parses a column value; anything unrecognized reads as `None`,
    /// which routes the instance to the convergence path
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "cover" => Some(Self::Cover),
            "text" => Some(Self::Text),
            "both" => Some(Self::Both),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip() {
        assert_eq!(PartAssignment::parse("cover"), Some(PartAssignment::Cover));
        assert_eq!(PartAssignment::parse("text"), Some(PartAssignment::Text));
        assert_eq!(PartAssignment::parse("both"), Some(PartAssignment::Both));
        assert_eq!(PartAssignment::parse(""), None);
        assert_eq!(PartAssignment::parse("unknown"), None);
    }
}
