use serde::{Deserialize, Serialize};

use super::{EntryId, RatedEntry};

/// Result of a pairwise comparison between entry A and entry B
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Outcome {
    #[serde(rename = "a", alias = "a_wins")]
    AWins,
    #[serde(rename = "b", alias = "b_wins")]
    BWins,
    #[serde(rename = "tie")]
    Tie,
}

impl Outcome {
    /// Actual score credited to entry A
    pub fn score_a(&self) -> f64 {
        match self {
            Outcome::AWins => 1.0,
            Outcome::BWins => 0.0,
            Outcome::Tie => 0.5,
        }
    }
}

/// Both sides of a comparison after ratings and ranks have been updated
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonResult {
    pub entry_a: RatedEntry,
    pub entry_b: RatedEntry,
}

/// Rank position to persist for one entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RankAssignment {
    pub id: EntryId,
    pub rank: i32,
}
