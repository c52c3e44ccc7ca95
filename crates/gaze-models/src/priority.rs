//! Tracking priority levels.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Priority assigned to a detected face when choosing what to track.
///
/// Ordered from most to least important: `Highest` sorts first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum TrackingPriority {
    /// Identity is in the configured priority set (e.g. known conversation partners).
    Highest,
    /// Any other recognized identity.
    High,
    /// Detected but not recognized.
    Medium,
    /// No face visible; the gimbal is searching.
    SearchOnly,
}

impl TrackingPriority {
    /// All priority levels, highest first.
    pub const ALL: &'static [TrackingPriority] = &[
        TrackingPriority::Highest,
        TrackingPriority::High,
        TrackingPriority::Medium,
        TrackingPriority::SearchOnly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrackingPriority::Highest => "highest",
            TrackingPriority::High => "high",
            TrackingPriority::Medium => "medium",
            TrackingPriority::SearchOnly => "search_only",
        }
    }

    /// Ranking weight used by target selection (larger wins).
    pub fn weight(&self) -> u8 {
        match self {
            TrackingPriority::Highest => 4,
            TrackingPriority::High => 3,
            TrackingPriority::Medium => 2,
            TrackingPriority::SearchOnly => 0,
        }
    }
}

impl fmt::Display for TrackingPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
