//! Search patterns used when no face is visible.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Motion pattern of an active search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SearchPattern {
    /// Sweep the pan axis back and forth around the rest position.
    #[default]
    SweepHorizontal,
    /// Briefly tilt up, then resume sweeping.
    LookUp,
}

impl SearchPattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchPattern::SweepHorizontal => "sweep_horizontal",
            SearchPattern::LookUp => "look_up",
        }
    }
}

impl fmt::Display for SearchPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
