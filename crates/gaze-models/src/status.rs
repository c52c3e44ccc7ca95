//! Status snapshots exposed by the tracking engine.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{ConversationStage, GimbalPose, Point, SearchPattern, SessionId, TrackingPriority};

/// Running performance counters for the tracking loop.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TrackingStats {
    /// Loop iterations completed
    pub iterations: u64,
    /// Frames that could not be read (error or timeout)
    pub frame_failures: u64,
    /// Servo writes that failed (error or timeout)
    pub servo_failures: u64,
    /// Searches started after losing every face
    pub searches_started: u64,
    /// Mean iteration work time in milliseconds
    pub avg_loop_ms: f64,
    /// Most recent iteration work time in milliseconds
    pub last_loop_ms: f64,
    /// Manual commands handled
    pub commands_handled: u64,
    /// Latency of the most recent manual command in milliseconds
    pub last_command_ms: f64,
}

impl TrackingStats {
    /// Record one loop iteration that took `work_ms` before pacing.
    pub fn record_iteration(&mut self, work_ms: f64) {
        self.iterations += 1;
        self.last_loop_ms = work_ms;
        self.avg_loop_ms += (work_ms - self.avg_loop_ms) / self.iterations as f64;
    }

    /// Record a handled manual command.
    pub fn record_command(&mut self, latency_ms: f64) {
        self.commands_handled += 1;
        self.last_command_ms = latency_ms;
    }
}

/// The followed face as last seen by the predictor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TargetSummary {
    pub identity: String,
    pub priority: TrackingPriority,
    /// Predicted aim point in frame pixels
    pub aim_point: Point,
    /// Estimated motion in pixels per second
    pub velocity: Point,
    /// Milliseconds since the target was last detected
    pub last_seen_ms: u64,
}

/// Point-in-time view of the tracking engine.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StatusSnapshot {
    pub is_tracking: bool,
    pub conversation_active: bool,
    pub stage: ConversationStage,
    /// Conversation partner requested by the conversation system
    pub conversation_target: Option<String>,
    /// Identity of the face currently tracked
    pub current_target: Option<String>,
    pub target_priority: Option<TrackingPriority>,
    pub target: Option<TargetSummary>,
    pub search_active: bool,
    pub search_pattern: Option<SearchPattern>,
    pub pose: GimbalPose,
    pub session_id: Option<SessionId>,
    pub priority_identities: Vec<String>,
    pub stats: TrackingStats,
    pub generated_at: DateTime<Utc>,
}

impl StatusSnapshot {
    #[inline]
    pub fn pan(&self) -> f64 {
        self.pose.pan
    }

    #[inline]
    pub fn tilt(&self) -> f64 {
        self.pose.tilt
    }

    /// One-sentence description of what the gimbal is doing.
    pub fn describe(&self) -> String {
        if !self.is_tracking {
            return "I'm not tracking anyone right now, I'm looking straight ahead.".to_string();
        }
        if self.search_active {
            return "I'm searching for faces by looking around slowly.".to_string();
        }
        match (&self.current_target, self.conversation_active) {
            (Some(target), true) => {
                format!("I'm in a conversation and looking at {}.", title_case(target))
            }
            (Some(target), false) if target != crate::UNKNOWN_IDENTITY => {
                format!("I'm looking at {}.", title_case(target))
            }
            (Some(_), false) => "I'm looking at someone I don't recognize yet.".to_string(),
            (None, _) => "I'm tracking, but I don't see anyone at the moment.".to_string(),
        }
    }
}

fn title_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
