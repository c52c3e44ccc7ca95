//! Shared data models for the gaze tracking engine.
//!
//! This crate provides Serde-serializable types for:
//! - Tracking priorities and conversation stages
//! - Control commands accepted by the tracking engine
//! - Gimbal poses and servo axes
//! - Face bounding boxes in frame pixel space
//! - Status snapshots and performance statistics

pub mod command;
pub mod conversation;
pub mod geometry;
pub mod gimbal;
pub mod priority;
pub mod search;
pub mod session;
pub mod status;

// Re-export common types
pub use command::{Command, CommandParseError};
pub use conversation::{ConversationStage, ConversationStageParseError};
pub use geometry::{BoundingBox, Point};
pub use gimbal::{GimbalPose, ServoAxis};
pub use priority::TrackingPriority;
pub use search::SearchPattern;
pub use session::SessionId;
pub use status::{StatusSnapshot, TargetSummary, TrackingStats};

/// Identity label used for faces the recognizer could not name.
pub const UNKNOWN_IDENTITY: &str = "unknown";
