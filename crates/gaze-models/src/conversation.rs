//! Conversation stage signalled by the external conversation system.
//!
//! The stage only tunes tracking responsiveness; it never changes which
//! face is selected.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Stage of the ongoing conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStage {
    #[default]
    Idle,
    /// Waiting for the partner to speak.
    Listening,
    /// Thinking about a reply.
    Processing,
    /// Speaking the reply.
    Responding,
}

impl ConversationStage {
    pub const ALL: &'static [ConversationStage] = &[
        ConversationStage::Idle,
        ConversationStage::Listening,
        ConversationStage::Processing,
        ConversationStage::Responding,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStage::Idle => "idle",
            ConversationStage::Listening => "listening",
            ConversationStage::Processing => "processing",
            ConversationStage::Responding => "responding",
        }
    }

    /// Fraction of the conversation smoothing boost applied in this stage.
    ///
    /// Processing keeps the gimbal calmer while the reply is being prepared.
    pub fn responsiveness_factor(&self) -> f64 {
        match self {
            ConversationStage::Processing => 0.5,
            ConversationStage::Idle
            | ConversationStage::Listening
            | ConversationStage::Responding => 1.0,
        }
    }
}

impl fmt::Display for ConversationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ConversationStage {
    type Err = ConversationStageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "idle" => Ok(ConversationStage::Idle),
            "listening" | "listen" => Ok(ConversationStage::Listening),
            "processing" | "thinking" => Ok(ConversationStage::Processing),
            "responding" | "speaking" => Ok(ConversationStage::Responding),
            _ => Err(ConversationStageParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown conversation stage: {0}")]
pub struct ConversationStageParseError(String);
