//! Conversation context supplied by the conversation system.

use gaze_models::ConversationStage;

use crate::face::normalize_identity;

/// Who the companion is talking to, and how far along the exchange is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationContext {
    pub active: bool,
    /// Normalized identity of the conversation partner
    pub target_identity: Option<String>,
    pub stage: ConversationStage,
}

impl ConversationContext {
    /// Context seeded by `start_tracking`.
    pub fn new(active: bool) -> Self {
        Self {
            active,
            ..Default::default()
        }
    }

    /// Enter or leave conversation mode. Leaving clears the target and the
    /// stage.
    pub fn set_mode(&mut self, active: bool, target_identity: Option<&str>) {
        self.active = active;
        if active {
            self.target_identity = target_identity
                .map(normalize_identity)
                .filter(|id| id != gaze_models::UNKNOWN_IDENTITY);
        } else {
            self.target_identity = None;
            self.stage = ConversationStage::Idle;
        }
    }

    /// The partner identity, only while the conversation is active.
    pub fn active_target(&self) -> Option<&str> {
        if self.active {
            self.target_identity.as_deref()
        } else {
            None
        }
    }
}
