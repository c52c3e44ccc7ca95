//! Structured logging for tracking sessions.
//!
//! Every tracking session gets a span carrying its session ID, so loop logs
//! from different start/stop cycles can be told apart.

use tracing::{info, warn, Span};

use gaze_models::SessionId;

/// Logger for one tracking session.
#[derive(Debug, Clone)]
pub struct SessionLogger {
    session_id: String,
    mode: &'static str,
}

impl SessionLogger {
    /// Create a logger for a session started in the given mode.
    pub fn new(session_id: &SessionId, conversation_mode: bool) -> Self {
        Self {
            session_id: session_id.to_string(),
            mode: if conversation_mode { "conversation" } else { "ambient" },
        }
    }

    pub fn log_start(&self, loop_hz: f64) {
        info!(
            session_id = %self.session_id,
            mode = self.mode,
            loop_hz,
            "Tracking started"
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            session_id = %self.session_id,
            mode = self.mode,
            "Tracking warning: {}", message
        );
    }

    pub fn log_stop(&self, iterations: u64) {
        info!(
            session_id = %self.session_id,
            mode = self.mode,
            iterations,
            "Tracking stopped"
        );
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Span wrapping the session's worker task.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "tracking_session",
            session_id = %self.session_id,
            mode = self.mode
        )
    }
}
