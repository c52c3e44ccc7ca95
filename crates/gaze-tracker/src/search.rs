//! Search controller.
//!
//! Drives the gimbal when nobody is being tracked: a slow horizontal sweep
//! around the rest pose with periodic look-up glances, bounded by a timeout
//! after which the gimbal returns to rest and stays there until the next
//! loss event.

use std::time::Duration;

use tokio::time::Instant;
use tracing::info;

use gaze_models::{GimbalPose, SearchPattern};

use crate::config::SearchConfig;
use crate::metrics;

/// What the loop should do with the gimbal on a search tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchAction {
    /// Not searching, or between sweep steps
    Hold,
    /// Move toward these angles
    MoveTo { pan: f64, tilt: f64 },
    /// Search timed out; force the rest pose
    ReturnToRest,
}

/// Mutable search state.
#[derive(Debug, Clone)]
pub struct SearchState {
    pub active: bool,
    pub pattern: SearchPattern,
    /// +1.0 sweeping toward higher pan, -1.0 toward lower
    pub direction: f64,
    /// Current sweep pan position in degrees
    pub position: f64,
    pub started_at: Option<Instant>,
    last_step_at: Option<Instant>,
    pattern_since: Option<Instant>,
    /// Set when a search times out; cleared by a sighting or a forced search
    pub exhausted: bool,
}

impl SearchState {
    fn idle(pan_center: f64) -> Self {
        Self {
            active: false,
            pattern: SearchPattern::SweepHorizontal,
            direction: 1.0,
            position: pan_center,
            started_at: None,
            last_step_at: None,
            pattern_since: None,
            exhausted: false,
        }
    }
}

pub struct SearchController {
    config: SearchConfig,
    pan_center: f64,
    tilt_center: f64,
    state: SearchState,
}

impl SearchController {
    pub fn new(config: SearchConfig, pan_center: f64, tilt_center: f64) -> Self {
        Self {
            state: SearchState::idle(pan_center),
            config,
            pan_center,
            tilt_center,
        }
    }

    pub fn state(&self) -> &SearchState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.active
    }

    /// Pattern currently running, if searching.
    pub fn pattern(&self) -> Option<SearchPattern> {
        self.state.active.then_some(self.state.pattern)
    }

    /// Whether a loss lasting `since_seen` should start a search.
    pub fn should_start(&self, since_seen: Duration, face_lost_timeout: Duration) -> bool {
        !self.state.active && !self.state.exhausted && since_seen >= face_lost_timeout
    }

    /// Start searching from the current pose.
    pub fn begin(&mut self, now: Instant, pose: &GimbalPose) {
        self.state = SearchState {
            active: true,
            position: pose.pan,
            started_at: Some(now),
            last_step_at: Some(now),
            pattern_since: Some(now),
            ..SearchState::idle(self.pan_center)
        };
        metrics::record_search_started();
        info!(pan = pose.pan, "No faces found, starting search");
    }

    /// A target was found; stop searching and clear the timeout latch.
    pub fn found(&mut self) {
        if self.state.active {
            info!("Face found, ending search");
        }
        self.state.active = false;
        self.state.exhausted = false;
        self.state.started_at = None;
    }

    /// Forget everything, including the latch.
    pub fn reset(&mut self) {
        self.state = SearchState::idle(self.pan_center);
    }

    /// Advance the search by one tick.
    pub fn tick(&mut self, now: Instant, pose: &GimbalPose, conversation_active: bool) -> SearchAction {
        if !self.state.active {
            return SearchAction::Hold;
        }

        let started_at = self.state.started_at.unwrap_or(now);
        if now.saturating_duration_since(started_at) >= self.config.search_timeout() {
            self.state.active = false;
            self.state.exhausted = true;
            self.state.started_at = None;
            metrics::record_search_timeout();
            info!(
                timeout_secs = self.config.search_timeout_secs,
                "Search timed out, returning to rest"
            );
            return SearchAction::ReturnToRest;
        }

        if let Some(last) = self.state.last_step_at {
            if now.saturating_duration_since(last) < self.config.step_interval() {
                return SearchAction::Hold;
            }
        }
        self.state.last_step_at = Some(now);

        let pattern_age = self
            .state
            .pattern_since
            .map(|since| now.saturating_duration_since(since))
            .unwrap_or_default();

        let (target_pan, target_tilt) = match self.state.pattern {
            SearchPattern::SweepHorizontal => {
                self.advance_sweep(conversation_active);
                if pattern_age >= self.config.look_up_interval() {
                    self.state.pattern = SearchPattern::LookUp;
                    self.state.pattern_since = Some(now);
                }
                (self.state.position, self.tilt_center)
            }
            SearchPattern::LookUp => {
                if pattern_age >= self.config.look_up_hold() {
                    self.state.pattern = SearchPattern::SweepHorizontal;
                    self.state.pattern_since = Some(now);
                }
                // Up is toward lower tilt
                (
                    self.state.position,
                    self.tilt_center - self.config.look_up_offset_degrees,
                )
            }
        };

        let approach = self.config.approach;
        SearchAction::MoveTo {
            pan: pose.pan + (target_pan - pose.pan) * approach,
            tilt: pose.tilt + (target_tilt - pose.tilt) * approach,
        }
    }

    fn advance_sweep(&mut self, conversation_active: bool) {
        let range = if conversation_active {
            self.config.conversation_range_degrees
        } else {
            self.config.idle_range_degrees
        };
        let upper = self.pan_center + range;
        let lower = self.pan_center - range;

        let next = self.state.position + self.config.step_degrees * self.state.direction;
        if next >= upper {
            self.state.position = upper;
            self.state.direction = -1.0;
        } else if next <= lower {
            self.state.position = lower;
            self.state.direction = 1.0;
        } else {
            self.state.position = next;
        }
    }
}
