//! Predictive smoothing and aim mapping.
//!
//! Two stages run per tick: motion prediction over a short history of target
//! centers, then exponential smoothing of the resulting servo angles.

use std::collections::VecDeque;

use tokio::time::Instant;

use gaze_models::{GimbalPose, Point};

use crate::config::SmoothingConfig;
use crate::context::ConversationContext;

/// Minimum spacing between samples used for velocity, in seconds.
const MIN_DT_SECS: f64 = 1e-3;

/// Short-horizon motion predictor for one target.
#[derive(Debug, Clone)]
pub struct PredictiveSmoother {
    history: VecDeque<(Point, Instant)>,
    capacity: usize,
    lookahead_secs: f64,
}

impl PredictiveSmoother {
    pub fn new(config: &SmoothingConfig) -> Self {
        let capacity = config.history_len.max(2);
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
            lookahead_secs: config.lookahead().as_secs_f64(),
        }
    }

    /// Record an observed center and return the predicted aim point.
    pub fn update(&mut self, center: Point, now: Instant) -> Point {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back((center, now));
        self.predict()
    }

    fn predict(&self) -> Point {
        let Some(&(last, _)) = self.history.back() else {
            return Point::default();
        };
        let velocity = self.velocity();
        Point::new(
            last.x + velocity.x * self.lookahead_secs,
            last.y + velocity.y * self.lookahead_secs,
        )
    }

    /// Velocity in pixels per second from the two newest samples. Zero until
    /// two samples at least a millisecond apart exist.
    pub fn velocity(&self) -> Point {
        let n = self.history.len();
        if n < 2 {
            return Point::default();
        }

        let (last, t_last) = self.history[n - 1];
        let (prev, t_prev) = self.history[n - 2];
        let dt = t_last.saturating_duration_since(t_prev).as_secs_f64();
        if dt < MIN_DT_SECS {
            return Point::default();
        }

        Point::new((last.x - prev.x) / dt, (last.y - prev.y) / dt)
    }

    /// Drop history, e.g. when the target changes.
    pub fn reset(&mut self) {
        self.history.clear();
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

/// Maps aim points to servo angles with exponential smoothing.
#[derive(Debug, Clone)]
pub struct AimMapper {
    config: SmoothingConfig,
}

impl AimMapper {
    pub fn new(config: SmoothingConfig) -> Self {
        Self { config }
    }

    /// Smoothing factor for the current conversation context.
    pub fn smoothing_factor(&self, context: &ConversationContext) -> f64 {
        let boost = if context.active {
            self.config.conversation_boost * context.stage.responsiveness_factor()
        } else {
            0.0
        };
        (self.config.base_smoothing + boost).min(self.config.max_smoothing)
    }

    /// Raw target angles for an aim point, relative to the current pose.
    ///
    /// Pan is inverted: a face right of center lowers the pan angle. A face
    /// below center raises the tilt angle.
    pub fn target_angles(
        &self,
        aim: Point,
        frame_width: u32,
        frame_height: u32,
        pose: &GimbalPose,
    ) -> (f64, f64) {
        let width = f64::from(frame_width.max(1));
        let height = f64::from(frame_height.max(1));
        let error_x = (aim.x - width / 2.0) / width;
        let error_y = (aim.y - height / 2.0) / height;

        (
            pose.pan - error_x * self.config.pan_gain,
            pose.tilt + error_y * self.config.tilt_gain,
        )
    }

    /// One exponential smoothing step from `pose` toward the target angles.
    pub fn step_toward(
        &self,
        pose: &GimbalPose,
        target_pan: f64,
        target_tilt: f64,
        context: &ConversationContext,
    ) -> (f64, f64) {
        let gain = self.smoothing_factor(context) * self.config.dampening;
        (
            pose.pan + (target_pan - pose.pan) * gain,
            pose.tilt + (target_tilt - pose.tilt) * gain,
        )
    }

    /// Prediction output to smoothed angles in one call.
    pub fn aim(
        &self,
        aim: Point,
        frame_width: u32,
        frame_height: u32,
        pose: &GimbalPose,
        context: &ConversationContext,
    ) -> (f64, f64) {
        let (pan, tilt) = self.target_angles(aim, frame_width, frame_height, pose);
        self.step_toward(pose, pan, tilt, context)
    }
}
