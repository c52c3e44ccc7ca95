//! Configuration for the tracking engine.
//!
//! Every tuning constant lives here: gains, timeouts, thresholds, servo
//! limits and the priority identity set. Nothing in this module is computed
//! at runtime.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use gaze_models::UNKNOWN_IDENTITY;

use crate::error::{TrackingError, TrackingResult};

/// What target selection does when the conversation partner is not in frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TargetAbsentPolicy {
    /// Select nothing, letting the search controller look for the partner.
    #[default]
    Search,
    /// Fall back to priority ranking among the faces that are visible.
    RankOthers,
}

impl FromStr for TargetAbsentPolicy {
    type Err = TrackingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "search" => Ok(Self::Search),
            "rank_others" | "rank" | "fallback" => Ok(Self::RankOthers),
            other => Err(TrackingError::invalid_config(
                "target_absent_policy",
                format!("unknown policy '{}'", other),
            )),
        }
    }
}

/// Face observer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverConfig {
    /// Run full recognition every Nth frame (default: 3)
    pub recognition_interval: u32,
    /// Maximum center distance for reusing a recognized identity (default: 100 px)
    pub match_radius_px: f64,
    /// Confidence given to fast-pass faces with no identity match (default: 0.5)
    pub unknown_confidence: f64,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            recognition_interval: 3,
            match_radius_px: 100.0,
            unknown_confidence: 0.5,
        }
    }
}

/// Predictive smoother and aim mapping settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Observations kept per target (default: 3)
    pub history_len: usize,
    /// Motion extrapolation horizon in milliseconds (default: 50)
    pub lookahead_ms: f64,
    /// Pan degrees per full frame width of pixel error (default: 60)
    pub pan_gain: f64,
    /// Tilt degrees per full frame height of pixel error (default: 45)
    pub tilt_gain: f64,
    /// Exponential smoothing factor outside conversations (default: 0.4)
    pub base_smoothing: f64,
    /// Smoothing increase during an active conversation (default: 0.2)
    pub conversation_boost: f64,
    /// Upper bound on the boosted smoothing factor (default: 0.6)
    pub max_smoothing: f64,
    /// Constant overshoot damping, strictly between 0 and 1 (default: 0.85)
    pub dampening: f64,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            history_len: 3,
            lookahead_ms: 50.0,
            pan_gain: 60.0,
            tilt_gain: 45.0,
            base_smoothing: 0.4,
            conversation_boost: 0.2,
            max_smoothing: 0.6,
            dampening: 0.85,
        }
    }
}

/// Search controller settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Seconds of searching before returning to rest (default: 8.0)
    pub search_timeout_secs: f64,
    /// Degrees advanced per sweep step (default: 2.0)
    pub step_degrees: f64,
    /// Milliseconds between sweep steps (default: 100)
    pub step_interval_ms: f64,
    /// Sweep half-width around the pan center when idle (default: 50)
    pub idle_range_degrees: f64,
    /// Sweep half-width during an active conversation (default: 70)
    pub conversation_range_degrees: f64,
    /// Seconds of sweeping between look-up glances (default: 4.0)
    pub look_up_interval_secs: f64,
    /// Seconds to hold a look-up glance (default: 1.0)
    pub look_up_hold_secs: f64,
    /// Degrees above the tilt center for a look-up glance (default: 30)
    pub look_up_offset_degrees: f64,
    /// Fraction of the remaining distance covered per search step (default: 0.3)
    pub approach: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            search_timeout_secs: 8.0,
            step_degrees: 2.0,
            step_interval_ms: 100.0,
            idle_range_degrees: 50.0,
            conversation_range_degrees: 70.0,
            look_up_interval_secs: 4.0,
            look_up_hold_secs: 1.0,
            look_up_offset_degrees: 30.0,
            approach: 0.3,
        }
    }
}

/// Servo angle limits and rest pose, in degrees.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServoLimits {
    pub servo_min: f64,
    pub servo_max: f64,
    pub pan_center: f64,
    pub tilt_center: f64,
    /// Global quota on non-forced axis commands (default: 120/s)
    pub max_commands_per_second: u32,
}

impl Default for ServoLimits {
    fn default() -> Self {
        Self {
            servo_min: 20.0,
            servo_max: 160.0,
            pan_center: 90.0,
            tilt_center: 90.0,
            max_commands_per_second: 120,
        }
    }
}

impl ServoLimits {
    /// Clamp an angle into `[servo_min, servo_max]`.
    #[inline]
    pub fn clamp(&self, angle: f64) -> f64 {
        angle.clamp(self.servo_min, self.servo_max)
    }
}

/// Configuration for the tracking engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    // === Selection ===
    /// Identities tracked at Highest priority (e.g. known conversation partners)
    pub priority_identities: Vec<String>,
    /// Minimum confidence for a recognized identity to rank High (default: 0.6)
    pub min_recognition_confidence: f64,
    /// Ranking boost for the conversation partner (default: 0.2)
    pub conversation_confidence_boost: f64,
    /// Behavior when the conversation partner is absent
    pub target_absent_policy: TargetAbsentPolicy,

    // === Loop ===
    /// Target loop rate in Hz (default: 60)
    pub target_loop_hz: f64,
    /// Time budget for each frame, detection or servo call (default: 250 ms)
    pub io_timeout_ms: u64,
    /// Bounded wait for the worker to exit on stop (default: 2000 ms)
    pub stop_join_timeout_ms: u64,
    /// Seconds without a target before searching (default: 1.0)
    pub face_lost_timeout_secs: f64,

    // === Manual control ===
    /// Degrees moved by look left/right/up/down (default: 25)
    pub manual_step_degrees: f64,

    pub observer: ObserverConfig,
    pub smoothing: SmoothingConfig,
    pub search: SearchConfig,
    pub servo: ServoLimits,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            priority_identities: Vec::new(),
            min_recognition_confidence: 0.6,
            conversation_confidence_boost: 0.2,
            target_absent_policy: TargetAbsentPolicy::Search,

            target_loop_hz: 60.0,
            io_timeout_ms: 250,
            stop_join_timeout_ms: 2000,
            face_lost_timeout_secs: 1.0,

            manual_step_degrees: 25.0,

            observer: ObserverConfig::default(),
            smoothing: SmoothingConfig::default(),
            search: SearchConfig::default(),
            servo: ServoLimits::default(),
        }
    }
}

impl TrackingConfig {
    /// Reduced-load configuration for small single-board computers.
    pub fn low_power() -> Self {
        Self {
            target_loop_hz: 30.0,
            observer: ObserverConfig {
                recognition_interval: 5,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Builder-style priority set.
    pub fn with_priority_identities<I, S>(mut self, identities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.priority_identities = identities.into_iter().map(Into::into).collect();
        self
    }

    /// Create config from environment variables, starting from the defaults
    /// (or the low-power preset when `GAZE_LOW_POWER=true`).
    pub fn from_env() -> Self {
        let base = if env_or("GAZE_LOW_POWER", false) {
            Self::low_power()
        } else {
            Self::default()
        };

        let priority_identities = std::env::var("GAZE_PRIORITY_IDENTITIES")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or(base.priority_identities);

        let target_absent_policy = std::env::var("GAZE_TARGET_ABSENT_POLICY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(base.target_absent_policy);

        Self {
            priority_identities,
            target_absent_policy,
            min_recognition_confidence: env_or(
                "GAZE_MIN_RECOGNITION_CONFIDENCE",
                base.min_recognition_confidence,
            ),
            target_loop_hz: env_or("GAZE_LOOP_HZ", base.target_loop_hz),
            io_timeout_ms: env_or("GAZE_IO_TIMEOUT_MS", base.io_timeout_ms),
            face_lost_timeout_secs: env_or(
                "GAZE_FACE_LOST_TIMEOUT_SECS",
                base.face_lost_timeout_secs,
            ),
            manual_step_degrees: env_or("GAZE_MANUAL_STEP_DEGREES", base.manual_step_degrees),
            observer: ObserverConfig {
                recognition_interval: env_or(
                    "GAZE_RECOGNITION_INTERVAL",
                    base.observer.recognition_interval,
                ),
                ..base.observer
            },
            search: SearchConfig {
                search_timeout_secs: env_or(
                    "GAZE_SEARCH_TIMEOUT_SECS",
                    base.search.search_timeout_secs,
                ),
                ..base.search
            },
            servo: ServoLimits {
                servo_min: env_or("GAZE_SERVO_MIN", base.servo.servo_min),
                servo_max: env_or("GAZE_SERVO_MAX", base.servo.servo_max),
                pan_center: env_or("GAZE_PAN_CENTER", base.servo.pan_center),
                tilt_center: env_or("GAZE_TILT_CENTER", base.servo.tilt_center),
                ..base.servo
            },
            ..base
        }
    }

    /// Load a configuration from a JSON file. Missing fields take their
    /// default values.
    pub fn from_json_file(path: impl AsRef<Path>) -> TrackingResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        serde_json::from_str(&contents).map_err(|e| {
            TrackingError::invalid_config(path.as_ref().display().to_string(), e.to_string())
        })
    }

    /// Validate the configuration.
    pub fn validate(&self) -> TrackingResult<()> {
        // Priority set
        for identity in &self.priority_identities {
            let normalized = identity.trim().to_lowercase();
            if normalized.is_empty() {
                return Err(TrackingError::invalid_config(
                    "priority_identities",
                    "Identities must not be blank",
                ));
            }
            if normalized == UNKNOWN_IDENTITY {
                return Err(TrackingError::invalid_config(
                    "priority_identities",
                    "The unknown sentinel cannot be a priority identity",
                ));
            }
        }

        // Servo limits
        let servo = &self.servo;
        if !(0.0..=180.0).contains(&servo.servo_min) || !(0.0..=180.0).contains(&servo.servo_max) {
            return Err(TrackingError::invalid_config(
                "servo",
                "Servo limits must be within 0-180 degrees",
            ));
        }
        if servo.servo_min >= servo.servo_max {
            return Err(TrackingError::invalid_config(
                "servo",
                "servo_min must be less than servo_max",
            ));
        }
        for (field, center) in [
            ("servo.pan_center", servo.pan_center),
            ("servo.tilt_center", servo.tilt_center),
        ] {
            if !(servo.servo_min..=servo.servo_max).contains(&center) {
                return Err(TrackingError::invalid_config(
                    field,
                    "Rest position must lie within the servo limits",
                ));
            }
        }
        if servo.max_commands_per_second == 0 {
            return Err(TrackingError::invalid_config(
                "servo.max_commands_per_second",
                "Command quota must be greater than 0",
            ));
        }

        // Loop timing
        require_positive("target_loop_hz", self.target_loop_hz)?;
        require_positive("face_lost_timeout_secs", self.face_lost_timeout_secs)?;
        if self.io_timeout_ms == 0 {
            return Err(TrackingError::invalid_config(
                "io_timeout_ms",
                "Call timeout must be greater than 0",
            ));
        }
        require_unit("min_recognition_confidence", self.min_recognition_confidence)?;
        require_unit(
            "conversation_confidence_boost",
            self.conversation_confidence_boost,
        )?;

        // Observer
        if self.observer.recognition_interval == 0 {
            return Err(TrackingError::invalid_config(
                "observer.recognition_interval",
                "Recognition interval must be at least 1",
            ));
        }
        require_positive("observer.match_radius_px", self.observer.match_radius_px)?;
        require_unit("observer.unknown_confidence", self.observer.unknown_confidence)?;

        // Smoothing
        let smoothing = &self.smoothing;
        if smoothing.history_len < 2 {
            return Err(TrackingError::invalid_config(
                "smoothing.history_len",
                "At least two observations are needed for velocity",
            ));
        }
        require_positive("smoothing.pan_gain", smoothing.pan_gain)?;
        require_positive("smoothing.tilt_gain", smoothing.tilt_gain)?;
        require_positive("smoothing.base_smoothing", smoothing.base_smoothing)?;
        require_unit("smoothing.max_smoothing", smoothing.max_smoothing)?;
        if smoothing.lookahead_ms < 0.0 || smoothing.conversation_boost < 0.0 {
            return Err(TrackingError::invalid_config(
                "smoothing",
                "Lookahead and conversation boost must not be negative",
            ));
        }
        if !(smoothing.dampening > 0.0 && smoothing.dampening < 1.0) {
            return Err(TrackingError::invalid_config(
                "smoothing.dampening",
                "Dampening must be strictly between 0 and 1",
            ));
        }

        // Search
        let search = &self.search;
        require_positive("search.search_timeout_secs", search.search_timeout_secs)?;
        require_positive("search.step_degrees", search.step_degrees)?;
        require_positive("search.step_interval_ms", search.step_interval_ms)?;
        require_positive("search.idle_range_degrees", search.idle_range_degrees)?;
        require_positive(
            "search.conversation_range_degrees",
            search.conversation_range_degrees,
        )?;
        require_positive("search.look_up_interval_secs", search.look_up_interval_secs)?;
        require_unit("search.approach", search.approach)?;

        Ok(())
    }

    /// Identities in the priority set, normalized for comparison.
    pub fn normalized_priority_identities(&self) -> Vec<String> {
        self.priority_identities
            .iter()
            .map(|s| s.trim().to_lowercase())
            .collect()
    }

    pub fn loop_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.target_loop_hz)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    pub fn stop_join_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_join_timeout_ms)
    }

    pub fn face_lost_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.face_lost_timeout_secs)
    }
}

impl SearchConfig {
    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.search_timeout_secs)
    }

    pub fn step_interval(&self) -> Duration {
        Duration::from_secs_f64(self.step_interval_ms / 1000.0)
    }

    pub fn look_up_interval(&self) -> Duration {
        Duration::from_secs_f64(self.look_up_interval_secs)
    }

    pub fn look_up_hold(&self) -> Duration {
        Duration::from_secs_f64(self.look_up_hold_secs.max(0.0))
    }
}

impl SmoothingConfig {
    pub fn lookahead(&self) -> Duration {
        Duration::from_secs_f64(self.lookahead_ms / 1000.0)
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn require_positive(field: &str, value: f64) -> TrackingResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(TrackingError::invalid_config(field, "Value must be greater than 0"))
    }
}

fn require_unit(field: &str, value: f64) -> TrackingResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(TrackingError::invalid_config(
            field,
            "Value must be between 0.0 and 1.0",
        ))
    }
}
