//! Metrics emitted by the tracking engine.
//!
//! Recording is a no-op until the host installs a recorder (the daemon
//! installs the Prometheus exporter when `GAZE_METRICS_PORT` is set).

use gaze_models::ServoAxis;
use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    // Loop metrics
    pub const LOOP_ITERATIONS_TOTAL: &str = "gaze_loop_iterations_total";
    pub const LOOP_DURATION_SECONDS: &str = "gaze_loop_duration_seconds";
    pub const FRAME_FAILURES_TOTAL: &str = "gaze_frame_failures_total";
    pub const TRACKING_ACTIVE: &str = "gaze_tracking_active";

    // Observer metrics
    pub const FULL_RECOGNITION_TOTAL: &str = "gaze_full_recognition_total";
    pub const DETECTION_FAILURES_TOTAL: &str = "gaze_detection_failures_total";

    // Servo metrics
    pub const SERVO_COMMANDS_TOTAL: &str = "gaze_servo_commands_total";
    pub const SERVO_FAILURES_TOTAL: &str = "gaze_servo_failures_total";
    pub const SERVO_THROTTLED_TOTAL: &str = "gaze_servo_throttled_total";

    // Search metrics
    pub const SEARCH_STARTED_TOTAL: &str = "gaze_search_started_total";
    pub const SEARCH_TIMEOUTS_TOTAL: &str = "gaze_search_timeouts_total";

    // Control metrics
    pub const MANUAL_COMMANDS_TOTAL: &str = "gaze_manual_commands_total";
}

/// Record one completed loop iteration.
pub fn record_loop_iteration(duration_secs: f64) {
    counter!(names::LOOP_ITERATIONS_TOTAL).increment(1);
    histogram!(names::LOOP_DURATION_SECONDS).record(duration_secs);
}

/// Record a frame that could not be read.
pub fn record_frame_failure(reason: &str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::FRAME_FAILURES_TOTAL, &labels).increment(1);
}

/// Update the tracking gauge.
pub fn set_tracking_active(active: bool) {
    gauge!(names::TRACKING_ACTIVE).set(if active { 1.0 } else { 0.0 });
}

/// Record a full recognition pass.
pub fn record_full_recognition() {
    counter!(names::FULL_RECOGNITION_TOTAL).increment(1);
}

/// Record a failed detector call.
pub fn record_detection_failure(pass: &str) {
    let labels = [("pass", pass.to_string())];
    counter!(names::DETECTION_FAILURES_TOTAL, &labels).increment(1);
}

/// Record a servo command written to the transport.
pub fn record_servo_command(axis: ServoAxis) {
    let labels = [("axis", axis.as_str().to_string())];
    counter!(names::SERVO_COMMANDS_TOTAL, &labels).increment(1);
}

/// Record a failed servo write.
pub fn record_servo_failure(axis: ServoAxis) {
    let labels = [("axis", axis.as_str().to_string())];
    counter!(names::SERVO_FAILURES_TOTAL, &labels).increment(1);
}

/// Record a servo command dropped by the quota.
pub fn record_servo_throttled(axis: ServoAxis) {
    let labels = [("axis", axis.as_str().to_string())];
    counter!(names::SERVO_THROTTLED_TOTAL, &labels).increment(1);
}

pub fn record_search_started() {
    counter!(names::SEARCH_STARTED_TOTAL).increment(1);
}

pub fn record_search_timeout() {
    counter!(names::SEARCH_TIMEOUTS_TOTAL).increment(1);
}

/// Record a manual command.
pub fn record_manual_command(command: &str) {
    let labels = [("command", command.to_string())];
    counter!(names::MANUAL_COMMANDS_TOTAL, &labels).increment(1);
}
