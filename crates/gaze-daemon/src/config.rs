//! Daemon configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// JSON tracking configuration; `GAZE_*` variables are used when unset
    pub config_file: Option<PathBuf>,
    /// Servo serial device; commands are only logged when unset
    pub servo_device: Option<PathBuf>,
    /// Port for the Prometheus exporter; disabled when unset
    pub metrics_port: Option<u16>,
    /// How often to log a status line
    pub status_interval: Duration,
    /// Simulated camera resolution
    pub frame_width: u32,
    pub frame_height: u32,
    /// Put a slowly moving demo face in the simulated scene
    pub demo_faces: bool,
    /// Start tracking right after initialization
    pub autostart: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            config_file: None,
            servo_device: None,
            metrics_port: None,
            status_interval: Duration::from_secs(5),
            frame_width: 640,
            frame_height: 480,
            demo_faces: false,
            autostart: true,
        }
    }
}

impl DaemonConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            config_file: std::env::var("GAZE_CONFIG_FILE")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            servo_device: std::env::var("GAZE_SERVO_DEVICE")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            metrics_port: std::env::var("GAZE_METRICS_PORT")
                .ok()
                .and_then(|s| s.parse().ok()),
            status_interval: Duration::from_secs(
                std::env::var("GAZE_STATUS_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            frame_width: std::env::var("GAZE_FRAME_WIDTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(640),
            frame_height: std::env::var("GAZE_FRAME_HEIGHT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(480),
            demo_faces: std::env::var("GAZE_DEMO_FACES")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            autostart: std::env::var("GAZE_AUTOSTART")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
        }
    }
}
