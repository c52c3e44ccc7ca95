//! Gimbal pose and servo axes.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One axis of the two-axis gimbal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ServoAxis {
    /// Left/right rotation.
    Pan,
    /// Up/down rotation.
    Tilt,
}

impl ServoAxis {
    pub const ALL: &'static [ServoAxis] = &[ServoAxis::Pan, ServoAxis::Tilt];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServoAxis::Pan => "pan",
            ServoAxis::Tilt => "tilt",
        }
    }
}

impl fmt::Display for ServoAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Current gimbal angles in degrees, plus the rest pose they return to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GimbalPose {
    pub pan: f64,
    pub tilt: f64,
    pub pan_center: f64,
    pub tilt_center: f64,
}

impl GimbalPose {
    /// A pose sitting at its rest position.
    pub fn at_rest(pan_center: f64, tilt_center: f64) -> Self {
        Self {
            pan: pan_center,
            tilt: tilt_center,
            pan_center,
            tilt_center,
        }
    }

    /// Same rest position, different angles.
    pub fn with_angles(&self, pan: f64, tilt: f64) -> Self {
        Self { pan, tilt, ..*self }
    }

    /// The rest pose for this gimbal.
    pub fn rest(&self) -> Self {
        Self::at_rest(self.pan_center, self.tilt_center)
    }

    /// Angle of a single axis.
    pub fn angle(&self, axis: ServoAxis) -> f64 {
        match axis {
            ServoAxis::Pan => self.pan,
            ServoAxis::Tilt => self.tilt,
        }
    }

    /// Whether both axes are within `tolerance` degrees of the rest pose.
    pub fn is_at_rest(&self, tolerance: f64) -> bool {
        (self.pan - self.pan_center).abs() <= tolerance
            && (self.tilt - self.tilt_center).abs() <= tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rest_pose() {
        let pose = GimbalPose::at_rest(90.0, 80.0).with_angles(120.0, 60.0);
        assert!(!pose.is_at_rest(0.5));
        assert_eq!(pose.angle(ServoAxis::Pan), 120.0);
        assert_eq!(pose.angle(ServoAxis::Tilt), 60.0);

        let rest = pose.rest();
        assert!(rest.is_at_rest(0.0));
        assert_eq!(rest.pan, 90.0);
        assert_eq!(rest.tilt, 80.0);
    }
}
