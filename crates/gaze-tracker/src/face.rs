//! Faces as seen by the tracking loop.

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use gaze_models::{BoundingBox, Point, UNKNOWN_IDENTITY};

/// A face returned by the recognition backend's full pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedFace {
    /// Identity label, or `"unknown"`
    pub identity: String,
    /// Recognition confidence in `[0, 1]`
    pub confidence: f64,
    pub bounding_box: BoundingBox,
}

impl RecognizedFace {
    pub fn new(identity: impl Into<String>, confidence: f64, bounding_box: BoundingBox) -> Self {
        Self {
            identity: identity.into(),
            confidence,
            bounding_box,
        }
    }
}

/// A face observed on one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedFace {
    /// Lowercased identity label, or `"unknown"`
    pub identity: String,
    pub confidence: f64,
    pub bounding_box: BoundingBox,
    /// Center of `bounding_box`, in pixels
    pub center: Point,
    /// Capture time of the frame this face came from
    pub observed_at: Instant,
}

impl DetectedFace {
    pub fn new(
        identity: impl AsRef<str>,
        confidence: f64,
        bounding_box: BoundingBox,
        observed_at: Instant,
    ) -> Self {
        Self {
            identity: normalize_identity(identity.as_ref()),
            confidence: confidence.clamp(0.0, 1.0),
            center: bounding_box.center(),
            bounding_box,
            observed_at,
        }
    }

    /// Whether this face carries a real identity.
    #[inline]
    pub fn is_recognized(&self) -> bool {
        self.identity != UNKNOWN_IDENTITY
    }
}

/// Lowercase and trim an identity label; blank labels become `"unknown"`.
pub fn normalize_identity(identity: &str) -> String {
    let normalized = identity.trim().to_lowercase();
    if normalized.is_empty() {
        UNKNOWN_IDENTITY.to_string()
    } else {
        normalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_normalized() {
        let face = DetectedFace::new(
            "  Sophia ",
            0.9,
            BoundingBox::from_xywh(10.0, 10.0, 40.0, 40.0),
            Instant::now(),
        );
        assert_eq!(face.identity, "sophia");
        assert!(face.is_recognized());
        assert_eq!(face.center, Point::new(30.0, 30.0));
    }

    #[test]
    fn test_blank_identity_is_unknown() {
        assert_eq!(normalize_identity(""), UNKNOWN_IDENTITY);
        assert_eq!(normalize_identity("UNKNOWN"), UNKNOWN_IDENTITY);
    }

    #[test]
    fn test_confidence_is_clamped() {
        let face = DetectedFace::new(
            "x",
            1.7,
            BoundingBox::from_xywh(0.0, 0.0, 1.0, 1.0),
            Instant::now(),
        );
        assert_eq!(face.confidence, 1.0);
    }
}
