//! Collaborator traits consumed by the tracking engine.
//!
//! The engine never talks to hardware directly. Cameras, recognition models
//! and servo controllers plug in behind these traits, and every call made
//! through them is bounded by [`bounded`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::RgbImage;
use tokio::time::Instant;

use gaze_models::{BoundingBox, ServoAxis};

use crate::error::{TrackingError, TrackingResult};
use crate::face::RecognizedFace;

/// One captured camera frame.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: Arc<RgbImage>,
    pub captured_at: Instant,
}

impl Frame {
    pub fn new(image: RgbImage, captured_at: Instant) -> Self {
        Self {
            image: Arc::new(image),
            captured_at,
        }
    }

    /// A black frame of the given size, captured now.
    pub fn blank(width: u32, height: u32) -> Self {
        Self::new(RgbImage::new(width, height), Instant::now())
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Source of camera frames.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Read the next frame.
    async fn read_frame(&self) -> TrackingResult<Frame>;
}

/// Face detection and recognition backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FaceRecognizer: Send + Sync {
    /// Full pass: detect faces and attach identities and confidences.
    async fn detect_and_recognize(&self, frame: &Frame) -> TrackingResult<Vec<RecognizedFace>>;

    /// Fast pass: face geometry only.
    async fn detect_fast(&self, frame: &Frame) -> TrackingResult<Vec<BoundingBox>>;
}

/// Transport to the pan/tilt servo controller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ServoTransport: Send + Sync {
    /// Move one axis to a whole-degree angle.
    async fn send_command(&self, axis: ServoAxis, angle: i32) -> TrackingResult<()>;
}

/// Run a collaborator call with a time budget.
///
/// Expiry maps to [`TrackingError::Timeout`] naming `operation`.
pub async fn bounded<T, F>(operation: &str, budget: Duration, call: F) -> TrackingResult<T>
where
    F: Future<Output = TrackingResult<T>>,
{
    match tokio::time::timeout(budget, call).await {
        Ok(result) => result,
        Err(_) => Err(TrackingError::Timeout {
            operation: operation.to_string(),
            after_ms: budget.as_millis() as u64,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_bounded_times_out() {
        let result: TrackingResult<()> = bounded("read_frame", Duration::from_millis(250), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        let err = result.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "read_frame timed out after 250 ms");
    }

    #[tokio::test]
    async fn test_bounded_passes_through_result() {
        let ok = bounded("detect", Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let err: TrackingResult<u8> = bounded("detect", Duration::from_secs(1), async {
            Err(TrackingError::detection("model not loaded"))
        })
        .await;
        assert!(matches!(err, Err(TrackingError::Detection(_))));
    }

    #[tokio::test]
    async fn test_mock_frame_source() {
        let mut source = MockFrameSource::new();
        source
            .expect_read_frame()
            .times(1)
            .returning(|| Ok(Frame::blank(64, 48)));

        let frame = source.read_frame().await.unwrap();
        assert_eq!((frame.width(), frame.height()), (64, 48));
    }
}
