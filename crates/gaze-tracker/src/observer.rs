//! Face observer.
//!
//! Alternates between an expensive full recognition pass every Kth frame and
//! a geometry-only fast pass on the frames in between. Identities from the
//! latest full pass are carried onto fast-pass detections by nearest-center
//! matching.

use std::time::Duration;

use tracing::{debug, warn};

use gaze_models::{BoundingBox, Point, UNKNOWN_IDENTITY};

use crate::backend::{bounded, FaceRecognizer, Frame};
use crate::config::ObserverConfig;
use crate::face::DetectedFace;
use crate::metrics;

/// Identity remembered from the latest full pass.
#[derive(Debug, Clone)]
struct CachedIdentity {
    identity: String,
    confidence: f64,
    center: Point,
}

/// Produces the face list for each frame.
#[derive(Debug)]
pub struct FaceObserver {
    config: ObserverConfig,
    frame_index: u64,
    cache: Vec<CachedIdentity>,
}

impl FaceObserver {
    pub fn new(config: ObserverConfig) -> Self {
        Self {
            config,
            frame_index: 0,
            cache: Vec::new(),
        }
    }

    /// Observe faces on `frame`. Never fails: backend errors degrade to the
    /// fast pass, then to an empty list.
    pub async fn observe(
        &mut self,
        recognizer: &dyn FaceRecognizer,
        frame: &Frame,
        budget: Duration,
    ) -> Vec<DetectedFace> {
        let interval = u64::from(self.config.recognition_interval.max(1));
        let full_pass = self.frame_index % interval == 0;
        self.frame_index = self.frame_index.wrapping_add(1);

        if full_pass {
            metrics::record_full_recognition();
            match bounded(
                "detect_and_recognize",
                budget,
                recognizer.detect_and_recognize(frame),
            )
            .await
            {
                Ok(recognized) if !recognized.is_empty() => {
                    let faces: Vec<DetectedFace> = recognized
                        .into_iter()
                        .map(|f| {
                            DetectedFace::new(f.identity, f.confidence, f.bounding_box, frame.captured_at)
                        })
                        .collect();
                    self.remember(&faces);
                    debug!(count = faces.len(), "Full recognition pass");
                    return faces;
                }
                Ok(_) => {
                    debug!("Full recognition pass found no faces, trying fast pass");
                }
                Err(e) => {
                    metrics::record_detection_failure("full");
                    warn!(error = %e, "Face recognition failed, falling back to fast pass");
                }
            }
        }

        match bounded("detect_fast", budget, recognizer.detect_fast(frame)).await {
            Ok(boxes) => self.label(boxes, frame),
            Err(e) => {
                metrics::record_detection_failure("fast");
                warn!(error = %e, "Fast face detection failed");
                Vec::new()
            }
        }
    }

    /// Forget cached identities and restart the recognition cadence.
    pub fn reset(&mut self) {
        self.frame_index = 0;
        self.cache.clear();
    }

    fn remember(&mut self, faces: &[DetectedFace]) {
        self.cache = faces
            .iter()
            .filter(|f| f.is_recognized())
            .map(|f| CachedIdentity {
                identity: f.identity.clone(),
                confidence: f.confidence,
                center: f.center,
            })
            .collect();
    }

    /// Greedy nearest-center matching of fast detections against the cache.
    /// Each cached identity is used at most once per frame.
    fn label(&mut self, boxes: Vec<BoundingBox>, frame: &Frame) -> Vec<DetectedFace> {
        let mut used = vec![false; self.cache.len()];

        boxes
            .into_iter()
            .map(|bbox| {
                let center = bbox.center();
                let nearest = self
                    .cache
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| !used[*i])
                    .map(|(i, cached)| (i, cached.center.distance(&center)))
                    .filter(|(_, d)| *d < self.config.match_radius_px)
                    .min_by(|a, b| a.1.total_cmp(&b.1));

                match nearest {
                    Some((i, _)) => {
                        used[i] = true;
                        let cached = &mut self.cache[i];
                        cached.center = center;
                        DetectedFace::new(&cached.identity, cached.confidence, bbox, frame.captured_at)
                    }
                    None => DetectedFace::new(
                        UNKNOWN_IDENTITY,
                        self.config.unknown_confidence,
                        bbox,
                        frame.captured_at,
                    ),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockFaceRecognizer;
    use crate::error::TrackingError;
    use crate::face::RecognizedFace;

    const BUDGET: Duration = Duration::from_millis(250);

    fn bbox_at(cx: f64, cy: f64) -> BoundingBox {
        BoundingBox::from_xywh(cx - 20.0, cy - 20.0, 40.0, 40.0)
    }

    fn observer(interval: u32) -> FaceObserver {
        FaceObserver::new(ObserverConfig {
            recognition_interval: interval,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_full_pass_runs_every_kth_frame() {
        let mut recognizer = MockFaceRecognizer::new();
        recognizer
            .expect_detect_and_recognize()
            .times(2)
            .returning(|_| Ok(vec![RecognizedFace::new("Sophia", 0.9, bbox_at(100.0, 100.0))]));
        recognizer
            .expect_detect_fast()
            .times(2)
            .returning(|_| Ok(vec![bbox_at(110.0, 100.0)]));

        let mut observer = observer(3);
        let frame = Frame::blank(640, 480);
        for _ in 0..4 {
            let faces = observer.observe(&recognizer, &frame, BUDGET).await;
            assert_eq!(faces.len(), 1);
            assert_eq!(faces[0].identity, "sophia");
        }
    }

    #[tokio::test]
    async fn test_fast_pass_labels_unmatched_as_unknown() {
        let mut recognizer = MockFaceRecognizer::new();
        recognizer
            .expect_detect_and_recognize()
            .times(1)
            .returning(|_| Ok(vec![RecognizedFace::new("eladriel", 0.8, bbox_at(100.0, 100.0))]));
        recognizer
            .expect_detect_fast()
            .returning(|_| Ok(vec![bbox_at(500.0, 300.0), bbox_at(120.0, 110.0)]));

        let mut observer = observer(3);
        let frame = Frame::blank(640, 480);
        observer.observe(&recognizer, &frame, BUDGET).await;
        let faces = observer.observe(&recognizer, &frame, BUDGET).await;

        assert_eq!(faces[0].identity, UNKNOWN_IDENTITY);
        assert_eq!(faces[0].confidence, 0.5);
        assert_eq!(faces[1].identity, "eladriel");
        assert_eq!(faces[1].confidence, 0.8);
    }

    #[tokio::test]
    async fn test_cached_identity_is_used_once() {
        let mut recognizer = MockFaceRecognizer::new();
        recognizer
            .expect_detect_and_recognize()
            .times(1)
            .returning(|_| Ok(vec![RecognizedFace::new("sophia", 0.9, bbox_at(100.0, 100.0))]));
        recognizer
            .expect_detect_fast()
            .returning(|_| Ok(vec![bbox_at(105.0, 100.0), bbox_at(95.0, 100.0)]));

        let mut observer = observer(5);
        let frame = Frame::blank(640, 480);
        observer.observe(&recognizer, &frame, BUDGET).await;
        let faces = observer.observe(&recognizer, &frame, BUDGET).await;

        let named = faces.iter().filter(|f| f.identity == "sophia").count();
        assert_eq!(named, 1);
    }

    #[tokio::test]
    async fn test_recognition_failure_falls_back_to_fast_pass() {
        let mut recognizer = MockFaceRecognizer::new();
        recognizer
            .expect_detect_and_recognize()
            .returning(|_| Err(TrackingError::detection("model crashed")));
        recognizer
            .expect_detect_fast()
            .times(1)
            .returning(|_| Ok(vec![bbox_at(320.0, 240.0)]));

        let mut observer = observer(3);
        let faces = observer
            .observe(&recognizer, &Frame::blank(640, 480), BUDGET)
            .await;
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].identity, UNKNOWN_IDENTITY);
    }

    #[tokio::test]
    async fn test_both_passes_failing_yields_empty() {
        let mut recognizer = MockFaceRecognizer::new();
        recognizer
            .expect_detect_and_recognize()
            .returning(|_| Err(TrackingError::detection("model crashed")));
        recognizer
            .expect_detect_fast()
            .returning(|_| Err(TrackingError::detection("camera glitch")));

        let mut observer = observer(1);
        let faces = observer
            .observe(&recognizer, &Frame::blank(640, 480), BUDGET)
            .await;
        assert!(faces.is_empty());
    }

    #[tokio::test]
    async fn test_reset_forces_full_pass() {
        let mut recognizer = MockFaceRecognizer::new();
        recognizer
            .expect_detect_and_recognize()
            .times(2)
            .returning(|_| Ok(vec![RecognizedFace::new("sophia", 0.9, bbox_at(100.0, 100.0))]));
        recognizer.expect_detect_fast().returning(|_| Ok(Vec::new()));

        let mut observer = observer(10);
        let frame = Frame::blank(640, 480);
        observer.observe(&recognizer, &frame, BUDGET).await;
        observer.observe(&recognizer, &frame, BUDGET).await;
        observer.reset();
        observer.observe(&recognizer, &frame, BUDGET).await;
    }
}
