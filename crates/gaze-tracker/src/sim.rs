//! Simulated collaborators for demos and tests.
//!
//! A [`SimulatedScene`] holds scripted faces moving at constant velocity.
//! [`SimulatedCamera`] and [`SimulatedRecognizer`] share a scene, so tests
//! can add, move or remove people while the engine is running.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use image::RgbImage;
use tokio::time::Instant;

use gaze_models::{BoundingBox, Point, ServoAxis};

use crate::backend::{FaceRecognizer, Frame, FrameSource, ServoTransport};
use crate::error::{TrackingError, TrackingResult};
use crate::face::RecognizedFace;

/// One scripted person.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedFace {
    pub identity: String,
    pub confidence: f64,
    /// Center at the time the face was added
    pub origin: Point,
    /// Pixels per second
    pub velocity: Point,
    /// Square box side in pixels
    pub size: f64,
}

impl ScriptedFace {
    pub fn still(identity: impl Into<String>, confidence: f64, center: Point) -> Self {
        Self {
            identity: identity.into(),
            confidence,
            origin: center,
            velocity: Point::default(),
            size: 80.0,
        }
    }

    pub fn moving(mut self, velocity: Point) -> Self {
        self.velocity = velocity;
        self
    }

    fn bounding_box_at(&self, elapsed: Duration) -> BoundingBox {
        let t = elapsed.as_secs_f64();
        let cx = self.origin.x + self.velocity.x * t;
        let cy = self.origin.y + self.velocity.y * t;
        let half = self.size / 2.0;
        BoundingBox::new(cx - half, cy - half, cx + half, cy + half)
    }
}

#[derive(Debug)]
struct SceneFace {
    face: ScriptedFace,
    added_at: Instant,
    occluded: bool,
}

/// Shared set of scripted faces.
#[derive(Debug, Default)]
pub struct SimulatedScene {
    faces: Mutex<Vec<SceneFace>>,
}

impl SimulatedScene {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add a face; its motion starts now.
    pub fn add(&self, face: ScriptedFace) {
        self.faces().push(SceneFace {
            face,
            added_at: Instant::now(),
            occluded: false,
        });
    }

    /// Hide or reveal a face without interrupting its motion.
    pub fn set_occluded(&self, identity: &str, occluded: bool) {
        for f in self.faces().iter_mut().filter(|f| f.face.identity == identity) {
            f.occluded = occluded;
        }
    }

    /// Remove every face with this identity.
    pub fn remove(&self, identity: &str) {
        self.faces().retain(|f| f.face.identity != identity);
    }

    pub fn clear(&self) {
        self.faces().clear();
    }

    pub fn len(&self) -> usize {
        self.faces().len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces().is_empty()
    }

    /// Visible face positions at `at`, in insertion order.
    pub fn snapshot(&self, at: Instant) -> Vec<RecognizedFace> {
        self.faces()
            .iter()
            .filter(|f| !f.occluded)
            .map(|f| {
                let elapsed = at.saturating_duration_since(f.added_at);
                RecognizedFace::new(
                    f.face.identity.clone(),
                    f.face.confidence,
                    f.face.bounding_box_at(elapsed),
                )
            })
            .collect()
    }

    fn faces(&self) -> std::sync::MutexGuard<'_, Vec<SceneFace>> {
        self.faces.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Camera producing blank frames stamped with the read time.
pub struct SimulatedCamera {
    width: u32,
    height: u32,
    latency: Duration,
    failures_remaining: AtomicU32,
    frames_read: AtomicU64,
}

impl SimulatedCamera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            latency: Duration::ZERO,
            failures_remaining: AtomicU32::new(0),
            frames_read: AtomicU64::new(0),
        }
    }

    /// Delay every read by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make the next `count` reads fail.
    pub fn fail_next(&self, count: u32) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FrameSource for SimulatedCamera {
    async fn read_frame(&self) -> TrackingResult<Frame> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let failing = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(TrackingError::frame_source("simulated capture failure"));
        }

        self.frames_read.fetch_add(1, Ordering::SeqCst);
        Ok(Frame::new(
            RgbImage::new(self.width, self.height),
            Instant::now(),
        ))
    }
}

/// Recognizer reporting the scene's faces at each frame's capture time.
pub struct SimulatedRecognizer {
    scene: Arc<SimulatedScene>,
    recognition_failing: AtomicBool,
    full_passes: AtomicU64,
}

impl SimulatedRecognizer {
    pub fn new(scene: Arc<SimulatedScene>) -> Self {
        Self {
            scene,
            recognition_failing: AtomicBool::new(false),
            full_passes: AtomicU64::new(0),
        }
    }

    /// Make full recognition passes fail (the fast pass keeps working).
    pub fn set_recognition_failing(&self, failing: bool) {
        self.recognition_failing.store(failing, Ordering::SeqCst);
    }

    pub fn full_passes(&self) -> u64 {
        self.full_passes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FaceRecognizer for SimulatedRecognizer {
    async fn detect_and_recognize(&self, frame: &Frame) -> TrackingResult<Vec<RecognizedFace>> {
        self.full_passes.fetch_add(1, Ordering::SeqCst);
        if self.recognition_failing.load(Ordering::SeqCst) {
            return Err(TrackingError::detection("simulated recognition failure"));
        }
        Ok(self.scene.snapshot(frame.captured_at))
    }

    async fn detect_fast(&self, frame: &Frame) -> TrackingResult<Vec<BoundingBox>> {
        Ok(self
            .scene
            .snapshot(frame.captured_at)
            .into_iter()
            .map(|f| f.bounding_box)
            .collect())
    }
}

/// Servo transport that records every command.
#[derive(Debug, Default)]
pub struct RecordingServo {
    commands: Mutex<Vec<(ServoAxis, i32)>>,
    failing: AtomicBool,
}

impl RecordingServo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent command fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Every successful command, in order.
    pub fn commands(&self) -> Vec<(ServoAxis, i32)> {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Most recent angle sent to `axis`.
    pub fn last_angle(&self, axis: ServoAxis) -> Option<i32> {
        self.commands()
            .iter()
            .rev()
            .find(|(a, _)| *a == axis)
            .map(|(_, angle)| *angle)
    }

    pub fn clear(&self) {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[async_trait]
impl ServoTransport for RecordingServo {
    async fn send_command(&self, axis: ServoAxis, angle: i32) -> TrackingResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TrackingError::servo("simulated servo failure"));
        }
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((axis, angle));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_scene_moves_faces() {
        let scene = SimulatedScene::new();
        scene.add(ScriptedFace::still("sophia", 0.9, Point::new(100.0, 100.0)).moving(Point::new(50.0, 0.0)));

        tokio::time::advance(Duration::from_secs(2)).await;
        let faces = scene.snapshot(Instant::now());
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].bounding_box.center(), Point::new(200.0, 100.0));

        scene.remove("sophia");
        assert!(scene.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_occluded_face_keeps_moving() {
        let scene = SimulatedScene::new();
        scene.add(ScriptedFace::still("marcus", 0.9, Point::new(100.0, 100.0)).moving(Point::new(0.0, 20.0)));

        scene.set_occluded("marcus", true);
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(scene.snapshot(Instant::now()).is_empty());
        assert_eq!(scene.len(), 1);

        scene.set_occluded("marcus", false);
        let faces = scene.snapshot(Instant::now());
        assert_eq!(faces[0].bounding_box.center(), Point::new(100.0, 120.0));
    }

    #[tokio::test]
    async fn test_camera_failure_injection() {
        let camera = SimulatedCamera::new(320, 240);
        camera.fail_next(2);
        assert!(camera.read_frame().await.is_err());
        assert!(camera.read_frame().await.is_err());
        let frame = camera.read_frame().await.unwrap();
        assert_eq!(frame.width(), 320);
        assert_eq!(camera.frames_read(), 1);
    }

    #[tokio::test]
    async fn test_recognizer_fast_pass_has_no_identities() {
        let scene = SimulatedScene::new();
        scene.add(ScriptedFace::still("eladriel", 0.8, Point::new(50.0, 60.0)));
        let recognizer = SimulatedRecognizer::new(scene);

        let frame = Frame::blank(320, 240);
        let boxes = recognizer.detect_fast(&frame).await.unwrap();
        assert_eq!(boxes.len(), 1);

        recognizer.set_recognition_failing(true);
        assert!(recognizer.detect_and_recognize(&frame).await.is_err());
        assert_eq!(recognizer.full_passes(), 1);
    }

    #[tokio::test]
    async fn test_recording_servo() {
        let servo = RecordingServo::new();
        servo.send_command(ServoAxis::Pan, 100).await.unwrap();
        servo.send_command(ServoAxis::Tilt, 80).await.unwrap();
        servo.send_command(ServoAxis::Pan, 110).await.unwrap();
        assert_eq!(servo.last_angle(ServoAxis::Pan), Some(110));
        assert_eq!(servo.commands().len(), 3);

        servo.set_failing(true);
        assert!(servo.send_command(ServoAxis::Pan, 120).await.is_err());
        assert_eq!(servo.commands().len(), 3);
    }
}
