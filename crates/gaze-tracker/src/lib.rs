//! Face-priority tracking and servo control engine.
//!
//! This crate provides:
//! - A face observer alternating full recognition and fast detection passes
//! - Deterministic target selection by identity, priority and confidence
//! - Two-stage predictive smoothing of the gimbal aim
//! - A sweep/look-up search controller with a timeout
//! - A clamping, rate-limited servo command dispatcher
//! - The real-time tracking loop and its control API
//!
//! Cameras, recognition models and servo controllers plug in through the
//! traits in [`backend`]. Simulated versions live in [`sim`].

pub mod backend;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod face;
pub mod logging;
pub mod metrics;
pub mod observer;
pub mod orchestrator;
pub mod search;
pub mod selector;
pub mod sim;
pub mod smoother;
pub mod transport;

pub use backend::{FaceRecognizer, Frame, FrameSource, ServoTransport};
pub use config::{
    ObserverConfig, SearchConfig, ServoLimits, SmoothingConfig, TargetAbsentPolicy,
    TrackingConfig,
};
pub use context::ConversationContext;
pub use dispatcher::{AxisOutcome, DispatchReport, ServoDispatcher};
pub use error::{TrackingError, TrackingResult};
pub use face::{DetectedFace, RecognizedFace};
pub use observer::FaceObserver;
pub use orchestrator::{TrackedTarget, TrackingEngine};
pub use search::{SearchAction, SearchController, SearchState};
pub use selector::{Selection, TargetSelector};
pub use smoother::{AimMapper, PredictiveSmoother};
pub use transport::{LineServoTransport, LogServoTransport};
