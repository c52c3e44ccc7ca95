//! Tracking orchestrator.
//!
//! [`TrackingEngine`] owns every piece of mutable tracking state behind one
//! mutex and runs the real-time loop on a dedicated tokio task. Public calls
//! are safe from any task while the loop runs; context changes take effect
//! on the next iteration.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn, Instrument};

use gaze_models::{
    Command, ConversationStage, GimbalPose, Point, SessionId, StatusSnapshot, TargetSummary,
    TrackingPriority, TrackingStats,
};

use crate::backend::{bounded, FaceRecognizer, FrameSource, ServoTransport};
use crate::config::TrackingConfig;
use crate::context::ConversationContext;
use crate::dispatcher::{DispatchReport, ServoDispatcher};
use crate::error::{TrackingError, TrackingResult};
use crate::logging::SessionLogger;
use crate::metrics;
use crate::observer::FaceObserver;
use crate::search::{SearchAction, SearchController};
use crate::selector::TargetSelector;
use crate::smoother::{AimMapper, PredictiveSmoother};

/// The face currently being followed. Kept through short detection gaps
/// and cleared once the loss timeout expires.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedTarget {
    pub identity: String,
    pub priority: TrackingPriority,
    /// Last observed center in frame pixels
    pub center: Point,
    /// Predicted point the gimbal was last aimed at
    pub last_aim_point: Point,
    /// Pixels per second, x and y
    pub velocity_estimate: Point,
    pub last_seen: Instant,
}

impl TrackedTarget {
    fn summary(&self, now: Instant) -> TargetSummary {
        TargetSummary {
            identity: self.identity.clone(),
            priority: self.priority,
            aim_point: self.last_aim_point,
            velocity: self.velocity_estimate,
            last_seen_ms: now.saturating_duration_since(self.last_seen).as_millis() as u64,
        }
    }
}

/// State shared between the control API and the loop.
struct SharedState {
    initialized: bool,
    running: bool,
    /// Bumped per session; a worker from an older session exits
    generation: u64,
    session: Option<SessionId>,
    context: ConversationContext,
    target: Option<TrackedTarget>,
    search: SearchController,
    pose: GimbalPose,
    pending_manual: Option<(f64, f64)>,
    force_search: bool,
    last_seen: Instant,
    stats: TrackingStats,
}

impl SharedState {
    fn ensure_initialized(&self) -> TrackingResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(TrackingError::NotInitialized)
        }
    }
}

type Shared = Arc<Mutex<SharedState>>;

fn lock(shared: &Mutex<SharedState>) -> MutexGuard<'_, SharedState> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Face-priority tracking engine.
pub struct TrackingEngine {
    config: TrackingConfig,
    frame_source: Arc<dyn FrameSource>,
    recognizer: Arc<dyn FaceRecognizer>,
    dispatcher: Arc<ServoDispatcher>,
    shared: Shared,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TrackingEngine {
    pub fn new(
        config: TrackingConfig,
        frame_source: Arc<dyn FrameSource>,
        recognizer: Arc<dyn FaceRecognizer>,
        servo: Arc<dyn ServoTransport>,
    ) -> Self {
        let limits = config.servo.clone();
        let pose = GimbalPose::at_rest(limits.pan_center, limits.tilt_center);
        let dispatcher = Arc::new(ServoDispatcher::new(servo, limits.clone(), config.io_timeout()));

        let shared = SharedState {
            initialized: false,
            running: false,
            generation: 0,
            session: None,
            context: ConversationContext::default(),
            target: None,
            search: SearchController::new(config.search.clone(), limits.pan_center, limits.tilt_center),
            pose,
            pending_manual: None,
            force_search: false,
            last_seen: Instant::now(),
            stats: TrackingStats::default(),
        };

        Self {
            config,
            frame_source,
            recognizer,
            dispatcher,
            shared: Arc::new(Mutex::new(shared)),
            worker: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    /// Validate configuration, probe the camera and center the gimbal.
    ///
    /// Returns `false` when the engine must not start.
    pub async fn initialize(&self) -> bool {
        if lock(&self.shared).initialized {
            return true;
        }

        if let Err(e) = self.config.validate() {
            error!(error = %e, "Refusing to initialize tracking");
            return false;
        }

        match bounded(
            "read_frame",
            self.config.io_timeout(),
            self.frame_source.read_frame(),
        )
        .await
        {
            Ok(frame) => {
                info!(width = frame.width(), height = frame.height(), "Camera ready");
            }
            Err(e) => {
                error!(error = %e, "Camera probe failed");
                return false;
            }
        }

        let pose = lock(&self.shared).pose;
        let report = self.dispatcher.center(&pose).await;
        if report.failures() > 0 {
            warn!("Servo did not acknowledge the initial centering move");
        }

        let mut state = lock(&self.shared);
        state.pose = report.pose;
        state.stats.servo_failures += report.failures();
        state.initialized = true;
        info!(
            priority_identities = ?self.config.normalized_priority_identities(),
            "Tracking engine initialized"
        );
        true
    }

    /// Start the tracking loop. Returns whether tracking is running.
    pub async fn start_tracking(&self, conversation_mode: bool) -> bool {
        let (generation, logger) = {
            let mut state = lock(&self.shared);
            if let Err(e) = state.ensure_initialized() {
                warn!(error = %e, "Cannot start tracking");
                return false;
            }
            if state.running {
                debug!("Tracking already running");
                return true;
            }

            let target = state.context.target_identity.clone();
            state.context.set_mode(conversation_mode, target.as_deref());
            state.running = true;
            state.generation += 1;
            state.target = None;
            state.pending_manual = None;
            state.last_seen = Instant::now();
            state.search.reset();

            let session = SessionId::new();
            let logger = SessionLogger::new(&session, conversation_mode);
            state.session = Some(session);
            (state.generation, logger)
        };

        logger.log_start(self.config.target_loop_hz);
        metrics::set_tracking_active(true);

        let worker = TrackingWorker::new(
            generation,
            self.config.clone(),
            Arc::clone(&self.shared),
            Arc::clone(&self.frame_source),
            Arc::clone(&self.recognizer),
            Arc::clone(&self.dispatcher),
            logger.clone(),
        );
        let handle = tokio::spawn(worker.run().instrument(logger.create_span()));

        let previous = self.worker_slot().replace(handle);
        if let Some(stale) = previous {
            stale.abort();
        }
        true
    }

    /// Stop the loop, wait for it with a bounded timeout and center the
    /// gimbal. Calling it while stopped does nothing.
    pub async fn stop_tracking(&self) {
        let was_running = {
            let mut state = lock(&self.shared);
            let was_running = state.running;
            state.running = false;
            was_running
        };

        let handle = self.worker_slot().take();
        if !was_running && handle.is_none() {
            return;
        }

        if let Some(mut handle) = handle {
            let join_timeout = self.config.stop_join_timeout();
            if tokio::time::timeout(join_timeout, &mut handle).await.is_err() {
                warn!(
                    timeout_ms = join_timeout.as_millis() as u64,
                    "Tracking worker did not exit in time, aborting it"
                );
                handle.abort();
            }
        }

        let pose = lock(&self.shared).pose;
        let report = self.dispatcher.center(&pose).await;

        let mut state = lock(&self.shared);
        state.pose = report.pose;
        state.stats.servo_failures += report.failures();
        state.target = None;
        state.pending_manual = None;
        state.force_search = false;
        state.search.reset();
        state.session = None;
        metrics::set_tracking_active(false);
        info!("Tracking stopped, gimbal centered");
    }

    /// Enter or leave conversation mode.
    pub fn set_conversation_mode(&self, active: bool, target_identity: Option<String>) {
        let mut state = lock(&self.shared);
        state.context.set_mode(active, target_identity.as_deref());
        info!(
            active,
            target = ?state.context.target_identity,
            "Conversation mode updated"
        );
    }

    pub fn set_conversation_stage(&self, stage: ConversationStage) {
        let mut state = lock(&self.shared);
        state.context.stage = stage;
        debug!(stage = %stage, "Conversation stage updated");
    }

    /// Handle a control command. Returns a human-readable response, or
    /// `None` when the engine has not been initialized.
    pub async fn process_manual_command(&self, command: Command) -> Option<String> {
        let started = Instant::now();
        let conversation_active = {
            let state = lock(&self.shared);
            if let Err(e) = state.ensure_initialized() {
                debug!(command = %command, error = %e, "Ignoring command");
                return None;
            }
            state.context.active
        };

        metrics::record_manual_command(command.as_str());
        let step = self.config.manual_step_degrees;

        let response = match command {
            Command::LookAtMe => {
                if self.start_tracking(conversation_active).await {
                    "I'm looking for you now.".to_string()
                } else {
                    "I can't start tracking right now.".to_string()
                }
            }
            Command::StopTracking => {
                self.stop_tracking().await;
                "I've stopped tracking and I'm looking straight ahead.".to_string()
            }
            Command::WhoAreYouTracking => self.get_status().describe(),
            Command::SearchForFaces => {
                lock(&self.shared).force_search = true;
                self.start_tracking(conversation_active).await;
                "I'm looking around for faces.".to_string()
            }
            Command::LookLeft => {
                self.request_pose(|pose| (pose.pan + step, pose.tilt)).await;
                "Looking left.".to_string()
            }
            Command::LookRight => {
                self.request_pose(|pose| (pose.pan - step, pose.tilt)).await;
                "Looking right.".to_string()
            }
            Command::LookUp => {
                self.request_pose(|pose| (pose.pan, pose.tilt - step)).await;
                "Looking up.".to_string()
            }
            Command::LookDown => {
                self.request_pose(|pose| (pose.pan, pose.tilt + step)).await;
                "Looking down.".to_string()
            }
            Command::Center => {
                self.request_pose(|pose| (pose.pan_center, pose.tilt_center))
                    .await;
                "Looking straight ahead.".to_string()
            }
        };

        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        lock(&self.shared).stats.record_command(latency_ms);
        debug!(command = %command, latency_ms, "Manual command handled");
        Some(response)
    }

    /// Point-in-time status.
    pub fn get_status(&self) -> StatusSnapshot {
        let state = lock(&self.shared);
        StatusSnapshot {
            is_tracking: state.running,
            conversation_active: state.context.active,
            stage: state.context.stage,
            conversation_target: state.context.target_identity.clone(),
            current_target: state.target.as_ref().map(|t| t.identity.clone()),
            target_priority: state.target.as_ref().map(|t| t.priority),
            target: state.target.as_ref().map(|t| t.summary(Instant::now())),
            search_active: state.search.is_active(),
            search_pattern: state.search.pattern(),
            pose: state.pose,
            session_id: state.session.clone(),
            priority_identities: self.config.normalized_priority_identities(),
            stats: state.stats.clone(),
            generated_at: Utc::now(),
        }
    }

    /// Manual pose: queued for the next tick while running, applied here
    /// while stopped. Both paths clamp in the dispatcher.
    async fn request_pose<F>(&self, target: F)
    where
        F: FnOnce(&GimbalPose) -> (f64, f64),
    {
        let (running, pose) = {
            let state = lock(&self.shared);
            (state.running, state.pose)
        };
        let (pan, tilt) = target(&pose);

        if running {
            lock(&self.shared).pending_manual = Some((pan, tilt));
            return;
        }

        let report = self.dispatcher.move_to(&pose, pan, tilt).await;
        let mut state = lock(&self.shared);
        state.pose = report.pose;
        state.stats.servo_failures += report.failures();
    }

    fn worker_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for TrackingEngine {
    fn drop(&mut self) {
        lock(&self.shared).running = false;
        if let Some(handle) = self.worker_slot().take() {
            handle.abort();
        }
    }
}

enum Tick {
    Continue,
    Exit,
}

/// The loop body and its per-session state.
struct TrackingWorker {
    generation: u64,
    config: TrackingConfig,
    shared: Shared,
    frame_source: Arc<dyn FrameSource>,
    recognizer: Arc<dyn FaceRecognizer>,
    dispatcher: Arc<ServoDispatcher>,
    logger: SessionLogger,
    observer: FaceObserver,
    selector: TargetSelector,
    smoother: PredictiveSmoother,
    mapper: AimMapper,
    last_identity: Option<String>,
}

impl TrackingWorker {
    fn new(
        generation: u64,
        config: TrackingConfig,
        shared: Shared,
        frame_source: Arc<dyn FrameSource>,
        recognizer: Arc<dyn FaceRecognizer>,
        dispatcher: Arc<ServoDispatcher>,
        logger: SessionLogger,
    ) -> Self {
        Self {
            generation,
            observer: FaceObserver::new(config.observer.clone()),
            selector: TargetSelector::new(&config),
            smoother: PredictiveSmoother::new(&config.smoothing),
            mapper: AimMapper::new(config.smoothing.clone()),
            config,
            shared,
            frame_source,
            recognizer,
            dispatcher,
            logger,
            last_identity: None,
        }
    }

    async fn run(mut self) {
        let period = self.config.loop_period();
        let mut iterations = 0u64;

        loop {
            let started = Instant::now();
            if let Tick::Exit = self.tick().await {
                break;
            }
            iterations += 1;

            let work = started.elapsed();
            lock(&self.shared)
                .stats
                .record_iteration(work.as_secs_f64() * 1000.0);
            metrics::record_loop_iteration(work.as_secs_f64());

            // Overruns are not compensated; the loop just runs slower
            if let Some(remaining) = period.checked_sub(work) {
                tokio::time::sleep(remaining).await;
            }
        }

        self.logger.log_stop(iterations);
    }

    async fn tick(&mut self) -> Tick {
        let (context, pose, manual) = {
            let mut state = lock(&self.shared);
            if !state.running || state.generation != self.generation {
                return Tick::Exit;
            }
            (
                state.context.clone(),
                state.pose,
                state.pending_manual.take(),
            )
        };

        // Manual override replaces target selection for this tick
        if let Some((pan, tilt)) = manual {
            let report = self.dispatcher.move_to(&pose, pan, tilt).await;
            self.commit(report);
            return Tick::Continue;
        }

        let frame = match bounded(
            "read_frame",
            self.config.io_timeout(),
            self.frame_source.read_frame(),
        )
        .await
        {
            Ok(frame) => frame,
            Err(e) => {
                metrics::record_frame_failure(if e.is_timeout() { "timeout" } else { "error" });
                lock(&self.shared).stats.frame_failures += 1;
                self.logger.log_warning(&format!("frame skipped: {}", e));
                return Tick::Continue;
            }
        };

        let faces = self
            .observer
            .observe(self.recognizer.as_ref(), &frame, self.config.io_timeout())
            .await;
        let selection = self.selector.select(&faces, &context);
        let now = Instant::now();

        match selection {
            Some(selection) => {
                let face = selection.face;
                if self.last_identity.as_deref() != Some(face.identity.as_str()) {
                    debug!(identity = %face.identity, priority = %selection.priority, "New target");
                    self.smoother.reset();
                    self.last_identity = Some(face.identity.clone());
                }

                let aim = self.smoother.update(face.center, face.observed_at);
                let (pan, tilt) = self
                    .mapper
                    .aim(aim, frame.width(), frame.height(), &pose, &context);

                {
                    let mut state = lock(&self.shared);
                    state.search.found();
                    state.force_search = false;
                    state.last_seen = now;
                    state.target = Some(TrackedTarget {
                        identity: face.identity.clone(),
                        priority: selection.priority,
                        center: face.center,
                        last_aim_point: aim,
                        velocity_estimate: self.smoother.velocity(),
                        last_seen: now,
                    });
                }

                let report = self.dispatcher.move_to(&pose, pan, tilt).await;
                self.commit(report);
            }
            None => {
                let (action, lost) = {
                    let mut state = lock(&self.shared);

                    let since_seen = now.saturating_duration_since(state.last_seen);
                    let mut lost = since_seen >= self.config.face_lost_timeout();
                    if std::mem::take(&mut state.force_search) {
                        state.search.reset();
                        state.search.begin(now, &pose);
                        state.stats.searches_started += 1;
                        lost = true;
                    } else if state
                        .search
                        .should_start(since_seen, self.config.face_lost_timeout())
                    {
                        state.search.begin(now, &pose);
                        state.stats.searches_started += 1;
                    }

                    // Short gaps keep the target and its motion history
                    if lost {
                        if let Some(target) = state.target.take() {
                            debug!(identity = %target.identity, "Target lost");
                        }
                    }
                    (state.search.tick(now, &pose, context.active), lost)
                };

                if lost && self.last_identity.take().is_some() {
                    self.smoother.reset();
                }

                match action {
                    SearchAction::Hold => {}
                    SearchAction::MoveTo { pan, tilt } => {
                        let report = self.dispatcher.move_to(&pose, pan, tilt).await;
                        self.commit(report);
                    }
                    SearchAction::ReturnToRest => {
                        let report = self.dispatcher.center(&pose).await;
                        self.commit(report);
                    }
                }
            }
        }

        Tick::Continue
    }

    fn commit(&self, report: DispatchReport) {
        let mut state = lock(&self.shared);
        if state.generation != self.generation {
            return;
        }
        state.pose = report.pose;
        state.stats.servo_failures += report.failures();
    }
}
