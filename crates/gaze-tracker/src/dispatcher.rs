//! Servo command dispatcher.
//!
//! Every gimbal move goes through here: angles are clamped to the servo
//! limits, unchanged whole-degree angles are suppressed, and a global quota
//! caps the command rate. Transport failures are logged and counted but never
//! propagated.

use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tracing::{debug, warn};

use gaze_models::{GimbalPose, ServoAxis};

use crate::backend::{bounded, ServoTransport};
use crate::config::ServoLimits;
use crate::metrics;

/// Command rate limiter type alias.
pub type CommandRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Result of dispatching one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisOutcome {
    Sent,
    /// Same whole-degree angle as the last command
    Unchanged,
    /// Dropped by the command quota
    Throttled,
    Failed,
}

impl AxisOutcome {
    /// Whether the actuator is now at the requested angle.
    pub fn reached(&self) -> bool {
        matches!(self, AxisOutcome::Sent | AxisOutcome::Unchanged)
    }
}

/// Result of one two-axis move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatchReport {
    /// Pose after the move; axes that were not reached keep their old angle
    pub pose: GimbalPose,
    pub pan: AxisOutcome,
    pub tilt: AxisOutcome,
}

impl DispatchReport {
    pub fn failures(&self) -> u64 {
        [self.pan, self.tilt]
            .iter()
            .filter(|o| **o == AxisOutcome::Failed)
            .count() as u64
    }
}

/// Sends clamped pan/tilt commands to the servo transport.
pub struct ServoDispatcher {
    transport: Arc<dyn ServoTransport>,
    limits: ServoLimits,
    io_timeout: Duration,
    limiter: CommandRateLimiter,
    /// Last whole-degree angle sent per axis (pan, tilt)
    last_sent: Mutex<[Option<i32>; 2]>,
}

impl ServoDispatcher {
    pub fn new(transport: Arc<dyn ServoTransport>, limits: ServoLimits, io_timeout: Duration) -> Self {
        let per_second = NonZeroU32::new(limits.max_commands_per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            transport,
            limiter: RateLimiter::direct(Quota::per_second(per_second)),
            limits,
            io_timeout,
            last_sent: Mutex::new([None, None]),
        }
    }

    pub fn limits(&self) -> &ServoLimits {
        &self.limits
    }

    /// Move toward `(pan, tilt)`, subject to suppression and the quota.
    pub async fn move_to(&self, from: &GimbalPose, pan: f64, tilt: f64) -> DispatchReport {
        self.dispatch(from, pan, tilt, false).await
    }

    /// Move to `(pan, tilt)`, bypassing suppression and the quota.
    pub async fn force_move(&self, from: &GimbalPose, pan: f64, tilt: f64) -> DispatchReport {
        self.dispatch(from, pan, tilt, true).await
    }

    /// Forced move to the rest pose.
    pub async fn center(&self, from: &GimbalPose) -> DispatchReport {
        let rest = from.rest();
        self.force_move(from, rest.pan, rest.tilt).await
    }

    async fn dispatch(&self, from: &GimbalPose, pan: f64, tilt: f64, force: bool) -> DispatchReport {
        let pan = self.limits.clamp(pan);
        let tilt = self.limits.clamp(tilt);

        // Pan first, then tilt
        let pan_outcome = self.send_axis(ServoAxis::Pan, pan, force).await;
        let tilt_outcome = self.send_axis(ServoAxis::Tilt, tilt, force).await;

        let mut pose = *from;
        if pan_outcome.reached() {
            pose.pan = pan;
        }
        if tilt_outcome.reached() {
            pose.tilt = tilt;
        }

        DispatchReport {
            pose,
            pan: pan_outcome,
            tilt: tilt_outcome,
        }
    }

    async fn send_axis(&self, axis: ServoAxis, angle: f64, force: bool) -> AxisOutcome {
        let degrees = angle.round() as i32;
        let slot = axis_slot(axis);

        if !force {
            if self.last_sent()[slot] == Some(degrees) {
                return AxisOutcome::Unchanged;
            }
            if self.limiter.check().is_err() {
                metrics::record_servo_throttled(axis);
                debug!(axis = %axis, angle = degrees, "Servo command throttled");
                return AxisOutcome::Throttled;
            }
        }

        match bounded(
            "send_command",
            self.io_timeout,
            self.transport.send_command(axis, degrees),
        )
        .await
        {
            Ok(()) => {
                self.last_sent()[slot] = Some(degrees);
                metrics::record_servo_command(axis);
                AxisOutcome::Sent
            }
            Err(e) => {
                // Unknown actuator state; resend next time
                self.last_sent()[slot] = None;
                metrics::record_servo_failure(axis);
                warn!(axis = %axis, angle = degrees, error = %e, "Servo command failed");
                AxisOutcome::Failed
            }
        }
    }

    fn last_sent(&self) -> std::sync::MutexGuard<'_, [Option<i32>; 2]> {
        self.last_sent.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn axis_slot(axis: ServoAxis) -> usize {
    match axis {
        ServoAxis::Pan => 0,
        ServoAxis::Tilt => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockServoTransport;
    use crate::error::{TrackingError, TrackingResult};
    use async_trait::async_trait;

    const TIMEOUT: Duration = Duration::from_millis(250);

    fn rest() -> GimbalPose {
        GimbalPose::at_rest(90.0, 90.0)
    }

    fn dispatcher(transport: MockServoTransport, quota: u32) -> ServoDispatcher {
        ServoDispatcher::new(
            Arc::new(transport),
            ServoLimits {
                max_commands_per_second: quota,
                ..Default::default()
            },
            TIMEOUT,
        )
    }

    #[tokio::test]
    async fn test_angles_are_clamped() {
        let mut transport = MockServoTransport::new();
        transport
            .expect_send_command()
            .withf(|_, angle| (20..=160).contains(angle))
            .times(4)
            .returning(|_, _| Ok(()));

        let d = dispatcher(transport, 100);
        let report = d.move_to(&rest(), 500.0, -40.0).await;
        assert_eq!(report.pose.pan, 160.0);
        assert_eq!(report.pose.tilt, 20.0);

        let report = d.move_to(&report.pose, -500.0, 400.0).await;
        assert_eq!((report.pose.pan, report.pose.tilt), (20.0, 160.0));
    }

    #[tokio::test]
    async fn test_pan_is_sent_before_tilt() {
        let mut seq = mockall::Sequence::new();
        let mut transport = MockServoTransport::new();
        transport
            .expect_send_command()
            .withf(|axis, angle| *axis == ServoAxis::Pan && *angle == 100)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        transport
            .expect_send_command()
            .withf(|axis, angle| *axis == ServoAxis::Tilt && *angle == 80)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let d = dispatcher(transport, 100);
        d.move_to(&rest(), 100.0, 80.0).await;
    }

    #[tokio::test]
    async fn test_unchanged_angles_are_suppressed() {
        let mut transport = MockServoTransport::new();
        transport.expect_send_command().times(2).returning(|_, _| Ok(()));

        let d = dispatcher(transport, 100);
        let first = d.move_to(&rest(), 95.0, 85.0).await;
        let second = d.move_to(&first.pose, 95.3, 84.8).await;

        assert_eq!(second.pan, AxisOutcome::Unchanged);
        assert_eq!(second.tilt, AxisOutcome::Unchanged);
        // Sub-degree progress is still tracked
        assert_eq!(second.pose.pan, 95.3);
    }

    #[tokio::test]
    async fn test_failure_keeps_old_angle() {
        let mut transport = MockServoTransport::new();
        transport
            .expect_send_command()
            .withf(|axis, _| *axis == ServoAxis::Pan)
            .returning(|_, _| Err(TrackingError::servo("serial port closed")));
        transport
            .expect_send_command()
            .withf(|axis, _| *axis == ServoAxis::Tilt)
            .returning(|_, _| Ok(()));

        let d = dispatcher(transport, 100);
        let report = d.move_to(&rest(), 120.0, 70.0).await;

        assert_eq!(report.pan, AxisOutcome::Failed);
        assert_eq!(report.failures(), 1);
        assert_eq!(report.pose.pan, 90.0);
        assert_eq!(report.pose.tilt, 70.0);
    }

    #[tokio::test]
    async fn test_quota_throttles_but_forced_moves_bypass() {
        let mut transport = MockServoTransport::new();
        transport.expect_send_command().times(3).returning(|_, _| Ok(()));

        let d = dispatcher(transport, 1);
        let report = d.move_to(&rest(), 100.0, 100.0).await;
        assert_eq!(report.pan, AxisOutcome::Sent);
        assert_eq!(report.tilt, AxisOutcome::Throttled);
        assert_eq!(report.pose.tilt, 90.0);

        let report = d.center(&report.pose).await;
        assert_eq!(report.pan, AxisOutcome::Sent);
        assert_eq!(report.tilt, AxisOutcome::Sent);
        assert_eq!(report.pose, rest());
    }

    struct StalledTransport;

    #[async_trait]
    impl ServoTransport for StalledTransport {
        async fn send_command(&self, _axis: ServoAxis, _angle: i32) -> TrackingResult<()> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_transport_times_out() {
        let d = ServoDispatcher::new(Arc::new(StalledTransport), ServoLimits::default(), TIMEOUT);
        let report = d.force_move(&rest(), 100.0, 100.0).await;
        assert_eq!(report.failures(), 2);
        assert_eq!(report.pose, rest());
    }
}
