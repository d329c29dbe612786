//! Path follower state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

// External
use log::{debug, info, trace, warn};
use serde::Serialize;

// Internal
use super::*;
use crate::{
    loc::{Pose, Twist},
    path::Path,
    profile::{
        CompletionBehaviour, MotionState, ProfileConstraints, ProfileError, ProfileFollower,
        ProfileGoal, TravelPolicy,
    },
    pursuit_ctrl::{PursuitCtrl, PursuitCtrlError, SteeringCommand},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Closed loop path following controller combining pursuit steering and profiled speed control.
pub struct PathFollower {
    params: FollowerParams,

    steering: PursuitCtrl,

    velocity: ProfileFollower,

    /// The steering delta used for the output, kept once steering finishes
    last_steering_delta: Twist,

    last_steering_cmd: Option<SteeringCommand>,

    remaining_path_length_m: f64,

    /// True once the follower has run at least one steering update
    has_steered: bool,

    /// Heading correction frozen
    done_steering: bool,

    /// Time at which the auto stop timer started
    auto_stop_start_s: Option<f64>,

    force_finish: Arc<AtomicBool>,

    /// Count of cycles where a degenerate steering delta forced a zero output
    num_degenerate_cycles: u64,

    events: Vec<FollowEvent>,

    flags: TransitionFlags,

    report: FollowReport,
}

/// A handle which finishes the follower it was taken from, usable from any thread.
#[derive(Debug, Clone)]
pub struct FinishHandle(Arc<AtomicBool>);

/// The status report of the latest cycle, flat so it can be archived as a CSV row.
#[derive(Debug, Default, Copy, Clone, Serialize)]
pub struct FollowReport {
    pub time_s: f64,
    pub remaining_path_length_m: f64,
    pub cross_track_error_m: f64,
    pub lookahead_x_m: f64,
    pub lookahead_y_m: f64,
    pub max_velocity_ms: f64,
    pub end_velocity_ms: f64,
    pub goal_pos_m: f64,
    pub setpoint_pos_m: f64,
    pub setpoint_vel_ms: f64,
    pub setpoint_acc_mss: f64,
    pub velocity_cmd_ms: f64,
    pub linear_ms: f64,
    pub angular_rads: f64,
    pub done_steering: bool,
    pub steering_finished: bool,
    pub profile_finished: bool,
    pub on_target: bool,
    pub finished: bool,
    pub degenerate_delta: bool,
}

/// Last seen value of every condition that raises an event.
#[derive(Debug, Default, Copy, Clone)]
struct TransitionFlags {
    steering_finished: bool,
    profile_finished: bool,
    on_target: bool,
    finished: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Notable transitions of the follower, each raised once when it happens.
#[derive(Debug, Copy, Clone, Serialize, PartialEq, Eq)]
pub enum FollowEvent {
    /// Heading correction has been frozen
    DoneSteering,

    /// The vehicle is close to the end and the auto stop timer has started
    AutoStopArmed,

    /// The auto stop timer expired and the follower finished itself
    AutoStopFired,

    /// Pursuit control has reached the end of the path
    SteeringFinished,

    /// The end of the motion profile has been reached
    ProfileFinished,

    /// The vehicle has come within the goal tolerances
    OnTarget,

    /// The follower is finished
    Finished,
}

#[derive(Debug, thiserror::Error)]
pub enum FollowError {
    #[error("Invalid follower parameters: {0}")]
    InvalidParams(String),

    #[error("Invalid motion constraints: {0}")]
    InvalidConstraints(ProfileError),

    #[error("Could not create the steering controller: {0}")]
    PursuitCtrlError(PursuitCtrlError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PathFollower {
    /// Create a new follower for the given path.
    pub fn new(path: Arc<Path>, params: Params) -> Result<Self, FollowError> {
        params
            .follower
            .validate()
            .map_err(FollowError::InvalidParams)?;

        ProfileConstraints::new(
            params.follower.max_vel_ms,
            params.follower.max_accel_mss,
            params.follower.max_decel_mss,
        )
        .map_err(FollowError::InvalidConstraints)?;

        let policy = if path.is_reversed() {
            TravelPolicy::ReverseOnly
        } else {
            TravelPolicy::ForwardOnly
        };

        let steering =
            PursuitCtrl::new(path, params.pursuit).map_err(FollowError::PursuitCtrlError)?;

        Ok(Self {
            params: params.follower,
            steering,
            velocity: ProfileFollower::new(params.profile, policy),
            last_steering_delta: Twist::identity(),
            last_steering_cmd: None,
            remaining_path_length_m: 0.0,
            has_steered: false,
            done_steering: false,
            auto_stop_start_s: None,
            force_finish: Arc::new(AtomicBool::new(false)),
            num_degenerate_cycles: 0,
            events: Vec::new(),
            flags: TransitionFlags::default(),
            report: FollowReport::default(),
        })
    }

    /// Run one control cycle.
    ///
    /// `displacement_m` and `velocity_ms` are the signed distance travelled and longitudinal
    /// speed of the vehicle. The returned twist is a body frame velocity whose angular component
    /// is positive clockwise, the convention of the drivetrain.
    pub fn update(
        &mut self,
        t_s: f64,
        pose: &Pose,
        displacement_m: f64,
        velocity_ms: f64,
    ) -> Twist {
        self.report = FollowReport {
            time_s: t_s,
            ..FollowReport::default()
        };

        // ---- STEERING ----

        if !self.steering.is_finished() {
            let cmd = self.steering.update(pose);
            let mut delta = cmd.delta;

            self.has_steered = true;
            self.remaining_path_length_m = cmd.remaining_path_length_m;

            if cmd.remaining_path_length_m < self.params.stop_steering_distance_m
                && !self.done_steering
            {
                self.done_steering = true;
                self.raise(FollowEvent::DoneSteering);
            }
            if self.done_steering {
                delta.dtheta = 0.0;
            }
            self.last_steering_delta = delta;

            self.update_auto_stop(t_s);

            let goal = ProfileGoal::new(
                displacement_m + delta.dx,
                cmd.end_velocity_ms.abs(),
                CompletionBehaviour::ViolateMaxAccel,
                self.params.goal_pos_tolerance_m,
                self.params.goal_vel_tolerance_ms,
            );
            let constraints = ProfileConstraints {
                max_vel_ms: self.params.max_vel_ms.min(cmd.max_velocity_ms.abs()),
                max_accel_mss: self.params.max_accel_mss,
                max_decel_mss: self.params.max_decel_mss,
            };

            if let Err(e) = self.velocity.set_goal_and_constraints(goal, constraints) {
                warn!("Profile goal rejected, holding previous goal: {}", e);
            }

            self.last_steering_cmd = Some(cmd);
        }

        // ---- VELOCITY ----

        let measured = MotionState::new(t_s, displacement_m, velocity_ms, 0.0);
        let velocity_cmd_ms = self.velocity.update(&measured, t_s);
        let setpoint = self.velocity.setpoint().unwrap_or_default();

        // ---- FUSION ----

        let twist = match fuse_curvature(
            &self.last_steering_delta,
            velocity_cmd_ms,
            setpoint.vel_ms,
            self.params.inertia_steering_gain,
            self.params.max_yaw_rate_rads,
        ) {
            Some(t) => t,
            None => {
                self.num_degenerate_cycles += 1;
                self.report.degenerate_delta = true;
                debug!(
                    "Degenerate steering delta {:?}, commanding zero ({} cycles so far)",
                    self.last_steering_delta, self.num_degenerate_cycles
                );
                Twist::identity()
            }
        };

        self.update_flags();
        self.fill_report(velocity_cmd_ms, &setpoint, &twist);

        trace!(
            "t {:.3} s, remaining {:.3} m, setpoint {:.3} m {:.3} m/s, output {:?}",
            t_s,
            self.remaining_path_length_m,
            setpoint.pos_m,
            setpoint.vel_ms,
            twist
        );

        twist
    }

    /// True once steering and the profile have finished and the vehicle is on target, or the
    /// follower has been forced to finish.
    pub fn is_finished(&self) -> bool {
        (self.steering.is_finished()
            && self.velocity.is_finished_profile()
            && self.velocity.on_target())
            || self.force_finish.load(Ordering::SeqCst)
    }

    /// Finish the follower immediately.
    pub fn force_finish(&self) {
        self.force_finish.store(true, Ordering::SeqCst);
    }

    /// Get a handle which can finish this follower from elsewhere.
    pub fn finish_handle(&self) -> FinishHandle {
        FinishHandle(self.force_finish.clone())
    }

    /// Path length between the vehicle and the end of the path, zero before the first cycle.
    pub fn remaining_path_length_m(&self) -> f64 {
        self.remaining_path_length_m
    }

    /// True once the remaining path is shorter than `distance_m`, or the follower is finished.
    pub fn remaining_within(&self, distance_m: f64) -> bool {
        (self.has_steered && self.remaining_path_length_m < distance_m) || self.is_finished()
    }

    pub fn steering_finished(&self) -> bool {
        self.steering.is_finished()
    }

    pub fn profile_finished(&self) -> bool {
        self.velocity.is_finished_profile()
    }

    pub fn on_target(&self) -> bool {
        self.velocity.on_target()
    }

    pub fn done_steering(&self) -> bool {
        self.done_steering
    }

    pub fn last_steering_command(&self) -> Option<&SteeringCommand> {
        self.last_steering_cmd.as_ref()
    }

    pub fn num_degenerate_cycles(&self) -> u64 {
        self.num_degenerate_cycles
    }

    pub fn report(&self) -> FollowReport {
        self.report
    }

    /// Take all events raised since the last call.
    pub fn take_events(&mut self) -> Vec<FollowEvent> {
        std::mem::take(&mut self.events)
    }

    fn update_auto_stop(&mut self, t_s: f64) {
        if self.auto_stop_start_s.is_none()
            && self.remaining_path_length_m < self.params.auto_stop_distance_m
        {
            self.auto_stop_start_s = Some(t_s);
            self.raise(FollowEvent::AutoStopArmed);
        }

        if let Some(start_s) = self.auto_stop_start_s {
            if t_s - start_s > self.params.auto_stop_dwell_s
                && !self.force_finish.load(Ordering::SeqCst)
            {
                warn!(
                    "Vehicle has been within {} m of the end for over {} s, finishing",
                    self.params.auto_stop_distance_m, self.params.auto_stop_dwell_s
                );
                self.force_finish();
                self.raise(FollowEvent::AutoStopFired);
            }
        }
    }

    /// Raise events for every condition that has become true this cycle.
    fn update_flags(&mut self) {
        let now = TransitionFlags {
            steering_finished: self.steering_finished(),
            profile_finished: self.profile_finished(),
            on_target: self.on_target(),
            finished: self.is_finished(),
        };
        let prev = self.flags;

        if now.steering_finished && !prev.steering_finished {
            self.raise(FollowEvent::SteeringFinished);
        }
        if now.profile_finished && !prev.profile_finished {
            self.raise(FollowEvent::ProfileFinished);
        }
        if now.on_target && !prev.on_target {
            self.raise(FollowEvent::OnTarget);
        }
        if now.finished && !prev.finished {
            self.raise(FollowEvent::Finished);
        }

        self.flags = now;
    }

    fn raise(&mut self, event: FollowEvent) {
        info!(
            "{:?} with {:.3} m of path remaining",
            event, self.remaining_path_length_m
        );
        self.events.push(event);
    }

    fn fill_report(&mut self, velocity_cmd_ms: f64, setpoint: &MotionState, twist: &Twist) {
        let r = &mut self.report;

        r.remaining_path_length_m = self.remaining_path_length_m;
        if let Some(ref cmd) = self.last_steering_cmd {
            r.cross_track_error_m = cmd.cross_track_error_m;
            r.lookahead_x_m = cmd.lookahead_point_m[0];
            r.lookahead_y_m = cmd.lookahead_point_m[1];
            r.max_velocity_ms = cmd.max_velocity_ms;
            r.end_velocity_ms = cmd.end_velocity_ms;
        }
        r.goal_pos_m = self.velocity.goal().map_or(0.0, |g| g.target_pos_m);
        r.setpoint_pos_m = setpoint.pos_m;
        r.setpoint_vel_ms = setpoint.vel_ms;
        r.setpoint_acc_mss = setpoint.acc_mss;
        r.velocity_cmd_ms = velocity_cmd_ms;
        r.linear_ms = twist.dx;
        r.angular_rads = twist.dtheta;
        r.done_steering = self.done_steering;
        r.steering_finished = self.flags.steering_finished;
        r.profile_finished = self.flags.profile_finished;
        r.on_target = self.flags.on_target;
        r.finished = self.flags.finished;
    }
}

impl FinishHandle {
    pub fn force_finish(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Largest curvature that can be driven at the given speed without exceeding the yaw rate limit.
///
/// Unbounded when stationary.
pub fn max_curvature(max_yaw_rate_rads: f64, speed_ms: f64) -> f64 {
    if speed_ms.abs() > f64::EPSILON {
        max_yaw_rate_rads / speed_ms.abs()
    } else {
        f64::INFINITY
    }
}

/// Combine a steering delta and a velocity command into an output velocity twist.
///
/// The delta's curvature is preserved, scaled up with speed by the inertia gain when it's within
/// the yaw rate limit. The output angular component is positive clockwise.
///
/// Returns `None` if the delta has zero length or the result isn't finite.
pub fn fuse_curvature(
    delta: &Twist,
    velocity_cmd_ms: f64,
    setpoint_vel_ms: f64,
    inertia_gain: f64,
    max_yaw_rate_rads: f64,
) -> Option<Twist> {
    if delta.dx == 0.0 || !delta.is_finite() || !velocity_cmd_ms.is_finite() {
        return None;
    }

    let curvature_m = delta.curvature();
    let dtheta = if curvature_m.is_finite()
        && curvature_m.abs() < max_curvature(max_yaw_rate_rads, setpoint_vel_ms)
    {
        delta.dx * curvature_m * (1.0 + inertia_gain * setpoint_vel_ms.abs())
    } else {
        delta.dtheta
    };

    let scale = velocity_cmd_ms / delta.dx;
    let twist = Twist::new(delta.dx * scale, 0.0, -dtheta * scale);

    if twist.is_finite() {
        Some(twist)
    } else {
        None
    }
}
