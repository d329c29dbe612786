//! Motion profile follower
//!
//! The follower owns the current goal and constraints. Every call to [`ProfileFollower::update`]
//! following a change of goal replans the profile from the measured state, anchored at the time
//! of the previous cycle, and samples it at the current time. Anchoring the plan one cycle back
//! means the sample is the state the profile expects to be in at the end of the cycle that has
//! just elapsed, so the command leads the measurement by one cycle.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::trace;
use serde::Serialize;

use super::*;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Tracks a motion profile towards a goal and produces velocity commands.
pub struct ProfileFollower {
    params: Params,

    policy: TravelPolicy,

    goal: Option<ProfileGoal>,

    constraints: Option<ProfileConstraints>,

    /// Set when the goal changes so that the next update replans
    needs_replan: bool,

    profile: Option<MotionProfile>,

    setpoint: Option<MotionState>,

    latest_state: Option<MotionState>,

    /// Time of the most recent distinct update
    tick_s: Option<f64>,

    /// Time of the distinct update before `tick_s`
    prev_tick_s: Option<f64>,

    finished_profile: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Directions of travel the follower may command.
#[derive(Debug, Copy, Clone, Serialize, PartialEq, Eq)]
pub enum TravelPolicy {
    Unrestricted,
    ForwardOnly,
    ReverseOnly,
}

/// The state of the follower.
#[derive(Debug, Copy, Clone, Serialize, PartialEq, Eq)]
pub enum ProfileState {
    /// No goal has been set
    Idle,

    /// Tracking a profile towards the goal
    Profiling,

    /// Measured state is within the goal tolerances, the profile may still be running
    OnTarget,

    /// The end of the profile has been reached
    FinishedProfile,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ProfileFollower {
    pub fn new(params: Params, policy: TravelPolicy) -> Self {
        Self {
            params,
            policy,
            goal: None,
            constraints: None,
            needs_replan: false,
            profile: None,
            setpoint: None,
            latest_state: None,
            tick_s: None,
            prev_tick_s: None,
            finished_profile: false,
        }
    }

    /// Set a new goal and constraints, to be planned towards on the next update.
    ///
    /// On error the previous goal and constraints are kept.
    pub fn set_goal_and_constraints(
        &mut self,
        goal: ProfileGoal,
        constraints: ProfileConstraints,
    ) -> Result<(), ProfileError> {
        constraints.validate()?;
        goal.validate()?;

        if let Some(state) = self.latest_state {
            let behind = match self.policy {
                TravelPolicy::Unrestricted => false,
                TravelPolicy::ForwardOnly => {
                    goal.target_pos_m < state.pos_m - goal.pos_tolerance_m
                }
                TravelPolicy::ReverseOnly => {
                    goal.target_pos_m > state.pos_m + goal.pos_tolerance_m
                }
            };

            if behind {
                return Err(ProfileError::InfeasibleGoal {
                    target_m: goal.target_pos_m,
                    current_m: state.pos_m,
                });
            }
        }

        self.goal = Some(goal);
        self.constraints = Some(constraints);
        self.needs_replan = true;
        self.finished_profile = false;

        Ok(())
    }

    /// Compute the velocity command for the measured state at time `t_s`.
    ///
    /// Repeated calls with the same inputs and no change of goal in between give the same command.
    pub fn update(&mut self, measured: &MotionState, t_s: f64) -> f64 {
        match self.tick_s {
            Some(tick) if t_s > tick => {
                self.prev_tick_s = Some(tick);
                self.tick_s = Some(t_s);
            }
            Some(_) => (),
            None => self.tick_s = Some(t_s),
        }
        self.latest_state = Some(*measured);

        let (goal, constraints) = match (self.goal, self.constraints) {
            (Some(g), Some(c)) => (g, c),
            _ => {
                self.setpoint = None;
                return 0.0;
            }
        };

        if self.needs_replan || self.profile.is_none() {
            let anchor = MotionState::new(
                self.prev_tick_s.unwrap_or(t_s),
                measured.pos_m,
                measured.vel_ms,
                0.0,
            );
            let profile = generate_profile(&constraints, &goal, &anchor);
            trace!(
                "Replanned profile: {} segments, ends at {:.3} s",
                profile.segments().len(),
                profile.end_time_s()
            );

            self.profile = Some(profile);
            self.needs_replan = false;
        }

        let mut setpoint = match self.profile {
            Some(ref p) => {
                if p.is_empty() || t_s >= p.end_time_s() {
                    self.finished_profile = true;
                    MotionState::new(t_s, goal.target_pos_m, p.end_state().vel_ms, 0.0)
                } else {
                    p.sample(t_s)
                }
            }
            None => return 0.0,
        };

        setpoint.vel_ms = match self.policy {
            TravelPolicy::Unrestricted => setpoint.vel_ms,
            TravelPolicy::ForwardOnly => setpoint.vel_ms.max(0.0),
            TravelPolicy::ReverseOnly => setpoint.vel_ms.min(0.0),
        };
        self.setpoint = Some(setpoint);

        let acc_ff = if setpoint.acc_mss.is_finite() {
            self.params.kffa * setpoint.acc_mss
        } else {
            0.0
        };

        let output = self.params.kffv * setpoint.vel_ms
            + acc_ff
            + self.params.kp * (setpoint.pos_m - measured.pos_m)
            + self.params.kv * (setpoint.vel_ms - measured.vel_ms);

        output
            .max(-self.params.max_output_ms)
            .min(self.params.max_output_ms)
    }

    /// True if the latest measured state is within the tolerances of the goal.
    pub fn on_target(&self) -> bool {
        match (self.goal, self.latest_state) {
            (Some(g), Some(s)) => g.at_goal(&s),
            _ => false,
        }
    }

    /// True once the end of the current profile has been sampled.
    pub fn is_finished_profile(&self) -> bool {
        self.finished_profile
    }

    pub fn state(&self) -> ProfileState {
        if self.goal.is_none() {
            ProfileState::Idle
        } else if self.finished_profile {
            ProfileState::FinishedProfile
        } else if self.on_target() {
            ProfileState::OnTarget
        } else {
            ProfileState::Profiling
        }
    }

    /// The setpoint sampled in the last update.
    pub fn setpoint(&self) -> Option<MotionState> {
        self.setpoint
    }

    pub fn goal(&self) -> Option<ProfileGoal> {
        self.goal
    }

    pub fn profile(&self) -> Option<&MotionProfile> {
        self.profile.as_ref()
    }
}
