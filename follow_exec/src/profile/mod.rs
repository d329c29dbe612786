//! # Motion profile module
//!
//! This module plans and follows one dimensional motion profiles along the path.
//!
//! A profile is a sequence of constant acceleration segments taking the vehicle from its current
//! displacement and velocity to a goal displacement and velocity, respecting velocity and
//! acceleration constraints. Acceleration and deceleration limits may differ.
//!
//! The [`ProfileFollower`] replans the profile from the measured state whenever it is given a new
//! goal, samples it at the current time and turns the sample into a velocity command.
//!
//! When the goal cannot be reached without breaking the constraints the
//! [`CompletionBehaviour`] of the goal decides what gives:
//!  - `Overshoot` respects the constraints, passes the goal and comes back to it.
//!  - `ViolateMaxAccel` decelerates harder than allowed in order to stop on the goal.
//!  - `ViolateMaxAbsVel` arrives at the goal faster than requested.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod follower;
pub mod generator;
pub mod motion;
pub mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use follower::*;
pub use generator::generate_profile;
pub use motion::*;
pub use params::Params;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Limits on the motion of the vehicle.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileConstraints {
    /// Maximum absolute velocity
    pub max_vel_ms: f64,

    /// Maximum magnitude of acceleration when speeding up
    pub max_accel_mss: f64,

    /// Maximum magnitude of acceleration when slowing down
    pub max_decel_mss: f64,
}

/// The state a profile must finish in.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileGoal {
    /// Displacement to finish at
    pub target_pos_m: f64,

    /// Absolute velocity to finish with
    pub target_vel_ms: f64,

    /// What to do if the goal can't be reached within the constraints
    pub completion_behaviour: CompletionBehaviour,

    /// Tolerance on displacement for the goal to be considered reached
    pub pos_tolerance_m: f64,

    /// Tolerance on velocity for the goal to be considered reached
    pub vel_tolerance_ms: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Policy used when a goal can't be reached without breaking the constraints.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum CompletionBehaviour {
    Overshoot,
    ViolateMaxAccel,
    ViolateMaxAbsVel,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ProfileError {
    #[error(
        "Constraints must be finite and positive (max vel {max_vel_ms}, max accel \
        {max_accel_mss}, max decel {max_decel_mss})"
    )]
    InvalidConstraints {
        max_vel_ms: f64,
        max_accel_mss: f64,
        max_decel_mss: f64,
    },

    #[error("Goal must have a finite target, non-negative velocity and tolerances: {0:?}")]
    InvalidGoal(ProfileGoal),

    #[error("Goal at {target_m} m requires travel in a forbidden direction from {current_m} m")]
    InfeasibleGoal { target_m: f64, current_m: f64 },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ProfileConstraints {
    /// Create a new set of constraints, checking they are valid.
    pub fn new(
        max_vel_ms: f64,
        max_accel_mss: f64,
        max_decel_mss: f64,
    ) -> Result<Self, ProfileError> {
        let c = Self {
            max_vel_ms,
            max_accel_mss,
            max_decel_mss,
        };
        c.validate()?;
        Ok(c)
    }

    pub fn validate(&self) -> Result<(), ProfileError> {
        let valid = |v: f64| v.is_finite() && v > 0.0;

        if valid(self.max_vel_ms) && valid(self.max_accel_mss) && valid(self.max_decel_mss) {
            Ok(())
        } else {
            Err(ProfileError::InvalidConstraints {
                max_vel_ms: self.max_vel_ms,
                max_accel_mss: self.max_accel_mss,
                max_decel_mss: self.max_decel_mss,
            })
        }
    }
}

impl ProfileGoal {
    pub fn new(
        target_pos_m: f64,
        target_vel_ms: f64,
        completion_behaviour: CompletionBehaviour,
        pos_tolerance_m: f64,
        vel_tolerance_ms: f64,
    ) -> Self {
        Self {
            target_pos_m,
            target_vel_ms,
            completion_behaviour,
            pos_tolerance_m,
            vel_tolerance_ms,
        }
    }

    pub fn validate(&self) -> Result<(), ProfileError> {
        let valid = self.target_pos_m.is_finite()
            && self.target_vel_ms.is_finite()
            && self.target_vel_ms >= 0.0
            && self.pos_tolerance_m.is_finite()
            && self.pos_tolerance_m >= 0.0
            && self.vel_tolerance_ms.is_finite()
            && self.vel_tolerance_ms >= 0.0;

        if valid {
            Ok(())
        } else {
            Err(ProfileError::InvalidGoal(*self))
        }
    }

    /// The same goal mirrored about zero displacement.
    pub fn flipped(&self) -> Self {
        Self {
            target_pos_m: -self.target_pos_m,
            ..*self
        }
    }

    /// True if the given state is within the tolerances of this goal.
    pub fn at_goal(&self, state: &MotionState) -> bool {
        (state.pos_m - self.target_pos_m).abs() < self.pos_tolerance_m
            && (state.vel_ms.abs() - self.target_vel_ms).abs() < self.vel_tolerance_ms
    }
}
