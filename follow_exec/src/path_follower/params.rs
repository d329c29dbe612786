//! Path follower parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// Internal
use crate::{profile, pursuit_ctrl};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the path follower
#[derive(Deserialize, Debug, Clone, Default)]
pub struct Params {
    /// Parameters of the steering controller
    pub pursuit: pursuit_ctrl::Params,

    /// Gains of the profile follower
    pub profile: profile::Params,

    /// Limits, tolerances and thresholds of the follower itself
    pub follower: FollowerParams,
}

/// Parameters of the follower itself
#[derive(Deserialize, Debug, Clone)]
pub struct FollowerParams {
    /// Maximum speed along the path
    pub max_vel_ms: f64,

    /// Maximum acceleration
    pub max_accel_mss: f64,

    /// Maximum deceleration
    pub max_decel_mss: f64,

    /// Distance from the goal displacement under which the profile is on target
    pub goal_pos_tolerance_m: f64,

    /// Speed error under which the profile is on target
    pub goal_vel_tolerance_ms: f64,

    /// Heading correction is frozen once the remaining path is shorter than this
    pub stop_steering_distance_m: f64,

    /// The auto stop timer starts once the remaining path is shorter than this
    pub auto_stop_distance_m: f64,

    /// Time after which the follower is finished if steering hasn't already finished
    pub auto_stop_dwell_s: f64,

    /// Increases the curvature of the output with speed to compensate for the vehicle's inertia
    pub inertia_steering_gain: f64,

    /// Largest yaw rate the drivetrain can achieve. Steering curvatures that would require more
    /// than this at the current speed are passed through without inertia compensation.
    pub max_yaw_rate_rads: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for FollowerParams {
    fn default() -> Self {
        Self {
            max_vel_ms: 3.0,
            max_accel_mss: 3.0,
            max_decel_mss: 3.0,
            goal_pos_tolerance_m: 0.02,
            goal_vel_tolerance_ms: 0.3,
            stop_steering_distance_m: 0.25,
            auto_stop_distance_m: 0.6,
            auto_stop_dwell_s: 2.0,
            inertia_steering_gain: 0.0,
            max_yaw_rate_rads: 6.0,
        }
    }
}

impl FollowerParams {
    pub fn validate(&self) -> Result<(), String> {
        let non_negative = [
            ("goal_pos_tolerance_m", self.goal_pos_tolerance_m),
            ("goal_vel_tolerance_ms", self.goal_vel_tolerance_ms),
            ("stop_steering_distance_m", self.stop_steering_distance_m),
            ("auto_stop_distance_m", self.auto_stop_distance_m),
            ("auto_stop_dwell_s", self.auto_stop_dwell_s),
            ("inertia_steering_gain", self.inertia_steering_gain),
        ];

        for (name, value) in non_negative.iter() {
            if !value.is_finite() || *value < 0.0 {
                return Err(format!("{} must be finite and non-negative, got {}", name, value));
            }
        }

        if !(self.max_yaw_rate_rads > 0.0) {
            return Err(format!(
                "max_yaw_rate_rads must be positive, got {}",
                self.max_yaw_rate_rads
            ));
        }

        if self.auto_stop_distance_m < self.stop_steering_distance_m {
            return Err(format!(
                "auto_stop_distance_m ({}) must not be less than stop_steering_distance_m ({})",
                self.auto_stop_distance_m, self.stop_steering_distance_m
            ));
        }

        Ok(())
    }
}
