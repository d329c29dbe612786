//! Motion profile generation
//!
//! Profiles are trapezoidal: accelerate at the maximum acceleration, cruise at the peak velocity
//! and decelerate at the maximum deceleration onto the goal. Short moves become triangular, and a
//! start state moving away from the goal is first brought to a stop.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use super::*;

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Generate a profile taking the vehicle from `prev_state` to `goal` within `constraints`.
///
/// The acceleration of `prev_state` is ignored, and its velocity is saturated at the maximum
/// velocity.
pub fn generate_profile(
    constraints: &ProfileConstraints,
    goal: &ProfileGoal,
    prev_state: &MotionState,
) -> MotionProfile {
    let delta_pos_m = goal.target_pos_m - prev_state.pos_m;

    // Everything below assumes a goal ahead, or level with us and not moving backwards
    if delta_pos_m < 0.0 || (delta_pos_m == 0.0 && prev_state.vel_ms < 0.0) {
        return generate_flipped(constraints, goal, prev_state);
    }

    let mut start = MotionState::new(
        prev_state.t_s,
        prev_state.pos_m,
        prev_state.vel_ms.signum() * prev_state.vel_ms.abs().min(constraints.max_vel_ms),
        0.0,
    );
    let mut profile = MotionProfile::new(start);

    // Moving away from the goal, stop first
    if start.vel_ms < 0.0 {
        profile.append_control(
            constraints.max_decel_mss,
            -start.vel_ms / constraints.max_decel_mss,
        );
        start = profile.end_state();

        // Stopping may have carried us behind the goal again
        if goal.target_pos_m < start.pos_m {
            let rest = generate_flipped(constraints, goal, &start);
            profile.append_profile(&rest);
            return profile;
        }
    }

    let delta_pos_m = goal.target_pos_m - start.pos_m;
    let v0_sq = start.vel_ms.powi(2);

    let min_abs_vel_at_goal_sq = v0_sq - 2.0 * constraints.max_decel_mss * delta_pos_m;
    let min_abs_vel_at_goal = min_abs_vel_at_goal_sq.abs().sqrt();
    let max_abs_vel_at_goal = (v0_sq + 2.0 * constraints.max_accel_mss * delta_pos_m).sqrt();

    let mut goal_vel_ms = goal.target_vel_ms.min(constraints.max_vel_ms);
    let mut decel_mss = constraints.max_decel_mss;

    // Overshooting within the velocity tolerance is accepted, the violating behaviours must
    // finish exactly on the goal.
    let vel_margin_ms = match goal.completion_behaviour {
        CompletionBehaviour::Overshoot => goal.vel_tolerance_ms,
        _ => 0.0,
    };

    if min_abs_vel_at_goal_sq > 0.0 && min_abs_vel_at_goal > goal_vel_ms + vel_margin_ms {
        // Can't slow down enough to meet the goal velocity
        match goal.completion_behaviour {
            CompletionBehaviour::ViolateMaxAbsVel => {
                goal_vel_ms = min_abs_vel_at_goal;
            }
            CompletionBehaviour::ViolateMaxAccel => {
                // The goal is never behind here, so this also catches a zero tolerance with the
                // start exactly on the goal
                if delta_pos_m <= goal.pos_tolerance_m {
                    // Already on the goal, change velocity instantly
                    profile.append_step(goal_vel_ms);
                    return profile;
                }

                decel_mss = (goal_vel_ms.powi(2) - v0_sq).abs() / (2.0 * delta_pos_m);
            }
            CompletionBehaviour::Overshoot => {
                // Stop past the goal then come back to it
                profile.append_control(
                    -constraints.max_decel_mss,
                    start.vel_ms / constraints.max_decel_mss,
                );
                let rest = generate_profile(constraints, goal, &profile.end_state());
                profile.append_profile(&rest);
                return profile;
            }
        }
    }

    goal_vel_ms = goal_vel_ms.min(max_abs_vel_at_goal);

    // Peak velocity reachable before having to decelerate onto the goal
    let accel_mss = constraints.max_accel_mss;
    let peak_vel_ms = ((decel_mss * v0_sq
        + accel_mss * goal_vel_ms.powi(2)
        + 2.0 * accel_mss * decel_mss * delta_pos_m)
        / (accel_mss + decel_mss))
        .sqrt()
        .min(constraints.max_vel_ms);

    // Accelerate to the peak
    if peak_vel_ms > start.vel_ms {
        profile.append_control(accel_mss, (peak_vel_ms - start.vel_ms) / accel_mss);
        start = profile.end_state();
    }

    // Cruise until the deceleration point
    let decel_dist_m = ((start.vel_ms.powi(2) - goal_vel_ms.powi(2)) / (2.0 * decel_mss)).max(0.0);
    let cruise_dist_m = (goal.target_pos_m - start.pos_m - decel_dist_m).max(0.0);
    if cruise_dist_m > 0.0 && start.vel_ms > 0.0 {
        profile.append_control(0.0, cruise_dist_m / start.vel_ms);
        start = profile.end_state();
    }

    // Decelerate onto the goal
    if decel_dist_m > 0.0 {
        profile.append_control(-decel_mss, (start.vel_ms - goal_vel_ms) / decel_mss);
    }

    profile
}

/// Generate the profile for a goal behind the start state by mirroring the problem.
fn generate_flipped(
    constraints: &ProfileConstraints,
    goal: &ProfileGoal,
    prev_state: &MotionState,
) -> MotionProfile {
    generate_profile(constraints, &goal.flipped(), &prev_state.flipped()).flipped()
}
