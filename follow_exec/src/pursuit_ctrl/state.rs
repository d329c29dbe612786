//! Pursuit control module state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::f64::consts::TAU;
use std::sync::Arc;

// External
use log::{debug, warn};
use nalgebra::Vector2;
use serde::Serialize;

// Internal
use super::*;
use crate::{
    loc::{Pose, Twist},
    path::{Path, Projection},
};
use util::maths::{lin_map_clamped, rem_euclid};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Lookahead speeds below this are treated as a request to stop at the lookahead point.
const STOP_SPEED_EPSILON_MS: f64 = 1e-6;

/// Arcs with a chord shorter than this are treated as having zero length.
const MIN_CHORD_M: f64 = 1e-9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Adaptive pure pursuit steering controller.
pub struct PursuitCtrl {
    params: Params,

    path: Arc<Path>,

    /// Index of the segment the vehicle was last projected onto
    cursor: usize,

    /// Arc length of the last projection, never decreases unless the vehicle is relocated
    progress_m: f64,

    finished: bool,

    report: StatusReport,
}

/// The output of one cycle of pursuit control.
#[derive(Debug, Copy, Clone, Serialize)]
pub struct SteeringCommand {
    /// The arc to drive this cycle, `dx` being its signed length and `dtheta` the heading change
    /// along it.
    pub delta: Twist,

    /// Distance between the vehicle and its projection on the path
    pub cross_track_error_m: f64,

    /// Speed limit imposed by the path around the lookahead point
    pub max_velocity_ms: f64,

    /// Speed the path asks for at the lookahead point
    pub end_velocity_ms: f64,

    /// The lookahead point in the path frame
    pub lookahead_point_m: Vector2<f64>,

    /// Path length between the projection of the vehicle and the end of the path
    pub remaining_path_length_m: f64,
}

/// The status report containing monitoring quantities for the last cycle.
#[derive(Debug, Default, Copy, Clone, Serialize)]
pub struct StatusReport {
    /// Arc length of the projection of the vehicle on the path
    pub progress_m: f64,

    /// Index of the segment the vehicle is projected onto
    pub segment: usize,

    /// The lookahead distance used
    pub lookahead_m: f64,

    /// Curvature of the commanded arc
    pub curvature_m: f64,

    /// True if the projection had to be recovered by searching the whole path
    pub relocated: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PursuitCtrlError {
    #[error("Invalid pursuit control parameters: {0}")]
    InvalidParams(String),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PursuitCtrl {
    /// Create a new controller for the given path.
    pub fn new(path: Arc<Path>, params: Params) -> Result<Self, PursuitCtrlError> {
        params.validate().map_err(PursuitCtrlError::InvalidParams)?;

        Ok(Self {
            params,
            path,
            cursor: 0,
            progress_m: 0.0,
            finished: false,
            report: StatusReport::default(),
        })
    }

    /// Compute the steering command for the current pose.
    ///
    /// Processing involves:
    ///  1. Projecting the pose onto the path, keeping progress monotonic.
    ///  1. Choosing a lookahead point based on the path speed and cross track error.
    ///  1. Finding the arc joining the pose to the lookahead point.
    ///  1. Shortening the arc if the path ends before the lookahead point is reached.
    pub fn update(&mut self, pose: &Pose) -> SteeringCommand {
        self.report = StatusReport::default();

        // A reversed path is followed by pretending the back of the vehicle is the front
        let pose = if self.path.is_reversed() {
            pose.flipped()
        } else {
            *pose
        };

        // ---- PROJECTION ----

        let proj = self.project(&pose.position_m);
        let remaining_m = (self.path.length_m() - proj.dist_m).max(0.0);

        // ---- LOOKAHEAD ----

        let proj_speed_ms = self.speed_limit_at(proj.dist_m);
        let lookahead_m = self.lookahead_for_speed(proj_speed_ms) + proj.error_m;
        let lookahead_dist_m = (proj.dist_m + lookahead_m).min(self.path.length_m());
        let lookahead_point_m = self.path.point_at(lookahead_dist_m);

        let max_velocity_ms = self.speed_limit_at(lookahead_dist_m);
        let end_velocity_ms = self.path.speed_at(lookahead_dist_m).min(max_velocity_ms);

        // ---- ARC ----

        let target_body = pose.to_body(&lookahead_point_m);
        let (curvature_m, arc_length_m) = arc_to(&target_body);

        // If the path ends before the lookahead arc does only drive the remaining length
        let mut scale = 1.0;
        if end_velocity_ms < STOP_SPEED_EPSILON_MS && remaining_m < arc_length_m {
            scale = (remaining_m / arc_length_m).max(0.0);
        }

        let direction = if self.path.is_reversed() { -1.0 } else { 1.0 };

        let delta = Twist::new(
            direction * scale * arc_length_m,
            0.0,
            arc_length_m * curvature_m * scale,
        );

        // ---- STATUS ----

        self.finished = remaining_m <= self.params.finish_tolerance_m;

        self.report.progress_m = proj.dist_m;
        self.report.segment = proj.segment;
        self.report.lookahead_m = lookahead_m;
        self.report.curvature_m = curvature_m;

        SteeringCommand {
            delta,
            cross_track_error_m: proj.error_m,
            max_velocity_ms,
            end_velocity_ms,
            lookahead_point_m,
            remaining_path_length_m: remaining_m,
        }
    }

    /// True once the vehicle has been projected within the finish tolerance of the path's end.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn path(&self) -> &Arc<Path> {
        &self.path
    }

    pub fn report(&self) -> StatusReport {
        self.report
    }

    /// Get the lookahead distance for the given path speed.
    pub fn lookahead_for_speed(&self, speed_ms: f64) -> f64 {
        lin_map_clamped(
            (
                self.params.min_lookahead_speed_ms,
                self.params.max_lookahead_speed_ms,
            ),
            (self.params.min_lookahead_m, self.params.max_lookahead_m),
            speed_ms.abs(),
        )
    }

    /// The speed limit at the given arc length, combining the segment speed, the lateral
    /// acceleration limit on the local curvature and the absolute speed limit.
    fn speed_limit_at(&self, dist_m: f64) -> f64 {
        let curvature_m = self.path.curvature_at(dist_m);
        let curvature_limit_ms = if curvature_m > 0.0 {
            (self.params.max_lat_accel_mss / curvature_m).sqrt()
        } else {
            f64::INFINITY
        };

        self.path
            .segment_speed_at(dist_m)
            .min(curvature_limit_ms)
            .min(self.params.max_speed_ms)
    }

    /// Project the given point onto the path.
    ///
    /// Only the search window ahead of the cursor is considered unless the vehicle appears lost,
    /// in which case the whole path is searched.
    fn project(&mut self, point_m: &Vector2<f64>) -> Projection {
        let window_end = self.cursor + self.params.search_window_segments + 1;
        let mut proj = self.path.project(point_m, self.cursor..window_end);

        if proj.error_m > self.params.lost_distance_m {
            let global = self.path.closest_point(point_m);

            if global.error_m < proj.error_m {
                warn!(
                    "Vehicle lost from path ({:.3} m), relocated from {:.3} m to {:.3} m along \
                     the path",
                    proj.error_m, proj.dist_m, global.dist_m
                );
                self.report.relocated = true;
                self.cursor = global.segment;
                self.progress_m = global.dist_m;
                return global;
            }
        }

        if proj.dist_m < self.progress_m {
            debug!(
                "Projection behind previous progress ({:.3} m < {:.3} m), holding progress",
                proj.dist_m, self.progress_m
            );
            proj = self.path.projection_at(point_m, self.progress_m);
        }

        self.cursor = proj.segment;
        self.progress_m = proj.dist_m;

        proj
    }
}

/// Find the constant curvature arc starting at the origin, tangent to the X axis, which passes
/// through the given point.
///
/// Returns the signed curvature (positive to the left) and the length of the arc.
pub fn arc_to(target: &Vector2<f64>) -> (f64, f64) {
    let chord_sq = target.norm_squared();

    if chord_sq < MIN_CHORD_M * MIN_CHORD_M {
        return (0.0, 0.0);
    }

    let curvature_m = 2.0 * target[1] / chord_sq;
    let k = curvature_m.abs();

    // Straight enough to treat as a line
    if k * chord_sq.sqrt() < 1e-9 {
        return (curvature_m, chord_sq.sqrt());
    }

    // Angle subtended by the arc, in [0, 2pi)
    let angle_rad = rem_euclid(
        (k * target[0]).atan2(1.0 - k * target[1].abs()),
        TAU,
    );

    (curvature_m, angle_rad / k)
}
