//! # Path
//!
//! This module defines the geometric path followed by the vehicle.
//!
//! A path is an ordered sequence of waypoints joined by straight segments. Each waypoint may carry
//! the speed at which the vehicle should drive towards it, which is inherited by later waypoints
//! that don't specify one. The path is parameterised by arc length from the first waypoint, and
//! the commanded speed at the very end of the path is always zero.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::ops::Range;

// External
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use util::maths::get_ang_dist_2pi;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Distance under which two consecutive waypoints are considered to be the same point.
const DUPLICATE_POINT_TOL_M: f64 = 1e-9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A single point of the path as it is specified by the user.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq)]
pub struct Waypoint {
    /// Position of the waypoint in the path frame
    pub position_m: Vector2<f64>,

    /// The speed at which to drive towards this waypoint. If not given the speed of the previous
    /// segment is used, and if no waypoint gives a speed the path is unconstrained.
    #[serde(default)]
    pub speed_ms: Option<f64>,
}

/// A segment between two path points
#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct PathSegment {
    /// The start point of the segment
    pub start_m: Vector2<f64>,

    /// The target of the segment
    pub target_m: Vector2<f64>,

    /// The length of the segment
    pub length_m: f64,

    /// Arc length along the path at which this segment starts
    pub start_dist_m: f64,

    /// The heading (angle to the +ve x axis) of the segment
    pub heading_rad: f64,

    /// Unit vector pointing in the direction of the segment
    pub direction: Vector2<f64>,

    /// Speed at which the segment should be driven
    pub speed_ms: f64,
}

/// A path defining the desired trajectory of the vehicle.
#[derive(Debug, Clone, Serialize)]
pub struct Path {
    waypoints: Vec<Waypoint>,

    segments: Vec<PathSegment>,

    /// Approximate curvature at each waypoint, zero at both ends.
    curvatures_m: Vec<f64>,

    length_m: f64,

    /// If true the path is driven backwards
    reversed: bool,
}

/// The projection of a point onto the path.
#[derive(Debug, Copy, Clone, Serialize, Default)]
pub struct Projection {
    /// Index of the segment the projection lies on
    pub segment: usize,

    /// Arc length along the path of the projected point
    pub dist_m: f64,

    /// The projected point itself
    pub point_m: Vector2<f64>,

    /// Distance between the point and its projection
    pub error_m: f64,
}

// -----------------------------------------------------------------------------------------------
// ENUMS
// -----------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("A path requires at least two distinct waypoints, got {0}")]
    TooFewWaypoints(usize),

    #[error("Waypoint {0} has a non-finite position")]
    NonFiniteWaypoint(usize),

    #[error("Waypoint {0} has a speed which is not finite and positive")]
    InvalidSpeed(usize),

    #[error("Point separation must be finite and positive, got {0}")]
    InvalidSeparation(f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Waypoint {
    pub fn new(x_m: f64, y_m: f64) -> Self {
        Self {
            position_m: Vector2::new(x_m, y_m),
            speed_ms: None,
        }
    }

    pub fn with_speed(x_m: f64, y_m: f64, speed_ms: f64) -> Self {
        Self {
            position_m: Vector2::new(x_m, y_m),
            speed_ms: Some(speed_ms),
        }
    }
}

impl Path {
    /// Build a new path from the given waypoints.
    ///
    /// Consecutive duplicate waypoints are merged. If `reversed` is set the path is driven with
    /// the back of the vehicle leading.
    pub fn new(waypoints: Vec<Waypoint>, reversed: bool) -> Result<Self, PathError> {
        // Validate the input before anything else
        for (i, w) in waypoints.iter().enumerate() {
            if !w.position_m.iter().all(|v| v.is_finite()) {
                return Err(PathError::NonFiniteWaypoint(i));
            }
            if let Some(s) = w.speed_ms {
                if !s.is_finite() || s <= 0.0 {
                    return Err(PathError::InvalidSpeed(i));
                }
            }
        }

        // Merge duplicates, keeping the speed of the last duplicate if it has one
        let mut points: Vec<Waypoint> = Vec::with_capacity(waypoints.len());
        for w in waypoints.iter() {
            match points.last_mut() {
                Some(last) if (w.position_m - last.position_m).norm() < DUPLICATE_POINT_TOL_M => {
                    if w.speed_ms.is_some() {
                        last.speed_ms = w.speed_ms;
                    }
                }
                _ => points.push(*w),
            }
        }

        if points.len() < 2 {
            return Err(PathError::TooFewWaypoints(points.len()));
        }

        // Build the segments and the arc length table
        let mut segments = Vec::with_capacity(points.len() - 1);
        let mut speed_ms = points[0].speed_ms.unwrap_or(f64::INFINITY);
        let mut dist_m = 0.0;

        for pair in points.windows(2) {
            if let Some(s) = pair[1].speed_ms {
                speed_ms = s;
            }

            let diff = pair[1].position_m - pair[0].position_m;
            let length_m = diff.norm();
            let direction = diff / length_m;

            segments.push(PathSegment {
                start_m: pair[0].position_m,
                target_m: pair[1].position_m,
                length_m,
                start_dist_m: dist_m,
                heading_rad: direction[1].atan2(direction[0]),
                direction,
                speed_ms,
            });

            dist_m += length_m;
        }

        // Curvature at each interior waypoint is the turning angle spread over the mean length of
        // the adjoining segments.
        let mut curvatures_m = vec![0.0; points.len()];
        for (i, pair) in segments.windows(2).enumerate() {
            let turn_rad = get_ang_dist_2pi(pair[0].heading_rad, pair[1].heading_rad).abs();
            curvatures_m[i + 1] = turn_rad / (0.5 * (pair[0].length_m + pair[1].length_m));
        }

        Ok(Self {
            waypoints: points,
            segments,
            curvatures_m,
            length_m: dist_m,
            reversed,
        })
    }

    /// Produces a direct path between the two position vectors, with each point in the path having
    /// at most the given separation.
    pub fn direct(
        from: Vector2<f64>,
        to: Vector2<f64>,
        point_sep_m: f64,
        speed_ms: Option<f64>,
    ) -> Result<Self, PathError> {
        if !point_sep_m.is_finite() || point_sep_m <= 0.0 {
            return Err(PathError::InvalidSeparation(point_sep_m));
        }

        let diff_vec = to - from;
        let dist = diff_vec.norm();

        // Number of segments needed so that none is longer than the separation
        let num_segments = ((dist / point_sep_m).ceil() as usize).max(1);

        let points = (0..=num_segments)
            .map(|i| Waypoint {
                position_m: from + diff_vec * (i as f64 / num_segments as f64),
                speed_ms,
            })
            .collect();

        Self::new(points, false)
    }

    /// Total arc length of the path
    pub fn length_m(&self) -> f64 {
        self.length_m
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn num_segments(&self) -> usize {
        self.segments.len()
    }

    pub fn segment(&self, index: usize) -> Option<&PathSegment> {
        self.segments.get(index)
    }

    /// The commanded speed at the end of the path.
    pub fn end_speed_ms(&self) -> f64 {
        0.0
    }

    /// Index of the segment containing the given arc length, clamped to the path.
    pub fn segment_index_at(&self, dist_m: f64) -> usize {
        // Number of segments starting at or before dist_m, the first always does.
        let num_started = self
            .segments
            .partition_point(|s| s.start_dist_m <= dist_m)
            .max(1);

        num_started - 1
    }

    /// The point at the given arc length, clamped to the ends of the path.
    pub fn point_at(&self, dist_m: f64) -> Vector2<f64> {
        let dist_m = dist_m.max(0.0).min(self.length_m);
        let seg = &self.segments[self.segment_index_at(dist_m)];
        let along_m = (dist_m - seg.start_dist_m).max(0.0).min(seg.length_m);

        seg.start_m + seg.direction * along_m
    }

    /// The speed the path asks for at the given arc length.
    ///
    /// This is the end speed once the end of the path is reached.
    pub fn speed_at(&self, dist_m: f64) -> f64 {
        if dist_m >= self.length_m {
            self.end_speed_ms()
        } else {
            self.segment_speed_at(dist_m)
        }
    }

    /// The speed of the segment containing the given arc length.
    pub fn segment_speed_at(&self, dist_m: f64) -> f64 {
        self.segments[self.segment_index_at(dist_m)].speed_ms
    }

    /// Approximate curvature of the path around the given arc length, the largest of the
    /// curvatures at the two ends of the containing segment.
    pub fn curvature_at(&self, dist_m: f64) -> f64 {
        let i = self.segment_index_at(dist_m);
        self.curvatures_m[i].max(self.curvatures_m[i + 1])
    }

    /// Project a point onto the given range of segments.
    ///
    /// When two segments are equally close the earlier is used. An empty or out of bounds range
    /// is clamped to the path.
    pub fn project(&self, point_m: &Vector2<f64>, segments: Range<usize>) -> Projection {
        let end = segments.end.min(self.segments.len());
        let start = segments.start.min(end.saturating_sub(1));

        let mut best: Option<Projection> = None;

        for (i, seg) in self.segments[start..end].iter().enumerate() {
            let along_m = (point_m - seg.start_m)
                .dot(&seg.direction)
                .max(0.0)
                .min(seg.length_m);
            let candidate = seg.start_m + seg.direction * along_m;
            let error_m = (point_m - candidate).norm();

            if best.map_or(true, |b| error_m < b.error_m) {
                best = Some(Projection {
                    segment: start + i,
                    dist_m: seg.start_dist_m + along_m,
                    point_m: candidate,
                    error_m,
                });
            }
        }

        // The range can only be empty if the path has no segments, which construction prevents.
        best.unwrap_or_default()
    }

    /// Project a point onto the whole path.
    pub fn closest_point(&self, point_m: &Vector2<f64>) -> Projection {
        self.project(point_m, 0..self.segments.len())
    }

    /// Projection of the given point on the path if it were constrained to the given arc length.
    pub fn projection_at(&self, point_m: &Vector2<f64>, dist_m: f64) -> Projection {
        let dist_m = dist_m.max(0.0).min(self.length_m);
        let path_point = self.point_at(dist_m);

        Projection {
            segment: self.segment_index_at(dist_m),
            dist_m,
            point_m: path_point,
            error_m: (point_m - path_point).norm(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn assert_point_eq(actual: Vector2<f64>, x: f64, y: f64) {
        assert_relative_eq!(actual[0], x, epsilon = 1e-12);
        assert_relative_eq!(actual[1], y, epsilon = 1e-12);
    }

    fn l_path() -> Path {
        Path::new(
            vec![
                Waypoint::with_speed(0.0, 0.0, 2.0),
                Waypoint::new(4.0, 0.0),
                Waypoint::with_speed(4.0, 3.0, 1.0),
            ],
            false,
        )
        .unwrap()
    }

    #[test]
    fn test_construction() {
        let path = l_path();

        assert_eq!(path.num_segments(), 2);
        assert_relative_eq!(path.length_m(), 7.0);
        assert_relative_eq!(path.segment(1).unwrap().start_dist_m, 4.0);
        assert_relative_eq!(path.segment(1).unwrap().heading_rad, FRAC_PI_2);

        assert!(matches!(
            Path::new(vec![Waypoint::new(0.0, 0.0)], false),
            Err(PathError::TooFewWaypoints(1))
        ));
        assert!(matches!(
            Path::new(vec![Waypoint::new(1.0, 1.0), Waypoint::new(1.0, 1.0)], false),
            Err(PathError::TooFewWaypoints(1))
        ));
        assert!(matches!(
            Path::new(
                vec![Waypoint::new(0.0, 0.0), Waypoint::new(f64::NAN, 1.0)],
                false
            ),
            Err(PathError::NonFiniteWaypoint(1))
        ));
        assert!(matches!(
            Path::new(
                vec![Waypoint::new(0.0, 0.0), Waypoint::with_speed(1.0, 1.0, 0.0)],
                false
            ),
            Err(PathError::InvalidSpeed(1))
        ));
    }

    #[test]
    fn test_duplicates_merged() {
        let path = Path::new(
            vec![
                Waypoint::new(0.0, 0.0),
                Waypoint::new(0.0, 0.0),
                Waypoint::new(1.0, 0.0),
                Waypoint::with_speed(1.0, 0.0, 3.0),
                Waypoint::new(2.0, 0.0),
            ],
            false,
        )
        .unwrap();

        assert_eq!(path.waypoints().len(), 3);
        assert_eq!(path.num_segments(), 2);
        // The merged waypoint keeps the later speed, which then carries on to the last segment
        assert_relative_eq!(path.segment(0).unwrap().speed_ms, 3.0);
        assert_relative_eq!(path.segment(1).unwrap().speed_ms, 3.0);

        let unconstrained =
            Path::new(vec![Waypoint::new(0.0, 0.0), Waypoint::new(1.0, 0.0)], false).unwrap();
        assert!(unconstrained.speed_at(0.5).is_infinite());
    }

    #[test]
    fn test_speeds() {
        let path = l_path();

        assert_relative_eq!(path.speed_at(0.0), 2.0);
        assert_relative_eq!(path.speed_at(3.9), 2.0);
        // The middle waypoint inherits the first speed, the last segment uses the final speed
        assert_relative_eq!(path.speed_at(4.5), 1.0);
        assert_relative_eq!(path.speed_at(7.0), 0.0);
        assert_relative_eq!(path.segment_speed_at(7.0), 1.0);
    }

    #[test]
    fn test_point_at() {
        let path = l_path();

        assert_point_eq(path.point_at(2.0), 2.0, 0.0);
        assert_point_eq(path.point_at(5.5), 4.0, 1.5);
        assert_point_eq(path.point_at(-1.0), 0.0, 0.0);
        assert_point_eq(path.point_at(100.0), 4.0, 3.0);
    }

    #[test]
    fn test_curvature() {
        let path = l_path();

        // Quarter turn spread over a mean segment length of 3.5
        assert_relative_eq!(path.curvature_at(1.0), FRAC_PI_2 / 3.5, epsilon = 1e-12);
        assert_relative_eq!(path.curvature_at(6.0), FRAC_PI_2 / 3.5, epsilon = 1e-12);

        let straight = Path::direct(Vector2::zeros(), Vector2::new(10.0, 0.0), 1.0, None).unwrap();
        assert_relative_eq!(straight.curvature_at(5.0), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_projection() {
        let path = l_path();

        let proj = path.closest_point(&Vector2::new(2.0, 0.5));
        assert_eq!(proj.segment, 0);
        assert_relative_eq!(proj.dist_m, 2.0);
        assert_relative_eq!(proj.error_m, 0.5);

        let proj = path.closest_point(&Vector2::new(5.0, 2.0));
        assert_eq!(proj.segment, 1);
        assert_relative_eq!(proj.dist_m, 6.0);
        assert_relative_eq!(proj.error_m, 1.0);

        // Restricting the range to the first segment clamps to its end
        let proj = path.project(&Vector2::new(5.0, 2.0), 0..1);
        assert_eq!(proj.segment, 0);
        assert_relative_eq!(proj.dist_m, 4.0);

        let proj = path.projection_at(&Vector2::new(0.0, 1.0), 1.0);
        assert_point_eq(proj.point_m, 1.0, 0.0);
        assert_relative_eq!(proj.error_m, 2f64.sqrt());
    }

    #[test]
    fn test_direct() {
        let path = Path::direct(Vector2::zeros(), Vector2::new(1.0, 0.0), 0.3, Some(0.5)).unwrap();

        assert_eq!(path.num_segments(), 4);
        assert_relative_eq!(path.length_m(), 1.0, epsilon = 1e-12);
        assert_point_eq(path.waypoints().last().unwrap().position_m, 1.0, 0.0);
        assert_relative_eq!(path.speed_at(0.5), 0.5);

        assert!(Path::direct(Vector2::zeros(), Vector2::new(1.0, 0.0), 0.0, None).is_err());
    }

    #[test]
    fn test_waypoint_deserialise() {
        let json = r#"[
            {"position_m": [0.0, 1.0]},
            {"position_m": [2.0, 1.0], "speed_ms": 0.5}
        ]"#;
        let w: Vec<Waypoint> = serde_json::from_str(json).unwrap();

        assert_eq!(w[0], Waypoint::new(0.0, 1.0));
        assert_eq!(w[1], Waypoint::with_speed(2.0, 1.0, 0.5));
    }
}
