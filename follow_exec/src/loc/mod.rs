//! # Localisation interface module
//!
//! The path follower does not estimate its own pose. Pose, displacement and velocity are polled
//! once per cycle from an external odometry provider through the [`OdomSource`] trait, and time is
//! read from a monotonic [`Clock`].

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod twist;
pub use twist::Twist;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{Rotation2, Vector2};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The current pose (position and heading in the path frame) of the vehicle.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Pose {
    /// The position in the path frame
    pub position_m: Vector2<f64>,

    /// The heading of the vehicle, the angle between the body X axis and the path frame X axis,
    /// positive anticlockwise.
    pub heading_rad: f64,
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A source of odometry, polled once per control cycle.
pub trait OdomSource {
    /// The current pose of the vehicle.
    fn pose(&self) -> Pose;

    /// The cumulative signed distance travelled by the vehicle.
    fn displacement_m(&self) -> f64;

    /// The signed longitudinal speed of the vehicle.
    fn velocity_ms(&self) -> f64;
}

/// A monotonic time source.
pub trait Clock {
    /// Current time in seconds.
    fn now_s(&self) -> f64;
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose {
    pub fn new(x_m: f64, y_m: f64, heading_rad: f64) -> Self {
        Self {
            position_m: Vector2::new(x_m, y_m),
            heading_rad,
        }
    }

    /// Unit vector pointing along the body X axis.
    pub fn forward(&self) -> Vector2<f64> {
        Vector2::new(self.heading_rad.cos(), self.heading_rad.sin())
    }

    /// Express a point given in the path frame in the body frame of this pose.
    pub fn to_body(&self, point_m: &Vector2<f64>) -> Vector2<f64> {
        Rotation2::new(-self.heading_rad) * (point_m - self.position_m)
    }

    /// The same position facing the opposite way.
    pub fn flipped(&self) -> Self {
        Self {
            position_m: self.position_m,
            heading_rad: util::maths::wrap_pi(self.heading_rad + std::f64::consts::PI),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.position_m.iter().all(|v| v.is_finite()) && self.heading_rad.is_finite()
    }

    /// Move this pose along a constant curvature arc described by a body frame twist.
    pub fn integrate(&self, delta: &Twist) -> Self {
        let (translation_m, dtheta_rad) = delta.exp();

        Self {
            position_m: self.position_m + Rotation2::new(self.heading_rad) * translation_m,
            heading_rad: util::maths::wrap_pi(self.heading_rad + dtheta_rad),
        }
    }
}
