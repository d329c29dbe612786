//! Body frame velocity type

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A body frame velocity, or the body frame motion over one cycle depending on where it is used.
///
/// For a differential drive vehicle `dy` is always zero.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Twist {
    /// Longitudinal component
    pub dx: f64,

    /// Lateral component
    pub dy: f64,

    /// Angular component
    pub dtheta: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Twist {
    pub fn new(dx: f64, dy: f64, dtheta: f64) -> Self {
        Self { dx, dy, dtheta }
    }

    /// The zero twist.
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn scaled(&self, scale: f64) -> Self {
        Self {
            dx: self.dx * scale,
            dy: self.dy * scale,
            dtheta: self.dtheta * scale,
        }
    }

    /// Curvature of the arc described by this twist, `dtheta / dx`.
    ///
    /// Not finite when `dx` is zero.
    pub fn curvature(&self) -> f64 {
        self.dtheta / self.dx
    }

    pub fn is_finite(&self) -> bool {
        self.dx.is_finite() && self.dy.is_finite() && self.dtheta.is_finite()
    }

    /// The translation and rotation obtained by following this twist for unit time.
    pub fn exp(&self) -> (Vector2<f64>, f64) {
        let (s, c) = if self.dtheta.abs() < 1e-9 {
            (
                1.0 - self.dtheta.powi(2) / 6.0,
                0.5 * self.dtheta,
            )
        } else {
            (
                self.dtheta.sin() / self.dtheta,
                (1.0 - self.dtheta.cos()) / self.dtheta,
            )
        };

        (
            Vector2::new(self.dx * s - self.dy * c, self.dx * c + self.dy * s),
            self.dtheta,
        )
    }
}
