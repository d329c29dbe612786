//! Simulation parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// Internal
use crate::path::Waypoint;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the follower simulation
#[derive(Deserialize, Debug, Clone)]
pub struct Params {
    /// Period of one control cycle
    pub cycle_period_s: f64,

    /// Time after which following is abandoned
    pub timeout_s: f64,

    /// If true each cycle is paced to take `cycle_period_s` of wall clock time
    pub real_time: bool,

    /// Starting pose of the vehicle, x, y and heading
    pub start_pose: [f64; 3],

    /// The path to follow, unless one is given on the command line
    pub waypoints: Vec<Waypoint>,

    /// Drive the path backwards
    pub reversed: bool,

    /// Remaining distances at which to announce progress
    #[serde(default)]
    pub announce_distances_m: Vec<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    /// Check the timing parameters can drive a simulation.
    ///
    /// An infinite timeout is allowed and means following is never abandoned.
    pub fn validate(&self) -> Result<(), String> {
        if !self.cycle_period_s.is_finite() || self.cycle_period_s <= 0.0 {
            return Err(format!(
                "The cycle period must be finite and positive, got {}",
                self.cycle_period_s
            ));
        }

        if self.timeout_s.is_nan() || self.timeout_s <= 0.0 {
            return Err(format!("The timeout must be positive, got {}", self.timeout_s));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn params(cycle_period_s: f64, timeout_s: f64) -> Params {
        Params {
            cycle_period_s,
            timeout_s,
            real_time: true,
            start_pose: [0.0, 0.0, 0.0],
            waypoints: vec![Waypoint::new(0.0, 0.0), Waypoint::new(1.0, 0.0)],
            reversed: false,
            announce_distances_m: Vec::new(),
        }
    }

    #[test]
    fn test_validate() {
        assert!(params(0.02, 60.0).validate().is_ok());
        assert!(params(0.02, f64::INFINITY).validate().is_ok());

        assert!(params(0.0, 60.0).validate().is_err());
        assert!(params(-0.02, 60.0).validate().is_err());
        assert!(params(f64::NAN, 60.0).validate().is_err());
        assert!(params(f64::INFINITY, 60.0).validate().is_err());

        assert!(params(0.02, 0.0).validate().is_err());
        assert!(params(0.02, f64::NAN).validate().is_err());
    }
}
