//! Pursuit control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for pursuit control
#[derive(Deserialize, Debug, Clone)]
pub struct Params {
    /// Lookahead distance used at or below `min_lookahead_speed_ms`
    pub min_lookahead_m: f64,

    /// Lookahead distance used at or above `max_lookahead_speed_ms`
    pub max_lookahead_m: f64,

    /// Path speed at which the minimum lookahead applies
    pub min_lookahead_speed_ms: f64,

    /// Path speed at which the maximum lookahead applies
    pub max_lookahead_speed_ms: f64,

    /// Steering is finished once the remaining path length is at or below this distance
    pub finish_tolerance_m: f64,

    /// Number of segments beyond the current one that are searched when projecting onto the path
    pub search_window_segments: usize,

    /// If the projection in the search window is further than this from the vehicle the whole
    /// path is searched instead.
    pub lost_distance_m: f64,

    /// Maximum lateral acceleration, which limits speed on curved sections
    pub max_lat_accel_mss: f64,

    /// Absolute speed limit applied on top of the path speeds
    pub max_speed_ms: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            min_lookahead_m: 0.3,
            max_lookahead_m: 0.6,
            min_lookahead_speed_ms: 0.25,
            max_lookahead_speed_ms: 3.0,
            finish_tolerance_m: 0.02,
            search_window_segments: 4,
            lost_distance_m: 1.0,
            max_lat_accel_mss: 2.0,
            max_speed_ms: 3.0,
        }
    }
}

impl Params {
    /// Check that the parameters describe a usable controller.
    pub fn validate(&self) -> Result<(), String> {
        let positive = [
            ("min_lookahead_m", self.min_lookahead_m),
            ("max_lookahead_m", self.max_lookahead_m),
            ("max_lat_accel_mss", self.max_lat_accel_mss),
            ("max_speed_ms", self.max_speed_ms),
        ];
        let non_negative = [
            ("min_lookahead_speed_ms", self.min_lookahead_speed_ms),
            ("max_lookahead_speed_ms", self.max_lookahead_speed_ms),
            ("finish_tolerance_m", self.finish_tolerance_m),
            ("lost_distance_m", self.lost_distance_m),
        ];

        for (name, value) in positive.iter() {
            if !value.is_finite() || *value <= 0.0 {
                return Err(format!("{} must be finite and positive, got {}", name, value));
            }
        }
        for (name, value) in non_negative.iter() {
            if !value.is_finite() || *value < 0.0 {
                return Err(format!("{} must be finite and non-negative, got {}", name, value));
            }
        }

        if self.min_lookahead_m > self.max_lookahead_m {
            return Err("min_lookahead_m is larger than max_lookahead_m".into());
        }
        if self.min_lookahead_speed_ms > self.max_lookahead_speed_ms {
            return Err("min_lookahead_speed_ms is larger than max_lookahead_speed_ms".into());
        }

        Ok(())
    }
}
