//! Profile follower parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Gains used to turn a profile setpoint into a velocity command.
///
/// The command is `kffv * v_sp + kffa * a_sp + kp * (x_sp - x) + kv * (v_sp - v)`, saturated at
/// `max_output_ms`.
#[derive(Deserialize, Debug, Clone)]
pub struct Params {
    /// Position error gain
    pub kp: f64,

    /// Velocity error gain
    pub kv: f64,

    /// Velocity feedforward gain
    pub kffv: f64,

    /// Acceleration feedforward gain
    pub kffa: f64,

    /// Saturation limit of the velocity command
    pub max_output_ms: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            kp: 0.0,
            kv: 0.0,
            kffv: 1.0,
            kffa: 0.0,
            max_output_ms: 10.0,
        }
    }
}
