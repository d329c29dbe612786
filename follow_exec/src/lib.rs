//! # Path following library.
//!
//! This library provides the closed loop path following controller, and allows the binaries,
//! tests and benchmarks in this crate to access its items.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Localisation interface - the pose, odometry and clock types the controller is fed with
pub mod loc;

/// Path - the geometry and speeds of the path to follow
pub mod path;

/// Path follower - combines steering and speed control into a velocity command
pub mod path_follower;

/// Motion profiles - plans and follows speed profiles along the path
pub mod profile;

/// Pursuit control - steers the vehicle onto the path with adaptive pure pursuit
pub mod pursuit_ctrl;

/// Simulation - an ideal vehicle for running the follower without hardware
pub mod sim;
