//! # Pursuit control module
//!
//! Pursuit control is responsible for steering the vehicle along the path. It uses an adaptive
//! pure pursuit law: every cycle the vehicle's position is projected onto the path, a lookahead
//! point is chosen further along the path and the constant curvature arc joining the vehicle to
//! that point is computed.
//!
//! The lookahead distance grows with the speed the path asks for at the projected point, so that
//! fast sections are followed smoothly while slow and tightly curved sections are followed
//! closely. The cross track error is added onto the lookahead so that a vehicle far from the path
//! rejoins it on a gentle arc.
//!
//! The output of the module is a [`SteeringCommand`], which contains the arc to drive this cycle
//! as well as the speed limits that the path imposes around the lookahead point. The arc is
//! expressed as a [`Twist`](crate::loc::Twist) giving the distance to drive and the heading change
//! along it, the ratio of the two being the curvature of the arc.
//!
//! Progress along the path is monotonic: the projection is searched for in a small window of
//! segments ahead of the last one, and is never allowed to move backwards unless the vehicle has
//! been lost and a search of the whole path is needed.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod params;
pub mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use params::Params;
pub use state::*;
