//! # Path follower module
//!
//! The path follower is the top level closed loop controller. Each cycle it:
//!  1. Runs pursuit control to get the arc to drive and the speed limits around the lookahead
//!     point, unless steering has already finished.
//!  1. Turns the length of that arc into a displacement goal for the profile follower, which
//!     produces the velocity command.
//!  1. Fuses the steering curvature with the velocity command into a body frame velocity twist.
//!
//! Near the end of the path heading correction is frozen, to avoid the vehicle spinning on the
//! spot as the lookahead point collapses onto it. If the vehicle remains close to the end for too
//! long without finishing the follower gives up and finishes anyway.
//!
//! The follower never blocks and performs no I/O. It may be finished early from another thread
//! through a [`FinishHandle`].

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod params;
pub mod state;
pub mod timed;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use params::{FollowerParams, Params};
pub use state::*;
pub use timed::*;
