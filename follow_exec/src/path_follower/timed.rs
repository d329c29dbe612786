//! Timed path following
//!
//! Wraps a [`PathFollower`] so that it is polled from odometry and clock sources, given a time
//! limit, and reports how long following took.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{info, warn};
use serde::Serialize;

use super::*;
use crate::loc::{Clock, OdomSource, Twist};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A path follower with a timeout.
pub struct TimedFollow {
    follower: PathFollower,

    timeout_s: f64,

    start_s: Option<f64>,

    outcome: Option<FollowOutcome>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// How a timed follow ended.
#[derive(Debug, Copy, Clone, Serialize, PartialEq)]
pub enum FollowOutcome {
    /// The follower finished by itself
    Completed { elapsed_s: f64 },

    /// The timeout expired first
    TimedOut { elapsed_s: f64, remaining_m: f64 },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TimedFollow {
    /// Wrap the given follower. A non-finite timeout never expires.
    pub fn new(follower: PathFollower, timeout_s: f64) -> Self {
        Self {
            follower,
            timeout_s,
            start_s: None,
            outcome: None,
        }
    }

    /// Run one cycle, polling the clock and odometry.
    ///
    /// Once an outcome is reached the zero twist is returned.
    pub fn update<C, O>(&mut self, clock: &C, odom: &O) -> Twist
    where
        C: Clock,
        O: OdomSource,
    {
        if self.outcome.is_some() {
            return Twist::identity();
        }

        let t_s = clock.now_s();
        let start_s = *self.start_s.get_or_insert(t_s);
        let elapsed_s = t_s - start_s;

        if elapsed_s > self.timeout_s {
            warn!(
                "Path following timed out after {:.3} s with {:.3} m remaining",
                elapsed_s,
                self.follower.remaining_path_length_m()
            );
            self.follower.force_finish();
            self.outcome = Some(FollowOutcome::TimedOut {
                elapsed_s,
                remaining_m: self.follower.remaining_path_length_m(),
            });
            return Twist::identity();
        }

        let twist = self.follower.update(
            t_s,
            &odom.pose(),
            odom.displacement_m(),
            odom.velocity_ms(),
        );

        if self.follower.is_finished() {
            info!("Path following finished after {:.3} s", elapsed_s);
            self.outcome = Some(FollowOutcome::Completed { elapsed_s });
            return Twist::identity();
        }

        twist
    }

    /// Time since the first cycle, zero before it.
    pub fn elapsed_s<C: Clock>(&self, clock: &C) -> f64 {
        self.start_s.map_or(0.0, |s| clock.now_s() - s)
    }

    pub fn outcome(&self) -> Option<FollowOutcome> {
        self.outcome
    }

    pub fn is_done(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn follower(&self) -> &PathFollower {
        &self.follower
    }

    pub fn follower_mut(&mut self) -> &mut PathFollower {
        &mut self.follower
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        loc::Pose,
        path::{Path, Waypoint},
    };
    use std::{cell::Cell, sync::Arc};

    struct FixedClock(Cell<f64>);

    impl Clock for FixedClock {
        fn now_s(&self) -> f64 {
            self.0.get()
        }
    }

    struct Parked;

    impl OdomSource for Parked {
        fn pose(&self) -> Pose {
            Pose::new(0.0, 0.0, 0.0)
        }

        fn displacement_m(&self) -> f64 {
            0.0
        }

        fn velocity_ms(&self) -> f64 {
            0.0
        }
    }

    fn follower() -> PathFollower {
        let path = Arc::new(
            Path::new(vec![Waypoint::new(0.0, 0.0), Waypoint::new(10.0, 0.0)], false).unwrap(),
        );
        PathFollower::new(path, Params::default()).unwrap()
    }

    #[test]
    fn test_timeout() {
        let clock = FixedClock(Cell::new(5.0));
        let mut timed = TimedFollow::new(follower(), 1.0);

        timed.update(&clock, &Parked);
        assert!(!timed.is_done());

        clock.0.set(5.5);
        assert!((timed.elapsed_s(&clock) - 0.5).abs() < 1e-12);
        timed.update(&clock, &Parked);
        assert!(!timed.is_done());

        clock.0.set(6.5);
        let twist = timed.update(&clock, &Parked);
        assert_eq!(twist, Twist::identity());
        assert_eq!(
            timed.outcome(),
            Some(FollowOutcome::TimedOut {
                elapsed_s: 1.5,
                remaining_m: 10.0
            })
        );
        assert!(timed.follower().is_finished());
    }

    #[test]
    fn test_completed() {
        let clock = FixedClock(Cell::new(0.0));
        let mut timed = TimedFollow::new(follower(), f64::INFINITY);

        timed.update(&clock, &Parked);
        timed.follower().force_finish();

        clock.0.set(0.25);
        timed.update(&clock, &Parked);
        assert_eq!(timed.outcome(), Some(FollowOutcome::Completed { elapsed_s: 0.25 }));
    }
}
