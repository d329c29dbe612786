//! Motion states, segments and profiles

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The one dimensional state of the vehicle along the path at a given time.
#[derive(Debug, Copy, Clone, Default, Serialize, PartialEq)]
pub struct MotionState {
    pub t_s: f64,
    pub pos_m: f64,
    pub vel_ms: f64,
    pub acc_mss: f64,
}

/// A constant acceleration segment of a profile.
///
/// A segment with zero duration and an infinite acceleration represents an instantaneous change
/// of velocity.
#[derive(Debug, Copy, Clone, Serialize, PartialEq)]
pub struct MotionSegment {
    pub start: MotionState,
    pub end: MotionState,
}

/// A continuous sequence of constant acceleration segments.
#[derive(Debug, Clone, Serialize)]
pub struct MotionProfile {
    /// State the profile starts in, used while it has no segments
    initial: MotionState,

    segments: Vec<MotionSegment>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl MotionState {
    pub fn new(t_s: f64, pos_m: f64, vel_ms: f64, acc_mss: f64) -> Self {
        Self {
            t_s,
            pos_m,
            vel_ms,
            acc_mss,
        }
    }

    /// The state reached at time `t_s` under this state's acceleration.
    pub fn extrapolate(&self, t_s: f64) -> Self {
        self.extrapolate_with(t_s, self.acc_mss)
    }

    /// The state reached at time `t_s` under the given acceleration.
    pub fn extrapolate_with(&self, t_s: f64, acc_mss: f64) -> Self {
        let dt = t_s - self.t_s;

        Self {
            t_s,
            pos_m: self.pos_m + self.vel_ms * dt + 0.5 * acc_mss * dt * dt,
            vel_ms: self.vel_ms + acc_mss * dt,
            acc_mss,
        }
    }

    /// The same state mirrored about zero displacement.
    pub fn flipped(&self) -> Self {
        Self {
            t_s: self.t_s,
            pos_m: -self.pos_m,
            vel_ms: -self.vel_ms,
            acc_mss: -self.acc_mss,
        }
    }
}

impl MotionSegment {
    pub fn duration_s(&self) -> f64 {
        self.end.t_s - self.start.t_s
    }

    pub fn contains_time(&self, t_s: f64) -> bool {
        t_s >= self.start.t_s && t_s <= self.end.t_s
    }

    /// Sample the segment at the given time, which must lie within it.
    pub fn sample(&self, t_s: f64) -> MotionState {
        if self.start.acc_mss.is_finite() {
            self.start.extrapolate(t_s)
        } else {
            MotionState { t_s, ..self.end }
        }
    }

    fn flipped(&self) -> Self {
        Self {
            start: self.start.flipped(),
            end: self.end.flipped(),
        }
    }
}

impl MotionProfile {
    /// Create an empty profile starting in the given state.
    pub fn new(initial: MotionState) -> Self {
        Self {
            initial,
            segments: Vec::new(),
        }
    }

    pub fn segments(&self) -> &[MotionSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn start_state(&self) -> MotionState {
        self.segments.first().map_or(self.initial, |s| s.start)
    }

    pub fn end_state(&self) -> MotionState {
        self.segments.last().map_or(self.initial, |s| s.end)
    }

    pub fn start_time_s(&self) -> f64 {
        self.start_state().t_s
    }

    pub fn end_time_s(&self) -> f64 {
        self.end_state().t_s
    }

    pub fn duration_s(&self) -> f64 {
        self.end_time_s() - self.start_time_s()
    }

    /// Append a segment of constant acceleration lasting `dt_s`.
    ///
    /// Non-positive durations are ignored.
    pub fn append_control(&mut self, acc_mss: f64, dt_s: f64) {
        if !(dt_s > 0.0) {
            return;
        }

        let last = self.end_state();
        let start = MotionState { acc_mss, ..last };
        let end = start.extrapolate(last.t_s + dt_s);

        self.segments.push(MotionSegment { start, end });
    }

    /// Append an instantaneous change of velocity.
    pub fn append_step(&mut self, vel_ms: f64) {
        let last = self.end_state();
        let acc_mss = if vel_ms < last.vel_ms {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };

        self.segments.push(MotionSegment {
            start: MotionState { acc_mss, ..last },
            end: MotionState {
                vel_ms,
                acc_mss,
                ..last
            },
        });
    }

    /// Append all segments of another profile, which should start where this one ends.
    pub fn append_profile(&mut self, other: &MotionProfile) {
        self.segments.extend_from_slice(&other.segments);
    }

    /// The state of the profile at the given time, or `None` if the time is outside of it.
    pub fn state_by_time(&self, t_s: f64) -> Option<MotionState> {
        if self.segments.is_empty() {
            return if t_s == self.initial.t_s {
                Some(self.initial)
            } else {
                None
            };
        }

        self.segments
            .iter()
            .find(|s| s.contains_time(t_s))
            .map(|s| s.sample(t_s))
    }

    /// The state of the profile at the given time, held at the start or end state outside of it.
    pub fn sample(&self, t_s: f64) -> MotionState {
        if t_s <= self.start_time_s() {
            return MotionState {
                t_s,
                ..self.start_state()
            };
        }
        if t_s >= self.end_time_s() {
            return MotionState {
                t_s,
                acc_mss: 0.0,
                ..self.end_state()
            };
        }

        self.state_by_time(t_s).unwrap_or(MotionState {
            t_s,
            ..self.end_state()
        })
    }

    /// The same profile mirrored about zero displacement.
    pub fn flipped(&self) -> Self {
        Self {
            initial: self.initial.flipped(),
            segments: self.segments.iter().map(|s| s.flipped()).collect(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_extrapolate() {
        let s = MotionState::new(1.0, 2.0, 3.0, 4.0).extrapolate(3.0);

        assert_relative_eq!(s.t_s, 3.0);
        assert_relative_eq!(s.pos_m, 2.0 + 6.0 + 8.0);
        assert_relative_eq!(s.vel_ms, 11.0);
        assert_relative_eq!(s.acc_mss, 4.0);

        let f = s.flipped();
        assert_relative_eq!(f.pos_m, -16.0);
        assert_relative_eq!(f.vel_ms, -11.0);
        assert_relative_eq!(f.acc_mss, -4.0);
    }

    #[test]
    fn test_profile_sampling() {
        let mut profile = MotionProfile::new(MotionState::new(0.0, 0.0, 0.0, 0.0));
        profile.append_control(2.0, 1.0);
        profile.append_control(0.0, 1.0);
        profile.append_control(-2.0, 1.0);
        profile.append_control(1.0, 0.0);

        assert_eq!(profile.segments().len(), 3);
        assert_relative_eq!(profile.duration_s(), 3.0);
        assert_relative_eq!(profile.end_state().pos_m, 4.0);
        assert_relative_eq!(profile.end_state().vel_ms, 0.0);

        let mid = profile.state_by_time(1.5).unwrap();
        assert_relative_eq!(mid.pos_m, 2.0);
        assert_relative_eq!(mid.vel_ms, 2.0);
        assert!(profile.state_by_time(3.5).is_none());

        let after = profile.sample(10.0);
        assert_relative_eq!(after.pos_m, 4.0);
        assert_relative_eq!(after.t_s, 10.0);
        assert_relative_eq!(after.acc_mss, 0.0);

        let before = profile.sample(-1.0);
        assert_relative_eq!(before.pos_m, 0.0);
    }

    #[test]
    fn test_step() {
        let mut profile = MotionProfile::new(MotionState::new(0.0, 1.0, 5.0, 0.0));
        profile.append_step(0.0);

        assert_relative_eq!(profile.duration_s(), 0.0);
        assert_relative_eq!(profile.end_state().vel_ms, 0.0);
        assert_relative_eq!(profile.end_state().pos_m, 1.0);
        assert!(profile.end_state().acc_mss.is_infinite());

        let s = profile.state_by_time(0.0).unwrap();
        assert_relative_eq!(s.vel_ms, 0.0);
    }
}
