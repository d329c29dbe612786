//! # Simulation module
//!
//! A kinematic stand-in for the vehicle, used by the `follow_sim` binary, the scenario tests and
//! the benchmarks. The drive tracks the commanded twist exactly, integrating it along a constant
//! curvature arc each cycle.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

use crate::{
    loc::{Clock, OdomSource, Pose, Twist},
    path_follower::FollowReport,
};
use util::{
    archive::{ArchiveError, Archived, Archiver},
    session::Session,
};

pub use params::Params;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Ideal differential drive with perfect odometry.
#[derive(Debug, Copy, Clone, Serialize, Default)]
pub struct SimDrive {
    pose: Pose,

    displacement_m: f64,

    velocity_ms: f64,
}

/// Clock advancing by a fixed period on every step.
#[derive(Debug, Copy, Clone)]
pub struct SimClock {
    now_s: f64,

    period_s: f64,
}

/// Archives the follower report and drive state each cycle.
pub struct SimRecorder {
    arch_report: Archiver,

    arch_drive: Archiver,

    report: FollowReport,

    drive: DriveRecord,
}

/// Flattened drive state for archiving.
#[derive(Debug, Copy, Clone, Serialize, Default)]
struct DriveRecord {
    time_s: f64,
    x_m: f64,
    y_m: f64,
    heading_rad: f64,
    displacement_m: f64,
    velocity_ms: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SimDrive {
    pub fn new(pose: Pose) -> Self {
        Self {
            pose,
            displacement_m: 0.0,
            velocity_ms: 0.0,
        }
    }

    /// Drive with the given output twist for `dt_s`.
    ///
    /// The angular component of the twist is positive clockwise, as produced by the path
    /// follower.
    pub fn apply(&mut self, twist: &Twist, dt_s: f64) {
        let delta = Twist::new(twist.dx * dt_s, twist.dy * dt_s, -twist.dtheta * dt_s);

        self.pose = self.pose.integrate(&delta);
        self.displacement_m += delta.dx;
        self.velocity_ms = twist.dx;
    }
}

impl OdomSource for SimDrive {
    fn pose(&self) -> Pose {
        self.pose
    }

    fn displacement_m(&self) -> f64 {
        self.displacement_m
    }

    fn velocity_ms(&self) -> f64 {
        self.velocity_ms
    }
}

impl SimClock {
    pub fn new(start_s: f64, period_s: f64) -> Self {
        Self {
            now_s: start_s,
            period_s,
        }
    }

    pub fn step(&mut self) {
        self.now_s += self.period_s;
    }

    pub fn period_s(&self) -> f64 {
        self.period_s
    }
}

impl Clock for SimClock {
    fn now_s(&self) -> f64 {
        self.now_s
    }
}

impl SimRecorder {
    /// Create the recorder, with archives in the session's archive directory.
    pub fn new(session: &Session) -> Result<Self, ArchiveError> {
        Ok(Self {
            arch_report: Archiver::from_path(session, "follow_report.csv")?,
            arch_drive: Archiver::from_path(session, "sim_drive.csv")?,
            report: FollowReport::default(),
            drive: DriveRecord::default(),
        })
    }

    /// Set the data to be written on the next call to `write`.
    pub fn record(&mut self, report: FollowReport, drive: &SimDrive) {
        self.report = report;
        self.drive = DriveRecord {
            time_s: report.time_s,
            x_m: drive.pose.position_m[0],
            y_m: drive.pose.position_m[1],
            heading_rad: drive.pose.heading_rad,
            displacement_m: drive.displacement_m,
            velocity_ms: drive.velocity_ms,
        };
    }
}

impl Archived for SimRecorder {
    fn write(&mut self) -> Result<(), ArchiveError> {
        self.arch_report.serialise(self.report)?;
        self.arch_drive.serialise(self.drive)
    }
}
