//! # Follow Simulation
//!
//! This binary runs the path follower against an ideal simulated vehicle. It is designed to allow
//! quick tuning of the follower parameters without requiring the physical vehicle.
//!
//! The follower report and the simulated drive state are archived every cycle in the session's
//! archive directory.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    fs,
    path::PathBuf,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use color_eyre::{
    eyre::{eyre, WrapErr},
    Result,
};
use log::{debug, info, warn};
use structopt::StructOpt;

use follow_lib::{
    loc::{Clock, OdomSource, Pose},
    path::{Path, Waypoint},
    path_follower::{self, FollowOutcome, PathFollower, TimedFollow},
    sim::{self, SimClock, SimDrive, SimRecorder},
};
use util::{
    archive::Archived,
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "follow_sim", about = "Run the path follower against a simulated vehicle")]
struct Opts {
    /// Simulation parameter file, relative to the params directory
    #[structopt(long, default_value = "follow_sim.toml")]
    sim_params: String,

    /// Path follower parameter file, relative to the params directory
    #[structopt(long, default_value = "path_follower.toml")]
    follower_params: String,

    /// JSON file containing the list of waypoints to follow, overriding the simulation parameters
    #[structopt(long, parse(from_os_str))]
    path: Option<PathBuf>,

    /// Include trace messages in the log
    #[structopt(short, long)]
    verbose: bool,
}

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    color_eyre::install()?;

    let opts = Opts::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("follow_sim", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    let level = if opts.verbose {
        LevelFilter::Trace
    } else {
        LevelFilter::Debug
    };
    logger_init(level, &session).wrap_err("Failed to initialise logging")?;

    info!("Follow Simulation\n");
    info!("Session directory: {:?}\n", session.session_root);
    debug!("CLI arguments: {:?}", opts);

    // ---- LOAD PARAMETERS ----

    let sim_params: sim::Params =
        util::params::load(&opts.sim_params).wrap_err("Could not load sim params")?;
    let follower_params: path_follower::Params =
        util::params::load(&opts.follower_params).wrap_err("Could not load follower params")?;

    sim_params.validate().map_err(|e| eyre!(e))?;

    // ---- PATH ----

    let waypoints: Vec<Waypoint> = match opts.path {
        Some(ref p) => {
            info!("Loading path from {:?}", p);
            let s = fs::read_to_string(p).wrap_err("Could not read the path file")?;
            serde_json::from_str(&s).wrap_err("Could not parse the path file")?
        }
        None => sim_params.waypoints.clone(),
    };

    let path = Arc::new(Path::new(waypoints, sim_params.reversed).wrap_err("Invalid path")?);
    info!(
        "Following a {:.3} m path with {} segments{}",
        path.length_m(),
        path.num_segments(),
        if path.is_reversed() { " in reverse" } else { "" }
    );
    session.save("path.json", &*path);

    // ---- MODULE INIT ----

    let follower = PathFollower::new(path.clone(), follower_params)
        .wrap_err("Failed to initialise the path follower")?;
    let mut mnvr = TimedFollow::new(follower, sim_params.timeout_s);

    let [x_m, y_m, heading_rad] = sim_params.start_pose;
    let mut drive = SimDrive::new(Pose::new(x_m, y_m, heading_rad));
    let mut clock = SimClock::new(0.0, sim_params.cycle_period_s);

    let mut recorder = SimRecorder::new(&session).wrap_err("Failed to create the archives")?;

    // Announced distances, largest first
    let mut announcements = sim_params.announce_distances_m.clone();
    announcements.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let mut num_cycles: u64 = 0;

    loop {
        let cycle_start_instant = Instant::now();

        // ---- CONTROL ----

        let twist = mnvr.update(&clock, &drive);

        for event in mnvr.follower_mut().take_events() {
            debug!("Event at {:.3} s: {:?}", clock.now_s(), event);
        }

        while let Some(&d) = announcements.first() {
            if mnvr.follower().remaining_within(d) {
                info!(
                    "Within {} m of the end after {:.3} s",
                    d,
                    mnvr.elapsed_s(&clock)
                );
                announcements.remove(0);
            } else {
                break;
            }
        }

        // ---- SIMULATION ----

        drive.apply(&twist, clock.period_s());

        // ---- ARCHIVE ----

        recorder.record(mnvr.follower().report(), &drive);
        if let Err(e) = recorder.write() {
            warn!("Could not write archives: {}", e);
        }

        num_cycles += 1;

        if let Some(outcome) = mnvr.outcome() {
            match outcome {
                FollowOutcome::Completed { elapsed_s } => info!(
                    "Path completed in {:.3} s ({} cycles), final pose {:?}",
                    elapsed_s,
                    num_cycles,
                    drive.pose()
                ),
                FollowOutcome::TimedOut {
                    elapsed_s,
                    remaining_m,
                } => warn!(
                    "Timed out after {:.3} s ({} cycles) with {:.3} m remaining",
                    elapsed_s, num_cycles, remaining_m
                ),
            }
            session.save("outcome.json", &outcome);
            break;
        }

        // ---- CYCLE MANAGEMENT ----

        if sim_params.real_time {
            let cycle_dur = Instant::now() - cycle_start_instant;

            match Duration::from_secs_f64(clock.period_s()).checked_sub(cycle_dur) {
                Some(d) => thread::sleep(d),
                None => warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - clock.period_s()
                ),
            }
        }

        clock.step();
    }

    info!(
        "Final displacement {:.3} m, degenerate cycles {}",
        drive.displacement_m(),
        mnvr.follower().num_degenerate_cycles()
    );

    Ok(())
}
