//! End to end scenarios of the path follower driving a simulated vehicle.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::Arc;

use approx::assert_relative_eq;

use follow_lib::{
    loc::{OdomSource, Pose, Twist},
    path::{Path, Waypoint},
    path_follower::{
        fuse_curvature, FollowEvent, FollowOutcome, FollowerParams, Params, PathFollower,
        TimedFollow,
    },
    profile, pursuit_ctrl,
    sim::{SimClock, SimDrive},
};

// ------------------------------------------------------------------------------------------------
// HELPERS
// ------------------------------------------------------------------------------------------------

const DT: f64 = 0.01;

/// Parameters in the units of a 100 unit long test track
fn track_params() -> Params {
    Params {
        pursuit: pursuit_ctrl::Params {
            min_lookahead_m: 12.0,
            max_lookahead_m: 50.0,
            min_lookahead_speed_ms: 9.0,
            max_lookahead_speed_ms: 60.0,
            finish_tolerance_m: 0.25,
            search_window_segments: 4,
            lost_distance_m: 10.0,
            max_lat_accel_mss: 1000.0,
            max_speed_ms: 60.0,
        },
        profile: profile::Params {
            kp: 0.0,
            kv: 0.0,
            kffv: 1.0,
            kffa: 0.0,
            max_output_ms: 100.0,
        },
        follower: FollowerParams {
            max_vel_ms: 60.0,
            max_accel_mss: 40.0,
            max_decel_mss: 40.0,
            goal_pos_tolerance_m: 0.5,
            goal_vel_tolerance_ms: 2.0,
            stop_steering_distance_m: 9.0,
            auto_stop_distance_m: 25.0,
            auto_stop_dwell_s: 2.0,
            inertia_steering_gain: 0.0,
            max_yaw_rate_rads: 100.0,
        },
    }
}

/// Parameters for a small vehicle, in metres
fn vehicle_params() -> Params {
    Params {
        pursuit: pursuit_ctrl::Params {
            max_lat_accel_mss: 1.0,
            max_lookahead_speed_ms: 1.5,
            max_speed_ms: 1.5,
            ..pursuit_ctrl::Params::default()
        },
        profile: profile::Params {
            max_output_ms: 2.0,
            ..profile::Params::default()
        },
        follower: FollowerParams {
            max_vel_ms: 1.5,
            max_accel_mss: 1.0,
            max_decel_mss: 1.5,
            max_yaw_rate_rads: 3.0,
            ..FollowerParams::default()
        },
    }
}

fn track() -> Arc<Path> {
    Arc::new(Path::new(vec![Waypoint::new(0.0, 0.0), Waypoint::new(100.0, 0.0)], false).unwrap())
}

/// Summary of a run
struct Run {
    follower: PathFollower,
    drive: SimDrive,
    events: Vec<FollowEvent>,
    max_speed_ms: f64,
    cycles: usize,
}

/// Run the follower against the simulated drive until it finishes or the cycle limit is hit.
///
/// `check` is called after every update.
fn run<F>(
    path: Arc<Path>,
    params: Params,
    start: SimDrive,
    dt: f64,
    max_cycles: usize,
    mut check: F,
) -> Run
where
    F: FnMut(&PathFollower, &Twist),
{
    let mut follower = PathFollower::new(path, params).unwrap();
    let mut drive = start;
    let mut events = Vec::new();
    let mut max_speed_ms: f64 = 0.0;
    let mut cycles = 0;

    for i in 0..max_cycles {
        let t = i as f64 * dt;
        let twist = follower.update(
            t,
            &drive.pose(),
            drive.displacement_m(),
            drive.velocity_ms(),
        );
        check(&follower, &twist);
        events.extend(follower.take_events());
        cycles = i + 1;

        if follower.is_finished() {
            break;
        }

        drive.apply(&twist, dt);
        max_speed_ms = max_speed_ms.max(drive.velocity_ms().abs());
    }

    Run {
        follower,
        drive,
        events,
        max_speed_ms,
        cycles,
    }
}

fn count(events: &[FollowEvent], event: FollowEvent) -> usize {
    events.iter().filter(|&&e| e == event).count()
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[test]
fn test_straight_track() {
    let mut last_remaining = f64::INFINITY;
    let mut last_linear_ms = 0.0;
    let mut accels = Vec::new();
    let mut cruise_cycles = 0;

    let run = run(
        track(),
        track_params(),
        SimDrive::new(Pose::new(0.0, 0.0, 0.0)),
        DT,
        1000,
        |f, twist| {
            // Finished exactly when all three conditions hold
            assert_eq!(
                f.is_finished(),
                f.steering_finished() && f.profile_finished() && f.on_target()
            );
            assert!(f.remaining_path_length_m() <= last_remaining);
            last_remaining = f.remaining_path_length_m();
            assert!(twist.is_finite());
            assert_eq!(twist.dy, 0.0);

            // The setpoint never plans beyond the limits
            assert!(f.report().setpoint_acc_mss.abs() <= 40.0 + 1e-9);

            // Acceleration actually commanded, the last twist is never driven
            if !f.is_finished() {
                let accel_mss = (twist.dx - last_linear_ms) / DT;
                if (twist.dx - 60.0).abs() < 1e-6 && accel_mss.abs() < 1e-6 {
                    cruise_cycles += 1;
                }
                accels.push(accel_mss);
                last_linear_ms = twist.dx;
            }
        },
    );

    assert!(run.follower.is_finished());
    assert!(run.cycles < 1000);

    // Trapezoid: accelerate and decelerate at the limits, holding 60 in between
    for a in accels.iter() {
        assert!(a.abs() <= 40.0 + 1e-6, "acceleration {} beyond the limits", a);
    }
    assert!(accels.iter().any(|&a| (a - 40.0).abs() < 1e-6));
    assert!(accels.iter().any(|&a| a < -30.0));
    assert!(cruise_cycles > 0);
    assert_eq!(count(&run.events, FollowEvent::AutoStopFired), 0);
    assert_eq!(count(&run.events, FollowEvent::Finished), 1);
    assert_eq!(run.events.last(), Some(&FollowEvent::Finished));

    // Cruises at the speed limit
    assert_relative_eq!(run.max_speed_ms, 60.0, epsilon = 1e-6);

    assert!((run.drive.displacement_m() - 100.0).abs() < 0.5);
    assert!(run.drive.velocity_ms().abs() < 2.0);
    assert!(run.follower.remaining_within(0.25));
}

#[test]
fn test_auto_stop_when_stalled() {
    let mut follower = PathFollower::new(track(), track_params()).unwrap();
    let mut events = Vec::new();

    // Stuck 20 from the end
    for i in 0..300 {
        let t = i as f64 * DT;
        let twist = follower.update(t, &Pose::new(80.0, 0.0, 0.0), 80.0, 0.0);
        events.extend(follower.take_events());

        assert!(twist.is_finite());
        if i <= 200 {
            assert!(!follower.is_finished(), "finished early at {} s", t);
        }
        if i > 200 {
            assert!(follower.is_finished(), "not finished at {} s", t);
        }
    }

    assert!(!follower.steering_finished());
    assert_eq!(
        events,
        vec![
            FollowEvent::AutoStopArmed,
            FollowEvent::AutoStopFired,
            FollowEvent::Finished
        ]
    );
}

#[test]
fn test_force_finish_mid_path() {
    let mut follower = PathFollower::new(track(), track_params()).unwrap();
    let mut drive = SimDrive::new(Pose::new(0.0, 0.0, 0.0));

    for i in 0..50 {
        let twist = follower.update(
            i as f64 * DT,
            &drive.pose(),
            drive.displacement_m(),
            drive.velocity_ms(),
        );
        drive.apply(&twist, DT);
    }
    assert!(!follower.is_finished());
    follower.take_events();

    let handle = follower.finish_handle();
    std::thread::spawn(move || handle.force_finish())
        .join()
        .unwrap();

    // Finished straight away, before the next cycle has run
    assert!(follower.is_finished());
    assert!(follower.remaining_path_length_m() > 25.0);

    follower.update(0.5, &drive.pose(), drive.displacement_m(), drive.velocity_ms());
    assert_eq!(follower.take_events(), vec![FollowEvent::Finished]);
}

#[test]
fn test_zero_delta_at_end() {
    let mut follower = PathFollower::new(track(), track_params()).unwrap();

    let twist = follower.update(0.0, &Pose::new(100.0, 0.0, 0.0), 100.0, 0.0);

    assert_eq!(twist, Twist::identity());
    assert_eq!(follower.num_degenerate_cycles(), 1);
    assert!(follower.report().degenerate_delta);
    assert!(follower.done_steering());
    assert!(follower.steering_finished());
    assert_eq!(follower.remaining_path_length_m(), 0.0);
}

#[test]
fn test_idempotent_updates() {
    let mut follower = PathFollower::new(track(), track_params()).unwrap();
    let mut drive = SimDrive::new(Pose::new(0.0, 1.0, 0.1));

    for i in 0..400 {
        let t = i as f64 * DT;
        let first = follower.update(t, &drive.pose(), drive.displacement_m(), drive.velocity_ms());
        let second = follower.update(t, &drive.pose(), drive.displacement_m(), drive.velocity_ms());

        assert_eq!(first, second, "cycle {}", i);

        if follower.is_finished() {
            break;
        }
        drive.apply(&first, DT);
    }

    assert!(follower.is_finished());
}

#[test]
fn test_violates_max_decel_rather_than_overshoot() {
    let mut params = track_params();
    params.follower.max_decel_mss = 10.0;

    // Moving at 50 with only 5 left
    let mut start = SimDrive::new(Pose::new(0.0, 0.0, 0.0));
    start.apply(&Twist::new(50.0, 0.0, 0.0), 1.9);

    let mut accels = Vec::new();
    let run = run(track(), params, start, DT, 500, |f, _| {
        accels.push(f.report().setpoint_acc_mss);
        assert!(f.report().setpoint_pos_m <= 100.0 + 1e-6);
    });

    // Braking far harder than the limit straight away
    assert!(accels.iter().take(5).all(|&a| a < -10.0 * 5.0));

    assert!(run.follower.is_finished());
    assert_eq!(count(&run.events, FollowEvent::AutoStopFired), 0);
    assert!(run.drive.displacement_m() <= 100.0 + 0.5);
    assert!(run.drive.pose().position_m[0] <= 100.0 + 0.5);
}

#[test]
fn test_curved_path() {
    let path = Arc::new(
        Path::new(
            vec![
                Waypoint::with_speed(0.0, 0.0, 1.0),
                Waypoint::new(5.0, 0.0),
                Waypoint::new(5.0, 5.0),
            ],
            false,
        )
        .unwrap(),
    );
    let mut last_remaining = f64::INFINITY;

    let run = run(
        path,
        vehicle_params(),
        SimDrive::new(Pose::new(0.0, 0.3, 0.3)),
        0.02,
        2000,
        |f, _| {
            assert!(f.remaining_path_length_m() <= last_remaining);
            last_remaining = f.remaining_path_length_m();

            // Heading correction only frozen near the end
            if f.done_steering() {
                assert!(f.remaining_path_length_m() < 0.25);
            }
        },
    );

    assert!(run.follower.is_finished());
    assert_eq!(count(&run.events, FollowEvent::AutoStopFired), 0);
    assert_eq!(count(&run.events, FollowEvent::DoneSteering), 1);

    let end = run.drive.pose().position_m;
    assert!((end[0] - 5.0).abs() < 0.05);
    assert!((end[1] - 5.0).abs() < 0.05);
}

#[test]
fn test_reversed_path() {
    let path = Arc::new(
        Path::new(vec![Waypoint::new(0.0, 0.0), Waypoint::new(-10.0, 0.0)], true).unwrap(),
    );

    let run = run(
        path,
        vehicle_params(),
        SimDrive::new(Pose::new(0.0, 0.0, 0.0)),
        0.02,
        2000,
        |_, twist| {
            assert!(twist.dx <= 0.0);
        },
    );

    assert!(run.follower.is_finished());
    assert_eq!(count(&run.events, FollowEvent::AutoStopFired), 0);
    assert!((run.drive.displacement_m() + 10.0).abs() < 0.05);
    assert!((run.drive.pose().position_m[0] + 10.0).abs() < 0.05);
}

#[test]
fn test_curvature_fusion() {
    let delta = Twist::new(2.0, 0.0, 0.5);

    // The output always has the curvature of the delta
    for i in -10..=10 {
        let v = i as f64 * 0.3;
        let out = fuse_curvature(&delta, v, v, 0.0, 3.0).unwrap();

        assert_relative_eq!(out.dx, v, epsilon = 1e-12);
        assert_relative_eq!(out.dtheta, -0.25 * v, epsilon = 1e-12);
    }

    // With inertia compensation the curvature grows with the setpoint speed
    let out = fuse_curvature(&delta, 2.0, 2.0, 0.5, 3.0).unwrap();
    assert_relative_eq!(out.dtheta, -0.25 * 2.0 * 2.0, epsilon = 1e-12);
}

#[test]
fn test_timed_follow() {
    let path = Arc::new(
        Path::new(vec![Waypoint::new(0.0, 0.0), Waypoint::new(5.0, 0.0)], false).unwrap(),
    );

    // Enough time to finish
    let follower = PathFollower::new(path.clone(), vehicle_params()).unwrap();
    let mut mnvr = TimedFollow::new(follower, 30.0);
    let mut drive = SimDrive::new(Pose::new(0.0, 0.0, 0.0));
    let mut clock = SimClock::new(0.0, 0.02);

    for _ in 0..2000 {
        let twist = mnvr.update(&clock, &drive);
        if mnvr.is_done() {
            break;
        }
        drive.apply(&twist, clock.period_s());
        clock.step();
    }

    match mnvr.outcome() {
        Some(FollowOutcome::Completed { elapsed_s }) => {
            assert!(elapsed_s > 1.0 && elapsed_s < 30.0)
        }
        o => panic!("Unexpected outcome {:?}", o),
    }
    assert!((drive.displacement_m() - 5.0).abs() < 0.05);

    // Not enough time
    let follower = PathFollower::new(path, vehicle_params()).unwrap();
    let mut mnvr = TimedFollow::new(follower, 1.0);
    let mut drive = SimDrive::new(Pose::new(0.0, 0.0, 0.0));
    let mut clock = SimClock::new(0.0, 0.02);

    for _ in 0..2000 {
        let twist = mnvr.update(&clock, &drive);
        if mnvr.is_done() {
            break;
        }
        drive.apply(&twist, clock.period_s());
        clock.step();
    }

    match mnvr.outcome() {
        Some(FollowOutcome::TimedOut {
            elapsed_s,
            remaining_m,
        }) => {
            assert!(elapsed_s > 1.0 && elapsed_s < 1.1);
            assert!(remaining_m > 1.0);
        }
        o => panic!("Unexpected outcome {:?}", o),
    }
    assert!(mnvr.follower().is_finished());
}
