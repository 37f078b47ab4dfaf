mod common;

use std::sync::atomic::Ordering;

use common::{fast_poll, job_manager, Move, Rig, SimMotion, CENTER_XY, FRAME, TRUE_MPP};
use nozzle_align::calib::CalibrationError;
use nozzle_align::{CalibrateError, CalibrationParams, CalibrationRunner, CIRCLE_OFFSETS};

fn runner() -> CalibrationRunner {
    CalibrationRunner::new(CalibrationParams {
        poll: fast_poll(),
        ..CalibrationParams::default()
    })
}

#[test]
fn calibration_finds_the_camera_center() {
    let rig = Rig::at([100.1, 49.9]);
    let jobs = job_manager(&rig);
    let mut motion = SimMotion(rig.clone());

    let report = runner().run(&jobs, &mut motion).unwrap();

    assert_eq!(report.attempted, 10);
    assert_eq!(report.collected, 11);
    assert!(report.average.samples.len() >= 8);
    // |dx| + |dy| travel overstates diagonal moves.
    assert!(report.average.mpp >= TRUE_MPP && report.average.mpp < 1.5 * TRUE_MPP);

    let state = &report.state;
    assert!(state.is_calibrated());
    assert_eq!(state.frame_size, FRAME);
    assert_eq!(state.center_point, Some(report.center_guess));
    assert!((report.center_guess[0] - CENTER_XY[0]).abs() < 0.1);
    assert!((report.center_guess[1] - CENTER_XY[1]).abs() < 0.1);

    let moves = rig.moves();
    assert_eq!(moves[0], Move::Relative(CIRCLE_OFFSETS[0]));
    assert_eq!(
        moves[1],
        Move::Relative([-CIRCLE_OFFSETS[0][0], -CIRCLE_OFFSETS[0][1]])
    );
    // Ten moves out, nine back, the extra step and the final absolute move.
    assert_eq!(moves.len(), 21);
    assert_eq!(moves.last(), Some(&Move::Absolute(report.center_guess)));
    assert_eq!(rig.position(), report.center_guess);

    let uv = report.center_uv.unwrap();
    assert!((uv[0] - 320.0).abs() <= 5.0 && (uv[1] - 240.0).abs() <= 5.0);
}

#[test]
fn unhomed_printer_is_rejected_before_moving() {
    let rig = Rig::at([100.1, 49.9]);
    rig.homed.store(false, Ordering::SeqCst);
    let jobs = job_manager(&rig);

    let err = runner().run(&jobs, &mut SimMotion(rig.clone())).unwrap_err();
    assert!(matches!(
        err,
        CalibrateError::Motion(nozzle_align::MotionError::NotHomed)
    ));
    assert!(rig.moves().is_empty());
}

#[test]
fn missing_nozzle_at_start_aborts() {
    let rig = Rig::at([100.1, 49.9]);
    rig.visible.store(false, Ordering::SeqCst);
    let jobs = job_manager(&rig);

    let err = runner().run(&jobs, &mut SimMotion(rig.clone())).unwrap_err();
    assert!(matches!(err, CalibrateError::StartNotFound(_)));
    assert!(rig.moves().is_empty());
}

#[test]
fn too_many_hidden_points_fail() {
    let rig = Rig::at([100.1, 49.9]);
    // Half the circle lies in a blind spot.
    *rig.max_visible_y.lock() = Some(49.91);
    let jobs = job_manager(&rig);

    let err = runner()
        .run(&jobs, &mut SimMotion(rig.clone()))
        .unwrap_err();
    assert_eq!(
        err,
        CalibrateError::Calibration(CalibrationError::TooManyFailedPoints {
            succeeded: 6,
            attempted: 10,
        })
    );

    // Every hidden point was still undone.
    let net = rig.position();
    let last = CIRCLE_OFFSETS[9];
    assert!((net[0] - (100.1 + 2.0 * last[0])).abs() < 1e-9);
    assert!((net[1] - (49.9 + 2.0 * last[1])).abs() < 1e-9);
}
