mod common;

use std::sync::atomic::Ordering;

use common::{
    fast_poll, job_manager, true_transform, Move, Rig, SimMotion, CENTER_XY, FRAME, TRUE_MPP,
};
use nozzle_align::{
    CalibrationParams, CalibrationRunner, CalibrationState, CenteringController, CenteringError,
    CenteringParams, WIGGLE_MOVES,
};

fn controller() -> CenteringController {
    CenteringController::new(CenteringParams {
        poll: fast_poll(),
        ..CenteringParams::default()
    })
}

fn calibrated(transform: nozzle_align::calib::TransformMatrix) -> CalibrationState {
    CalibrationState {
        mpp: Some(TRUE_MPP),
        transform: Some(transform),
        center_point: Some(CENTER_XY),
        frame_size: FRAME,
    }
}

fn assert_near_center(xy: [f64; 2], tol: f64) {
    assert!(
        (xy[0] - CENTER_XY[0]).abs() < tol && (xy[1] - CENTER_XY[1]).abs() < tol,
        "{xy:?} is not within {tol} of {CENTER_XY:?}"
    );
}

#[test]
fn exact_transform_converges_quickly() {
    let rig = Rig::at([100.1, 49.95]);
    let jobs = job_manager(&rig);
    let state = calibrated(true_transform());

    let report = controller()
        .run(&state, &jobs, &mut SimMotion(rig.clone()))
        .unwrap();

    assert!(report.steps.len() <= 5, "took {} steps", report.steps.len());
    assert_eq!(report.wiggles, 0);
    let last = report.steps.last().unwrap();
    assert_eq!(last.uv, [320.0, 240.0]);
    assert_eq!(last.offset, [0.0, 0.0]);
    assert_eq!(report.position, rig.position());
    assert_near_center(rig.position(), 0.015);

    // Every correction kept the nozzle in view.
    let mut xy = [100.1, 49.95];
    for m in rig.moves() {
        let Move::Relative([dx, dy]) = m else {
            panic!("unexpected absolute move");
        };
        xy = [xy[0] + dx, xy[1] + dy];
        let [u, v] = Rig::project(xy);
        assert!(FRAME.contains(u, v), "move to {xy:?} left the frame");
    }
}

#[test]
fn calibrate_then_center() {
    let rig = Rig::at([100.1, 49.9]);
    let jobs = job_manager(&rig);
    let mut motion = SimMotion(rig.clone());

    let calibration = CalibrationRunner::new(CalibrationParams {
        poll: fast_poll(),
        ..CalibrationParams::default()
    })
    .run(&jobs, &mut motion)
    .unwrap();

    let report = controller()
        .run(&calibration.state, &jobs, &mut motion)
        .unwrap();
    assert_eq!(report.steps.last().map(|s| s.uv), Some([320.0, 240.0]));
    assert_near_center(rig.position(), 0.02);
}

#[test]
fn uncalibrated_state_is_rejected() {
    let rig = Rig::at([100.1, 49.95]);
    let jobs = job_manager(&rig);
    let err = controller()
        .run(&CalibrationState::default(), &jobs, &mut SimMotion(rig.clone()))
        .unwrap_err();
    assert_eq!(err, CenteringError::NotCalibrated);
    assert!(rig.moves().is_empty());
}

#[test]
fn lost_nozzle_wiggles_then_fails() {
    let rig = Rig::at([100.1, 49.95]);
    rig.visible.store(false, Ordering::SeqCst);
    let jobs = job_manager(&rig);

    let err = controller()
        .run(&calibrated(true_transform()), &jobs, &mut SimMotion(rig.clone()))
        .unwrap_err();
    assert_eq!(err, CenteringError::NotFound { wiggles: 4 });

    let expected: Vec<Move> = WIGGLE_MOVES.iter().map(|w| Move::Relative(*w)).collect();
    assert_eq!(rig.moves(), expected);
}

#[test]
fn wild_transform_is_stopped_at_the_frame_edge() {
    let rig = Rig::at([100.1, 49.95]);
    let jobs = job_manager(&rig);
    let mut t = true_transform();
    for row in t.rows.iter_mut() {
        for c in row.iter_mut().take(5) {
            *c *= 1000.0;
        }
    }

    let err = controller()
        .run(&calibrated(t), &jobs, &mut SimMotion(rig.clone()))
        .unwrap_err();
    assert!(matches!(err, CenteringError::OutOfFrame { .. }), "{err:?}");
    assert!(rig.moves().is_empty());
}

#[test]
fn retry_budget_is_enforced() {
    let rig = Rig::at([100.1, 49.95]);
    let jobs = job_manager(&rig);
    let ctl = CenteringController::new(CenteringParams {
        max_iterations: 2,
        poll: fast_poll(),
        ..CenteringParams::default()
    });

    let err = ctl
        .run(&calibrated(true_transform()), &jobs, &mut SimMotion(rig.clone()))
        .unwrap_err();
    assert_eq!(err, CenteringError::RetriesExhausted { iterations: 2 });
    assert_eq!(rig.moves().len(), 2);
}
