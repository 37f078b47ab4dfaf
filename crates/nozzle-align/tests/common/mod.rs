//! Simulated printer with a camera looking at the nozzle.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nozzle_align::calib::TransformMatrix;
use nozzle_align::core::{
    BlobLocator, DetectedBlob, FnSourceFactory, Frame, FrameError, FrameSize, FrameSource,
    FrameSourceFactory, Rgb,
};
use nozzle_align::jobs::{DetectionJobManager, JobManagerParams, PollParams, StabilizeParams};
use nozzle_align::{MotionController, MotionError};
use parking_lot::Mutex;

pub const FRAME: FrameSize = FrameSize::new(640, 480);
pub const TRUE_MPP: f64 = 0.02;
/// Machine position that puts the nozzle at the frame center.
pub const CENTER_XY: [f64; 2] = [100.0, 50.0];
pub const ROTATION_DEG: f64 = 3.0;

pub struct Rig {
    pub xy: Mutex<[f64; 2]>,
    pub homed: AtomicBool,
    pub visible: AtomicBool,
    /// Nozzle is hidden while the machine Y exceeds this.
    pub max_visible_y: Mutex<Option<f64>>,
    /// Every relative move, in order; absolute moves are recorded as targets.
    pub moves: Mutex<Vec<Move>>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Move {
    Relative([f64; 2]),
    Absolute([f64; 2]),
}

impl Rig {
    pub fn at(xy: [f64; 2]) -> Arc<Self> {
        Arc::new(Self {
            xy: Mutex::new(xy),
            homed: AtomicBool::new(true),
            visible: AtomicBool::new(true),
            max_visible_y: Mutex::new(None),
            moves: Mutex::new(Vec::new()),
        })
    }

    pub fn position(&self) -> [f64; 2] {
        *self.xy.lock()
    }

    /// Exact pixel position of the nozzle for machine position `xy`.
    pub fn project(xy: [f64; 2]) -> [f64; 2] {
        let (s, c) = ROTATION_DEG.to_radians().sin_cos();
        let dx = (xy[0] - CENTER_XY[0]) / TRUE_MPP;
        let dy = (xy[1] - CENTER_XY[1]) / TRUE_MPP;
        let (cx, cy) = FRAME.center();
        [cx + c * dx - s * dy, cy + s * dx + c * dy]
    }

    /// What the detector reports: whole pixels, only when in view.
    pub fn observe(&self) -> Option<[f64; 2]> {
        if !self.visible.load(Ordering::SeqCst) {
            return None;
        }
        let xy = self.position();
        if matches!(*self.max_visible_y.lock(), Some(max) if xy[1] > max) {
            return None;
        }
        let [u, v] = Self::project(xy);
        FRAME.contains(u, v).then(|| [u.round(), v.round()])
    }

    pub fn moves(&self) -> Vec<Move> {
        self.moves.lock().clone()
    }
}

/// Exact transform of the rig's camera.
pub fn true_transform() -> TransformMatrix {
    let (s, c) = ROTATION_DEG.to_radians().sin_cos();
    let (w, h) = (FRAME.width as f64, FRAME.height as f64);
    TransformMatrix::new([
        [0.0, 0.0, 0.0, TRUE_MPP * c * w, TRUE_MPP * s * h, CENTER_XY[0]],
        [0.0, 0.0, 0.0, -TRUE_MPP * s * w, TRUE_MPP * c * h, CENTER_XY[1]],
    ])
}

pub struct SimLocator(pub Arc<Rig>);

impl BlobLocator for SimLocator {
    fn locate(&self, _frame: &Frame) -> Option<DetectedBlob> {
        self.0.observe().map(|[u, v]| DetectedBlob::new(u, v, 12.0))
    }
}

pub struct SimMotion(pub Arc<Rig>);

impl MotionController for SimMotion {
    fn ensure_homed(&mut self) -> Result<(), MotionError> {
        if self.0.homed.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(MotionError::NotHomed)
        }
    }

    fn move_relative(&mut self, dx: f64, dy: f64) -> Result<(), MotionError> {
        let mut xy = self.0.xy.lock();
        xy[0] += dx;
        xy[1] += dy;
        self.0.moves.lock().push(Move::Relative([dx, dy]));
        Ok(())
    }

    fn move_absolute(&mut self, x: f64, y: f64) -> Result<(), MotionError> {
        *self.0.xy.lock() = [x, y];
        self.0.moves.lock().push(Move::Absolute([x, y]));
        Ok(())
    }

    fn position(&mut self) -> Result<[f64; 3], MotionError> {
        let [x, y] = self.0.position();
        Ok([x, y, 5.0])
    }
}

pub fn job_manager(rig: &Arc<Rig>) -> DetectionJobManager {
    let blank: Arc<dyn FrameSourceFactory> = Arc::new(FnSourceFactory(
        || -> Result<Box<dyn FrameSource + Send>, FrameError> {
            Ok(Box::new(|| Ok::<_, FrameError>(Frame::filled(8, 8, Rgb::WHITE))))
        },
    ));
    DetectionJobManager::new(
        blank,
        Arc::new(SimLocator(rig.clone())),
        JobManagerParams {
            stabilize: StabilizeParams {
                min_matches: 3,
                timeout_s: 0.05,
                xy_tolerance: 1.0,
                frame_delay_s: 0.0,
            },
            retention_s: 600.0,
            frame_size: FRAME,
        },
    )
}

pub fn fast_poll() -> PollParams {
    PollParams {
        interval_s: 0.001,
        timeout_s: 5.0,
    }
}
