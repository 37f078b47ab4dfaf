use nozzle_align_calib::CalibrationError;
use nozzle_align_jobs::PollError;

use crate::motion::MotionError;

/// Failure of a camera calibration run.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CalibrateError {
    #[error(transparent)]
    Motion(#[from] MotionError),

    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    #[error("nozzle not found at the start position: {0}")]
    StartNotFound(PollError),

    #[error(transparent)]
    Detection(PollError),
}

/// Failure of a nozzle centering run.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CenteringError {
    #[error("camera is not calibrated")]
    NotCalibrated,

    #[error(transparent)]
    Motion(#[from] MotionError),

    #[error("move ({dx:.3}, {dy:.3}) would leave the frame (predicted pixel {predicted:?})")]
    OutOfFrame {
        dx: f64,
        dy: f64,
        predicted: Option<[f64; 2]>,
    },

    #[error("nozzle not found after {wiggles} wiggle moves")]
    NotFound { wiggles: usize },

    #[error(transparent)]
    Detection(PollError),

    #[error("nozzle not centered after {iterations} iterations")]
    RetriesExhausted { iterations: usize },
}

/// Configuration file failures.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
