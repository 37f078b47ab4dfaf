//! Closed-loop centering of the nozzle over the camera.
//!
//! The controller alternates between measuring (one detection job) and
//! correcting (one damped relative move) until the predicted correction
//! rounds to zero, the retry budget runs out, or a move would push the
//! nozzle out of the frame.

use nalgebra::Vector2;
use nozzle_align_calib::{normalize_coords, predict_offset, round3, FeatureMode, TransformMatrix};
use nozzle_align_core::FrameSize;
use nozzle_align_jobs::{request_position, JobService, PollError, PollParams};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::calibration::CalibrationState;
use crate::error::CenteringError;
use crate::motion::MotionController;

/// Relative moves tried, in order, while the nozzle cannot be found.
pub const WIGGLE_MOVES: [[f64; 2]; 4] = [[0.1, 0.0], [-0.2, 0.0], [0.1, 0.1], [0.0, -0.2]];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CenteringParams {
    /// Measurement iterations before giving up.
    pub max_iterations: usize,
    pub wiggle_moves: Vec<[f64; 2]>,
    /// Taken from the config's top-level `poll` section.
    #[serde(skip)]
    pub poll: PollParams,
}

impl Default for CenteringParams {
    fn default() -> Self {
        Self {
            max_iterations: 30,
            wiggle_moves: WIGGLE_MOVES.to_vec(),
            poll: PollParams::default(),
        }
    }
}

/// Where the control loop is.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CenteringPhase {
    Measuring,
    Correcting { uv: [f64; 2], offset: [f64; 2] },
    Converged { uv: [f64; 2] },
}

/// One measurement of a centering run.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CenteringStep {
    pub iteration: usize,
    /// Machine XY at the time of the measurement.
    pub position: [f64; 2],
    pub uv: [f64; 2],
    /// Correction computed from `uv`, rounded to 3 decimals.
    pub offset: [f64; 2],
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CenteringReport {
    pub steps: Vec<CenteringStep>,
    pub wiggles: usize,
    /// Machine XY once converged.
    pub position: [f64; 2],
}

impl CenteringReport {
    pub fn iterations(&self) -> usize {
        self.steps.len() + self.wiggles
    }
}

/// Damped, rounded correction for a nozzle seen at `uv`.
pub fn centering_offset(transform: &TransformMatrix, uv: [f64; 2], frame: FrameSize) -> [f64; 2] {
    let [dx, dy] = predict_offset(transform, uv, frame, FeatureMode::Displacement);
    // `+ 0.0` folds -0.0 into 0.0
    [round3(dx) + 0.0, round3(dy) + 0.0]
}

/// Pixel position the nozzle is expected at after moving by `offset`.
///
/// The direction comes from the local derivative of the transform, the
/// length from the calibrated scale. `None` when the transform is
/// degenerate at `uv`.
pub fn predicted_pixel(
    transform: &TransformMatrix,
    mpp: f64,
    uv: [f64; 2],
    offset: [f64; 2],
    frame: FrameSize,
) -> Option<[f64; 2]> {
    let d = Vector2::new(offset[0], offset[1]);
    let step_mm = d.norm();
    if step_mm == 0.0 {
        return Some(uv);
    }
    if mpp <= 0.0 || !mpp.is_finite() {
        return None;
    }
    let j = transform.jacobian(normalize_coords(uv, frame));
    let dn = j.try_inverse()? * d;
    let dp = Vector2::new(dn[0] * frame.width as f64, dn[1] * frame.height as f64);
    let len = dp.norm();
    if len <= f64::EPSILON || !len.is_finite() {
        return None;
    }
    let step_px = dp * (step_mm / mpp / len);
    Some([uv[0] + step_px[0], uv[1] + step_px[1]])
}

/// Iteratively moves the nozzle to the camera center.
#[derive(Clone, Debug, Default)]
pub struct CenteringController {
    params: CenteringParams,
}

impl CenteringController {
    pub fn new(params: CenteringParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &CenteringParams {
        &self.params
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(max_iterations = self.params.max_iterations))
    )]
    pub fn run(
        &self,
        state: &CalibrationState,
        service: &dyn JobService,
        motion: &mut dyn MotionController,
    ) -> Result<CenteringReport, CenteringError> {
        let (Some(transform), Some(mpp)) = (state.transform.as_ref(), state.mpp) else {
            return Err(CenteringError::NotCalibrated);
        };
        motion.ensure_homed()?;
        let frame = state.frame_size;

        let mut report = CenteringReport::default();
        let mut not_found = 0usize;
        let mut phase = CenteringPhase::Measuring;

        for iteration in 0..self.params.max_iterations {
            debug_assert_eq!(phase, CenteringPhase::Measuring);
            let pos = match request_position(service, &self.params.poll) {
                Ok(p) => p,
                Err(PollError::NotFound(_) | PollError::Timeout { .. }) => {
                    let Some(w) = self.params.wiggle_moves.get(not_found) else {
                        return Err(CenteringError::NotFound { wiggles: not_found });
                    };
                    log::info!("nozzle not found, wiggling toolhead by ({}, {})", w[0], w[1]);
                    motion.move_relative(w[0], w[1])?;
                    not_found += 1;
                    report.wiggles += 1;
                    continue;
                }
                Err(e) => return Err(CenteringError::Detection(e)),
            };
            not_found = 0;

            let uv = pos.uv();
            let [x, y, _] = motion.position()?;
            let offset = centering_offset(transform, uv, frame);
            log::info!(
                "centering take {iteration}: X{x:.3} Y{y:.3} UV ({}, {}) offset ({:.3}, {:.3})",
                uv[0],
                uv[1],
                offset[0],
                offset[1]
            );
            report.steps.push(CenteringStep {
                iteration,
                position: [x, y],
                uv,
                offset,
            });

            phase = if offset == [0.0, 0.0] {
                CenteringPhase::Converged { uv }
            } else {
                CenteringPhase::Correcting { uv, offset }
            };

            match phase {
                CenteringPhase::Converged { .. } => {
                    log::info!("nozzle centered at X{x:.3} Y{y:.3}");
                    report.position = [x, y];
                    return Ok(report);
                }
                CenteringPhase::Correcting { uv, offset } => {
                    let predicted = predicted_pixel(transform, mpp, uv, offset, frame);
                    if !predicted.is_some_and(|p| frame.contains(p[0], p[1])) {
                        return Err(CenteringError::OutOfFrame {
                            dx: offset[0],
                            dy: offset[1],
                            predicted,
                        });
                    }
                    motion.move_relative(offset[0], offset[1])?;
                    phase = CenteringPhase::Measuring;
                }
                CenteringPhase::Measuring => {}
            }
        }

        Err(CenteringError::RetriesExhausted {
            iterations: self.params.max_iterations,
        })
    }
}
