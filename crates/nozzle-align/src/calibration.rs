//! Camera calibration: move the nozzle around a small circle, measure the
//! scale of every step and fit the pixel-to-machine transform.

use nozzle_align_calib::{
    average_mpp, mm_per_pixel, round3, CalibrationError, CalibrationSample, MppAverage,
    MppFilterParams, TransformFitter, TransformMatrix,
};
use nozzle_align_core::{FrameSize, StablePosition};
use nozzle_align_jobs::{request_position, JobService, PollError, PollParams};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::error::CalibrateError;
use crate::motion::MotionController;

/// Ten points on a 0.5 mm circle around the start position.
pub const CIRCLE_OFFSETS: [[f64; 2]; 10] = [
    [0.0, -0.5],
    [0.294, -0.405],
    [0.476, -0.155],
    [0.476, 0.155],
    [0.294, 0.405],
    [0.0, 0.5],
    [-0.294, 0.405],
    [-0.476, 0.155],
    [-0.476, -0.155],
    [-0.294, -0.405],
];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationParams {
    /// Relative moves visited in order, each followed by a move back.
    pub offsets: Vec<[f64; 2]>,
    /// Fraction of points that must survive detection and outlier pruning.
    pub min_success_ratio: f64,
    pub mpp_filter: MppFilterParams,
    /// Taken from the config's top-level `poll` section.
    #[serde(skip)]
    pub poll: PollParams,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self {
            offsets: CIRCLE_OFFSETS.to_vec(),
            min_success_ratio: 0.75,
            mpp_filter: MppFilterParams::default(),
            poll: PollParams::default(),
        }
    }
}

/// Calibration results kept for a session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationState {
    pub mpp: Option<f64>,
    pub transform: Option<TransformMatrix>,
    /// Machine position offsets are reported against.
    pub center_point: Option<[f64; 2]>,
    pub frame_size: FrameSize,
}

impl CalibrationState {
    pub fn is_calibrated(&self) -> bool {
        self.mpp.is_some() && self.transform.is_some()
    }

    pub fn set_center_point(&mut self, xy: [f64; 2]) {
        log::info!("center position set to X:{:.3} Y:{:.3}", xy[0], xy[1]);
        self.center_point = Some(xy);
    }

    /// `xy - center_point`, or `None` without a center point.
    pub fn offset_from_center(&self, xy: [f64; 2]) -> Option<[f64; 2]> {
        self.center_point.map(|c| [xy[0] - c[0], xy[1] - c[1]])
    }
}

/// Outcome of a successful [`CalibrationRunner::run`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub state: CalibrationState,
    pub average: MppAverage,
    pub residual: f64,
    /// Offsets attempted.
    pub attempted: usize,
    /// Samples recorded before outlier pruning.
    pub collected: usize,
    /// Machine position predicted to show the nozzle at the frame center.
    pub center_guess: [f64; 2],
    /// Where the nozzle was seen after moving to `center_guess`.
    pub center_uv: Option<[f64; 2]>,
}

/// Drives a calibration run against a detection service and a motion system.
#[derive(Clone, Debug, Default)]
pub struct CalibrationRunner {
    params: CalibrationParams,
}

impl CalibrationRunner {
    pub fn new(params: CalibrationParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &CalibrationParams {
        &self.params
    }

    /// Detect the nozzle; "not found" and poll timeouts yield `None`.
    fn detect(&self, service: &dyn JobService) -> Result<Option<StablePosition>, CalibrateError> {
        match request_position(service, &self.params.poll) {
            Ok(p) => Ok(Some(p)),
            Err(PollError::NotFound(_) | PollError::Timeout { .. }) => Ok(None),
            Err(e) => Err(CalibrateError::Detection(e)),
        }
    }

    fn sample(
        &self,
        motion: &mut dyn MotionController,
        travel: [f64; 2],
        from_uv: [f64; 2],
        to_uv: [f64; 2],
    ) -> Result<Option<CalibrationSample>, CalibrateError> {
        let mpp = match mm_per_pixel(travel, from_uv, to_uv) {
            Ok(v) => v,
            Err(CalibrationError::ZeroPixelDistance) => {
                log::warn!("nozzle did not move on camera, skipping point");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let [x, y, _] = motion.position()?;
        Ok(Some(CalibrationSample::new([x, y], to_uv, mpp)))
    }

    /// Run a full calibration. The caller's previous state is only replaced
    /// by the returned one, so a failed run leaves it untouched.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(points = self.params.offsets.len()))
    )]
    pub fn run(
        &self,
        service: &dyn JobService,
        motion: &mut dyn MotionController,
    ) -> Result<CalibrationReport, CalibrateError> {
        motion.ensure_homed()?;
        let frame = service.frame_size();

        let start = request_position(service, &self.params.poll)
            .map_err(CalibrateError::StartNotFound)?;
        let start_uv = start.uv();
        log::info!("calibration start at uv ({}, {})", start_uv[0], start_uv[1]);

        let offsets = &self.params.offsets;
        let n = offsets.len();
        let mut samples = Vec::with_capacity(n + 1);

        for (i, &off) in offsets.iter().enumerate() {
            log::info!("calibrating camera step {} of {n}", i + 1);
            motion.move_relative(off[0], off[1])?;

            let Some(pos) = self.detect(service)? else {
                log::info!("step {}: nozzle not found, skipping", i + 1);
                motion.move_relative(-off[0], -off[1])?;
                continue;
            };
            let uv = pos.uv();
            if let Some(s) = self.sample(motion, off, start_uv, uv)? {
                log::info!("step {}: {} mm/px", i + 1, s.mpp);
                samples.push(s);
            }

            if i + 1 < n {
                motion.move_relative(-off[0], -off[1])?;
                continue;
            }

            // Last point: one more step the same way, measured from here.
            motion.move_relative(off[0], off[1])?;
            if let Some(next) = self.detect(service)? {
                if let Some(s) = self.sample(motion, off, uv, next.uv())? {
                    log::info!("step {}: {} mm/px (extra)", i + 1, s.mpp);
                    samples.push(s);
                }
            }
        }

        let ratio = self.params.min_success_ratio;
        if (samples.len() as f64) < n as f64 * ratio {
            return Err(CalibrationError::TooManyFailedPoints {
                succeeded: samples.len(),
                attempted: n,
            }
            .into());
        }

        let average = average_mpp(&samples, &self.params.mpp_filter)?;
        if (average.samples.len() as f64) < samples.len() as f64 * ratio {
            return Err(CalibrationError::TooManyFailedPoints {
                succeeded: average.samples.len(),
                attempted: samples.len(),
            }
            .into());
        }
        log::info!(
            "average {:.4} mm/px over {} of {} samples",
            average.mpp,
            average.samples.len(),
            samples.len()
        );

        let points: Vec<_> = average
            .samples
            .iter()
            .map(|s| (s.space_xy, s.camera_uv))
            .collect();
        let fit = TransformFitter::new(frame).fit(&points)?;

        let c = fit.transform.center_position();
        let center_guess = [round3(c[0]), round3(c[1])];
        log::info!(
            "calibration positional guess X:{:.3} Y:{:.3}",
            center_guess[0],
            center_guess[1]
        );
        motion.move_absolute(center_guess[0], center_guess[1])?;
        let center_uv = self.detect(service)?.map(|p| p.uv());

        Ok(CalibrationReport {
            state: CalibrationState {
                mpp: Some(average.mpp),
                transform: Some(fit.transform),
                center_point: Some(center_guess),
                frame_size: frame,
            },
            average,
            residual: fit.residual,
            attempted: n,
            collected: samples.len(),
            center_guess,
            center_uv,
        })
    }
}
