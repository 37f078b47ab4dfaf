//! JSON configuration for the whole pipeline.

use std::{fs, path::Path};

use nozzle_align_blob::CascadeParams;
use nozzle_align_core::FrameSize;
use nozzle_align_jobs::{JobManagerParams, PollParams, StabilizeParams};
use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationParams;
use crate::centering::CenteringParams;
use crate::error::ConfigError;

/// Camera frame geometry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameSourceConfig {
    pub width: u32,
    pub height: u32,
    /// Resize decoded images that do not match `width x height`.
    pub resize: bool,
}

impl Default for FrameSourceConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            resize: true,
        }
    }
}

impl FrameSourceConfig {
    pub fn frame_size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NozzleAlignConfig {
    pub camera: FrameSourceConfig,
    pub cascade: CascadeParams,
    pub stabilize: StabilizeParams,
    /// Retention of finished jobs, in seconds.
    pub job_retention_s: Option<f64>,
    /// Job polling for every caller: CLI, calibration and centering.
    pub poll: PollParams,
    pub calibration: CalibrationParams,
    pub centering: CenteringParams,
}

impl NozzleAlignConfig {
    /// Load a JSON config from disk. Missing fields take their defaults.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Job manager parameters derived from the camera and stabilizer sections.
    pub fn job_manager(&self) -> JobManagerParams {
        let defaults = JobManagerParams::default();
        JobManagerParams {
            stabilize: self.stabilize.clone(),
            retention_s: self.job_retention_s.unwrap_or(defaults.retention_s),
            frame_size: self.camera.frame_size(),
        }
    }

    /// Calibration parameters polling with the shared `poll` section.
    pub fn calibration_params(&self) -> CalibrationParams {
        CalibrationParams {
            poll: self.poll.clone(),
            ..self.calibration.clone()
        }
    }

    /// Centering parameters polling with the shared `poll` section.
    pub fn centering_params(&self) -> CenteringParams {
        CenteringParams {
            poll: self.poll.clone(),
            ..self.centering.clone()
        }
    }
}
