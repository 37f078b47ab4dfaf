//! Camera-based nozzle alignment for 3D printers.
//!
//! This crate ties the `nozzle-align-*` workspace together:
//! - re-exports of the detection, calibration and job crates
//! - [`CalibrationRunner`]: moves the nozzle around a small circle, derives
//!   the mm-per-pixel scale and fits the pixel-to-machine transform
//! - [`CenteringController`]: detect, correct, repeat until the nozzle sits
//!   at the frame center
//! - [`NozzleAlignConfig`]: one JSON file for every parameter set
//! - (feature `image`) frame sources backed by encoded images
//!
//! The printer itself is reached through the [`MotionController`] trait and
//! detections through [`JobService`](jobs::JobService), usually a
//! [`DetectionJobManager`](jobs::DetectionJobManager).
//!
//! ## Quickstart
//!
//! ```no_run
//! use std::sync::Arc;
//! use nozzle_align::blob::BlobCascadeDetector;
//! use nozzle_align::camera::ImageFileSource;
//! use nozzle_align::jobs::{request_position, DetectionJobManager};
//! use nozzle_align::NozzleAlignConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = NozzleAlignConfig::load_json("nozzle.json")?;
//! let camera = ImageFileSource::new("/tmp/snapshot.jpg", cfg.camera.clone());
//! let detector = BlobCascadeDetector::new(cfg.cascade.clone());
//! let jobs = DetectionJobManager::new(Arc::new(camera), Arc::new(detector), cfg.job_manager());
//!
//! let pos = request_position(&jobs, &cfg.poll)?;
//! println!("nozzle at {:?}", pos.uv());
//! # Ok(())
//! # }
//! ```

pub use nozzle_align_blob as blob;
pub use nozzle_align_calib as calib;
pub use nozzle_align_core as core;
pub use nozzle_align_jobs as jobs;

pub use nozzle_align_blob::{BlobCascadeDetector, CascadeParams};
pub use nozzle_align_core::{DetectedBlob, Frame, FrameSize, StablePosition};

mod calibration;
mod centering;
mod config;
mod error;
mod motion;

#[cfg(feature = "image")]
pub mod camera;

pub use calibration::{
    CalibrationParams, CalibrationReport, CalibrationRunner, CalibrationState, CIRCLE_OFFSETS,
};
pub use centering::{
    centering_offset, predicted_pixel, CenteringController, CenteringParams, CenteringPhase,
    CenteringReport, CenteringStep, WIGGLE_MOVES,
};
pub use config::{FrameSourceConfig, NozzleAlignConfig};
pub use error::{CalibrateError, CenteringError, ConfigError};
pub use motion::{MotionController, MotionError};
