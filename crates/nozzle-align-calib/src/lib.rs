//! Calibration math for camera-based nozzle alignment.
//!
//! - [`mm_per_pixel`] derives a scale from one known machine move.
//! - [`average_mpp`] combines per-move scales, pruning outliers.
//! - [`TransformFitter`] fits a quadratic mapping from normalized pixel
//!   coordinates to machine coordinates; [`predict_offset`] turns an
//!   observed nozzle position into a damped corrective move.

mod error;
mod mpp;
mod stats;
mod transform;

pub use error::CalibrationError;
pub use mpp::{mm_per_pixel, round3};
pub use stats::{average_mpp, CalibrationSample, MppAverage, MppFilterParams};
pub use transform::{
    features, normalize_coords, predict_offset, FeatureMode, TransformFit, TransformFitter,
    TransformMatrix, DAMPING, FEATURE_COUNT,
};
