//! Nozzle tip detection in camera frames.
//!
//! A [`BlobCascadeDetector`] runs an ordered list of stages, each a
//! [`Preprocessor`] followed by a multi-threshold [`BlobDetector`], and
//! accepts the first stage that sees exactly one blob.
//!
//! ```no_run
//! use nozzle_align_blob::{BlobCascadeDetector, CascadeParams};
//! use nozzle_align_core::{Frame, Rgb};
//!
//! let frame = Frame::filled(640, 480, Rgb::WHITE);
//! let detector = BlobCascadeDetector::new(CascadeParams::default());
//! if let Some(hit) = detector.detect(&frame) {
//!     println!("nozzle at ({}, {}) via stage {}", hit.blob.x, hit.blob.y, hit.stage);
//! }
//! ```

mod annotate;
mod cascade;
mod contour;
mod detector;
mod params;
mod preprocess;
mod threshold;

pub use annotate::{annotate_frame, stage_color, STAGE_COLORS};
pub use cascade::{
    BlobCascadeDetector, CascadeDetection, CascadeParams, CascadeReport, CascadeStage,
};
pub use detector::BlobDetector;
pub use params::{BlobParams, FilterRange};
pub use preprocess::{gamma_lut, gaussian_blur, median_blur, PreprocessParams, Preprocessor};
pub use threshold::{adaptive_threshold_gaussian, binarize, triangle_threshold};
