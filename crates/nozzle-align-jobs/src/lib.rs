//! Asynchronous nozzle detection jobs.
//!
//! A detection job reads frames until [`PositionStabilizer`] sees the same
//! nozzle position on several consecutive frames. [`DetectionJobManager`]
//! runs every job on its own worker thread and answers polls with
//! `202 / 200 / 404 / 500`-style [`JobStatus`] codes; [`wait_for_job`] is
//! the client side of that exchange.
//!
//! ```no_run
//! use std::sync::Arc;
//! use nozzle_align_core::{
//!     BlobLocator, DetectedBlob, FnSourceFactory, Frame, FrameError, FrameSource, Rgb,
//! };
//! use nozzle_align_jobs::{request_position, DetectionJobManager, JobManagerParams, PollParams};
//!
//! struct Center;
//! impl BlobLocator for Center {
//!     fn locate(&self, f: &Frame) -> Option<DetectedBlob> {
//!         Some(DetectedBlob::new(f.width() as f64 / 2.0, f.height() as f64 / 2.0, 10.0))
//!     }
//! }
//!
//! let factory = FnSourceFactory(|| -> Result<Box<dyn FrameSource + Send>, FrameError> {
//!     Ok(Box::new(|| Ok::<_, FrameError>(Frame::filled(640, 480, Rgb::WHITE))))
//! });
//! let manager = DetectionJobManager::new(Arc::new(factory), Arc::new(Center), JobManagerParams::default());
//! let pos = request_position(&manager, &PollParams::default()).unwrap();
//! println!("nozzle at {:?}", pos.uv());
//! ```

mod job;
mod manager;
mod poll;
mod stabilizer;

pub use job::{DetectionJob, JobError, JobResponse, JobStatus, UNKNOWN_JOB_MESSAGE};
pub use manager::{DetectionJobManager, JobManagerParams, JobService};
pub use poll::{request_position, wait_for_job, PollError, PollParams};
pub use stabilizer::{PositionStabilizer, StabilizeParams};
