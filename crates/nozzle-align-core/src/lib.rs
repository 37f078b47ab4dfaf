//! Core types shared by the nozzle alignment crates.
//!
//! This crate is intentionally small. It does *not* know how blobs are
//! detected or how frames are acquired; it only defines the raster types,
//! the detection records that flow between stages, and the collaborator
//! traits (frame sources, frame sinks, blob locators) the other crates are
//! written against.

mod blob;
mod frame;
mod logger;
mod source;

pub use blob::{DetectedBlob, StablePosition};
pub use frame::{Frame, FramePixelsMut, FrameSize, GrayImage, GrayImageView, Rgb};
pub use source::{
    BlobLocator, FnSourceFactory, FrameError, FrameSink, FrameSource, FrameSourceFactory,
    LatestFrame,
};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
