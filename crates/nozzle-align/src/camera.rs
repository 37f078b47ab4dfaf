//! Frames from encoded images via the `image` crate.

use std::path::{Path, PathBuf};

use image::{imageops::FilterType, DynamicImage, RgbImage};
use nozzle_align_core::{Frame, FrameError, FrameSource, FrameSourceFactory};

use crate::config::FrameSourceConfig;

/// Convert an RGB image into a [`Frame`].
pub fn frame_from_image(img: RgbImage) -> Result<Frame, FrameError> {
    let (w, h) = img.dimensions();
    Frame::from_rgb(w as usize, h as usize, img.into_raw())
}

/// Convert a decoded image, resizing to the configured frame size when asked to.
pub fn frame_from_dynamic(img: DynamicImage, cfg: &FrameSourceConfig) -> Result<Frame, FrameError> {
    let img = if cfg.resize && (img.width(), img.height()) != (cfg.width, cfg.height) {
        log::debug!(
            "resizing {}x{} frame to {}x{}",
            img.width(),
            img.height(),
            cfg.width,
            cfg.height
        );
        img.resize_exact(cfg.width, cfg.height, FilterType::Triangle)
    } else {
        img
    };
    frame_from_image(img.to_rgb8())
}

/// Decode an encoded image (JPEG, PNG, ...) into a frame.
pub fn decode_frame(bytes: &[u8], cfg: &FrameSourceConfig) -> Result<Frame, FrameError> {
    let img = image::load_from_memory(bytes).map_err(|e| FrameError::Decode(e.to_string()))?;
    frame_from_dynamic(img, cfg)
}

/// Read and decode an image file into a frame.
pub fn load_frame(path: impl AsRef<Path>, cfg: &FrameSourceConfig) -> Result<Frame, FrameError> {
    let bytes = std::fs::read(path)?;
    decode_frame(&bytes, cfg)
}

/// Convert a frame back into an `image` buffer, e.g. to save an annotated copy.
pub fn frame_to_image(frame: &Frame) -> Result<RgbImage, FrameError> {
    let (w, h) = (frame.width(), frame.height());
    RgbImage::from_raw(w as u32, h as u32, frame.as_raw().to_vec()).ok_or(
        FrameError::InvalidBuffer {
            expected: w * h * 3,
            got: frame.as_raw().len(),
        },
    )
}

/// Frame source that re-reads an image file on every frame, so a file kept
/// current by a snapshot writer behaves like a live camera.
#[derive(Clone, Debug)]
pub struct ImageFileSource {
    path: PathBuf,
    cfg: FrameSourceConfig,
}

impl ImageFileSource {
    pub fn new(path: impl Into<PathBuf>, cfg: FrameSourceConfig) -> Self {
        Self {
            path: path.into(),
            cfg,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSource for ImageFileSource {
    fn get_frame(&mut self) -> Result<Frame, FrameError> {
        load_frame(&self.path, &self.cfg)
    }
}

impl FrameSourceFactory for ImageFileSource {
    fn open(&self) -> Result<Box<dyn FrameSource + Send>, FrameError> {
        if !self.path.is_file() {
            return Err(FrameError::Unavailable(format!(
                "{} is not a readable file",
                self.path.display()
            )));
        }
        Ok(Box::new(self.clone()))
    }
}
