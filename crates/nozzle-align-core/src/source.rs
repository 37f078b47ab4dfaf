//! Collaborator contracts: where frames come from, where annotated frames go,
//! and what turns a frame into a blob position.

use parking_lot::Mutex;

use crate::{DetectedBlob, Frame};

/// Frame acquisition or decoding failure.
#[derive(thiserror::Error, Debug)]
pub enum FrameError {
    #[error("invalid frame dimensions (width={width}, height={height})")]
    InvalidDimensions { width: usize, height: usize },

    #[error("invalid frame buffer length (expected {expected} bytes, got {got})")]
    InvalidBuffer { expected: usize, got: usize },

    #[error("frame decoding failed: {0}")]
    Decode(String),

    #[error("frame source unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Produces fresh frames on demand, in acquisition order.
pub trait FrameSource {
    fn get_frame(&mut self) -> Result<Frame, FrameError>;
}

impl<F> FrameSource for F
where
    F: FnMut() -> Result<Frame, FrameError>,
{
    fn get_frame(&mut self) -> Result<Frame, FrameError> {
        self()
    }
}

/// Opens an exclusive frame source for one detection job.
pub trait FrameSourceFactory: Send + Sync {
    fn open(&self) -> Result<Box<dyn FrameSource + Send>, FrameError>;
}

/// [`FrameSourceFactory`] backed by a closure.
pub struct FnSourceFactory<F>(pub F);

impl<F> FrameSourceFactory for FnSourceFactory<F>
where
    F: Fn() -> Result<Box<dyn FrameSource + Send>, FrameError> + Send + Sync,
{
    fn open(&self) -> Result<Box<dyn FrameSource + Send>, FrameError> {
        (self.0)()
    }
}

/// Finds at most one nozzle-like blob in a frame.
pub trait BlobLocator: Send + Sync {
    fn locate(&self, frame: &Frame) -> Option<DetectedBlob>;

    /// [`BlobLocator::locate`] plus an optional debug rendering of the result.
    fn locate_annotated(&self, frame: &Frame) -> (Option<DetectedBlob>, Option<Frame>) {
        (self.locate(frame), None)
    }
}

/// Receives annotated frames for display. Never influences detection.
pub trait FrameSink: Send + Sync {
    fn put_frame(&self, frame: Frame);
}

/// Keeps only the most recent frame it was given.
#[derive(Default)]
pub struct LatestFrame {
    slot: Mutex<Option<Frame>>,
}

impl LatestFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<Frame> {
        self.slot.lock().clone()
    }
}

impl FrameSink for LatestFrame {
    fn put_frame(&self, frame: Frame) {
        *self.slot.lock() = Some(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Rgb;

    #[test]
    fn closures_act_as_frame_sources() {
        let mut n = 0;
        let mut source = move || {
            n += 1;
            Ok(Frame::filled(n, 1, Rgb::BLACK))
        };
        assert_eq!(source.get_frame().unwrap().width(), 1);
        assert_eq!(source.get_frame().unwrap().width(), 2);
    }

    #[test]
    fn latest_frame_keeps_last() {
        let sink = LatestFrame::new();
        assert!(sink.latest().is_none());
        sink.put_frame(Frame::filled(1, 1, Rgb::BLACK));
        sink.put_frame(Frame::filled(2, 2, Rgb::WHITE));
        assert_eq!(sink.latest().unwrap().width(), 2);
    }
}
