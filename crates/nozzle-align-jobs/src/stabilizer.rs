use std::sync::Arc;
use std::time::{Duration, Instant};

use nozzle_align_core::{
    BlobLocator, DetectedBlob, FrameError, FrameSink, FrameSource, StablePosition,
};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizeParams {
    /// Consecutive agreeing detections required.
    pub min_matches: usize,
    /// Give up after this many seconds.
    pub timeout_s: f64,
    /// Per-axis agreement tolerance in pixels.
    pub xy_tolerance: f64,
    /// Pause between frames, in seconds, so a buffered stream can refresh.
    pub frame_delay_s: f64,
}

impl Default for StabilizeParams {
    fn default() -> Self {
        Self {
            min_matches: 3,
            timeout_s: 20.0,
            xy_tolerance: 1.0,
            frame_delay_s: 0.3,
        }
    }
}

/// Seconds to a `Duration`, clamping negatives to zero and overlarge values
/// to `Duration::MAX`.
pub(crate) fn saturating_secs(s: f64) -> Duration {
    Duration::try_from_secs_f64(s.max(0.0)).unwrap_or(Duration::MAX)
}

impl StabilizeParams {
    pub fn timeout(&self) -> Duration {
        saturating_secs(self.timeout_s)
    }

    pub fn frame_delay(&self) -> Duration {
        saturating_secs(self.frame_delay_s)
    }
}

/// Confirms a nozzle position over several consecutive frames.
///
/// A detection that agrees with the previous one (both axis deltas within
/// `xy_tolerance`) extends the streak; a diverging detection starts a new
/// streak of one; a frame without detection clears it.
pub struct PositionStabilizer {
    locator: Arc<dyn BlobLocator>,
    sink: Option<Arc<dyn FrameSink>>,
    params: StabilizeParams,
}

impl PositionStabilizer {
    pub fn new(locator: Arc<dyn BlobLocator>, params: StabilizeParams) -> Self {
        Self {
            locator,
            sink: None,
            params,
        }
    }

    /// Forward an annotated copy of every processed frame to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn FrameSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn params(&self) -> &StabilizeParams {
        &self.params
    }

    /// Pull frames until a stable position is confirmed or the timeout
    /// elapses (`Ok(None)`). Frame acquisition failures abort immediately.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, source), fields(min_matches = self.params.min_matches))
    )]
    pub fn stabilize(
        &self,
        source: &mut dyn FrameSource,
    ) -> Result<Option<StablePosition>, FrameError> {
        let started = Instant::now();
        let timeout = self.params.timeout();
        let delay = self.params.frame_delay();
        let need = self.params.min_matches.max(1);

        let mut last: Option<DetectedBlob> = None;
        let mut matches = 0usize;
        let mut frames = 0usize;

        while started.elapsed() <= timeout {
            let frame = source.get_frame()?;
            frames += 1;
            let blob = match &self.sink {
                Some(sink) => {
                    let (blob, annotated) = self.locator.locate_annotated(&frame);
                    if let Some(annotated) = annotated {
                        sink.put_frame(annotated);
                    }
                    blob
                }
                None => self.locator.locate(&frame),
            };

            match blob {
                Some(b) => {
                    matches = match last {
                        Some(prev) if b.agrees_with(&prev, self.params.xy_tolerance) => matches + 1,
                        _ => 1,
                    };
                    last = Some(b);
                    log::trace!("frame {frames}: blob at ({}, {}), streak {matches}", b.x, b.y);
                    if matches >= need {
                        log::debug!(
                            "stable position ({}, {}) after {frames} frames in {:.2}s",
                            b.x,
                            b.y,
                            started.elapsed().as_secs_f64()
                        );
                        return Ok(Some(StablePosition::from_blob(b, matches)));
                    }
                }
                None => {
                    log::trace!("frame {frames}: no blob");
                    matches = 0;
                    last = None;
                }
            }

            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
        }

        log::debug!("no stable position within {:.1}s ({frames} frames)", timeout.as_secs_f64());
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nozzle_align_core::{Frame, LatestFrame, Rgb};
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Replays a fixed list of detections, then reports nothing.
    struct Scripted(Mutex<VecDeque<Option<(f64, f64)>>>);

    impl Scripted {
        fn new(seq: &[Option<(f64, f64)>]) -> Arc<Self> {
            Arc::new(Self(Mutex::new(seq.iter().copied().collect())))
        }
    }

    impl BlobLocator for Scripted {
        fn locate(&self, _frame: &Frame) -> Option<DetectedBlob> {
            self.0
                .lock()
                .pop_front()
                .flatten()
                .map(|(x, y)| DetectedBlob::new(x, y, 10.0))
        }

        fn locate_annotated(&self, frame: &Frame) -> (Option<DetectedBlob>, Option<Frame>) {
            (self.locate(frame), Some(frame.clone()))
        }
    }

    fn params() -> StabilizeParams {
        StabilizeParams {
            min_matches: 3,
            timeout_s: 0.2,
            xy_tolerance: 1.0,
            frame_delay_s: 0.0,
        }
    }

    fn blank_source() -> impl FnMut() -> Result<Frame, FrameError> {
        || Ok(Frame::filled(4, 4, Rgb::BLACK))
    }

    #[test]
    fn three_agreeing_detections_confirm() {
        let stab = PositionStabilizer::new(
            Scripted::new(&[Some((10.0, 10.0)), Some((10.0, 10.0)), Some((10.0, 10.0))]),
            params(),
        );
        let pos = stab.stabilize(&mut blank_source()).unwrap().unwrap();
        assert_eq!(pos.uv(), [10.0, 10.0]);
        assert_eq!(pos.matches, 3);
    }

    #[test]
    fn jump_restarts_the_streak() {
        let locator = Scripted::new(&[Some((10.0, 10.0)), Some((50.0, 50.0)), Some((10.0, 10.0))]);
        let stab = PositionStabilizer::new(locator.clone(), params());
        assert_eq!(stab.stabilize(&mut blank_source()).unwrap(), None);
        assert!(locator.0.lock().is_empty());
    }

    #[test]
    fn small_jitter_is_tolerated() {
        let stab = PositionStabilizer::new(
            Scripted::new(&[Some((10.0, 10.0)), Some((10.8, 9.5)), Some((11.5, 9.0))]),
            params(),
        );
        let pos = stab.stabilize(&mut blank_source()).unwrap().unwrap();
        assert_eq!(pos.uv(), [11.5, 9.0]);
    }

    #[test]
    fn missed_frame_clears_the_streak() {
        let stab = PositionStabilizer::new(
            Scripted::new(&[
                Some((10.0, 10.0)),
                Some((10.0, 10.0)),
                None,
                Some((10.0, 10.0)),
                Some((10.0, 10.0)),
            ]),
            params(),
        );
        assert_eq!(stab.stabilize(&mut blank_source()).unwrap(), None);
    }

    #[test]
    fn durations_saturate() {
        let p = StabilizeParams {
            timeout_s: 1e20,
            frame_delay_s: -1.0,
            ..StabilizeParams::default()
        };
        assert_eq!(p.timeout(), Duration::MAX);
        assert_eq!(p.frame_delay(), Duration::ZERO);
        assert_eq!(saturating_secs(f64::INFINITY), Duration::MAX);
        assert_eq!(saturating_secs(0.25), Duration::from_millis(250));
    }

    #[test]
    fn frame_errors_propagate() {
        let stab = PositionStabilizer::new(Scripted::new(&[]), params());
        let mut failing = || -> Result<Frame, FrameError> {
            Err(FrameError::Unavailable("camera unplugged".into()))
        };
        assert!(matches!(
            stab.stabilize(&mut failing),
            Err(FrameError::Unavailable(_))
        ));
    }

    #[test]
    fn annotated_frames_reach_the_sink() {
        let sink = Arc::new(LatestFrame::new());
        let stab = PositionStabilizer::new(Scripted::new(&[Some((1.0, 1.0))]), params())
            .with_sink(sink.clone());
        let _ = stab.stabilize(&mut blank_source()).unwrap();
        assert_eq!(sink.latest().map(|f| f.width()), Some(4));
    }
}
