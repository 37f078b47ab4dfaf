use nozzle_align_core::{BlobLocator, DetectedBlob, Frame, GrayImage};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::annotate::{annotate_frame, stage_color};
use crate::detector::BlobDetector;
use crate::params::BlobParams;
use crate::preprocess::{PreprocessParams, Preprocessor};

/// One (preprocessor, blob parameters) combination.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CascadeStage {
    pub preprocessor: Preprocessor,
    pub blob: BlobParams,
}

impl CascadeStage {
    pub fn new(preprocessor: Preprocessor, blob: BlobParams) -> Self {
        Self { preprocessor, blob }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeParams {
    /// Stages, strictest first.
    pub stages: Vec<CascadeStage>,
    pub preprocess: PreprocessParams,
    /// When the last stage still sees several blobs, keep the one nearest
    /// the frame center instead of reporting nothing.
    pub center_tie_break: bool,
    /// Round detected centers to whole pixels.
    pub round_centers: bool,
}

impl Default for CascadeParams {
    fn default() -> Self {
        Self {
            stages: vec![
                CascadeStage::new(Preprocessor::LumaAdaptive, BlobParams::standard()),
                CascadeStage::new(Preprocessor::TriangleBlur, BlobParams::standard()),
                CascadeStage::new(Preprocessor::LumaAdaptive, BlobParams::relaxed()),
                CascadeStage::new(Preprocessor::TriangleBlur, BlobParams::relaxed()),
                CascadeStage::new(Preprocessor::MedianBlur, BlobParams::super_relaxed()),
            ],
            preprocess: PreprocessParams::default(),
            center_tie_break: true,
            round_centers: true,
        }
    }
}

/// A single blob and the index of the stage that found it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CascadeDetection {
    pub blob: DetectedBlob,
    pub stage: usize,
}

/// Per-stage blob counts of one cascade run, up to the accepting stage.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CascadeReport {
    pub stage_counts: Vec<usize>,
    pub detection: Option<CascadeDetection>,
}

/// Runs the stages in order and accepts the first that sees exactly one blob.
#[derive(Clone, Debug)]
pub struct BlobCascadeDetector {
    params: CascadeParams,
    detectors: Vec<BlobDetector>,
}

impl Default for BlobCascadeDetector {
    fn default() -> Self {
        Self::new(CascadeParams::default())
    }
}

impl BlobCascadeDetector {
    pub fn new(params: CascadeParams) -> Self {
        let detectors = params
            .stages
            .iter()
            .map(|s| BlobDetector::new(s.blob.clone()))
            .collect();
        Self { params, detectors }
    }

    pub fn params(&self) -> &CascadeParams {
        &self.params
    }

    pub fn detect(&self, frame: &Frame) -> Option<CascadeDetection> {
        self.detect_with_report(frame).detection
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, frame), fields(width = frame.width(), height = frame.height()))
    )]
    pub fn detect_with_report(&self, frame: &Frame) -> CascadeReport {
        let mut report = CascadeReport::default();
        let mut planes: [Option<GrayImage>; 3] = [None, None, None];
        let last = self.params.stages.len().saturating_sub(1);

        for (i, (stage, detector)) in self.params.stages.iter().zip(&self.detectors).enumerate() {
            let plane = planes[stage.preprocessor.index()]
                .get_or_insert_with(|| stage.preprocessor.apply(frame, &self.params.preprocess));
            let blobs = detector.detect(&plane.view());
            report.stage_counts.push(blobs.len());
            log::debug!(
                "cascade stage {i} ({:?}): {} blob(s)",
                stage.preprocessor,
                blobs.len()
            );

            let chosen = match blobs.len() {
                1 => Some(blobs[0]),
                n if n > 1 && i == last && self.params.center_tie_break => {
                    nearest_to_center(&blobs, frame)
                }
                _ => None,
            };
            if let Some(blob) = chosen {
                let blob = if self.params.round_centers {
                    DetectedBlob::new(blob.x.round_ties_even(), blob.y.round_ties_even(), blob.radius)
                } else {
                    blob
                };
                report.detection = Some(CascadeDetection { blob, stage: i });
                return report;
            }
        }
        log::debug!("cascade found no unique blob: {:?}", report.stage_counts);
        report
    }
}

fn nearest_to_center(blobs: &[DetectedBlob], frame: &Frame) -> Option<DetectedBlob> {
    let (cx, cy) = frame.size().center();
    blobs.iter().copied().min_by(|a, b| {
        let da = (a.x - cx).powi(2) + (a.y - cy).powi(2);
        let db = (b.x - cx).powi(2) + (b.y - cy).powi(2);
        da.total_cmp(&db)
    })
}

impl BlobLocator for BlobCascadeDetector {
    fn locate(&self, frame: &Frame) -> Option<DetectedBlob> {
        self.detect(frame).map(|d| d.blob)
    }

    /// The overlay is filled with the color of the stage that matched.
    fn locate_annotated(&self, frame: &Frame) -> (Option<DetectedBlob>, Option<Frame>) {
        let det = self.detect(frame);
        let fill = stage_color(det.map_or(0, |d| d.stage));
        let blob = det.map(|d| d.blob);
        (blob, Some(annotate_frame(frame, blob.as_ref(), fill)))
    }
}
