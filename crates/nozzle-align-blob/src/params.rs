use serde::{Deserialize, Serialize};

/// Closed interval `[min, max]` used by the optional shape filters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterRange {
    pub min: f32,
    pub max: f32,
}

impl FilterRange {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Range bounded from below only.
    pub const fn at_least(min: f32) -> Self {
        Self { min, max: f32::MAX }
    }

    #[inline]
    pub fn contains(&self, v: f32) -> bool {
        v >= self.min && v <= self.max
    }
}

/// Parameters of the multi-threshold blob search.
///
/// The gray image is binarised at `min_threshold`, `min_threshold + step`,
/// ... while below `max_threshold`. Components that pass every enabled
/// filter at a threshold become candidates; candidates that recur at
/// `min_repeatability` thresholds are reported.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobParams {
    pub min_threshold: f32,
    pub max_threshold: f32,
    pub threshold_step: f32,
    /// Number of thresholds a blob must be seen at.
    pub min_repeatability: usize,
    /// Candidates closer than this (in pixels) are merged into one group.
    pub min_dist_between_blobs: f32,
    /// `Some(0)` keeps dark blobs, `Some(255)` bright ones, `None` keeps both.
    pub blob_color: Option<u8>,
    pub area: Option<FilterRange>,
    pub circularity: Option<FilterRange>,
    pub convexity: Option<FilterRange>,
    pub inertia_ratio: Option<FilterRange>,
}

impl Default for BlobParams {
    fn default() -> Self {
        Self {
            min_threshold: 50.0,
            max_threshold: 220.0,
            threshold_step: 10.0,
            min_repeatability: 2,
            min_dist_between_blobs: 10.0,
            blob_color: Some(0),
            area: Some(FilterRange::new(25.0, 5000.0)),
            circularity: None,
            convexity: Some(FilterRange::at_least(0.95)),
            inertia_ratio: Some(FilterRange::at_least(0.1)),
        }
    }
}

impl BlobParams {
    /// Tight windows for a crisp, round nozzle tip under good contrast.
    pub fn standard() -> Self {
        Self {
            min_threshold: 1.0,
            max_threshold: 50.0,
            threshold_step: 1.0,
            area: Some(FilterRange::new(400.0, 900.0)),
            circularity: Some(FilterRange::new(0.8, 1.0)),
            convexity: Some(FilterRange::new(0.3, 1.0)),
            inertia_ratio: Some(FilterRange::at_least(0.3)),
            ..Self::default()
        }
    }

    /// Larger and less circular blobs, e.g. a nozzle seen slightly out of focus.
    pub fn relaxed() -> Self {
        Self {
            area: Some(FilterRange::new(600.0, 15000.0)),
            circularity: Some(FilterRange::new(0.6, 1.0)),
            convexity: Some(FilterRange::new(0.1, 1.0)),
            ..Self::standard()
        }
    }

    /// Last resort: wide threshold sweep, either polarity, loose shape limits.
    pub fn super_relaxed() -> Self {
        Self {
            min_threshold: 20.0,
            max_threshold: 200.0,
            min_dist_between_blobs: 2.0,
            blob_color: None,
            area: Some(FilterRange::new(200.0, 5000.0)),
            circularity: Some(FilterRange::at_least(0.5)),
            convexity: Some(FilterRange::at_least(0.5)),
            inertia_ratio: Some(FilterRange::at_least(0.5)),
            ..Self::default()
        }
    }

    /// Threshold values visited by the sweep.
    pub fn thresholds(&self) -> impl Iterator<Item = f32> + '_ {
        let step = self.threshold_step.max(f32::EPSILON);
        (0..)
            .map(move |i| self.min_threshold + i as f32 * step)
            .take_while(move |&t| t < self.max_threshold)
    }
}
