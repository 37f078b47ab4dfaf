use serde::{Deserialize, Serialize};

/// One blob found in a single frame, in pixel coordinates.
///
/// `radius` is informational only; centering math uses the center.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedBlob {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
}

impl DetectedBlob {
    pub fn new(x: f64, y: f64, radius: f64) -> Self {
        Self { x, y, radius }
    }

    #[inline]
    pub fn center(&self) -> [f64; 2] {
        [self.x, self.y]
    }

    /// Both axis deltas to `other` are within `tolerance` pixels.
    #[inline]
    pub fn agrees_with(&self, other: &DetectedBlob, tolerance: f64) -> bool {
        (self.x - other.x).abs() <= tolerance && (self.y - other.y).abs() <= tolerance
    }
}

/// A pixel position confirmed by several consecutive agreeing detections.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StablePosition {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    /// Number of consecutive agreeing detections that confirmed the position.
    pub matches: usize,
}

impl StablePosition {
    pub fn from_blob(blob: DetectedBlob, matches: usize) -> Self {
        Self {
            x: blob.x,
            y: blob.y,
            radius: blob.radius,
            matches,
        }
    }

    #[inline]
    pub fn uv(&self) -> [f64; 2] {
        [self.x, self.y]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agreement_is_per_axis() {
        let a = DetectedBlob::new(10.0, 10.0, 5.0);
        assert!(a.agrees_with(&DetectedBlob::new(11.0, 9.0, 7.0), 1.0));
        assert!(!a.agrees_with(&DetectedBlob::new(11.5, 10.0, 5.0), 1.0));
        assert!(!a.agrees_with(&DetectedBlob::new(10.0, 8.0, 5.0), 1.0));
    }
}
