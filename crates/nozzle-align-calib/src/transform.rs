//! Quadratic pixel-to-machine mapping fitted by linear least squares.

use nalgebra::{DMatrix, Matrix2, SMatrix, SVector};
use nozzle_align_core::FrameSize;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::CalibrationError;

/// Fraction of the predicted correction applied per centering step.
pub const DAMPING: f64 = 0.55;

/// Number of quadratic features, and so the minimum number of points.
pub const FEATURE_COUNT: usize = 6;

/// Map pixel coordinates into `[-0.5, 0.5]` relative to the frame center.
#[inline]
pub fn normalize_coords(uv: [f64; 2], frame: FrameSize) -> [f64; 2] {
    [
        uv[0] / frame.width as f64 - 0.5,
        uv[1] / frame.height as f64 - 0.5,
    ]
}

/// Trailing term of the feature vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureMode {
    /// Constant `0`: the intercept is dropped, yielding a displacement.
    Displacement,
    /// Constant `1`: yields an absolute machine position.
    Absolute,
}

impl FeatureMode {
    fn constant(self) -> f64 {
        match self {
            FeatureMode::Displacement => 0.0,
            FeatureMode::Absolute => 1.0,
        }
    }
}

/// `[u², v², u·v, u, v, c]` of normalized coordinates.
#[inline]
pub fn features(norm_uv: [f64; 2], mode: FeatureMode) -> [f64; FEATURE_COUNT] {
    let [u, v] = norm_uv;
    [u * u, v * v, u * v, u, v, mode.constant()]
}

/// `2x6` coefficients, one row per machine axis.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransformMatrix {
    pub rows: [[f64; FEATURE_COUNT]; 2],
}

impl TransformMatrix {
    pub fn new(rows: [[f64; FEATURE_COUNT]; 2]) -> Self {
        Self { rows }
    }

    pub fn to_matrix(&self) -> SMatrix<f64, 2, FEATURE_COUNT> {
        SMatrix::<f64, 2, FEATURE_COUNT>::from_fn(|r, c| self.rows[r][c])
    }

    /// Undamped `T · f`.
    pub fn evaluate(&self, f: &[f64; FEATURE_COUNT]) -> [f64; 2] {
        let v = self.to_matrix() * SVector::<f64, FEATURE_COUNT>::from_column_slice(f);
        [v[0], v[1]]
    }

    /// Machine position predicted for a nozzle seen at the frame center.
    pub fn center_position(&self) -> [f64; 2] {
        self.evaluate(&features([0.0, 0.0], FeatureMode::Absolute))
    }

    /// Partial derivatives of the machine position with respect to the
    /// normalized coordinates at `norm_uv`: column 0 is `d/du`, column 1 `d/dv`.
    pub fn jacobian(&self, norm_uv: [f64; 2]) -> Matrix2<f64> {
        let [u, v] = norm_uv;
        let du = [2.0 * u, 0.0, v, 1.0, 0.0];
        let dv = [0.0, 2.0 * v, u, 0.0, 1.0];
        let dot = |row: &[f64; FEATURE_COUNT], d: &[f64; 5]| -> f64 {
            row.iter().zip(d).map(|(a, b)| a * b).sum()
        };
        Matrix2::new(
            dot(&self.rows[0], &du),
            dot(&self.rows[0], &dv),
            dot(&self.rows[1], &du),
            dot(&self.rows[1], &dv),
        )
    }
}

/// Damped correction `-DAMPING · T · f(uv)` that moves a nozzle seen at
/// `uv` towards the frame center.
pub fn predict_offset(
    transform: &TransformMatrix,
    uv: [f64; 2],
    frame: FrameSize,
    mode: FeatureMode,
) -> [f64; 2] {
    let f = features(normalize_coords(uv, frame), mode);
    let [x, y] = transform.evaluate(&f);
    [-DAMPING * x, -DAMPING * y]
}

/// Fitted transform and its mean per-axis residual sum of squares.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransformFit {
    pub transform: TransformMatrix,
    pub residual: f64,
}

/// Least-squares fitter of [`TransformMatrix`] from calibration points.
#[derive(Clone, Copy, Debug)]
pub struct TransformFitter {
    frame: FrameSize,
    eps: f64,
}

impl TransformFitter {
    pub fn new(frame: FrameSize) -> Self {
        Self { frame, eps: 1e-12 }
    }

    pub fn frame(&self) -> FrameSize {
        self.frame
    }

    /// Fit `space_xy ≈ T · f(normalize(camera_uv))` over `(space_xy, camera_uv)` pairs.
    ///
    /// Solved via SVD, so rank-deficient or over-determined systems yield the
    /// minimum-norm least-squares solution instead of failing.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, points), fields(points = points.len()))
    )]
    pub fn fit(&self, points: &[([f64; 2], [f64; 2])]) -> Result<TransformFit, CalibrationError> {
        let n = points.len();
        if n < FEATURE_COUNT {
            return Err(CalibrationError::Underdetermined {
                got: n,
                need: FEATURE_COUNT,
            });
        }

        let mut a = DMatrix::<f64>::zeros(n, FEATURE_COUNT);
        let mut s = DMatrix::<f64>::zeros(n, 2);
        for (i, (space, uv)) in points.iter().enumerate() {
            let f = features(normalize_coords(*uv, self.frame), FeatureMode::Absolute);
            for (j, v) in f.iter().enumerate() {
                a[(i, j)] = *v;
            }
            s[(i, 0)] = space[0];
            s[(i, 1)] = space[1];
        }

        let svd = a.clone().svd(true, true);
        let x = svd.solve(&s, self.eps).map_err(CalibrationError::Solve)?;

        let r = &a * &x - &s;
        let residual = (0..2)
            .map(|c| r.column(c).iter().map(|v| v * v).sum::<f64>())
            .sum::<f64>()
            / 2.0;

        let mut rows = [[0.0; FEATURE_COUNT]; 2];
        for (j, row) in rows.iter_mut().enumerate() {
            for (k, v) in row.iter_mut().enumerate() {
                *v = x[(k, j)];
            }
        }
        log::debug!("transform fit over {n} points, residual {residual:.3e}");
        Ok(TransformFit {
            transform: TransformMatrix::new(rows),
            residual,
        })
    }
}
