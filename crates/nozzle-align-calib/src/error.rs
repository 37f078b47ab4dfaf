/// Calibration quality and input failures.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("not enough samples (got {got}, need at least {need})")]
    TooFewSamples { got: usize, need: usize },

    #[error("mm-per-pixel spread {spread:.3} exceeds the accepted {max:.3}")]
    SpreadTooHigh { spread: f64, max: f64 },

    #[error("too many calibration points failed ({succeeded} of {attempted} usable)")]
    TooManyFailedPoints { succeeded: usize, attempted: usize },

    #[error("transform needs at least {need} points, got {got}")]
    Underdetermined { got: usize, need: usize },

    #[error("start and end pixel positions coincide")]
    ZeroPixelDistance,

    #[error("least-squares solve failed: {0}")]
    Solve(&'static str),
}
