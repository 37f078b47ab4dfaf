//! Contract of the printer motion system.

/// Motion failures reported by a [`MotionController`].
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum MotionError {
    #[error("axes must be homed first")]
    NotHomed,

    #[error("motion command failed: {0}")]
    Failed(String),
}

/// Moves the toolhead in the XY plane. Every move blocks until motion has
/// settled, so a frame grabbed afterwards shows the new position.
pub trait MotionController {
    /// Fail with [`MotionError::NotHomed`] unless X and Y are homed.
    fn ensure_homed(&mut self) -> Result<(), MotionError>;

    fn move_relative(&mut self, dx: f64, dy: f64) -> Result<(), MotionError>;

    fn move_absolute(&mut self, x: f64, y: f64) -> Result<(), MotionError>;

    /// Current `(x, y, z)` machine position.
    fn position(&mut self) -> Result<[f64; 3], MotionError>;
}
