use crate::CalibrationError;

/// Round to 3 decimals, the machine's move resolution.
#[inline]
pub fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// Scale of one calibration move: travelled distance over pixel distance.
///
/// Travel is measured as `|dx| + |dy|`, the pixel distance as the euclidean
/// norm between the two observed positions. Rounded to 3 decimals.
pub fn mm_per_pixel(
    travel: [f64; 2],
    from_uv: [f64; 2],
    to_uv: [f64; 2],
) -> Result<f64, CalibrationError> {
    let dist = (to_uv[0] - from_uv[0]).hypot(to_uv[1] - from_uv[1]);
    if dist <= f64::EPSILON {
        return Err(CalibrationError::ZeroPixelDistance);
    }
    let mpp = round3((travel[0].abs() + travel[1].abs()) / dist);
    log::debug!("travel {travel:?}, {from_uv:?} -> {to_uv:?}: {mpp} mm/px");
    Ok(mpp)
}
