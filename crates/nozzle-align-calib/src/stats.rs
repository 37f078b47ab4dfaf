//! Outlier-resistant averaging of per-move mm-per-pixel samples.

use serde::{Deserialize, Serialize};

use crate::CalibrationError;

/// One calibration move: where the machine was, where the nozzle was seen,
/// and the scale derived from the move.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSample {
    pub space_xy: [f64; 2],
    pub camera_uv: [f64; 2],
    pub mpp: f64,
}

impl CalibrationSample {
    pub fn new(space_xy: [f64; 2], camera_uv: [f64; 2], mpp: f64) -> Self {
        Self {
            space_xy,
            camera_uv,
            mpp,
        }
    }
}

/// Knobs of the outlier rejection. Fractions are relative to the current mean.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MppFilterParams {
    /// Accept without refinement when `std_dev / mean` is at most this.
    pub accept_spread: f64,
    /// Drop the extreme max (min) when it lies this far above (below) the mean.
    pub trim_fraction: f64,
    /// Drop values further than this many standard deviations from the mean.
    pub sigma_band: f64,
    /// Drop values further than this fraction of the mean from the mean.
    pub relative_band: f64,
    /// Fail when the refined spread is still above this.
    pub max_spread: f64,
    /// Fail when fewer samples than this survive refinement.
    pub min_samples: usize,
}

impl Default for MppFilterParams {
    fn default() -> Self {
        Self {
            accept_spread: 0.10,
            trim_fraction: 0.20,
            sigma_band: 2.0,
            relative_band: 0.25,
            max_spread: 0.20,
            min_samples: 5,
        }
    }
}

/// Accepted scale and the samples it was computed from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MppAverage {
    pub mpp: f64,
    /// Sample (n - 1) standard deviation of the kept values.
    pub std_dev: f64,
    pub samples: Vec<CalibrationSample>,
    /// `false` when the input was accepted without pruning.
    pub refined: bool,
}

impl MppAverage {
    /// Relative spread, `std_dev / mpp`.
    pub fn spread(&self) -> f64 {
        relative_spread(self.std_dev, self.mpp)
    }

    pub fn mpps(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.mpp).collect()
    }
}

fn mean_and_std(samples: &[CalibrationSample]) -> (f64, f64) {
    let n = samples.len() as f64;
    let mean = samples.iter().map(|s| s.mpp).sum::<f64>() / n;
    let var = samples.iter().map(|s| (s.mpp - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var.sqrt())
}

fn relative_spread(std_dev: f64, mean: f64) -> f64 {
    if mean > 0.0 {
        std_dev / mean
    } else {
        f64::INFINITY
    }
}

fn index_of(samples: &[CalibrationSample], better: impl Fn(f64, f64) -> bool) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, s) in samples.iter().enumerate() {
        match best {
            Some(b) if !better(s.mpp, samples[b].mpp) => {}
            _ => best = Some(i),
        }
    }
    best
}

/// Average the per-move scales, pruning outliers when they spread too far.
///
/// Samples are removed whole, so positions and scales stay paired.
/// Refinement runs four passes, recomputing mean and standard deviation
/// after each: drop the maximum if it exceeds the mean by `trim_fraction`,
/// drop the minimum if it falls short by `trim_fraction`, drop everything
/// outside `sigma_band` standard deviations, drop everything outside
/// `relative_band` of the mean.
pub fn average_mpp(
    samples: &[CalibrationSample],
    params: &MppFilterParams,
) -> Result<MppAverage, CalibrationError> {
    if samples.len() < 2 {
        return Err(CalibrationError::TooFewSamples {
            got: samples.len(),
            need: 2,
        });
    }

    let (mean, std_dev) = mean_and_std(samples);
    let spread = relative_spread(std_dev, mean);
    if spread <= params.accept_spread {
        log::info!(
            "mm per pixel {mean:.4} (std dev {std_dev:.4}, spread {:.2} %)",
            spread * 100.0
        );
        return Ok(MppAverage {
            mpp: mean,
            std_dev,
            samples: samples.to_vec(),
            refined: false,
        });
    }

    log::info!(
        "mm per pixel spread {:.2} % too high (mean {mean:.4}), excluding outliers",
        spread * 100.0
    );
    let mut kept = samples.to_vec();
    let need = params.min_samples.max(2);
    let ensure_len = |kept: &[CalibrationSample]| {
        if kept.len() < 2 {
            Err(CalibrationError::TooFewSamples {
                got: kept.len(),
                need,
            })
        } else {
            Ok(())
        }
    };

    let (mean, _) = mean_and_std(&kept);
    if let Some(i) = index_of(&kept, |a, b| a > b) {
        if kept[i].mpp > mean * (1.0 + params.trim_fraction) {
            log::debug!("dropping max {}", kept[i].mpp);
            kept.remove(i);
        }
    }
    ensure_len(&kept)?;

    let (mean, _) = mean_and_std(&kept);
    if let Some(i) = index_of(&kept, |a, b| a < b) {
        if kept[i].mpp < mean * (1.0 - params.trim_fraction) {
            log::debug!("dropping min {}", kept[i].mpp);
            kept.remove(i);
        }
    }
    ensure_len(&kept)?;

    let (mean, std_dev) = mean_and_std(&kept);
    log::info!(
        "without extremes: mm per pixel {mean:.4}, std dev {std_dev:.4} ({:.2} %)",
        relative_spread(std_dev, mean) * 100.0
    );
    let band = params.sigma_band * std_dev;
    kept.retain(|s| (s.mpp - mean).abs() <= band);
    ensure_len(&kept)?;

    let (mean, _) = mean_and_std(&kept);
    let band = params.relative_band * mean;
    kept.retain(|s| (s.mpp - mean).abs() <= band);
    ensure_len(&kept)?;

    let (mean, std_dev) = mean_and_std(&kept);
    let spread = relative_spread(std_dev, mean);
    log::info!(
        "final mm per pixel {mean:.4} from {} values, std dev {std_dev:.4} ({:.2} %)",
        kept.len(),
        spread * 100.0
    );

    if spread > params.max_spread {
        return Err(CalibrationError::SpreadTooHigh {
            spread,
            max: params.max_spread,
        });
    }
    if kept.len() < params.min_samples {
        return Err(CalibrationError::TooFewSamples {
            got: kept.len(),
            need: params.min_samples,
        });
    }

    Ok(MppAverage {
        mpp: mean,
        std_dev,
        samples: kept,
        refined: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn samples(mpps: &[f64]) -> Vec<CalibrationSample> {
        mpps.iter()
            .enumerate()
            .map(|(i, &m)| CalibrationSample::new([i as f64, 0.0], [0.0, i as f64], m))
            .collect()
    }

    #[test]
    fn clean_input_is_returned_unchanged() {
        let input = samples(&[0.05, 0.051, 0.049, 0.0505, 0.0495, 0.05]);
        let params = MppFilterParams::default();
        let first = average_mpp(&input, &params).unwrap();
        assert!(!first.refined);
        assert_eq!(first.samples, input);
        assert_relative_eq!(first.mpp, 0.05, epsilon = 1e-12);

        let second = average_mpp(&first.samples, &params).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn egregious_outlier_is_pruned() {
        let input = samples(&[1.0, 1.02, 0.98, 1.01, 5.0]);
        let params = MppFilterParams {
            min_samples: 4,
            ..MppFilterParams::default()
        };
        let avg = average_mpp(&input, &params).unwrap();
        assert!(avg.refined);
        assert_eq!(avg.mpps(), vec![1.0, 1.02, 0.98, 1.01]);
        assert_relative_eq!(avg.mpp, 1.0025, epsilon = 1e-12);
        assert_relative_eq!(avg.std_dev, 0.017078, epsilon = 1e-5);
        assert!(avg.spread() <= 0.20);
        // Positions travel with their scale.
        assert_eq!(avg.samples[3].space_xy, [3.0, 0.0]);
    }

    #[test]
    fn default_minimum_rejects_four_survivors() {
        let input = samples(&[1.0, 1.02, 0.98, 1.01, 5.0]);
        let err = average_mpp(&input, &MppFilterParams::default()).unwrap_err();
        assert_eq!(err, CalibrationError::TooFewSamples { got: 4, need: 5 });
    }

    #[test]
    fn irreducible_spread_fails() {
        let input = samples(&[0.5, 1.0, 1.5, 0.6, 1.4, 0.9, 1.1]);
        let params = MppFilterParams {
            relative_band: 0.5,
            ..MppFilterParams::default()
        };
        let err = average_mpp(&input, &params).unwrap_err();
        assert!(matches!(err, CalibrationError::SpreadTooHigh { .. }));
    }

    #[test]
    fn needs_two_samples() {
        let err = average_mpp(&samples(&[1.0]), &MppFilterParams::default()).unwrap_err();
        assert_eq!(err, CalibrationError::TooFewSamples { got: 1, need: 2 });
    }
}
