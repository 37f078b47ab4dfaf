//! Global and local thresholding of gray planes.

use nozzle_align_core::{GrayImage, GrayImageView};

pub(crate) fn histogram(img: &GrayImageView<'_>) -> [u32; 256] {
    let mut hist = [0u32; 256];
    for &v in img.data {
        hist[v as usize] += 1;
    }
    hist
}

/// Triangle threshold of a histogram.
///
/// Draws a line from the histogram peak to the far end of the longer tail
/// and picks the bin with the largest distance below that line. Suited to
/// unimodal histograms where the object is a small fraction of the frame.
pub fn triangle_threshold(hist: &[u32; 256]) -> u8 {
    const N: usize = 256;

    let Some(mut left) = hist.iter().position(|&h| h > 0) else {
        return 0;
    };
    let mut right = hist.iter().rposition(|&h| h > 0).unwrap_or(left);
    left = left.saturating_sub(1);
    if right < N - 1 {
        right += 1;
    }

    let mut peak = 0usize;
    let mut peak_h = 0u32;
    for (i, &h) in hist.iter().enumerate() {
        if h > peak_h {
            peak_h = h;
            peak = i;
        }
    }

    // Work on the longer tail: mirror so that it is always on the left.
    let flipped = peak - left < right - peak;
    let mut h = *hist;
    if flipped {
        h.reverse();
        left = N - 1 - right;
        peak = N - 1 - peak;
    }

    let a = peak_h as f64;
    let b = left as f64 - peak as f64;
    let mut thresh = left as f64;
    let mut best = 0.0f64;
    for (i, &hi) in h.iter().enumerate().take(peak + 1).skip(left + 1) {
        let d = a * i as f64 + b * hi as f64;
        if d > best {
            best = d;
            thresh = i as f64;
        }
    }
    thresh -= 1.0;
    if flipped {
        thresh = (N - 1) as f64 - thresh;
    }
    thresh.clamp(0.0, 255.0) as u8
}

/// `255` where `v > thresh`, `0` elsewhere.
pub fn binarize(img: &GrayImageView<'_>, thresh: u8) -> GrayImage {
    GrayImage {
        width: img.width,
        height: img.height,
        data: img
            .data
            .iter()
            .map(|&v| if v > thresh { 255 } else { 0 })
            .collect(),
    }
}

/// Local threshold against a Gaussian-weighted neighbourhood mean.
///
/// A pixel becomes `255` when `v - mean > -c`, `0` otherwise. Borders are
/// replicated.
pub fn adaptive_threshold_gaussian(img: &GrayImageView<'_>, block: usize, c: i32) -> GrayImage {
    let block = block.max(3) | 1;
    let sigma = 0.3 * ((block as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let mean = crate::preprocess::gaussian_blur(img, block, sigma);
    let data = img
        .data
        .iter()
        .zip(mean.data.iter())
        .map(|(&v, &m)| if v as i32 - m as i32 > -c { 255 } else { 0 })
        .collect();
    GrayImage {
        width: img.width,
        height: img.height,
        data,
    }
}
