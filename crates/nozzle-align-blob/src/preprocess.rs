//! Frame preprocessing ahead of the blob search.
//!
//! Each [`Preprocessor`] turns an RGB frame into a gray plane where the
//! nozzle tip reads as a dark, well separated disk under a particular kind
//! of lighting.

use nozzle_align_core::{Frame, GrayImage, GrayImageView};
use serde::{Deserialize, Serialize};

use crate::threshold::{adaptive_threshold_gaussian, binarize, histogram, triangle_threshold};

/// Preprocessing pipelines available to the cascade.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preprocessor {
    /// Gamma, luma plane, Gaussian blur, adaptive Gaussian threshold.
    LumaAdaptive,
    /// Gamma, gray, triangle threshold, Gaussian blur.
    TriangleBlur,
    /// Gray (no gamma), median blur.
    MedianBlur,
}

impl Preprocessor {
    pub const ALL: [Preprocessor; 3] = [
        Preprocessor::LumaAdaptive,
        Preprocessor::TriangleBlur,
        Preprocessor::MedianBlur,
    ];

    #[inline]
    pub(crate) fn index(self) -> usize {
        match self {
            Preprocessor::LumaAdaptive => 0,
            Preprocessor::TriangleBlur => 1,
            Preprocessor::MedianBlur => 2,
        }
    }

    pub fn apply(self, frame: &Frame, params: &PreprocessParams) -> GrayImage {
        match self {
            Preprocessor::LumaAdaptive => {
                let luma = frame.map_lut(&gamma_lut(params.gamma)).to_gray();
                let blurred = gaussian_blur(&luma.view(), params.blur_ksize, params.blur_sigma);
                adaptive_threshold_gaussian(
                    &blurred.view(),
                    params.adaptive_block,
                    params.adaptive_c,
                )
            }
            Preprocessor::TriangleBlur => {
                let gray = frame.map_lut(&gamma_lut(params.gamma)).to_gray();
                let t = triangle_threshold(&histogram(&gray.view()));
                log::trace!("triangle threshold {t}");
                let bin = binarize(&gray.view(), t);
                gaussian_blur(&bin.view(), params.blur_ksize, params.blur_sigma)
            }
            Preprocessor::MedianBlur => median_blur(&frame.to_gray().view(), params.median_ksize),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessParams {
    pub gamma: f32,
    /// Gaussian kernel size (odd).
    pub blur_ksize: usize,
    pub blur_sigma: f32,
    /// Adaptive threshold neighbourhood size (odd).
    pub adaptive_block: usize,
    pub adaptive_c: i32,
    pub median_ksize: usize,
}

impl Default for PreprocessParams {
    fn default() -> Self {
        Self {
            gamma: 1.2,
            blur_ksize: 7,
            blur_sigma: 6.0,
            adaptive_block: 35,
            adaptive_c: 1,
            median_ksize: 5,
        }
    }
}

/// Lookup table applying `out = 255 * (in / 255)^(1 / gamma)`, truncated.
pub fn gamma_lut(gamma: f32) -> [u8; 256] {
    let inv = 1.0 / gamma.max(f32::EPSILON) as f64;
    let mut lut = [0u8; 256];
    for (i, v) in lut.iter_mut().enumerate() {
        *v = ((i as f64 / 255.0).powf(inv) * 255.0).clamp(0.0, 255.0) as u8;
    }
    lut
}

fn gaussian_kernel(ksize: usize, sigma: f32) -> Vec<f32> {
    let r = (ksize / 2) as i32;
    let s2 = 2.0 * sigma.max(1e-3) * sigma.max(1e-3);
    let mut k: Vec<f32> = (-r..=r).map(|i| (-(i * i) as f32 / s2).exp()).collect();
    let sum: f32 = k.iter().sum();
    for w in &mut k {
        *w /= sum;
    }
    k
}

/// Separable Gaussian blur with replicated borders.
pub fn gaussian_blur(img: &GrayImageView<'_>, ksize: usize, sigma: f32) -> GrayImage {
    let ksize = ksize.max(1) | 1;
    let kernel = gaussian_kernel(ksize, sigma);
    let r = (ksize / 2) as i64;
    let (w, h) = (img.width, img.height);

    let mut tmp = vec![0f32; w * h];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0;
            for (k, &wk) in kernel.iter().enumerate() {
                acc += wk * img.get_clamped(x as i64 + k as i64 - r, y as i64) as f32;
            }
            tmp[y * w + x] = acc;
        }
    }

    let mut out = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0;
            for (k, &wk) in kernel.iter().enumerate() {
                let yy = (y as i64 + k as i64 - r).clamp(0, h as i64 - 1) as usize;
                acc += wk * tmp[yy * w + x];
            }
            out.data[y * w + x] = acc.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Square median filter with replicated borders.
pub fn median_blur(img: &GrayImageView<'_>, ksize: usize) -> GrayImage {
    let ksize = ksize.max(1) | 1;
    let r = (ksize / 2) as i64;
    let mut window = Vec::with_capacity(ksize * ksize);
    let mut out = GrayImage::new(img.width, img.height);
    for y in 0..img.height {
        for x in 0..img.width {
            window.clear();
            for dy in -r..=r {
                for dx in -r..=r {
                    window.push(img.get_clamped(x as i64 + dx, y as i64 + dy));
                }
            }
            let mid = window.len() / 2;
            let (_, m, _) = window.select_nth_unstable(mid);
            out.set(x, y, *m);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use nozzle_align_core::Rgb;

    #[test]
    fn gamma_brightens_midtones_and_keeps_extremes() {
        let lut = gamma_lut(1.2);
        assert_eq!(lut[0], 0);
        assert_eq!(lut[255], 255);
        assert!(lut[128] > 128);
    }

    #[test]
    fn gaussian_preserves_constant_image() {
        let img = GrayImage {
            width: 9,
            height: 5,
            data: vec![77; 45],
        };
        let out = gaussian_blur(&img.view(), 7, 6.0);
        assert!(out.data.iter().all(|&v| v == 77));
    }

    #[test]
    fn median_removes_salt_noise() {
        let mut img = GrayImage {
            width: 9,
            height: 9,
            data: vec![100; 81],
        };
        img.set(4, 4, 255);
        img.set(0, 0, 0);
        let out = median_blur(&img.view(), 5);
        assert_eq!(out.get(4, 4), 100);
        assert_eq!(out.get(0, 0), 100);
    }

    #[test]
    fn luma_adaptive_output_is_binary() {
        let mut frame = Frame::filled(48, 48, Rgb([210, 210, 210]));
        {
            let mut px = frame.pixels_mut();
            for y in 20..28 {
                for x in 20..28 {
                    px.put(x, y, Rgb([15, 15, 15]));
                }
            }
        }
        let out = Preprocessor::LumaAdaptive.apply(&frame, &PreprocessParams::default());
        assert!(out.data.iter().all(|&v| v == 0 || v == 255));
        assert_eq!(out.get(24, 24), 0);
        assert_eq!(out.get(2, 2), 255);
    }
}
