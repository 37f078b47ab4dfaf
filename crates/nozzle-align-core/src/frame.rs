use serde::{Deserialize, Serialize};

use crate::FrameError;

/// Width and height of a camera frame in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Geometric center of the frame in pixel coordinates.
    pub fn center(&self) -> (f64, f64) {
        (self.width as f64 * 0.5, self.height as f64 * 0.5)
    }

    /// `true` when `(u, v)` lies inside `[0, width] x [0, height]`.
    pub fn contains(&self, u: f64, v: f64) -> bool {
        u >= 0.0 && v >= 0.0 && u <= self.width as f64 && v <= self.height as f64
    }
}

impl Default for FrameSize {
    fn default() -> Self {
        Self::new(640, 480)
    }
}

/// 8-bit RGB color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    pub const BLACK: Rgb = Rgb([0, 0, 0]);
    pub const WHITE: Rgb = Rgb([255, 255, 255]);
    pub const RED: Rgb = Rgb([255, 0, 0]);

    /// ITU-R BT.601 luma, rounded to the nearest integer.
    #[inline]
    pub fn luma(self) -> u8 {
        let [r, g, b] = self.0;
        let y = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        y.round().clamp(0.0, 255.0) as u8
    }
}

/// Immutable RGB raster acquired from a camera.
///
/// Pixels are stored row-major, three interleaved bytes per pixel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap an interleaved RGB buffer, validating its length.
    pub fn from_rgb(width: usize, height: usize, data: Vec<u8>) -> Result<Self, FrameError> {
        let expected = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(3))
            .ok_or(FrameError::InvalidDimensions { width, height })?;
        if width == 0 || height == 0 {
            return Err(FrameError::InvalidDimensions { width, height });
        }
        if data.len() != expected {
            return Err(FrameError::InvalidBuffer {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Frame of a single color.
    pub fn filled(width: usize, height: usize, color: Rgb) -> Self {
        let mut data = Vec::with_capacity(width * height * 3);
        for _ in 0..width * height {
            data.extend_from_slice(&color.0);
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Promote a gray raster to RGB by replicating the channel.
    pub fn from_gray(img: &GrayImageView<'_>) -> Self {
        let mut data = Vec::with_capacity(img.data.len() * 3);
        for &v in img.data {
            data.extend_from_slice(&[v, v, v]);
        }
        Self {
            width: img.width,
            height: img.height,
            data,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width as u32, self.height as u32)
    }

    #[inline]
    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> Rgb {
        let i = (y * self.width + x) * 3;
        Rgb([self.data[i], self.data[i + 1], self.data[i + 2]])
    }

    /// Copy with every channel value passed through `lut`.
    pub fn map_lut(&self, lut: &[u8; 256]) -> Frame {
        Frame {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|&v| lut[v as usize]).collect(),
        }
    }

    /// Luma plane of the frame.
    pub fn to_gray(&self) -> GrayImage {
        let data = self
            .data
            .chunks_exact(3)
            .map(|px| Rgb([px[0], px[1], px[2]]).luma())
            .collect();
        GrayImage {
            width: self.width,
            height: self.height,
            data,
        }
    }

    /// Mutable access for drawing on an owned copy.
    pub fn pixels_mut(&mut self) -> FramePixelsMut<'_> {
        FramePixelsMut { frame: self }
    }
}

/// Write handle over a frame's pixels; out-of-bounds writes are ignored.
pub struct FramePixelsMut<'a> {
    frame: &'a mut Frame,
}

impl FramePixelsMut<'_> {
    #[inline]
    pub fn put(&mut self, x: i64, y: i64, color: Rgb) {
        if x < 0 || y < 0 || x >= self.frame.width as i64 || y >= self.frame.height as i64 {
            return;
        }
        let i = (y as usize * self.frame.width + x as usize) * 3;
        self.frame.data[i..i + 3].copy_from_slice(&color.0);
    }

    /// Blend `color` over the pixel with weight `alpha` in `[0, 1]`.
    #[inline]
    pub fn blend(&mut self, x: i64, y: i64, color: Rgb, alpha: f32) {
        if x < 0 || y < 0 || x >= self.frame.width as i64 || y >= self.frame.height as i64 {
            return;
        }
        let i = (y as usize * self.frame.width + x as usize) * 3;
        for (c, &src) in color.0.iter().enumerate() {
            let dst = self.frame.data[i + c] as f32;
            let v = alpha * src as f32 + (1.0 - alpha) * dst;
            self.frame.data[i + c] = v.round().clamp(0.0, 255.0) as u8;
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

impl GrayImageView<'_> {
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    /// Pixel access with replicated borders.
    #[inline]
    pub fn get_clamped(&self, x: i64, y: i64) -> u8 {
        let x = x.clamp(0, self.width as i64 - 1) as usize;
        let y = y.clamp(0, self.height as i64 - 1) as usize;
        self.data[y * self.width + x]
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: u8) {
        self.data[y * self.width + x] = v;
    }
}
