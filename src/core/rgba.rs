//! Batched RGBA float images produced by the blend step.

use image::{Rgba, RgbaImage};
use nalgebra::Vector4;

/// A batch of RGBA images, shape (N, H, W) of `Vector4` = (r, g, b, a).
///
/// Also used for upstream gradients dL/d(pixel) in the backward passes.
#[derive(Clone, Debug, PartialEq)]
pub struct RgbaBatch {
    pub batch: usize,
    pub height: usize,
    pub width: usize,
    pub data: Vec<Vector4<f32>>,
}

impl RgbaBatch {
    pub fn new(batch: usize, height: usize, width: usize, data: Vec<Vector4<f32>>) -> Self {
        assert_eq!(
            data.len(),
            batch * height * width,
            "RGBA data does not match image shape"
        );
        Self {
            batch,
            height,
            width,
            data,
        }
    }

    /// Every pixel set to `value`.
    pub fn filled(batch: usize, height: usize, width: usize, value: Vector4<f32>) -> Self {
        Self::new(batch, height, width, vec![value; batch * height * width])
    }

    pub fn get(&self, n: usize, y: usize, x: usize) -> Vector4<f32> {
        self.data[(n * self.height + y) * self.width + x]
    }

    /// Alpha channel of every pixel, in the same flat order as `data`.
    pub fn alphas(&self) -> Vec<f32> {
        self.data.iter().map(|p| p.w).collect()
    }

    /// Quantize batch element `n` to an 8-bit image (values clamped to [0, 1]).
    pub fn to_rgba8(&self, n: usize) -> RgbaImage {
        assert!(n < self.batch, "batch index {n} out of range ({})", self.batch);
        let mut img = RgbaImage::new(self.width as u32, self.height as u32);
        for y in 0..self.height {
            for x in 0..self.width {
                let p = self.get(n, y, x);
                img.put_pixel(
                    x as u32,
                    y as u32,
                    Rgba([quantize(p.x), quantize(p.y), quantize(p.z), quantize(p.w)]),
                );
            }
        }
        img
    }
}

fn quantize(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}
