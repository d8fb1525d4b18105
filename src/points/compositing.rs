//! Per-pixel reduction of point-cloud fragments into feature images.
//!
//! Layouts follow the point rasterizer: fragment indices and alphas are
//! (N, K, H, W), point features are (C, P) and composited images are
//! (N, C, H, W). Points arrive sorted nearest-first per pixel, `-1` marks an
//! empty slot.

use crate::diff::composite_grad::{
    alpha_composite_backward, alpha_composite_forward, norm_weighted_sum_backward,
    norm_weighted_sum_forward, weighted_sum_backward, weighted_sum_forward, CompositeForward,
    CompositeGrads,
};
use nalgebra::DVector;
use rayon::prelude::*;

/// Nearest point indices per pixel, shape (N, K, H, W).
#[derive(Clone, Debug, PartialEq)]
pub struct PointFragments {
    pub batch: usize,
    pub points_per_pixel: usize,
    pub height: usize,
    pub width: usize,
    pub idx: Vec<i64>,
}

impl PointFragments {
    pub fn new(
        batch: usize,
        points_per_pixel: usize,
        height: usize,
        width: usize,
        idx: Vec<i64>,
    ) -> Self {
        assert_eq!(
            idx.len(),
            batch * points_per_pixel * height * width,
            "point indices do not match fragment shape"
        );
        Self {
            batch,
            points_per_pixel,
            height,
            width,
            idx,
        }
    }

    pub fn num_pixels(&self) -> usize {
        self.batch * self.height * self.width
    }

    /// Flat (N, K, H, W) index of slot `k` of pixel `pixel` (flat over N, H, W).
    pub fn slot(&self, pixel: usize, k: usize) -> usize {
        let hw = self.height * self.width;
        let (n, yx) = (pixel / hw, pixel % hw);
        (n * self.points_per_pixel + k) * hw + yx
    }

    /// True when the nearest slot of the pixel is empty.
    pub fn is_background(&self, pixel: usize) -> bool {
        self.idx[self.slot(pixel, 0)] < 0
    }
}

/// Per-point features, shape (C, P).
#[derive(Clone, Debug, PartialEq)]
pub struct PointFeatures {
    pub channels: usize,
    pub num_points: usize,
    pub data: Vec<f32>,
}

impl PointFeatures {
    pub fn new(channels: usize, num_points: usize, data: Vec<f32>) -> Self {
        assert_eq!(data.len(), channels * num_points, "features do not match (C, P)");
        Self {
            channels,
            num_points,
            data,
        }
    }

    pub fn zeros(channels: usize, num_points: usize) -> Self {
        Self::new(channels, num_points, vec![0.0; channels * num_points])
    }

    /// Build from one feature vector per point.
    pub fn from_points(points: &[Vec<f32>]) -> Self {
        let channels = points.first().map_or(0, Vec::len);
        let mut data = vec![0.0; channels * points.len()];
        for (p, feat) in points.iter().enumerate() {
            assert_eq!(feat.len(), channels, "point {p} has the wrong channel count");
            for (c, &v) in feat.iter().enumerate() {
                data[c * points.len() + p] = v;
            }
        }
        Self::new(channels, points.len(), data)
    }

    /// Feature column of point `p`.
    pub fn point(&self, p: usize) -> DVector<f32> {
        DVector::from_iterator(
            self.channels,
            (0..self.channels).map(|c| self.data[c * self.num_points + p]),
        )
    }

    fn add_to_point(&mut self, p: usize, grad: &DVector<f32>) {
        for c in 0..self.channels {
            self.data[c * self.num_points + p] += grad[c];
        }
    }
}

/// Composited images, shape (N, C, H, W).
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureImages {
    pub batch: usize,
    pub channels: usize,
    pub height: usize,
    pub width: usize,
    pub data: Vec<f32>,
}

impl FeatureImages {
    pub fn new(batch: usize, channels: usize, height: usize, width: usize, data: Vec<f32>) -> Self {
        assert_eq!(
            data.len(),
            batch * channels * height * width,
            "image data does not match (N, C, H, W)"
        );
        Self {
            batch,
            channels,
            height,
            width,
            data,
        }
    }

    /// Flat index of channel `c` at pixel `pixel` (flat over N, H, W).
    pub fn index(&self, pixel: usize, c: usize) -> usize {
        let hw = self.height * self.width;
        let (n, yx) = (pixel / hw, pixel % hw);
        (n * self.channels + c) * hw + yx
    }

    pub fn get(&self, n: usize, c: usize, y: usize, x: usize) -> f32 {
        self.data[((n * self.channels + c) * self.height + y) * self.width + x]
    }

    /// All channels of one pixel.
    pub fn pixel(&self, pixel: usize) -> DVector<f32> {
        DVector::from_iterator(self.channels, (0..self.channels).map(|c| self.data[self.index(pixel, c)]))
    }
}

/// Gradients of a compositing rule.
#[derive(Clone, Debug)]
pub struct CompositingGrads {
    /// dL/d(alphas), shape (N, K, H, W)
    pub d_alphas: Vec<f32>,
    /// dL/d(features), shape (C, P)
    pub d_features: PointFeatures,
}

/// How the K points of a pixel are reduced into one feature vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompositeRule {
    /// Front-to-back "over" compositing
    AlphaComposite,
    /// Σ a f / Σ a
    NormWeightedSum,
    /// Σ a f
    WeightedSum,
}

impl CompositeRule {
    fn forward(&self, alphas: &[f32], feats: &[DVector<f32>], channels: usize) -> CompositeForward {
        match self {
            CompositeRule::AlphaComposite => alpha_composite_forward(alphas, feats, channels),
            CompositeRule::NormWeightedSum => norm_weighted_sum_forward(alphas, feats, channels),
            CompositeRule::WeightedSum => weighted_sum_forward(alphas, feats, channels),
        }
    }

    fn backward(
        &self,
        alphas: &[f32],
        feats: &[DVector<f32>],
        forward: &CompositeForward,
        d_out: &DVector<f32>,
    ) -> CompositeGrads {
        match self {
            CompositeRule::AlphaComposite => alpha_composite_backward(alphas, feats, forward, d_out),
            CompositeRule::NormWeightedSum => {
                norm_weighted_sum_backward(alphas, feats, forward, d_out)
            }
            CompositeRule::WeightedSum => weighted_sum_backward(alphas, feats, d_out),
        }
    }

    /// Reduce every pixel. Returns an (N, C, H, W) image.
    pub fn composite(
        &self,
        fragments: &PointFragments,
        alphas: &[f32],
        features: &PointFeatures,
    ) -> FeatureImages {
        assert_eq!(alphas.len(), fragments.idx.len(), "alphas do not match fragments");
        let channels = features.channels;

        let per_pixel: Vec<DVector<f32>> = (0..fragments.num_pixels())
            .into_par_iter()
            .map(|pixel| {
                let (_, a, f) = gather(fragments, alphas, features, pixel);
                self.forward(&a, &f, channels).out
            })
            .collect();

        let mut images = FeatureImages::new(
            fragments.batch,
            channels,
            fragments.height,
            fragments.width,
            vec![0.0; fragments.num_pixels() * channels],
        );
        for (pixel, out) in per_pixel.iter().enumerate() {
            for c in 0..channels {
                let i = images.index(pixel, c);
                images.data[i] = out[c];
            }
        }
        images
    }

    /// Gradients of `composite` given dL/d(images).
    pub fn composite_backward(
        &self,
        fragments: &PointFragments,
        alphas: &[f32],
        features: &PointFeatures,
        d_images: &FeatureImages,
    ) -> CompositingGrads {
        assert_eq!(alphas.len(), fragments.idx.len(), "alphas do not match fragments");
        assert_eq!(d_images.channels, features.channels, "gradient channel count mismatch");
        let channels = features.channels;

        // Thread-local accumulation of per-point feature gradients, reduced at the end.
        struct LocalGrads {
            d_alphas: Vec<(usize, f32)>,
            d_features: PointFeatures,
        }

        let locals: Vec<LocalGrads> = (0..fragments.num_pixels())
            .into_par_iter()
            .fold(
                || LocalGrads {
                    d_alphas: Vec::new(),
                    d_features: PointFeatures::zeros(channels, features.num_points),
                },
                |mut local, pixel| {
                    let (slots, a, f) = gather(fragments, alphas, features, pixel);
                    if slots.is_empty() {
                        return local;
                    }
                    let fwd = self.forward(&a, &f, channels);
                    let grads = self.backward(&a, &f, &fwd, &d_images.pixel(pixel));
                    for (j, &slot) in slots.iter().enumerate() {
                        local.d_alphas.push((slot, grads.d_alphas[j]));
                        local
                            .d_features
                            .add_to_point(fragments.idx[slot] as usize, &grads.d_features[j]);
                    }
                    local
                },
            )
            .collect();

        let mut d_alphas = vec![0.0f32; alphas.len()];
        let mut d_features = PointFeatures::zeros(channels, features.num_points);
        for local in locals {
            for (slot, g) in local.d_alphas {
                d_alphas[slot] = g;
            }
            for (acc, g) in d_features.data.iter_mut().zip(&local.d_features.data) {
                *acc += g;
            }
        }

        CompositingGrads {
            d_alphas,
            d_features,
        }
    }
}

/// Valid slots of one pixel: (flat slot indices, alphas, point features).
fn gather(
    fragments: &PointFragments,
    alphas: &[f32],
    features: &PointFeatures,
    pixel: usize,
) -> (Vec<usize>, Vec<f32>, Vec<DVector<f32>>) {
    let mut slots = Vec::new();
    let mut a = Vec::new();
    let mut f = Vec::new();
    for k in 0..fragments.points_per_pixel {
        let slot = fragments.slot(pixel, k);
        let idx = fragments.idx[slot];
        if idx < 0 {
            continue;
        }
        slots.push(slot);
        a.push(alphas[slot]);
        f.push(features.point(idx as usize));
    }
    (slots, a, f)
}

/// Front-to-back alpha compositing of point features.
pub fn alpha_composite(
    fragments: &PointFragments,
    alphas: &[f32],
    features: &PointFeatures,
) -> FeatureImages {
    CompositeRule::AlphaComposite.composite(fragments, alphas, features)
}

/// Alpha-normalized weighted sum of point features.
pub fn norm_weighted_sum(
    fragments: &PointFragments,
    alphas: &[f32],
    features: &PointFeatures,
) -> FeatureImages {
    CompositeRule::NormWeightedSum.composite(fragments, alphas, features)
}

/// Alpha-weighted sum of point features.
pub fn weighted_sum(
    fragments: &PointFragments,
    alphas: &[f32],
    features: &PointFeatures,
) -> FeatureImages {
    CompositeRule::WeightedSum.composite(fragments, alphas, features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// One image 1×2, K = 2: pixel 0 sees points [1, 0], pixel 1 is empty.
    fn scene() -> (PointFragments, Vec<f32>, PointFeatures) {
        // (N, K, H, W) = (1, 2, 1, 2)
        let frags = PointFragments::new(1, 2, 1, 2, vec![1, -1, 0, -1]);
        let alphas = vec![0.5, 0.9, 1.0, 0.9];
        let feats = PointFeatures::from_points(&[vec![1.0, 0.0, 0.0], vec![0.0, 0.0, 1.0]]);
        (frags, alphas, feats)
    }

    #[test]
    fn test_layouts() {
        let (frags, _, feats) = scene();
        assert_eq!(frags.slot(0, 1), 2);
        assert_eq!(frags.slot(1, 0), 1);
        assert!(frags.is_background(1));
        assert!(!frags.is_background(0));
        assert_eq!(feats.point(1), DVector::from_vec(vec![0.0, 0.0, 1.0]));
    }

    #[test]
    fn test_alpha_composite_nearest_first() {
        let (frags, alphas, feats) = scene();
        let img = alpha_composite(&frags, &alphas, &feats);
        // blue at alpha 0.5 over red at alpha 1.0
        assert_relative_eq!(img.get(0, 2, 0, 0), 0.5, epsilon = 1e-6);
        assert_relative_eq!(img.get(0, 0, 0, 0), 0.5, epsilon = 1e-6);
        // empty pixel
        assert_eq!(img.get(0, 0, 0, 1), 0.0);
    }

    #[test]
    fn test_norm_and_plain_weighted_sum() {
        let (frags, alphas, feats) = scene();
        let img = norm_weighted_sum(&frags, &alphas, &feats);
        assert_relative_eq!(img.get(0, 2, 0, 0), 0.5 / 1.5, epsilon = 1e-6);
        assert_relative_eq!(img.get(0, 0, 0, 0), 1.0 / 1.5, epsilon = 1e-6);

        let img = weighted_sum(&frags, &alphas, &feats);
        assert_relative_eq!(img.get(0, 2, 0, 0), 0.5, epsilon = 1e-6);
        assert_relative_eq!(img.get(0, 0, 0, 0), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_backward_ignores_empty_slots() {
        let (frags, alphas, feats) = scene();
        let d_img = FeatureImages::new(1, 3, 1, 2, vec![1.0; 6]);
        let grads = CompositeRule::WeightedSum.composite_backward(&frags, &alphas, &feats, &d_img);
        assert_eq!(grads.d_alphas[1], 0.0);
        assert_eq!(grads.d_alphas[3], 0.0);
        // d/da of Σ a f summed over channels = Σ_c f_c = 1 for both points
        assert_relative_eq!(grads.d_alphas[0], 1.0);
        assert_relative_eq!(grads.d_alphas[2], 1.0);
        assert_eq!(grads.d_features.point(0), DVector::from_vec(vec![1.0, 1.0, 1.0]));
    }
}
