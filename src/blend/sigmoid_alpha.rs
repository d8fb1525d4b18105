//! Silhouette blending: differentiable alpha from signed distances.
//!
//! - **RGB**: color of the closest fragment, copied as is
//! - **A**: probability that at least one of the K faces covers the pixel,
//!   `1 - Π_k (1 - σ(-d_k / sigma))`
//!
//! See Liu et al., "Soft Rasterizer: A Differentiable Renderer for Image-based
//! 3D Reasoning", ICCV 2019.
//!
//! The per-pixel reduction is pluggable through `SigmoidAlphaKernel`. Both
//! provided kernels run the same per-pixel code, so their results are
//! bit-identical.

use crate::blend::BlendParams;
use crate::core::{FragmentColors, FragmentShape, Fragments, RgbaBatch};
use crate::diff::blend_grad::{coverage_backward, coverage_forward};
use nalgebra::Vector4;
use rayon::prelude::*;

/// Fused forward/backward reduction over the K slots of every pixel.
///
/// Buffers are flat `(pixels, K)`; `alphas` and `grad_alphas` are flat `(pixels)`.
pub trait SigmoidAlphaKernel {
    fn forward(&self, dists: &[f32], pix_to_face: &[i64], k: usize, sigma: f32) -> Vec<f32>;

    fn backward(
        &self,
        grad_alphas: &[f32],
        dists: &[f32],
        pix_to_face: &[i64],
        k: usize,
        sigma: f32,
    ) -> Vec<f32>;
}

/// Straightforward nested loops over pixels × K.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialKernel;

impl SigmoidAlphaKernel for SerialKernel {
    fn forward(&self, dists: &[f32], pix_to_face: &[i64], k: usize, sigma: f32) -> Vec<f32> {
        dists
            .chunks(k)
            .zip(pix_to_face.chunks(k))
            .map(|(d, f)| coverage_forward(f, d, sigma))
            .collect()
    }

    fn backward(
        &self,
        grad_alphas: &[f32],
        dists: &[f32],
        pix_to_face: &[i64],
        k: usize,
        sigma: f32,
    ) -> Vec<f32> {
        let mut grad_dists = vec![0.0f32; dists.len()];
        for (p, out) in grad_dists.chunks_mut(k).enumerate() {
            let range = p * k..(p + 1) * k;
            coverage_backward(
                &pix_to_face[range.clone()],
                &dists[range],
                sigma,
                grad_alphas[p],
                out,
            );
        }
        grad_dists
    }
}

/// Pixel-parallel kernel on the rayon thread pool.
#[derive(Clone, Copy, Debug, Default)]
pub struct ParallelKernel;

impl SigmoidAlphaKernel for ParallelKernel {
    fn forward(&self, dists: &[f32], pix_to_face: &[i64], k: usize, sigma: f32) -> Vec<f32> {
        dists
            .par_chunks(k)
            .zip(pix_to_face.par_chunks(k))
            .map(|(d, f)| coverage_forward(f, d, sigma))
            .collect()
    }

    fn backward(
        &self,
        grad_alphas: &[f32],
        dists: &[f32],
        pix_to_face: &[i64],
        k: usize,
        sigma: f32,
    ) -> Vec<f32> {
        let mut grad_dists = vec![0.0f32; dists.len()];
        grad_dists
            .par_chunks_mut(k)
            .zip(dists.par_chunks(k))
            .zip(pix_to_face.par_chunks(k))
            .zip(grad_alphas.par_iter())
            .for_each(|(((out, d), f), &g)| coverage_backward(f, d, sigma, g, out));
        grad_dists
    }
}

/// Everything the backward pass needs from one forward call.
///
/// Returned by `SigmoidAlphaBlend::forward` and consumed by `backward`, so a
/// saved state can only be differentiated once.
#[derive(Clone, Debug)]
pub struct SigmoidAlphaForward {
    pub shape: FragmentShape,
    pub sigma: f32,
    pub dists: Vec<f32>,
    pub pix_to_face: Vec<i64>,
    /// Forward output, one alpha per pixel
    pub alphas: Vec<f32>,
}

/// Sigmoid-alpha blend driven by a chosen kernel.
#[derive(Clone, Copy, Debug, Default)]
pub struct SigmoidAlphaBlend<K = ParallelKernel> {
    kernel: K,
}

impl<K: SigmoidAlphaKernel> SigmoidAlphaBlend<K> {
    pub fn new(kernel: K) -> Self {
        Self { kernel }
    }

    /// Compute per-pixel alphas and keep the inputs for `backward`.
    pub fn forward(&self, fragments: &Fragments, sigma: f32) -> SigmoidAlphaForward {
        let k = fragments.shape.faces_per_pixel;
        let alphas = self
            .kernel
            .forward(&fragments.dists, &fragments.pix_to_face, k, sigma);

        SigmoidAlphaForward {
            shape: fragments.shape,
            sigma,
            dists: fragments.dists.clone(),
            pix_to_face: fragments.pix_to_face.clone(),
            alphas,
        }
    }

    /// dL/d(dists) given dL/d(alpha) per pixel.
    pub fn backward(&self, saved: SigmoidAlphaForward, grad_alphas: &[f32]) -> Vec<f32> {
        assert_eq!(
            grad_alphas.len(),
            saved.shape.num_pixels(),
            "one alpha gradient per pixel expected"
        );
        self.kernel.backward(
            grad_alphas,
            &saved.dists,
            &saved.pix_to_face,
            saved.shape.faces_per_pixel,
            saved.sigma,
        )
    }

    /// Full RGBA blend plus the saved state for `backward`.
    pub fn blend(
        &self,
        colors: &FragmentColors,
        fragments: &Fragments,
        params: &BlendParams,
    ) -> (RgbaBatch, SigmoidAlphaForward) {
        assert_eq!(colors.shape, fragments.shape, "colors and fragments disagree in shape");
        let shape = fragments.shape;
        let saved = self.forward(fragments, params.sigma);

        let data = saved
            .alphas
            .iter()
            .enumerate()
            .map(|(p, &a)| {
                let rgb = colors.pixel(p)[0];
                Vector4::new(rgb.x, rgb.y, rgb.z, a)
            })
            .collect();

        (
            RgbaBatch::new(shape.batch, shape.height, shape.width, data),
            saved,
        )
    }
}

/// Silhouette blend with the default (parallel) kernel.
pub fn sigmoid_alpha_blend(
    colors: &FragmentColors,
    fragments: &Fragments,
    params: &BlendParams,
) -> RgbaBatch {
    SigmoidAlphaBlend::<ParallelKernel>::default()
        .blend(colors, fragments, params)
        .0
}
