//! Softmax RGB blending: soft visibility combined with a depth prior.
//!
//! - **RGB**: softmax over the K fragments plus one implicit background
//!   candidate, weighted by the distance-based coverage probability and an
//!   exponential of relative inverse depth
//! - **A**: `1 - Π_k (1 - p_k)`, as in `sigmoid_alpha`
//!
//! Nearer, more probable faces dominate the color while far or improbable faces
//! contribute little, so gradients flow through occlusion ordering. Subtracting
//! the per-pixel max before exponentiating keeps the weights from overflowing.
//!
//! See Liu et al., "Soft Rasterizer: A Differentiable Renderer for Image-based
//! 3D Reasoning", ICCV 2019.

use crate::blend::BlendParams;
use crate::core::{FragmentColors, Fragments, RgbaBatch};
use crate::diff::blend_grad::{softmax_backward, softmax_forward};
use crate::error::RenderError;
use nalgebra::{Vector3, Vector4};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Depth range used to rescale fragment depth into the softmax weights.
///
/// Defaults to (1, 100). These are blend parameters in their own right and are
/// not read from the camera's clipping planes. Deserialization rejects a range
/// with `zfar <= znear`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDepthRange")]
pub struct DepthRange {
    pub znear: f32,
    pub zfar: f32,
}

/// Unchecked wire form of `DepthRange`; missing fields take the defaults.
#[derive(Deserialize)]
#[serde(default)]
struct RawDepthRange {
    znear: f32,
    zfar: f32,
}

impl Default for RawDepthRange {
    fn default() -> Self {
        let DepthRange { znear, zfar } = DepthRange::default();
        Self { znear, zfar }
    }
}

impl TryFrom<RawDepthRange> for DepthRange {
    type Error = RenderError;

    fn try_from(raw: RawDepthRange) -> Result<Self, Self::Error> {
        let range = Self {
            znear: raw.znear,
            zfar: raw.zfar,
        };
        range.validate()?;
        Ok(range)
    }
}

impl Default for DepthRange {
    fn default() -> Self {
        Self {
            znear: 1.0,
            zfar: 100.0,
        }
    }
}

impl DepthRange {
    pub fn new(znear: f32, zfar: f32) -> Self {
        let range = Self { znear, zfar };
        range.assert_valid();
        range
    }

    /// Check that both ends are finite and `zfar > znear`.
    pub fn validate(&self) -> Result<(), RenderError> {
        let finite = self.znear.is_finite() && self.zfar.is_finite();
        if !finite || self.zfar <= self.znear {
            return Err(RenderError::InvalidBlendParams(format!(
                "zfar ({}) must be greater than znear ({})",
                self.zfar, self.znear
            )));
        }
        Ok(())
    }

    fn assert_valid(&self) {
        if let Err(err) = self.validate() {
            panic!("{err}");
        }
    }

    /// Relative inverse depth: 1 at `znear`, 0 at `zfar`.
    pub fn z_inv(&self, depth: f32) -> f32 {
        (self.zfar - depth) / (self.zfar - self.znear)
    }
}

/// RGB and alpha blending of the top K faces.
pub fn softmax_rgb_blend(
    colors: &FragmentColors,
    fragments: &Fragments,
    params: &BlendParams,
    range: &DepthRange,
) -> RgbaBatch {
    assert_eq!(colors.shape, fragments.shape, "colors and fragments disagree in shape");
    range.assert_valid();
    let shape = fragments.shape;

    let data = (0..shape.num_pixels())
        .into_par_iter()
        .map(|p| {
            let frag = fragments.pixel(p);
            let fwd = softmax_forward(
                colors.pixel(p),
                frag.pix_to_face,
                frag.dists,
                frag.zbuf,
                params,
                range,
            );
            Vector4::new(fwd.rgb.x, fwd.rgb.y, fwd.rgb.z, fwd.alpha)
        })
        .collect();

    RgbaBatch::new(shape.batch, shape.height, shape.width, data)
}

/// Gradients of `softmax_rgb_blend` with respect to its differentiable inputs.
#[derive(Clone, Debug)]
pub struct SoftmaxBlendGrads {
    /// dL/d(dists), flat (N, H, W, K)
    pub d_dists: Vec<f32>,
    /// dL/d(zbuf), flat (N, H, W, K)
    pub d_zbuf: Vec<f32>,
    /// dL/d(colors), same shape as the colors
    pub d_colors: FragmentColors,
    /// dL/d(background_color), summed over all pixels
    pub d_background: Vector3<f32>,
}

/// Backward pass of `softmax_rgb_blend`.
///
/// `d_image` holds the upstream gradient dL/d(r, g, b, a) per pixel. The
/// forward is recomputed per pixel, so nothing needs to be saved between the
/// two calls beyond the inputs themselves.
pub fn softmax_rgb_blend_backward(
    colors: &FragmentColors,
    fragments: &Fragments,
    params: &BlendParams,
    range: &DepthRange,
    d_image: &RgbaBatch,
) -> SoftmaxBlendGrads {
    assert_eq!(colors.shape, fragments.shape, "colors and fragments disagree in shape");
    range.assert_valid();
    let shape = fragments.shape;
    assert_eq!(
        d_image.data.len(),
        shape.num_pixels(),
        "upstream gradient does not match image shape"
    );
    let k = shape.faces_per_pixel;

    let mut d_dists = vec![0.0f32; shape.len()];
    let mut d_zbuf = vec![0.0f32; shape.len()];
    let mut d_colors = vec![Vector3::<f32>::zeros(); shape.len()];

    let d_background = d_dists
        .par_chunks_mut(k)
        .zip(d_zbuf.par_chunks_mut(k))
        .zip(d_colors.par_chunks_mut(k))
        .enumerate()
        .map(|(p, ((dd, dz), dc))| {
            let frag = fragments.pixel(p);
            let pixel_colors = colors.pixel(p);
            let fwd = softmax_forward(
                pixel_colors,
                frag.pix_to_face,
                frag.dists,
                frag.zbuf,
                params,
                range,
            );
            let upstream = d_image.data[p];
            let grads = softmax_backward(
                pixel_colors,
                frag.pix_to_face,
                params,
                range,
                &fwd,
                &upstream.xyz(),
                upstream.w,
            );
            dd.copy_from_slice(&grads.d_dists);
            dz.copy_from_slice(&grads.d_zbuf);
            dc.copy_from_slice(&grads.d_colors);
            grads.d_background
        })
        .reduce(|| Vector3::zeros(), |a, b| a + b);

    SoftmaxBlendGrads {
        d_dists,
        d_zbuf,
        d_colors: FragmentColors::new(shape, d_colors),
        d_background,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FragmentShape, NO_FACE};
    use approx::assert_relative_eq;

    #[test]
    fn test_z_inv_endpoints() {
        let r = DepthRange::new(2.0, 10.0);
        assert_relative_eq!(r.z_inv(2.0), 1.0);
        assert_relative_eq!(r.z_inv(10.0), 0.0);
        assert_relative_eq!(r.z_inv(6.0), 0.5);
    }

    #[test]
    #[should_panic(expected = "must be greater")]
    fn test_inverted_range_panics() {
        DepthRange::new(10.0, 1.0);
    }

    #[test]
    fn test_validate_rejects_degenerate_ranges() {
        assert!(DepthRange::default().validate().is_ok());
        for (znear, zfar) in [(5.0, 5.0), (5.0, 1.0), (f32::NAN, 1.0), (0.0, f32::INFINITY)] {
            let range = DepthRange { znear, zfar };
            assert!(matches!(range.validate(), Err(RenderError::InvalidBlendParams(_))));
        }
    }

    #[test]
    fn test_deserialize_checks_range() {
        let r: DepthRange = serde_json::from_str(r#"{"zfar": 20.0}"#).unwrap();
        assert_eq!(r, DepthRange::new(1.0, 20.0));
        assert!(serde_json::from_str::<DepthRange>(r#"{"znear": 5.0, "zfar": 5.0}"#).is_err());
    }

    #[test]
    #[should_panic(expected = "must be greater")]
    fn test_blend_with_empty_range_panics() {
        let shape = FragmentShape::new(1, 1, 1, 1);
        let frags = Fragments::new(
            shape,
            vec![0],
            vec![5.0],
            vec![Vector3::repeat(1.0 / 3.0)],
            vec![-0.1],
        );
        let colors = FragmentColors::uniform(shape, Vector3::new(1.0, 0.0, 0.0));
        // Public fields bypass `new`
        let range = DepthRange {
            znear: 5.0,
            zfar: 5.0,
        };
        softmax_rgb_blend(&colors, &frags, &BlendParams::default(), &range);
    }

    #[test]
    fn test_nearer_face_dominates() {
        let shape = FragmentShape::new(1, 1, 1, 2);
        let frags = Fragments::new(
            shape,
            vec![0, 1],
            vec![2.0, 50.0],
            vec![Vector3::new(1.0, 0.0, 0.0); 2],
            vec![-0.5, -0.5],
        );
        let colors = FragmentColors::new(
            shape,
            vec![Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 1.0)],
        );
        let params = BlendParams {
            sigma: 1e-2,
            gamma: 1e-2,
            background_color: Vector3::zeros(),
        };

        let out = softmax_rgb_blend(&colors, &frags, &params, &DepthRange::default());
        let px = out.get(0, 0, 0);
        assert!(px.x > 0.99 && px.z < 0.01, "got {px:?}");
        assert_relative_eq!(px.w, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_empty_pixel_is_background_with_zero_alpha() {
        let shape = FragmentShape::new(1, 1, 2, 3);
        let mut frags = Fragments::empty(shape);
        frags.pix_to_face[0] = 4;
        frags.zbuf[0] = 5.0;
        frags.dists[0] = -0.1;
        let bg = Vector3::new(0.2, 0.3, 0.4);
        let params = BlendParams {
            background_color: bg,
            ..BlendParams::default()
        };
        let colors = FragmentColors::uniform(shape, Vector3::new(0.9, 0.9, 0.9));

        let out = softmax_rgb_blend(&colors, &frags, &params, &DepthRange::default());
        assert_eq!(out.get(0, 0, 1), Vector4::new(0.2, 0.3, 0.4, 0.0));
        assert_eq!(frags.pix_to_face[3], NO_FACE);
    }
}
