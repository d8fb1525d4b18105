//! Per-pixel forward/backward kernels for the mesh blend policies.
//!
//! Coverage (shared by sigmoid-alpha and softmax blending):
//!   p_k   = σ(-d_k / sigma) for real slots, 0 for sentinels
//!   alpha = 1 - Π_k (1 - p_k)
//!
//! Softmax color, over K fragments plus one background candidate:
//!   z_k   = (zfar - depth_k) / (zfar - znear), 0 for sentinels
//!   zmax  = max(max_k z_k, eps)
//!   w_k   = p_k * exp((z_k - zmax) / gamma)
//!   delta = max(exp((eps - zmax) / gamma), eps)
//!   rgb   = (Σ w_k c_k + delta * bg) / (Σ w_k + delta)
//!
//! The backward passes never divide by (1 - p_k): the product over the other
//! slots is built from prefix/suffix products, so saturated fragments
//! (p_k == 1) still get finite gradients.

use crate::blend::{BlendParams, DepthRange};
use crate::core::coverage_probability;
use crate::diff::math_grad::coverage_grad_from_probability;
use nalgebra::Vector3;

/// Floor on `zmax` and on the background weight `delta`.
pub const SOFTMAX_EPS: f32 = 1e-10;

/// Probability that at least one real fragment covers the pixel.
pub fn coverage_forward(pix_to_face: &[i64], dists: &[f32], sigma: f32) -> f32 {
    assert_eq!(pix_to_face.len(), dists.len());

    let mut transmit = 1.0f32;
    for (&face, &d) in pix_to_face.iter().zip(dists) {
        if face < 0 {
            continue;
        }
        let (_, q) = coverage_probability(d, sigma);
        transmit *= q;
    }
    1.0 - transmit
}

/// Backward of `coverage_forward` with respect to the signed distances.
///
/// Writes dL/dd_k into `d_dists` (zero for sentinel slots).
pub fn coverage_backward(
    pix_to_face: &[i64],
    dists: &[f32],
    sigma: f32,
    d_alpha: f32,
    d_dists: &mut [f32],
) {
    assert_eq!(pix_to_face.len(), dists.len());
    assert_eq!(d_dists.len(), dists.len());

    let probs = slot_probabilities(pix_to_face, dists, sigma);
    let others = product_of_others(&probs);

    for (k, &face) in pix_to_face.iter().enumerate() {
        if face < 0 {
            d_dists[k] = 0.0;
            continue;
        }
        let (p, q) = probs[k];
        // dalpha/dp_k = Π_{j≠k} q_j
        d_dists[k] = d_alpha * others[k] * coverage_grad_from_probability(p, q, sigma);
    }
}

/// (p_k, 1 - p_k) per slot; sentinels are (0, 1).
fn slot_probabilities(pix_to_face: &[i64], dists: &[f32], sigma: f32) -> Vec<(f32, f32)> {
    pix_to_face
        .iter()
        .zip(dists)
        .map(|(&face, &d)| {
            if face < 0 {
                (0.0, 1.0)
            } else {
                coverage_probability(d, sigma)
            }
        })
        .collect()
}

/// Π_{j≠k} (1 - p_j) for every k.
fn product_of_others(probs: &[(f32, f32)]) -> Vec<f32> {
    let n = probs.len();
    let mut suffix = vec![1.0f32; n + 1];
    for k in (0..n).rev() {
        suffix[k] = suffix[k + 1] * probs[k].1;
    }

    let mut prefix = 1.0f32;
    let mut others = Vec::with_capacity(n);
    for k in 0..n {
        others.push(prefix * suffix[k + 1]);
        prefix *= probs[k].1;
    }
    others
}

/// Forward results of softmax blending for one pixel, kept for the backward pass.
#[derive(Clone, Debug)]
pub struct SoftmaxForward {
    pub rgb: Vector3<f32>,
    pub alpha: f32,
    /// (p_k, 1 - p_k) per slot
    probs: Vec<(f32, f32)>,
    /// exp((z_k - zmax) / gamma) per slot
    exps: Vec<f32>,
    /// un-normalized weights w_k
    weights: Vec<f32>,
    delta: f32,
    /// true when `delta` sits on its eps floor (and no longer depends on zmax)
    delta_floored: bool,
    /// slot that produced zmax, None when zmax sits on its eps floor
    argmax: Option<usize>,
    denom: f32,
}

/// Softmax blend of one pixel's K fragments.
pub fn softmax_forward(
    colors: &[Vector3<f32>],
    pix_to_face: &[i64],
    dists: &[f32],
    zbuf: &[f32],
    params: &BlendParams,
    range: &DepthRange,
) -> SoftmaxForward {
    let k = pix_to_face.len();
    assert!(colors.len() == k && dists.len() == k && zbuf.len() == k);

    let probs = slot_probabilities(pix_to_face, dists, params.sigma);
    let transmit: f32 = probs.iter().map(|&(_, q)| q).product();
    let alpha = 1.0 - transmit;

    let z_inv: Vec<f32> = pix_to_face
        .iter()
        .zip(zbuf)
        .map(|(&face, &z)| if face < 0 { 0.0 } else { range.z_inv(z) })
        .collect();

    // Max over every slot, masked ones included (they contribute 0).
    let mut raw_max = f32::NEG_INFINITY;
    let mut raw_argmax = 0;
    for (i, &z) in z_inv.iter().enumerate() {
        if z > raw_max {
            raw_max = z;
            raw_argmax = i;
        }
    }
    let z_inv_max = raw_max.max(SOFTMAX_EPS);
    let argmax = (raw_max > SOFTMAX_EPS).then_some(raw_argmax);

    let exps: Vec<f32> = z_inv
        .iter()
        .map(|&z| ((z - z_inv_max) / params.gamma).exp())
        .collect();
    let weights: Vec<f32> = probs.iter().zip(&exps).map(|(&(p, _), &e)| p * e).collect();

    let delta_raw = ((SOFTMAX_EPS - z_inv_max) / params.gamma).exp();
    let delta = delta_raw.max(SOFTMAX_EPS);
    let delta_floored = delta_raw < SOFTMAX_EPS;

    let denom = weights.iter().sum::<f32>() + delta;
    let mut numer = params.background_color * delta;
    for (w, c) in weights.iter().zip(colors) {
        numer += c * *w;
    }

    SoftmaxForward {
        rgb: numer / denom,
        alpha,
        probs,
        exps,
        weights,
        delta,
        delta_floored,
        argmax,
        denom,
    }
}

/// Gradients of one pixel's softmax blend.
#[derive(Clone, Debug)]
pub struct SoftmaxPixelGrads {
    pub d_dists: Vec<f32>,
    pub d_zbuf: Vec<f32>,
    pub d_colors: Vec<Vector3<f32>>,
    pub d_background: Vector3<f32>,
}

/// Backward pass of `softmax_forward`.
///
/// Inputs are the same as the forward plus the saved `forward` record and the
/// upstream gradients dL/d(rgb) and dL/d(alpha).
pub fn softmax_backward(
    colors: &[Vector3<f32>],
    pix_to_face: &[i64],
    params: &BlendParams,
    range: &DepthRange,
    forward: &SoftmaxForward,
    d_rgb: &Vector3<f32>,
    d_alpha: f32,
) -> SoftmaxPixelGrads {
    let k = pix_to_face.len();
    assert_eq!(forward.weights.len(), k);

    let s = forward.denom;
    let rgb = forward.rgb;
    let gamma = params.gamma;

    // rgb = N / S  ⇒  d rgb / d w_k = (c_k - rgb) / S, d rgb / d delta = (bg - rgb) / S
    let g_w: Vec<f32> = colors.iter().map(|c| d_rgb.dot(&(c - rgb)) / s).collect();
    let g_delta = d_rgb.dot(&(params.background_color - rgb)) / s;

    let d_colors = forward.weights.iter().map(|w| d_rgb * (w / s)).collect();
    let d_background = d_rgb * (forward.delta / s);

    // zmax shifts every exponent; it only matters where the floors break the
    // exact cancellation between the weights and delta.
    let mut g_zmax: f32 = -g_w
        .iter()
        .zip(&forward.weights)
        .map(|(g, w)| g * w)
        .sum::<f32>()
        / gamma;
    if !forward.delta_floored {
        g_zmax -= g_delta * forward.delta / gamma;
    }

    let others = product_of_others(&forward.probs);
    let z_scale = range.zfar - range.znear;

    let mut d_dists = vec![0.0f32; k];
    let mut d_zbuf = vec![0.0f32; k];
    for i in 0..k {
        if pix_to_face[i] < 0 {
            continue;
        }
        let (p, q) = forward.probs[i];

        let g_p = g_w[i] * forward.exps[i] + d_alpha * others[i];
        d_dists[i] = g_p * coverage_grad_from_probability(p, q, params.sigma);

        let mut g_z_inv = g_w[i] * forward.weights[i] / gamma;
        if forward.argmax == Some(i) {
            g_z_inv += g_zmax;
        }
        d_zbuf[i] = -g_z_inv / z_scale;
    }

    SoftmaxPixelGrads {
        d_dists,
        d_zbuf,
        d_colors,
        d_background,
    }
}
