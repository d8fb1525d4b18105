//! Gradients for the per-pixel point compositing rules.
//!
//! Alpha compositing (front-to-back, nearest point first):
//!   T_0 = 1
//!   for i in 0..N:
//!     out += T_i * a_i * f_i
//!     T_{i+1} = T_i * (1 - a_i)
//!
//! Normalized weighted sum:
//!   out = Σ a_i f_i / max(Σ a_i, NORM_EPS)
//!
//! Weighted sum:
//!   out = Σ a_i f_i
//!
//! where `a_i` is the alpha of the i-th valid point at the pixel and `f_i` its
//! C-channel feature vector. Sentinel slots are dropped by the caller.

use nalgebra::DVector;

/// Floor on the alpha sum of the normalized weighted sum.
pub const NORM_EPS: f32 = 1e-4;

#[derive(Clone, Debug)]
pub struct CompositeForward {
    pub out: DVector<f32>,
    /// T_i for i=0..=N (length N+1); all ones for the sum rules
    pub transmittance: Vec<f32>,
}

#[derive(Clone, Debug)]
pub struct CompositeGrads {
    pub d_alphas: Vec<f32>,
    pub d_features: Vec<DVector<f32>>,
}

/// Forward alpha compositing, returning the output features and saved transmittances.
pub fn alpha_composite_forward(
    alphas: &[f32],
    features: &[DVector<f32>],
    channels: usize,
) -> CompositeForward {
    assert_eq!(alphas.len(), features.len());

    let mut out = DVector::<f32>::zeros(channels);
    let mut transmittance = Vec::with_capacity(alphas.len() + 1);
    let mut t = 1.0f32;
    transmittance.push(t);

    for (a, f) in alphas.iter().copied().zip(features) {
        out += f * (t * a);
        t *= 1.0 - a;
        transmittance.push(t);
    }

    CompositeForward { out, transmittance }
}

/// Backward pass for alpha compositing.
///
/// Inputs:
/// - `alphas`, `features`: same as forward
/// - `forward`: output of `alpha_composite_forward` (contains all T_i)
/// - `d_out`: upstream gradient dL/d(out)
pub fn alpha_composite_backward(
    alphas: &[f32],
    features: &[DVector<f32>],
    forward: &CompositeForward,
    d_out: &DVector<f32>,
) -> CompositeGrads {
    assert_eq!(alphas.len(), features.len());
    assert_eq!(forward.transmittance.len(), alphas.len() + 1);

    let n = alphas.len();
    let mut d_alphas = vec![0.0f32; n];
    let mut d_features = vec![DVector::<f32>::zeros(d_out.len()); n];

    // Reverse scan over the transmittance recurrence.
    // g_t_next = dL/dT_{i+1}; the output does not depend on T_N directly.
    let mut g_t_next = 0.0f32;

    for i in (0..n).rev() {
        let a_i = alphas[i];
        let f_i = &features[i];
        let t_i = forward.transmittance[i];

        d_features[i] = d_out * (t_i * a_i);

        // direct: out term T_i a_i f_i; indirect: T_{i+1} = T_i (1 - a_i)
        let direct = t_i * d_out.dot(f_i);
        let indirect = g_t_next * (-t_i);
        d_alphas[i] = direct + indirect;

        let g_t_from_out = a_i * d_out.dot(f_i);
        let g_t_from_next = g_t_next * (1.0 - a_i);
        g_t_next = g_t_from_out + g_t_from_next;
    }

    CompositeGrads { d_alphas, d_features }
}

/// Forward normalized weighted sum; zero where every alpha is zero.
pub fn norm_weighted_sum_forward(
    alphas: &[f32],
    features: &[DVector<f32>],
    channels: usize,
) -> CompositeForward {
    let (sum, total) = weighted_accumulate(alphas, features, channels);
    CompositeForward {
        out: sum / total.max(NORM_EPS),
        transmittance: vec![1.0; alphas.len() + 1],
    }
}

/// Backward pass for the normalized weighted sum.
pub fn norm_weighted_sum_backward(
    alphas: &[f32],
    features: &[DVector<f32>],
    forward: &CompositeForward,
    d_out: &DVector<f32>,
) -> CompositeGrads {
    assert_eq!(alphas.len(), features.len());

    let total: f32 = alphas.iter().sum();
    let denom = total.max(NORM_EPS);
    // out = A / B; B only depends on the alphas above the floor
    let g_denom = if total > NORM_EPS {
        -d_out.dot(&forward.out) / denom
    } else {
        0.0
    };

    let d_alphas = features
        .iter()
        .map(|f| d_out.dot(f) / denom + g_denom)
        .collect();
    let d_features = alphas.iter().map(|&a| d_out * (a / denom)).collect();

    CompositeGrads { d_alphas, d_features }
}

/// Forward weighted sum.
pub fn weighted_sum_forward(
    alphas: &[f32],
    features: &[DVector<f32>],
    channels: usize,
) -> CompositeForward {
    let (sum, _) = weighted_accumulate(alphas, features, channels);
    CompositeForward {
        out: sum,
        transmittance: vec![1.0; alphas.len() + 1],
    }
}

/// Backward pass for the weighted sum.
pub fn weighted_sum_backward(
    alphas: &[f32],
    features: &[DVector<f32>],
    d_out: &DVector<f32>,
) -> CompositeGrads {
    assert_eq!(alphas.len(), features.len());
    CompositeGrads {
        d_alphas: features.iter().map(|f| d_out.dot(f)).collect(),
        d_features: alphas.iter().map(|&a| d_out * a).collect(),
    }
}

/// (Σ a_i f_i, Σ a_i)
fn weighted_accumulate(
    alphas: &[f32],
    features: &[DVector<f32>],
    channels: usize,
) -> (DVector<f32>, f32) {
    assert_eq!(alphas.len(), features.len());
    let mut sum = DVector::<f32>::zeros(channels);
    let mut total = 0.0f32;
    for (&a, f) in alphas.iter().zip(features) {
        sum += f * a;
        total += a;
    }
    (sum, total)
}
