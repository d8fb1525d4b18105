//! Scalar math utilities shared by the blend kernels.

/// Sigmoid activation function: σ(x) = 1 / (1 + e^(-x))
///
/// Maps R → (0, 1). Saturates to exactly 0.0 / 1.0 for large |x| instead of
/// producing NaN, since `1 / (1 + inf) == 0`.
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Coverage probability of a fragment and its complement.
///
/// Returns `(p, 1 - p)` with `p = σ(-dist / sigma)`. The complement is evaluated
/// as `σ(dist / sigma)` rather than `1 - p` so that it keeps full precision when
/// the pixel is deep inside a face and `p` rounds to 1.
pub fn coverage_probability(dist: f32, sigma: f32) -> (f32, f32) {
    let x = dist / sigma;
    (sigmoid(-x), sigmoid(x))
}
