//! Gradients for small scalar math utilities.

/// Derivative of a fragment's coverage probability p = σ(-d / sigma) with
/// respect to its signed distance d, given (p, 1 - p).
///
/// dp/dd = -p (1 - p) / sigma
pub fn coverage_grad_from_probability(p: f32, one_minus_p: f32, sigma: f32) -> f32 {
    -p * one_minus_p / sigma
}
