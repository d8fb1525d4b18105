//! Differentiable operations (backward passes).
//!
//! Per-pixel forward/backward kernels. The batched entry points live next to
//! their forward operations in `blend` and `points`, which call into these.

pub mod blend_grad;
pub mod composite_grad;
pub mod math_grad;
