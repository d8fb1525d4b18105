//! Blending the top-K fragments of every pixel into one RGBA value.
//!
//! Every policy consumes (per-fragment colors, fragments, blend params) and
//! returns an (N, H, W, 4) image:
//! - `hard`: nearest fragment, alpha 1
//! - `sigmoid_alpha`: nearest color, differentiable silhouette alpha
//! - `softmax`: differentiable color and alpha

mod hard;
mod params;
pub mod sigmoid_alpha;
pub mod softmax;

pub use hard::hard_rgb_blend;
pub use params::BlendParams;
pub use sigmoid_alpha::{
    sigmoid_alpha_blend, ParallelKernel, SerialKernel, SigmoidAlphaBlend, SigmoidAlphaForward,
    SigmoidAlphaKernel,
};
pub use softmax::{softmax_rgb_blend, softmax_rgb_blend_backward, DepthRange, SoftmaxBlendGrads};

use crate::core::{FragmentColors, Fragments, RgbaBatch};
use crate::error::RenderError;
use serde::{Deserialize, Serialize};

/// Blend policy used by a mesh renderer.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MeshBlend {
    Hard,
    SigmoidAlpha,
    Softmax(DepthRange),
}

impl Default for MeshBlend {
    fn default() -> Self {
        MeshBlend::Softmax(DepthRange::default())
    }
}

impl MeshBlend {
    /// Check the policy's own parameters (the softmax depth range).
    pub fn validate(&self) -> Result<(), RenderError> {
        match self {
            MeshBlend::Softmax(range) => range.validate(),
            MeshBlend::Hard | MeshBlend::SigmoidAlpha => Ok(()),
        }
    }

    /// Blend `colors` over `fragments` with this policy.
    pub fn blend(
        &self,
        colors: &FragmentColors,
        fragments: &Fragments,
        params: &BlendParams,
    ) -> RgbaBatch {
        match self {
            MeshBlend::Hard => hard_rgb_blend(colors, fragments, params),
            MeshBlend::SigmoidAlpha => sigmoid_alpha_blend(colors, fragments, params),
            MeshBlend::Softmax(range) => softmax_rgb_blend(colors, fragments, params, range),
        }
    }
}
