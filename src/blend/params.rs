//! Blend parameters shared by every mesh blend policy.

use crate::error::RenderError;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Softness and background settings for blending the top-K fragments.
///
/// Constructed once and passed by reference through a whole forward/backward
/// pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendParams {
    /// Width of the sigmoid turning signed distance into coverage probability.
    /// Smaller sigma gives harder edges.
    pub sigma: f32,

    /// Scale of the depth exponential in softmax blending.
    /// Smaller gamma lets the nearest face dominate the color.
    pub gamma: f32,

    /// RGB in [0, 1] for pixels not covered by any face
    pub background_color: Vector3<f32>,
}

impl Default for BlendParams {
    fn default() -> Self {
        Self {
            sigma: 1e-4,
            gamma: 1e-4,
            background_color: Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

impl BlendParams {
    /// Create validated blend parameters.
    pub fn new(sigma: f32, gamma: f32, background_color: Vector3<f32>) -> Result<Self, RenderError> {
        let params = Self {
            sigma,
            gamma,
            background_color,
        };
        params.validate()?;
        Ok(params)
    }

    /// Check `sigma > 0`, `gamma > 0` and a finite background color.
    pub fn validate(&self) -> Result<(), RenderError> {
        if !(self.sigma > 0.0 && self.sigma.is_finite()) {
            return Err(RenderError::InvalidBlendParams(format!(
                "sigma must be positive and finite, got {}",
                self.sigma
            )));
        }
        if !(self.gamma > 0.0 && self.gamma.is_finite()) {
            return Err(RenderError::InvalidBlendParams(format!(
                "gamma must be positive and finite, got {}",
                self.gamma
            )));
        }
        if !self.background_color.iter().all(|c| c.is_finite()) {
            return Err(RenderError::InvalidBlendParams(format!(
                "background color must be finite, got {:?}",
                self.background_color
            )));
        }
        Ok(())
    }
}
