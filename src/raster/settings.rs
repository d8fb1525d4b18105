//! Mesh rasterization settings.
//!
//! `RasterizationSettings` is what the user writes (some fields may be left
//! unset); `resolve` turns it into a fully populated `ResolvedRasterSettings`
//! once, before any rasterization work starts.

use crate::error::RenderError;
use serde::{Deserialize, Serialize};

/// User-facing rasterization settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterizationSettings {
    /// Output images are `image_size × image_size`
    pub image_size: usize,

    /// Faces farther than this (NDC distance) from a pixel are ignored; > 0
    /// lets faces bleed into neighbouring pixels for soft edges
    pub blur_radius: f32,

    /// K: nearest faces kept per pixel
    pub faces_per_pixel: usize,

    /// Coarse-to-fine bin size. Accepted for compatibility; the naive search
    /// does not bin.
    pub bin_size: Option<usize>,

    /// Face limit per bin. Accepted for compatibility; unused by the naive search.
    pub max_faces_per_bin: Option<usize>,

    /// Interpolate barycentrics in view space rather than screen space
    pub perspective_correct: bool,

    /// Clamp barycentrics to [0, 1]. Unset ⇒ on when `blur_radius > 0`, since
    /// faces can then match pixels outside them.
    pub clip_barycentric_coords: Option<bool>,

    /// Skip faces whose screen-space winding points away from the camera
    pub cull_backfaces: bool,
}

impl Default for RasterizationSettings {
    fn default() -> Self {
        Self {
            image_size: 256,
            blur_radius: 0.0,
            faces_per_pixel: 1,
            bin_size: None,
            max_faces_per_bin: None,
            perspective_correct: false,
            clip_barycentric_coords: None,
            cull_backfaces: false,
        }
    }
}

/// Settings with every default applied; what the face search consumes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResolvedRasterSettings {
    pub image_height: usize,
    pub image_width: usize,
    pub blur_radius: f32,
    pub faces_per_pixel: usize,
    pub perspective_correct: bool,
    pub clip_barycentric_coords: bool,
    pub cull_backfaces: bool,
}

impl RasterizationSettings {
    /// Validate and apply defaults.
    pub fn resolve(&self) -> Result<ResolvedRasterSettings, RenderError> {
        if self.image_size == 0 {
            return Err(RenderError::InvalidRasterSettings(
                "image_size must be positive".to_string(),
            ));
        }
        if self.faces_per_pixel == 0 {
            return Err(RenderError::InvalidRasterSettings(
                "faces_per_pixel must be positive".to_string(),
            ));
        }
        if !(self.blur_radius >= 0.0 && self.blur_radius.is_finite()) {
            return Err(RenderError::InvalidRasterSettings(format!(
                "blur_radius must be finite and non-negative, got {}",
                self.blur_radius
            )));
        }
        if self.bin_size.is_some() || self.max_faces_per_bin.is_some() {
            tracing::debug!("bin_size / max_faces_per_bin ignored by the naive face search");
        }

        Ok(ResolvedRasterSettings {
            image_height: self.image_size,
            image_width: self.image_size,
            blur_radius: self.blur_radius,
            faces_per_pixel: self.faces_per_pixel,
            perspective_correct: self.perspective_correct,
            clip_barycentric_coords: self
                .clip_barycentric_coords
                .unwrap_or(self.blur_radius > 0.0),
            cull_backfaces: self.cull_backfaces,
        })
    }
}
