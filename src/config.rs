//! JSON render configuration.
//!
//! Every field is optional in the file; missing values take their defaults.
//!
//! ```json
//! {
//!   "raster": { "image_size": 128, "blur_radius": 1e-3, "faces_per_pixel": 4 },
//!   "blend": { "sigma": 1e-4, "gamma": 1e-4, "background_color": [0.0, 0.0, 0.0] },
//!   "blend_mode": { "mode": "softmax", "znear": 1.0, "zfar": 100.0 }
//! }
//! ```

use crate::blend::{BlendParams, MeshBlend};
use crate::error::RenderError;
use crate::raster::RasterizationSettings;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Raster settings, blend parameters and blend policy for one renderer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub raster: RasterizationSettings,
    pub blend: BlendParams,
    pub blend_mode: MeshBlend,
}

impl RenderConfig {
    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self, RenderError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RenderError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Check every section without building anything.
    pub fn validate(&self) -> Result<(), RenderError> {
        self.raster.resolve()?;
        self.blend.validate()?;
        self.blend_mode.validate()
    }

    /// Serialize back to pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String, RenderError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blend::DepthRange;

    #[test]
    fn test_empty_object_is_default() {
        let config = RenderConfig::from_json_str("{}").unwrap();
        assert_eq!(config, RenderConfig::default());
        assert_eq!(config.raster.image_size, 256);
    }

    #[test]
    fn test_partial_config() {
        let config = RenderConfig::from_json_str(
            r#"{"raster": {"faces_per_pixel": 4}, "blend_mode": {"mode": "softmax", "znear": 0.5}}"#,
        )
        .unwrap();
        assert_eq!(config.raster.faces_per_pixel, 4);
        assert_eq!(config.raster.image_size, 256);
        assert_eq!(config.blend_mode, MeshBlend::Softmax(DepthRange::new(0.5, 100.0)));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            RenderConfig::from_json_str(r#"{"blend": {"sigma": 0.0}}"#),
            Err(RenderError::InvalidBlendParams(_))
        ));
        // An inverted depth range is refused while parsing
        assert!(matches!(
            RenderConfig::from_json_str(r#"{"blend_mode": {"mode": "softmax", "znear": 5.0, "zfar": 1.0}}"#),
            Err(RenderError::Config(_))
        ));
        let config = RenderConfig {
            blend_mode: MeshBlend::Softmax(DepthRange {
                znear: 5.0,
                zfar: 5.0,
            }),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(RenderError::InvalidBlendParams(_))));
        assert!(matches!(
            RenderConfig::from_json_str("not json"),
            Err(RenderError::Config(_))
        ));
    }

    #[test]
    fn test_json_roundtrip() {
        let config = RenderConfig {
            blend_mode: MeshBlend::Hard,
            ..Default::default()
        };
        let json = config.to_json_string().unwrap();
        assert_eq!(RenderConfig::from_json_str(&json).unwrap(), config);
    }
}
