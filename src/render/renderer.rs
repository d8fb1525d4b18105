//! Mesh renderer: rasterize, shade, blend.

use crate::blend::{BlendParams, MeshBlend};
use crate::config::RenderConfig;
use crate::core::{Cameras, FragmentColors, Fragments, MeshBatch, RgbaBatch};
use crate::error::RenderError;
use crate::raster::{FaceSearch, MeshRasterizer, NaiveFaceSearch};

/// Rasterizer, shading callback and blend policy chained together.
///
/// Shading is supplied per call as any `(&Fragments, &M) -> FragmentColors`,
/// so textures and lighting stay outside the renderer.
#[derive(Clone, Debug)]
pub struct MeshRenderer<C, S = NaiveFaceSearch> {
    pub rasterizer: MeshRasterizer<C, S>,
    pub blend: MeshBlend,
    pub blend_params: BlendParams,
}

impl<C: Cameras> MeshRenderer<C, NaiveFaceSearch> {
    /// Build a renderer from a validated config.
    pub fn from_config(cameras: Option<C>, config: &RenderConfig) -> Result<Self, RenderError> {
        config.validate()?;
        Ok(Self::new(
            MeshRasterizer::new(cameras, config.raster.clone()),
            config.blend_mode,
            config.blend.clone(),
        ))
    }
}

impl<C: Cameras, S: FaceSearch> MeshRenderer<C, S> {
    pub fn new(rasterizer: MeshRasterizer<C, S>, blend: MeshBlend, blend_params: BlendParams) -> Self {
        Self {
            rasterizer,
            blend,
            blend_params,
        }
    }

    /// Render `meshes` to an (N, H, W, 4) image.
    pub fn render<M, F>(&self, meshes: &M, shade: F) -> Result<RgbaBatch, RenderError>
    where
        M: MeshBatch,
        F: FnOnce(&Fragments, &M) -> FragmentColors,
    {
        self.render_with_fragments(meshes, shade).map(|(image, _)| image)
    }

    /// Render and also return the fragments, e.g. to run a blend backward pass.
    pub fn render_with_fragments<M, F>(
        &self,
        meshes: &M,
        shade: F,
    ) -> Result<(RgbaBatch, Fragments), RenderError>
    where
        M: MeshBatch,
        F: FnOnce(&Fragments, &M) -> FragmentColors,
    {
        self.blend_params.validate()?;
        self.blend.validate()?;

        let fragments = self.rasterizer.rasterize(meshes)?;
        let colors = shade(&fragments, meshes);
        assert_eq!(
            colors.shape, fragments.shape,
            "shading output does not match fragment shape"
        );
        let image = self.blend.blend(&colors, &fragments, &self.blend_params);
        Ok((image, fragments))
    }
}
