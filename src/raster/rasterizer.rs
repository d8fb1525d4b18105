//! Mesh rasterizer: camera transform followed by the face search.

use crate::core::{Cameras, Fragments, MeshBatch, PaddedVerts, TransformPoints};
use crate::error::RenderError;
use crate::raster::search::{FaceSearch, NaiveFaceSearch};
use crate::raster::settings::RasterizationSettings;

/// Per-call replacements for the rasterizer's stored cameras and settings.
pub struct RasterizeOverrides<'a, C> {
    pub cameras: Option<&'a C>,
    pub raster_settings: Option<&'a RasterizationSettings>,
}

impl<C> Default for RasterizeOverrides<'_, C> {
    fn default() -> Self {
        Self {
            cameras: None,
            raster_settings: None,
        }
    }
}

/// Rasterizes a batch of meshes into per-pixel fragments.
///
/// Cameras may be stored on the rasterizer or supplied per call; one of the two
/// is required. A batch holds either one camera shared by all meshes or one
/// camera per mesh.
#[derive(Clone, Debug)]
pub struct MeshRasterizer<C, S = NaiveFaceSearch> {
    pub cameras: Option<C>,
    pub raster_settings: RasterizationSettings,
    pub search: S,
}

impl<C: Cameras> MeshRasterizer<C, NaiveFaceSearch> {
    pub fn new(cameras: Option<C>, raster_settings: RasterizationSettings) -> Self {
        Self::with_search(cameras, raster_settings, NaiveFaceSearch)
    }
}

impl<C: Cameras, S: FaceSearch> MeshRasterizer<C, S> {
    pub fn with_search(cameras: Option<C>, raster_settings: RasterizationSettings, search: S) -> Self {
        Self {
            cameras,
            raster_settings,
            search,
        }
    }

    /// Move mesh vertices from world space to screen space.
    ///
    /// x and y come out in NDC, z keeps the view-space depth so that the
    /// z-buffer holds camera distances.
    pub fn transform<M: MeshBatch>(
        &self,
        meshes: &M,
        cameras: Option<&C>,
    ) -> Result<M, RenderError> {
        let cameras = cameras
            .or(self.cameras.as_ref())
            .ok_or(RenderError::MissingCameras)?;

        let n_cameras = cameras.len();
        if n_cameras != 1 && n_cameras != meshes.len() {
            return Err(RenderError::CameraCountMismatch {
                cameras: n_cameras,
                meshes: meshes.len(),
            });
        }

        let padded = meshes.verts_padded();
        let screen: Vec<_> = (0..meshes.len())
            .map(|n| {
                let index = if n_cameras == 1 { 0 } else { n };
                let view = cameras
                    .world_to_view_transform(index)
                    .transform_points(padded.verts(n));
                let mut screen = cameras.projection_transform(index).transform_points(&view);
                for (s, v) in screen.iter_mut().zip(&view) {
                    s.z = v.z;
                }
                screen
            })
            .collect();

        Ok(meshes.update_padded(&PaddedVerts::from_list(&screen)))
    }

    /// Rasterize with the stored cameras and settings.
    pub fn rasterize<M: MeshBatch>(&self, meshes: &M) -> Result<Fragments, RenderError> {
        self.rasterize_with(meshes, RasterizeOverrides::default())
    }

    /// Rasterize, replacing cameras and/or settings for this call only.
    pub fn rasterize_with<M: MeshBatch>(
        &self,
        meshes: &M,
        overrides: RasterizeOverrides<'_, C>,
    ) -> Result<Fragments, RenderError> {
        let settings = overrides
            .raster_settings
            .unwrap_or(&self.raster_settings)
            .resolve()?;
        let meshes_screen = self.transform(meshes, overrides.cameras)?;

        tracing::debug!(
            meshes = meshes.len(),
            image_size = settings.image_height,
            faces_per_pixel = settings.faces_per_pixel,
            blur_radius = settings.blur_radius,
            "rasterizing"
        );

        Ok(self.search.search(&meshes_screen, &settings))
    }
}
