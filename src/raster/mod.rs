//! Mesh rasterization: world-space meshes to per-pixel `Fragments`.

mod rasterizer;
pub mod search;
mod settings;

pub use rasterizer::{MeshRasterizer, RasterizeOverrides};
pub use search::{pixel_center_ndc, FaceSearch, NaiveFaceSearch};
pub use settings::{RasterizationSettings, ResolvedRasterSettings};
