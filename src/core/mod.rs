//! Core data structures shared by the rasterizer and the blend functions.
//!
//! - `Fragments`: top-K faces per pixel with depth, barycentrics and distances
//! - `RgbaBatch`: blended output images
//! - Camera and mesh contracts consumed by the rasterizer
//!
//! All types here are "pure data" - no rendering logic.

mod camera;
mod fragments;
mod rgba;
mod math;
mod mesh;

pub use camera::{Cameras, PerspectiveCamera, PerspectiveCameras, Transform3d, TransformPoints};
pub use fragments::{FragmentColors, FragmentShape, Fragments, PixelFragments, NO_FACE};
pub use rgba::RgbaBatch;
pub use math::{coverage_probability, sigmoid};
pub use mesh::{MeshBatch, Meshes, PaddedVerts};
