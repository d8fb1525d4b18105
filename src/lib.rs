//! # softras-rs: differentiable mesh rasterization and blending
//!
//! Turns batches of triangle meshes (and point clouds) into RGBA images with
//! explicit forward and backward passes, so image-space gradients reach the
//! per-fragment signed distances, depths and colors.
//!
//! ## Architecture
//!
//! - `core`: fragments, RGBA batches, cameras, meshes, logistic math
//! - `raster`: camera transform and per-pixel nearest-face search
//! - `blend`: hard, sigmoid-alpha and softmax blending of the top-K fragments
//! - `points`: alpha and weighted-sum compositing of point fragments
//! - `diff`: per-pixel backward passes used by `blend` and `points`
//! - `render`: rasterize → shade → blend
//! - `config`: JSON configuration
//!
//! Pipeline: `MeshRasterizer::rasterize` → `Fragments` → shading →
//! `FragmentColors` → `MeshBlend::blend` → `RgbaBatch`.

// Core data structures and math
pub mod core;

// Meshes → fragments
pub mod raster;

// Fragments → pixels
pub mod blend;

// Point-cloud compositing
pub mod points;

// Differentiable operations (backward passes)
pub mod diff;

// Rasterize + shade + blend
pub mod render;

pub mod config;
pub mod error;

// Re-export commonly used types at crate root for convenience
pub use blend::{BlendParams, DepthRange, MeshBlend};
pub use config::RenderConfig;
pub use core::{
    FragmentColors, Fragments, MeshBatch, Meshes, PerspectiveCamera, PerspectiveCameras, RgbaBatch,
};
pub use error::RenderError;
pub use raster::{MeshRasterizer, RasterizationSettings};
pub use render::MeshRenderer;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
