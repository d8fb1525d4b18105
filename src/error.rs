//! Errors reported to callers of the rasterizer and configuration layer.
//!
//! Shape mismatches between fragment buffers and color tensors are programming
//! errors and panic via `assert_eq!`; everything here is recoverable by the caller.

use thiserror::Error;

/// Errors that can occur while configuring or running the render pipeline.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("cameras must be specified either at construction or in the rasterize call")]
    MissingCameras,

    #[error("wrong number ({cameras}) of cameras for {meshes} meshes")]
    CameraCountMismatch { cameras: usize, meshes: usize },

    #[error("invalid blend parameters: {0}")]
    InvalidBlendParams(String),

    #[error("invalid rasterization settings: {0}")]
    InvalidRasterSettings(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid render config: {0}")]
    Config(#[from] serde_json::Error),
}
