//! End-to-end mesh rendering on the CPU.
//!
//! - `MeshRenderer`: rasterize → shade → blend
//! - `shading`: barycentric interpolation of face and vertex attributes
//!
//! Gradients are not computed here; see the `blend` and `diff` modules for
//! the backward passes.

mod renderer;
pub mod shading;

pub use renderer::MeshRenderer;
pub use shading::{interpolate_face_attributes, interpolate_vertex_colors};
