//! Point-cloud compositing.
//!
//! The point path mirrors mesh blending: fragments sorted by depth per pixel
//! are reduced into an image, with per-point alphas supplied by the caller.

pub mod compositing;
mod compositor;

pub use compositing::{
    alpha_composite, norm_weighted_sum, weighted_sum, CompositeRule, CompositingGrads,
    FeatureImages, PointFeatures, PointFragments,
};
pub use compositor::{
    add_background_color_to_images, AlphaCompositor, NormWeightedCompositor, PointCompositor,
};
