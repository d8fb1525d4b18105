//! Hard blending: the nearest fragment wins, no soft edges.

use crate::blend::BlendParams;
use crate::core::{FragmentColors, Fragments, RgbaBatch};
use nalgebra::Vector4;
use rayon::prelude::*;

/// Naive blending of the top K faces.
///
/// - **RGB**: color of the closest fragment (K = 0), or the background color
///   where that slot is empty
/// - **A**: 1.0 everywhere, background included
///
/// A one pixel shift of a triangle edge causes a discontinuous jump; use
/// `softmax_rgb_blend` when gradients through occlusion are needed.
pub fn hard_rgb_blend(
    colors: &FragmentColors,
    fragments: &Fragments,
    params: &BlendParams,
) -> RgbaBatch {
    assert_eq!(colors.shape, fragments.shape, "colors and fragments disagree in shape");
    let shape = fragments.shape;
    let bg = params.background_color;

    let data = (0..shape.num_pixels())
        .into_par_iter()
        .map(|p| {
            let rgb = if fragments.pixel(p).is_background() {
                bg
            } else {
                colors.pixel(p)[0]
            };
            Vector4::new(rgb.x, rgb.y, rgb.z, 1.0)
        })
        .collect();

    RgbaBatch::new(shape.batch, shape.height, shape.width, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FragmentShape, NO_FACE};
    use nalgebra::Vector3;

    #[test]
    fn test_nearest_color_or_background() {
        let shape = FragmentShape::new(1, 1, 2, 2);
        let mut frags = Fragments::empty(shape);
        // Pixel 0 covered by faces 3 (near) and 7 (far); pixel 1 empty.
        frags.pix_to_face = vec![3, 7, NO_FACE, NO_FACE];
        let colors = FragmentColors::new(
            shape,
            vec![
                Vector3::new(1.0, 0.0, 0.0),
                Vector3::new(0.0, 1.0, 0.0),
                Vector3::new(0.5, 0.5, 0.5),
                Vector3::new(0.5, 0.5, 0.5),
            ],
        );
        let params = BlendParams {
            background_color: Vector3::new(0.2, 0.3, 0.4),
            ..BlendParams::default()
        };

        let out = hard_rgb_blend(&colors, &frags, &params);
        assert_eq!(out.get(0, 0, 0), Vector4::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(out.get(0, 0, 1), Vector4::new(0.2, 0.3, 0.4, 1.0));
    }

    #[test]
    fn test_pixel_order_is_preserved() {
        // Every other pixel covered, each with its own color
        let shape = FragmentShape::new(2, 8, 8, 1);
        let mut frags = Fragments::empty(shape);
        let mut rgb = Vec::new();
        for p in 0..shape.num_pixels() {
            if p % 2 == 0 {
                frags.pix_to_face[p] = p as i64;
            }
            rgb.push(Vector3::new(p as f32, 0.0, 0.0));
        }
        let colors = FragmentColors::new(shape, rgb);
        let params = BlendParams {
            background_color: Vector3::new(-1.0, -1.0, -1.0),
            ..BlendParams::default()
        };

        let out = hard_rgb_blend(&colors, &frags, &params);
        for (p, px) in out.data.iter().enumerate() {
            let expected = if p % 2 == 0 { p as f32 } else { -1.0 };
            assert_eq!(px.x, expected);
            assert_eq!(px.w, 1.0);
        }
    }
}
