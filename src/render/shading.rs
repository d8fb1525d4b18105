//! Minimal shading: per-fragment colors from barycentric interpolation.

use crate::core::{FragmentColors, Fragments, MeshBatch};
use nalgebra::Vector3;
use rayon::prelude::*;

/// Interpolate per-face vertex attributes at every fragment.
///
/// `face_attrs[f]` holds the attribute at the three corners of packed face `f`.
/// Sentinel slots get zero.
pub fn interpolate_face_attributes(
    fragments: &Fragments,
    face_attrs: &[[Vector3<f32>; 3]],
) -> FragmentColors {
    let data = fragments
        .pix_to_face
        .par_iter()
        .zip(fragments.bary_coords.par_iter())
        .map(|(&face, bary)| {
            if face < 0 {
                return Vector3::zeros();
            }
            let [a, b, c] = face_attrs[face as usize];
            a * bary.x + b * bary.y + c * bary.z
        })
        .collect();
    FragmentColors::new(fragments.shape, data)
}

/// Interpolate per-vertex colors of every mesh at every fragment.
pub fn interpolate_vertex_colors<M: MeshBatch>(
    fragments: &Fragments,
    meshes: &M,
    vertex_colors: &[Vec<Vector3<f32>>],
) -> FragmentColors {
    assert_eq!(
        vertex_colors.len(),
        meshes.len(),
        "one vertex color list per mesh is required"
    );
    let face_attrs: Vec<[Vector3<f32>; 3]> = (0..meshes.len())
        .flat_map(|n| {
            let colors = &vertex_colors[n];
            meshes
                .faces(n)
                .iter()
                .map(move |face| face.map(|i| colors[i as usize]))
        })
        .collect();
    interpolate_face_attributes(fragments, &face_attrs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FragmentShape, Meshes, NO_FACE};
    use approx::assert_relative_eq;

    #[test]
    fn test_vertex_colors_follow_barycentrics() {
        let meshes = Meshes::new(
            vec![vec![Vector3::zeros(); 3], vec![Vector3::zeros(); 3]],
            vec![vec![[0, 1, 2]], vec![[2, 1, 0]]],
        );
        let colors = vec![
            vec![Vector3::x(), Vector3::y(), Vector3::z()],
            vec![Vector3::x(), Vector3::y(), Vector3::z()],
        ];
        let frags = Fragments::new(
            FragmentShape::new(1, 1, 1, 3),
            vec![0, 1, NO_FACE],
            vec![1.0, 2.0, -1.0],
            vec![
                Vector3::new(0.5, 0.25, 0.25),
                Vector3::new(1.0, 0.0, 0.0),
                Vector3::repeat(-1.0),
            ],
            vec![-0.1, -0.1, -1.0],
        );

        let shaded = interpolate_vertex_colors(&frags, &meshes, &colors);
        assert_relative_eq!(shaded.data[0], Vector3::new(0.5, 0.25, 0.25));
        // Packed face 1 is mesh 1's face [2, 1, 0]: first corner is vertex 2
        assert_relative_eq!(shaded.data[1], Vector3::z());
        assert_eq!(shaded.data[2], Vector3::zeros());
    }
}
