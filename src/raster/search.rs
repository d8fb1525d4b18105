//! Per-pixel face search: which faces cover which pixel, and how.
//!
//! The search runs in screen (NDC) space. Pixel `(y, x)` of an `H × W` image
//! has its center at
//!
//!   x_ndc = 1 - (2x + 1) / W,   y_ndc = 1 - (2y + 1) / H
//!
//! so +X points left and +Y points up. Vertex z carries view-space depth.

use crate::core::{FragmentShape, Fragments, MeshBatch, NO_FACE};
use crate::raster::settings::ResolvedRasterSettings;
use nalgebra::{Vector2, Vector3};
use rayon::prelude::*;

/// Faces with |area| below this are degenerate and never rasterized.
const AREA_EPS: f32 = 1e-8;

/// Finds the K nearest faces for every pixel of every mesh in screen space.
pub trait FaceSearch {
    fn search<M: MeshBatch>(&self, meshes_screen: &M, settings: &ResolvedRasterSettings)
        -> Fragments;
}

/// Brute-force search: every pixel tests every face of its mesh.
///
/// Pixels run in parallel. Cost is O(H·W·F) per mesh, which is fine for the
/// small scenes this crate targets; `bin_size` is ignored.
#[derive(Clone, Copy, Debug, Default)]
pub struct NaiveFaceSearch;

/// A face in screen space, with its signed area cached.
#[derive(Clone, Copy, Debug)]
struct ScreenFace {
    packed: i64,
    v: [Vector3<f32>; 3],
    area: f32,
    min: Vector2<f32>,
    max: Vector2<f32>,
}

/// One candidate fragment for a pixel.
#[derive(Clone, Copy, Debug)]
struct Hit {
    face: i64,
    z: f32,
    bary: Vector3<f32>,
    dist: f32,
}

impl FaceSearch for NaiveFaceSearch {
    fn search<M: MeshBatch>(
        &self,
        meshes_screen: &M,
        settings: &ResolvedRasterSettings,
    ) -> Fragments {
        let (h, w, k) = (
            settings.image_height,
            settings.image_width,
            settings.faces_per_pixel,
        );
        let shape = FragmentShape::new(meshes_screen.len(), h, w, k);
        let faces = screen_faces(meshes_screen);

        let hits: Vec<Vec<Hit>> = (0..shape.num_pixels())
            .into_par_iter()
            .map(|pixel| {
                let n = pixel / (h * w);
                let y = (pixel / w) % h;
                let x = pixel % w;
                let p = Vector2::new(pixel_center_ndc(x, w), pixel_center_ndc(y, h));
                nearest_faces(&faces[n], p, settings)
            })
            .collect();

        let mut fragments = Fragments::empty(shape);
        let mut num_covered = 0usize;
        for (pixel, pixel_hits) in hits.iter().enumerate() {
            if !pixel_hits.is_empty() {
                num_covered += 1;
            }
            for (slot, hit) in pixel_hits.iter().enumerate() {
                let i = pixel * k + slot;
                fragments.pix_to_face[i] = hit.face;
                fragments.zbuf[i] = hit.z;
                fragments.bary_coords[i] = hit.bary;
                fragments.dists[i] = hit.dist;
            }
        }

        tracing::debug!(
            meshes = meshes_screen.len(),
            faces = meshes_screen.num_faces_packed(),
            pixels = shape.num_pixels(),
            covered = num_covered,
            "face search complete"
        );

        fragments
    }
}

/// NDC coordinate of the center of pixel `i` along an axis of `size` pixels.
pub fn pixel_center_ndc(i: usize, size: usize) -> f32 {
    1.0 - (2.0 * i as f32 + 1.0) / size as f32
}

/// Twice the signed area of (v0, v1, p).
fn edge_function(p: Vector2<f32>, v0: Vector2<f32>, v1: Vector2<f32>) -> f32 {
    (p.x - v0.x) * (v1.y - v0.y) - (p.y - v0.y) * (v1.x - v0.x)
}

/// Distance from `p` to the segment (a, b).
fn point_segment_distance(p: Vector2<f32>, a: Vector2<f32>, b: Vector2<f32>) -> f32 {
    let ab = b - a;
    let len2 = ab.norm_squared();
    let t = if len2 > 0.0 {
        ((p - a).dot(&ab) / len2).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (p - (a + ab * t)).norm()
}

/// Distance from `p` to the nearest edge of the triangle.
fn point_triangle_distance(p: Vector2<f32>, v: &[Vector3<f32>; 3]) -> f32 {
    let (a, b, c) = (v[0].xy(), v[1].xy(), v[2].xy());
    point_segment_distance(p, a, b)
        .min(point_segment_distance(p, b, c))
        .min(point_segment_distance(p, c, a))
}

/// Screen-space faces of every mesh; unusable faces are dropped here.
fn screen_faces<M: MeshBatch>(meshes: &M) -> Vec<Vec<ScreenFace>> {
    let padded = meshes.verts_padded();
    let first_idx = meshes.mesh_to_face_first_idx();

    (0..meshes.len())
        .map(|n| {
            let verts = padded.verts(n);
            meshes
                .faces(n)
                .iter()
                .enumerate()
                .filter_map(|(f, face)| {
                    let v = face.map(|i| verts[i as usize]);
                    let usable = v.iter().all(|p| p.iter().all(|c| c.is_finite()))
                        && v.iter().all(|p| p.z > 0.0);
                    if !usable {
                        return None;
                    }
                    let area = edge_function(v[2].xy(), v[0].xy(), v[1].xy());
                    if area.abs() <= AREA_EPS {
                        return None;
                    }
                    let min = v[0].xy().inf(&v[1].xy()).inf(&v[2].xy());
                    let max = v[0].xy().sup(&v[1].xy()).sup(&v[2].xy());
                    Some(ScreenFace {
                        packed: (first_idx[n] + f) as i64,
                        v,
                        area,
                        min,
                        max,
                    })
                })
                .collect()
        })
        .collect()
}

/// Test one face against pixel center `p`.
fn hit_face(face: &ScreenFace, p: Vector2<f32>, settings: &ResolvedRasterSettings) -> Option<Hit> {
    let blur = settings.blur_radius;
    if p.x < face.min.x - blur
        || p.x > face.max.x + blur
        || p.y < face.min.y - blur
        || p.y > face.max.y + blur
    {
        return None;
    }
    if settings.cull_backfaces && face.area < 0.0 {
        return None;
    }

    let [v0, v1, v2] = face.v;
    let screen_bary = Vector3::new(
        edge_function(p, v1.xy(), v2.xy()),
        edge_function(p, v2.xy(), v0.xy()),
        edge_function(p, v0.xy(), v1.xy()),
    ) / face.area;

    let bary = if settings.perspective_correct {
        perspective_correct(screen_bary, v0.z, v1.z, v2.z)
    } else {
        screen_bary
    };

    let inside = bary.x > 0.0 && bary.y > 0.0 && bary.z > 0.0;
    let dist = point_triangle_distance(p, &face.v);
    if !inside && dist >= blur {
        return None;
    }

    let bary = if settings.clip_barycentric_coords {
        clip_barycentric(bary)
    } else {
        bary
    };

    let z = bary.x * v0.z + bary.y * v1.z + bary.z * v2.z;
    if z < 0.0 {
        return None;
    }

    Some(Hit {
        face: face.packed,
        z,
        bary,
        dist: if inside { -dist } else { dist },
    })
}

/// Up to K hits for pixel `p`, nearest first; ties go to the lower face index.
fn nearest_faces(faces: &[ScreenFace], p: Vector2<f32>, settings: &ResolvedRasterSettings) -> Vec<Hit> {
    let k = settings.faces_per_pixel;
    let mut best: Vec<Hit> = Vec::with_capacity(k + 1);
    for face in faces {
        let Some(hit) = hit_face(face, p, settings) else {
            continue;
        };
        let pos = best
            .iter()
            .position(|b| (hit.z, hit.face) < (b.z, b.face))
            .unwrap_or(best.len());
        if pos < k {
            best.insert(pos, hit);
            best.truncate(k);
        }
    }
    debug_assert!(best.iter().all(|h| h.face != NO_FACE));
    best
}

/// Re-weight screen-space barycentrics by inverse vertex depth.
fn perspective_correct(bary: Vector3<f32>, z0: f32, z1: f32, z2: f32) -> Vector3<f32> {
    let top = Vector3::new(bary.x * z1 * z2, bary.y * z0 * z2, bary.z * z0 * z1);
    let denom = (top.x + top.y + top.z).max(AREA_EPS);
    top / denom
}

/// Clamp barycentrics to be non-negative and renormalize to sum to one.
fn clip_barycentric(bary: Vector3<f32>) -> Vector3<f32> {
    let clipped = bary.map(|b| b.max(0.0));
    let sum = (clipped.x + clipped.y + clipped.z).max(AREA_EPS);
    clipped / sum
}
