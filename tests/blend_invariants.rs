//! Blend invariants
//!
//! Properties every blend policy must hold regardless of scene content:
//! - Empty pixels are well defined (background, never NaN)
//! - Alpha stays in [0, 1] and never decreases when a fragment is added
//! - Softmax color is a convex combination of fragment colors and background
//! - Results do not depend on the order of fragments within a pixel

use approx::assert_relative_eq;
use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use softras_rs::blend::{
    hard_rgb_blend, sigmoid_alpha_blend, softmax_rgb_blend, BlendParams, DepthRange, MeshBlend,
};
use softras_rs::core::{FragmentColors, FragmentShape, Fragments, NO_FACE};

fn single_pixel(faces: Vec<i64>, zbuf: Vec<f32>, dists: Vec<f32>) -> Fragments {
    let shape = FragmentShape::new(1, 1, 1, faces.len());
    let bary = vec![Vector3::repeat(1.0 / 3.0); faces.len()];
    Fragments::new(shape, faces, zbuf, bary, dists)
}

fn random_pixel(rng: &mut StdRng, k: usize, filled: usize) -> (Fragments, FragmentColors) {
    let mut faces = Vec::new();
    let mut zbuf = Vec::new();
    let mut dists = Vec::new();
    for i in 0..k {
        if i < filled {
            faces.push(i as i64);
            zbuf.push(rng.gen_range(1.0..20.0));
            dists.push(rng.gen_range(-0.05..0.05));
        } else {
            faces.push(NO_FACE);
            zbuf.push(-1.0);
            dists.push(-1.0);
        }
    }
    let frags = single_pixel(faces, zbuf, dists);
    let colors = FragmentColors::new(
        frags.shape,
        (0..k)
            .map(|_| {
                Vector3::new(
                    rng.gen_range(0.0..1.0),
                    rng.gen_range(0.0..1.0),
                    rng.gen_range(0.0..1.0),
                )
            })
            .collect(),
    );
    (frags, colors)
}

fn soft_params() -> BlendParams {
    BlendParams {
        sigma: 1e-2,
        gamma: 1e-1,
        background_color: Vector3::new(0.2, 0.3, 0.4),
    }
}

#[test]
fn test_empty_pixels_per_policy() {
    let frags = Fragments::empty(FragmentShape::new(2, 3, 3, 4));
    let colors = FragmentColors::uniform(frags.shape, Vector3::new(0.9, 0.1, 0.1));
    let params = soft_params();
    let bg = params.background_color;

    let hard = hard_rgb_blend(&colors, &frags, &params);
    let soft = softmax_rgb_blend(&colors, &frags, &params, &DepthRange::default());
    let silhouette = sigmoid_alpha_blend(&colors, &frags, &params);

    for p in 0..frags.shape.num_pixels() {
        assert_eq!(hard.data[p].xyz(), bg);
        assert_eq!(hard.data[p].w, 1.0);

        assert_eq!(soft.data[p].xyz(), bg);
        assert_eq!(soft.data[p].w, 0.0);

        // Silhouette RGB is the nearest slot's color, background or not
        assert_eq!(silhouette.data[p].xyz(), Vector3::new(0.9, 0.1, 0.1));
        assert_eq!(silhouette.data[p].w, 0.0);
    }
}

#[test]
fn test_deep_inside_single_face_is_opaque() {
    let frags = single_pixel(vec![0], vec![5.0], vec![-1.0]);
    let colors = FragmentColors::uniform(frags.shape, Vector3::new(0.0, 1.0, 0.0));
    let params = BlendParams::default();

    for blend in [
        MeshBlend::Hard,
        MeshBlend::SigmoidAlpha,
        MeshBlend::Softmax(DepthRange::default()),
    ] {
        let img = blend.blend(&colors, &frags, &params);
        assert_relative_eq!(img.data[0].w, 1.0);
        assert_relative_eq!(img.data[0].xyz(), Vector3::new(0.0, 1.0, 0.0), epsilon = 1e-6);
    }
}

#[test]
fn test_alpha_is_bounded_and_monotone() {
    let mut rng = StdRng::seed_from_u64(0xB0_0D_u64);
    let params = soft_params();

    for _ in 0..100 {
        let (frags, colors) = random_pixel(&mut rng, 6, 6);
        let mut previous = 0.0f32;
        for filled in 0..=6 {
            // Mask every slot past `filled`
            let mut masked = frags.clone();
            for k in filled..6 {
                masked.pix_to_face[k] = NO_FACE;
            }
            let alpha = sigmoid_alpha_blend(&colors, &masked, &params).data[0].w;
            assert!((0.0..=1.0).contains(&alpha), "alpha {alpha} out of range");
            assert!(alpha >= previous - 1e-6, "alpha decreased: {previous} -> {alpha}");
            previous = alpha;
        }
    }
}

#[test]
fn test_sigmoid_and_softmax_share_coverage() {
    let mut rng = StdRng::seed_from_u64(7);
    let params = soft_params();
    for filled in 0..=4 {
        let (frags, colors) = random_pixel(&mut rng, 4, filled);
        let a = sigmoid_alpha_blend(&colors, &frags, &params).data[0].w;
        let b = softmax_rgb_blend(&colors, &frags, &params, &DepthRange::default()).data[0].w;
        assert_relative_eq!(a, b, epsilon = 1e-6);
    }
}

#[test]
fn test_softmax_color_is_convex_combination() {
    let mut rng = StdRng::seed_from_u64(0x00C0_4E3_u64);
    let params = soft_params();

    for _ in 0..200 {
        let filled = rng.gen_range(0..=5);
        let (frags, colors) = random_pixel(&mut rng, 5, filled);
        let rgb = softmax_rgb_blend(&colors, &frags, &params, &DepthRange::default()).data[0].xyz();

        let candidates: Vec<Vector3<f32>> = colors.data[..filled]
            .iter()
            .copied()
            .chain(std::iter::once(params.background_color))
            .collect();
        for c in 0..3 {
            let lo = candidates.iter().map(|v| v[c]).fold(f32::INFINITY, f32::min);
            let hi = candidates.iter().map(|v| v[c]).fold(f32::NEG_INFINITY, f32::max);
            assert!(rgb[c].is_finite());
            assert!(
                rgb[c] >= lo - 1e-5 && rgb[c] <= hi + 1e-5,
                "channel {c}: {} not in [{lo}, {hi}]",
                rgb[c]
            );
        }
    }
}

#[test]
fn test_slot_order_does_not_matter() {
    let mut rng = StdRng::seed_from_u64(0x0DE7_u64);
    let params = soft_params();
    let range = DepthRange::default();

    for _ in 0..50 {
        let (frags, colors) = random_pixel(&mut rng, 4, 3);
        // Reverse the slots (sentinel first) and rotate them
        let order = [3, 2, 0, 1];
        let permuted = single_pixel(
            order.iter().map(|&i| frags.pix_to_face[i]).collect(),
            order.iter().map(|&i| frags.zbuf[i]).collect(),
            order.iter().map(|&i| frags.dists[i]).collect(),
        );
        let permuted_colors =
            FragmentColors::new(permuted.shape, order.iter().map(|&i| colors.data[i]).collect());

        let a = softmax_rgb_blend(&colors, &frags, &params, &range).data[0];
        let b = softmax_rgb_blend(&permuted_colors, &permuted, &params, &range).data[0];
        assert_relative_eq!(a, b, epsilon = 1e-5);

        let alpha = sigmoid_alpha_blend(&colors, &frags, &params).data[0].w;
        let permuted_alpha = sigmoid_alpha_blend(&permuted_colors, &permuted, &params).data[0].w;
        assert_relative_eq!(alpha, permuted_alpha, epsilon = 1e-6);
    }
}

#[test]
fn test_hard_blend_ignores_farther_slots() {
    let frags = single_pixel(vec![2, 5], vec![1.0, 2.0], vec![0.3, -0.3]);
    let colors = FragmentColors::new(
        frags.shape,
        vec![Vector3::new(0.1, 0.2, 0.3), Vector3::new(0.9, 0.9, 0.9)],
    );
    let img = hard_rgb_blend(&colors, &frags, &soft_params());
    // The nearest slot wins even though its pixel center lies outside the face
    assert_eq!(img.data[0].xyz(), Vector3::new(0.1, 0.2, 0.3));
    assert_eq!(img.data[0].w, 1.0);
}
