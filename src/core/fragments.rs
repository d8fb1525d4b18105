//! Rasterization output: the top-K fragments covering every pixel.
//!
//! All buffers are row-major over `(batch, height, width, K)`. Within one pixel
//! the K slots are ordered nearest-first and sentinel slots (`face < 0`) only
//! ever follow real ones.

use nalgebra::Vector3;

/// Face index stored in slots with no covering face.
pub const NO_FACE: i64 = -1;

/// Leading shape shared by `Fragments` and `FragmentColors`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FragmentShape {
    pub batch: usize,
    pub height: usize,
    pub width: usize,
    /// K: candidates kept per pixel
    pub faces_per_pixel: usize,
}

impl FragmentShape {
    pub fn new(batch: usize, height: usize, width: usize, faces_per_pixel: usize) -> Self {
        assert!(faces_per_pixel > 0, "at least one fragment per pixel is required");
        Self {
            batch,
            height,
            width,
            faces_per_pixel,
        }
    }

    /// Number of pixels over the whole batch (N * H * W).
    pub fn num_pixels(&self) -> usize {
        self.batch * self.height * self.width
    }

    /// Number of fragment slots (N * H * W * K).
    pub fn len(&self) -> usize {
        self.num_pixels() * self.faces_per_pixel
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flat pixel index of `(n, y, x)`.
    pub fn pixel_index(&self, n: usize, y: usize, x: usize) -> usize {
        debug_assert!(n < self.batch && y < self.height && x < self.width);
        (n * self.height + y) * self.width + x
    }

    /// Flat slot index of `(n, y, x, k)`.
    pub fn slot_index(&self, n: usize, y: usize, x: usize, k: usize) -> usize {
        debug_assert!(k < self.faces_per_pixel);
        self.pixel_index(n, y, x) * self.faces_per_pixel + k
    }
}

/// Per-pixel view into a `Fragments` record.
#[derive(Clone, Copy, Debug)]
pub struct PixelFragments<'a> {
    pub pix_to_face: &'a [i64],
    pub zbuf: &'a [f32],
    pub bary_coords: &'a [Vector3<f32>],
    pub dists: &'a [f32],
}

impl PixelFragments<'_> {
    /// True when no face covers the pixel at all.
    pub fn is_background(&self) -> bool {
        self.pix_to_face.first().map_or(true, |&f| f < 0)
    }
}

/// Top-K fragments per pixel produced by the rasterizer.
#[derive(Clone, Debug, PartialEq)]
pub struct Fragments {
    pub shape: FragmentShape,

    /// Packed face index per slot, `NO_FACE` for empty slots
    pub pix_to_face: Vec<i64>,

    /// Interpolated view-space depth, -1 for empty slots
    pub zbuf: Vec<f32>,

    /// Barycentric coordinates within the covering face, (-1, -1, -1) for empty slots
    pub bary_coords: Vec<Vector3<f32>>,

    /// Signed Euclidean distance (NDC units) from the pixel center to the face
    /// boundary; negative inside the face, -1 for empty slots
    pub dists: Vec<f32>,
}

impl Fragments {
    /// Assemble a fragment record; panics if any buffer disagrees with `shape`.
    pub fn new(
        shape: FragmentShape,
        pix_to_face: Vec<i64>,
        zbuf: Vec<f32>,
        bary_coords: Vec<Vector3<f32>>,
        dists: Vec<f32>,
    ) -> Self {
        let n = shape.len();
        assert_eq!(pix_to_face.len(), n, "pix_to_face does not match fragment shape");
        assert_eq!(zbuf.len(), n, "zbuf does not match fragment shape");
        assert_eq!(bary_coords.len(), n, "bary_coords does not match fragment shape");
        assert_eq!(dists.len(), n, "dists does not match fragment shape");

        Self {
            shape,
            pix_to_face,
            zbuf,
            bary_coords,
            dists,
        }
    }

    /// A record where every slot is a sentinel (an empty scene).
    pub fn empty(shape: FragmentShape) -> Self {
        let n = shape.len();
        Self {
            shape,
            pix_to_face: vec![NO_FACE; n],
            zbuf: vec![-1.0; n],
            bary_coords: vec![Vector3::repeat(-1.0); n],
            dists: vec![-1.0; n],
        }
    }

    /// Fragments for the pixel with flat index `pixel`.
    pub fn pixel(&self, pixel: usize) -> PixelFragments<'_> {
        let k = self.shape.faces_per_pixel;
        let range = pixel * k..(pixel + 1) * k;
        PixelFragments {
            pix_to_face: &self.pix_to_face[range.clone()],
            zbuf: &self.zbuf[range.clone()],
            bary_coords: &self.bary_coords[range.clone()],
            dists: &self.dists[range],
        }
    }
}

/// Per-fragment RGB colors, index-aligned with `Fragments`.
#[derive(Clone, Debug, PartialEq)]
pub struct FragmentColors {
    pub shape: FragmentShape,
    pub data: Vec<Vector3<f32>>,
}

impl FragmentColors {
    pub fn new(shape: FragmentShape, data: Vec<Vector3<f32>>) -> Self {
        assert_eq!(data.len(), shape.len(), "color tensor does not match fragment shape");
        Self { shape, data }
    }

    /// Every slot set to the same color.
    pub fn uniform(shape: FragmentShape, color: Vector3<f32>) -> Self {
        Self {
            shape,
            data: vec![color; shape.len()],
        }
    }

    /// K colors of one pixel.
    pub fn pixel(&self, pixel: usize) -> &[Vector3<f32>] {
        let k = self.shape.faces_per_pixel;
        &self.data[pixel * k..(pixel + 1) * k]
    }
}
