//! Mesh batch contract and a simple list-backed implementation.
//!
//! Faces are addressed two ways: per mesh (indices into that mesh's own vertex
//! list) and packed (a single running index over all faces in the batch, which
//! is what `Fragments::pix_to_face` stores).

use nalgebra::Vector3;

/// Vertex positions padded to the largest mesh in the batch.
///
/// `data` has shape (N, max_verts); rows shorter than `max_verts` are padded
/// with zeros.
#[derive(Clone, Debug, PartialEq)]
pub struct PaddedVerts {
    pub max_verts: usize,
    pub num_verts: Vec<usize>,
    pub data: Vec<Vector3<f32>>,
}

impl PaddedVerts {
    /// Pad a list of per-mesh vertex arrays.
    pub fn from_list(verts: &[Vec<Vector3<f32>>]) -> Self {
        let max_verts = verts.iter().map(Vec::len).max().unwrap_or(0);
        let mut data = Vec::with_capacity(verts.len() * max_verts);
        for v in verts {
            data.extend_from_slice(v);
            data.extend(std::iter::repeat(Vector3::zeros()).take(max_verts - v.len()));
        }
        Self {
            max_verts,
            num_verts: verts.iter().map(Vec::len).collect(),
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.num_verts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_verts.is_empty()
    }

    /// Padded row of mesh `n` (length `max_verts`).
    pub fn row(&self, n: usize) -> &[Vector3<f32>] {
        &self.data[n * self.max_verts..(n + 1) * self.max_verts]
    }

    /// Unpadded vertices of mesh `n`.
    pub fn verts(&self, n: usize) -> &[Vector3<f32>] {
        &self.row(n)[..self.num_verts[n]]
    }
}

/// A batch of triangle meshes as seen by the rasterizer.
pub trait MeshBatch: Sized {
    /// Number of meshes in the batch.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn verts_padded(&self) -> PaddedVerts;

    /// Faces of mesh `n`, indexing into that mesh's vertices.
    fn faces(&self, n: usize) -> &[[u32; 3]];

    /// Same topology with vertex positions replaced by `new_verts`.
    fn update_padded(&self, new_verts: &PaddedVerts) -> Self;

    /// Packed index of the first face of every mesh.
    fn mesh_to_face_first_idx(&self) -> Vec<usize> {
        let mut first = Vec::with_capacity(self.len());
        let mut offset = 0;
        for n in 0..self.len() {
            first.push(offset);
            offset += self.faces(n).len();
        }
        first
    }

    /// Total number of faces over the batch.
    fn num_faces_packed(&self) -> usize {
        (0..self.len()).map(|n| self.faces(n).len()).sum()
    }
}

/// List-backed mesh batch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Meshes {
    pub verts: Vec<Vec<Vector3<f32>>>,
    pub faces: Vec<Vec<[u32; 3]>>,
}

impl Meshes {
    /// Build a batch; panics if the vertex and face lists disagree in length or
    /// a face references a missing vertex.
    pub fn new(verts: Vec<Vec<Vector3<f32>>>, faces: Vec<Vec<[u32; 3]>>) -> Self {
        assert_eq!(verts.len(), faces.len(), "verts and faces must have one entry per mesh");
        for (n, (v, f)) in verts.iter().zip(&faces).enumerate() {
            if let Some(bad) = f.iter().flatten().find(|&&i| i as usize >= v.len()) {
                panic!("mesh {n}: face index {bad} out of range for {} vertices", v.len());
            }
        }
        Self { verts, faces }
    }

    /// A batch with a single mesh.
    pub fn single(verts: Vec<Vector3<f32>>, faces: Vec<[u32; 3]>) -> Self {
        Self::new(vec![verts], vec![faces])
    }
}

impl MeshBatch for Meshes {
    fn len(&self) -> usize {
        self.verts.len()
    }

    fn verts_padded(&self) -> PaddedVerts {
        PaddedVerts::from_list(&self.verts)
    }

    fn faces(&self, n: usize) -> &[[u32; 3]] {
        &self.faces[n]
    }

    fn update_padded(&self, new_verts: &PaddedVerts) -> Self {
        assert_eq!(new_verts.len(), self.len(), "padded verts do not match mesh count");
        let verts = (0..self.len())
            .map(|n| {
                assert_eq!(new_verts.num_verts[n], self.verts[n].len());
                new_verts.verts(n).to_vec()
            })
            .collect();
        Self {
            verts,
            faces: self.faces.clone(),
        }
    }
}
