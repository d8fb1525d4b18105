//! Camera contract consumed by the rasterizer, plus a perspective camera batch.
//!
//! The rasterizer only ever calls `transform_points` on two transforms in a
//! row: world → view, then view → screen (NDC). Screen space follows the
//! convention +X left, +Y up, with the camera looking down +Z.

use nalgebra::{Matrix3, Matrix4, Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// Something that maps a set of points into the next coordinate space.
pub trait TransformPoints {
    fn transform_points(&self, points: &[Vector3<f32>]) -> Vec<Vector3<f32>>;
}

/// A batch of cameras.
///
/// Either one camera shared by every mesh, or one camera per mesh.
pub trait Cameras {
    type Transform: TransformPoints;

    /// Number of cameras in the batch.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// World → view transform of camera `index`.
    fn world_to_view_transform(&self, index: usize) -> Self::Transform;

    /// View → screen (NDC) transform of camera `index`.
    fn projection_transform(&self, index: usize) -> Self::Transform;
}

/// Homogeneous 4×4 transform applied to column vectors, with perspective divide.
#[derive(Clone, Debug, PartialEq)]
pub struct Transform3d {
    pub matrix: Matrix4<f32>,
}

impl Transform3d {
    pub fn new(matrix: Matrix4<f32>) -> Self {
        Self { matrix }
    }
}

impl TransformPoints for Transform3d {
    fn transform_points(&self, points: &[Vector3<f32>]) -> Vec<Vector3<f32>> {
        points
            .iter()
            .map(|p| {
                let h = self.matrix * p.push(1.0);
                // w == 0 gives non-finite coordinates; the face search skips those faces.
                Vector3::new(h.x / h.w, h.y / h.w, h.z / h.w)
            })
            .collect()
    }
}

/// Pinhole camera with intrinsics expressed in NDC units.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PerspectiveCamera {
    /// Focal length (NDC units, 1.0 ⇔ 90° field of view)
    pub focal_length: Vector2<f32>,

    /// Principal point (NDC)
    pub principal_point: Vector2<f32>,

    /// Rotation from world to camera coordinates
    pub rotation: Matrix3<f32>,

    /// Translation from world to camera coordinates
    pub translation: Vector3<f32>,
}

impl PerspectiveCamera {
    pub fn new(
        focal_length: Vector2<f32>,
        principal_point: Vector2<f32>,
        rotation: Matrix3<f32>,
        translation: Vector3<f32>,
    ) -> Self {
        Self {
            focal_length,
            principal_point,
            rotation,
            translation,
        }
    }

    /// Camera at the origin looking down +Z with the given vertical field of view.
    pub fn from_fov(fov_degrees: f32) -> Self {
        let f = 1.0 / (0.5 * fov_degrees.to_radians()).tan();
        Self::new(
            Vector2::new(f, f),
            Vector2::zeros(),
            Matrix3::identity(),
            Vector3::zeros(),
        )
    }

    /// 4×4 view matrix [R | t].
    pub fn view_matrix(&self) -> Matrix4<f32> {
        let mut m = self.rotation.to_homogeneous();
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.translation);
        m
    }

    /// 4×4 projection matrix from camera space to NDC.
    ///
    /// x_ndc = fx * x/z + px, y_ndc = fy * y/z + py; the z row is irrelevant
    /// because the rasterizer keeps view-space depth.
    pub fn projection_matrix(&self) -> Matrix4<f32> {
        let (fx, fy) = (self.focal_length.x, self.focal_length.y);
        let (px, py) = (self.principal_point.x, self.principal_point.y);
        Matrix4::new(
            fx, 0.0, px, 0.0, //
            0.0, fy, py, 0.0, //
            0.0, 0.0, 0.0, 1.0, //
            0.0, 0.0, 1.0, 0.0,
        )
    }
}

/// A batch of perspective cameras.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PerspectiveCameras {
    pub cameras: Vec<PerspectiveCamera>,
}

impl PerspectiveCameras {
    pub fn new(cameras: Vec<PerspectiveCamera>) -> Self {
        Self { cameras }
    }

    pub fn single(camera: PerspectiveCamera) -> Self {
        Self::new(vec![camera])
    }
}

impl Cameras for PerspectiveCameras {
    type Transform = Transform3d;

    fn len(&self) -> usize {
        self.cameras.len()
    }

    fn world_to_view_transform(&self, index: usize) -> Transform3d {
        Transform3d::new(self.cameras[index].view_matrix())
    }

    fn projection_transform(&self, index: usize) -> Transform3d {
        Transform3d::new(self.cameras[index].projection_matrix())
    }
}
