use nalgebra::{Matrix3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

/// Board pose in the camera frame: `X_cam = R(rotation) * X_board + translation`.
///
/// `rotation` is a Rodrigues vector (axis times angle in radians). An estimate
/// with `valid == false` carries zero vectors and means "no pose this frame".
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoseEstimate {
    pub translation: Vector3<f64>,
    pub rotation: Vector3<f64>,
    pub valid: bool,
}

impl Default for PoseEstimate {
    fn default() -> Self {
        Self::invalid()
    }
}

impl PoseEstimate {
    pub fn new(rotation: Vector3<f64>, translation: Vector3<f64>) -> Self {
        Self {
            translation,
            rotation,
            valid: true,
        }
    }

    pub fn invalid() -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation: Vector3::zeros(),
            valid: false,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        Rotation3::new(self.rotation).into_inner()
    }

    /// Row-major 4x4 homogeneous matrix `[R | t; 0 0 0 1]`.
    pub fn to_matrix(&self) -> [[f64; 4]; 4] {
        let r = self.rotation_matrix();
        let t = &self.translation;
        [
            [r[(0, 0)], r[(0, 1)], r[(0, 2)], t.x],
            [r[(1, 0)], r[(1, 1)], r[(1, 2)], t.y],
            [r[(2, 0)], r[(2, 1)], r[(2, 2)], t.z],
            [0.0, 0.0, 0.0, 1.0],
        ]
    }
}

/// Pose of a single marker, relative to its own center.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkerPose {
    pub id: u32,
    pub translation: Vector3<f64>,
    pub rotation: Vector3<f64>,
}

impl MarkerPose {
    pub fn as_estimate(&self) -> PoseEstimate {
        PoseEstimate::new(self.rotation, self.translation)
    }
}
