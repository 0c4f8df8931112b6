//! Capabilities the estimator depends on but does not implement itself.

use crate::dictionary::MarkerDictionary;
use fiducial_pose_core::GrayImageView;
use nalgebra::{Matrix3, Point2, Point3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

/// One decoded marker in image pixels.
///
/// Corners are clockwise from the marker's top-left corner, matching
/// [`MarkerCorners`](fiducial_pose_board::MarkerCorners).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkerDetection {
    pub id: u32,
    pub corners: [Point2<f64>; 4],
}

/// Finds and decodes square fiducials in a grayscale frame.
pub trait MarkerDetector {
    fn detect_markers(
        &self,
        image: &GrayImageView<'_>,
        dictionary: MarkerDictionary,
    ) -> Vec<MarkerDetection>;
}

/// Rotation (Rodrigues vector) and translation mapping object points into
/// the camera frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PnpSolution {
    pub rotation: Vector3<f64>,
    pub translation: Vector3<f64>,
}

impl PnpSolution {
    pub fn from_matrix(rotation: &Matrix3<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation: Rotation3::from_matrix_unchecked(*rotation).scaled_axis(),
            translation,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.rotation
            .iter()
            .chain(self.translation.iter())
            .all(|v| v.is_finite())
    }
}

/// Perspective-n-point solver.
///
/// `camera_matrix` is the 3x3 intrinsics matrix and `dist_coeffs` the
/// distortion vector `[k1, k2, p1, p2, k3]`. `None` means no pose.
pub trait PnpSolver {
    fn solve(
        &self,
        object_points: &[Point3<f64>],
        image_points: &[Point2<f64>],
        camera_matrix: &Matrix3<f64>,
        dist_coeffs: &[f64; 5],
    ) -> Option<PnpSolution>;
}

impl<T: PnpSolver + ?Sized> PnpSolver for &T {
    fn solve(
        &self,
        object_points: &[Point3<f64>],
        image_points: &[Point2<f64>],
        camera_matrix: &Matrix3<f64>,
        dist_coeffs: &[f64; 5],
    ) -> Option<PnpSolution> {
        (**self).solve(object_points, image_points, camera_matrix, dist_coeffs)
    }
}

impl<T: MarkerDetector + ?Sized> MarkerDetector for &T {
    fn detect_markers(
        &self,
        image: &GrayImageView<'_>,
        dictionary: MarkerDictionary,
    ) -> Vec<MarkerDetection> {
        (**self).detect_markers(image, dictionary)
    }
}
