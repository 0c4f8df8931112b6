//! Camera calibration record and its matrix forms.

use crate::distortion::BrownConrady5;
use crate::error::ErrorKind;
use nalgebra::{Matrix3, Point2, Point3, Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(thiserror::Error, Debug)]
pub enum CalibrationError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl CalibrationError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidArgument
    }
}

/// Pinhole intrinsics plus a 5-parameter Brown–Conrady lens model.
///
/// This is a plain snapshot supplied by the caller. Nothing here checks that
/// the numbers are physically plausible.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraCalibration {
    /// `(fx, fy)` in pixels.
    pub focal_length: Vector2<f64>,
    /// `(cx, cy)` in pixels.
    pub principal_point: Vector2<f64>,
    /// `(k1, k2, k3)`.
    pub radial_distortion: Vector3<f64>,
    /// `(p1, p2)`.
    pub tangential_distortion: Vector2<f64>,
    pub image_width: u32,
    pub image_height: u32,
}

impl CameraCalibration {
    /// Distortion-free calibration with the given intrinsics.
    pub fn pinhole(fx: f64, fy: f64, cx: f64, cy: f64, image_width: u32, image_height: u32) -> Self {
        Self {
            focal_length: Vector2::new(fx, fy),
            principal_point: Vector2::new(cx, cy),
            radial_distortion: Vector3::zeros(),
            tangential_distortion: Vector2::zeros(),
            image_width,
            image_height,
        }
    }

    /// Camera matrix `K = [[fx, 0, cx], [0, fy, cy], [0, 0, 1]]`.
    pub fn intrinsics_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.focal_length.x,
            0.0,
            self.principal_point.x,
            0.0,
            self.focal_length.y,
            self.principal_point.y,
            0.0,
            0.0,
            1.0,
        )
    }

    /// Distortion coefficients in `[k1, k2, p1, p2, k3]` order.
    ///
    /// The third radial term goes last, after the two tangential terms.
    pub fn distortion_vector(&self) -> [f64; 5] {
        [
            self.radial_distortion.x,
            self.radial_distortion.y,
            self.tangential_distortion.x,
            self.tangential_distortion.y,
            self.radial_distortion.z,
        ]
    }

    /// Lens model built from the distortion coefficients.
    #[inline]
    pub fn lens(&self) -> BrownConrady5 {
        BrownConrady5::from_coefficients(&self.distortion_vector())
    }

    /// True if every distortion coefficient is exactly zero.
    pub fn is_distortion_free(&self) -> bool {
        self.distortion_vector().iter().all(|&c| c == 0.0)
    }

    /// Map a distorted pixel to an undistorted normalized image point.
    pub fn pixel_to_normalized(&self, pixel: &Point2<f64>) -> Point2<f64> {
        let distorted = Point2::new(
            (pixel.x - self.principal_point.x) / self.focal_length.x,
            (pixel.y - self.principal_point.y) / self.focal_length.y,
        );
        self.lens().undistort(&distorted)
    }

    /// Project a camera-frame point to pixels, applying lens distortion.
    ///
    /// Returns `None` for points at or behind the camera plane.
    pub fn project(&self, p_cam: &Point3<f64>) -> Option<Point2<f64>> {
        if p_cam.z <= f64::EPSILON {
            return None;
        }
        let ideal = Point2::new(p_cam.x / p_cam.z, p_cam.y / p_cam.z);
        let d = self.lens().distort(&ideal);
        Some(Point2::new(
            self.focal_length.x * d.x + self.principal_point.x,
            self.focal_length.y * d.y + self.principal_point.y,
        ))
    }

    /// Load a calibration from a JSON file.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, CalibrationError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this calibration to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), CalibrationError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
