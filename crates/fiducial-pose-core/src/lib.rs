//! Core types for fiducial board pose estimation.
//!
//! This crate is intentionally small and purely geometric. It holds the
//! camera calibration record and its conversion into the matrix forms a PnP
//! solver needs, the Brown–Conrady lens model, and a thin image-source
//! abstraction. It does *not* detect markers or solve poses.

mod camera;
mod distortion;
mod error;
mod image;
mod logger;

pub use camera::{CalibrationError, CameraCalibration};
pub use distortion::BrownConrady5;
pub use error::ErrorKind;
pub use image::{GrayImage, GrayImageView, ImageError, ImageSource, ImageView, PixelFormat};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, verbosity_level};
