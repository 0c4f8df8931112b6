//! Rigid alignment of corresponding 3D point sets.
//!
//! [`compute_rigid_transform`] solves the absolute orientation problem with
//! the SVD-based Kabsch method: given matched points `a[i]` and `b[i]` it
//! returns the rotation and translation minimizing `sum |R a[i] + t - b[i]|^2`,
//! always as a proper rotation (`det R = +1`).
//!
//! The [`correspondence`] module wraps it for display calibration, where
//! point pairs are gathered one at a time per eye.

pub mod correspondence;
mod rigid;

pub use correspondence::{
    CollectStatus, CorrespondenceCollector, CorrespondenceError, CorrespondenceSet, Eye,
    StereoCalibration, StereoStatus,
};
pub use rigid::{compute_rigid_transform, AlignmentError, RigidTransform, TransformError};
