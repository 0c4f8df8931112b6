//! High-level facade crate for the `fiducial-pose-*` workspace.
//!
//! This crate provides stable re-exports of the underlying crates and the
//! (feature-gated) `fiducial-pose` command line tool.
//!
//! ## Quickstart
//!
//! ```no_run
//! use fiducial_pose::align::CorrespondenceSet;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pairs = CorrespondenceSet::load_json("right_eye.json")?;
//! let transform = pairs.compute_transform()?;
//! println!("{:?}", transform.to_row_major());
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `fiducial_pose::core`: camera calibration, lens model, image sources, logging.
//! - `fiducial_pose::board`: board layouts and marker corner geometry.
//! - `fiducial_pose::estimate`: board/marker pose estimation and tracking.
//! - `fiducial_pose::align`: Kabsch rigid alignment and display calibration.

pub use fiducial_pose_align as align;
pub use fiducial_pose_board as board;
pub use fiducial_pose_core as core;
pub use fiducial_pose_estimate as estimate;
pub use nalgebra;

pub use fiducial_pose_align::{compute_rigid_transform, RigidTransform};
pub use fiducial_pose_board::{build_board_layout, BoardLayout};
pub use fiducial_pose_core::{CameraCalibration, ErrorKind};
pub use fiducial_pose_estimate::{estimate_pose, PoseEstimate};
