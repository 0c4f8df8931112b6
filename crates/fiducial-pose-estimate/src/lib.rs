//! Fiducial board and marker pose estimation.
//!
//! The numeric pipeline is:
//! 1. a [`MarkerDetector`] turns a grayscale frame into [`MarkerDetection`]s
//!    (id + four pixel corners),
//! 2. [`estimate_pose`] matches them against a
//!    [`BoardLayout`](fiducial_pose_board::BoardLayout) and hands the 2D-3D
//!    correspondences to a [`PnpSolver`],
//! 3. the solver answer becomes a [`PoseEstimate`]; no answer (too few
//!    markers, solver failure) is an invalid estimate, never an error.
//!
//! Marker detection has no in-tree implementation; PnP defaults to
//! [`LinearPnpSolver`]. [`BoardTracker`] wires everything to an
//! [`ImageSource`](fiducial_pose_core::ImageSource) with a [`TrackerConfig`].
//!
//! ```no_run
//! use fiducial_pose_board::build_board_layout;
//! use fiducial_pose_core::CameraCalibration;
//! use fiducial_pose_estimate::{estimate_pose, LinearPnpSolver, MarkerDetection};
//! use nalgebra::Point3;
//!
//! let layout = build_board_layout(
//!     2,
//!     0.04,
//!     &[Point3::new(0.0, 0.0, 0.0), Point3::new(0.1, 0.0, 0.0)],
//! )
//! .unwrap();
//! let calib = CameraCalibration::pinhole(800.0, 800.0, 320.0, 240.0, 640, 480);
//! let detections: Vec<MarkerDetection> = Vec::new(); // from a detector
//! let pose = estimate_pose(&detections, &layout, &calib, &LinearPnpSolver::default());
//! if pose.is_valid() {
//!     println!("board at {:?}", pose.translation);
//! }
//! ```

mod backend;
mod dictionary;
mod estimator;
mod linear_pnp;
mod pose;
mod tracker;

pub use backend::{MarkerDetection, MarkerDetector, PnpSolution, PnpSolver};
pub use dictionary::MarkerDictionary;
pub use estimator::{
    estimate_marker_poses, estimate_pose, estimate_pose_with_min_markers, MIN_BOARD_MARKERS,
};
pub use linear_pnp::LinearPnpSolver;
pub use pose::{MarkerPose, PoseEstimate};
pub use tracker::{BoardTracker, ConfigError, TrackerConfig};
