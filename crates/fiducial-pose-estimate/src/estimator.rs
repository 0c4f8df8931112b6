use crate::backend::{MarkerDetection, PnpSolver};
use crate::pose::{MarkerPose, PoseEstimate};
use fiducial_pose_board::{BoardLayout, MarkerCorners};
use fiducial_pose_core::CameraCalibration;
use nalgebra::{Point2, Point3};
use std::collections::HashSet;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Fewest board markers a pose is ever attempted from.
pub const MIN_BOARD_MARKERS: usize = 2;

/// Board pose from marker detections.
///
/// Detections whose id is not on the board are ignored, as are repeated
/// detections of an id already used. With fewer than [`MIN_BOARD_MARKERS`]
/// matching markers, or when the solver gives up, the result is
/// [`PoseEstimate::invalid`].
pub fn estimate_pose<S: PnpSolver + ?Sized>(
    detections: &[MarkerDetection],
    layout: &BoardLayout,
    calibration: &CameraCalibration,
    solver: &S,
) -> PoseEstimate {
    estimate_pose_with_min_markers(detections, layout, calibration, solver, MIN_BOARD_MARKERS)
}

/// [`estimate_pose`] with a stricter marker threshold.
///
/// `min_markers` below [`MIN_BOARD_MARKERS`] is raised to it.
#[cfg_attr(
    feature = "tracing",
    instrument(
        level = "debug",
        skip(detections, layout, calibration, solver),
        fields(detections = detections.len())
    )
)]
pub fn estimate_pose_with_min_markers<S: PnpSolver + ?Sized>(
    detections: &[MarkerDetection],
    layout: &BoardLayout,
    calibration: &CameraCalibration,
    solver: &S,
    min_markers: usize,
) -> PoseEstimate {
    let min_markers = min_markers.max(MIN_BOARD_MARKERS);

    let mut used = HashSet::with_capacity(detections.len());
    let mut object: Vec<Point3<f64>> = Vec::with_capacity(4 * detections.len());
    let mut image: Vec<Point2<f64>> = Vec::with_capacity(4 * detections.len());
    for det in detections {
        let Some(corners) = layout.corners(det.id) else {
            continue;
        };
        if !used.insert(det.id) {
            log::debug!("marker {} detected twice, keeping the first", det.id);
            continue;
        }
        object.extend_from_slice(corners.points());
        image.extend_from_slice(&det.corners);
    }

    let matched = used.len();
    if matched < min_markers {
        log::debug!(
            "{matched} of {} detections on the board, need {min_markers}",
            detections.len()
        );
        return PoseEstimate::invalid();
    }

    let camera_matrix = calibration.intrinsics_matrix();
    let dist_coeffs = calibration.distortion_vector();
    match solver.solve(&object, &image, &camera_matrix, &dist_coeffs) {
        Some(sol) if sol.is_finite() => {
            log::debug!(
                "board pose from {matched} markers: t={:?}",
                sol.translation.as_slice()
            );
            PoseEstimate::new(sol.rotation, sol.translation)
        }
        _ => {
            log::warn!("no board pose from {matched} markers");
            PoseEstimate::invalid()
        }
    }
}

/// Independent pose of every detected marker.
///
/// Each marker is treated as a square of side `marker_size` centered on its
/// own origin. Markers the solver cannot handle are left out.
#[cfg_attr(
    feature = "tracing",
    instrument(
        level = "debug",
        skip(detections, calibration, solver),
        fields(detections = detections.len())
    )
)]
pub fn estimate_marker_poses<S: PnpSolver + ?Sized>(
    detections: &[MarkerDetection],
    marker_size: f64,
    calibration: &CameraCalibration,
    solver: &S,
) -> Vec<MarkerPose> {
    if !marker_size.is_finite() || marker_size <= 0.0 {
        log::warn!("marker size must be finite and > 0 (got {marker_size})");
        return Vec::new();
    }

    let object = MarkerCorners::centered(marker_size);
    let camera_matrix = calibration.intrinsics_matrix();
    let dist_coeffs = calibration.distortion_vector();

    let poses: Vec<MarkerPose> = detections
        .iter()
        .filter_map(|det| {
            let sol = solver
                .solve(object.points(), &det.corners, &camera_matrix, &dist_coeffs)
                .filter(|s| s.is_finite());
            if sol.is_none() {
                log::debug!("no pose for marker {}", det.id);
            }
            sol.map(|s| MarkerPose {
                id: det.id,
                translation: s.translation,
                rotation: s.rotation,
            })
        })
        .collect();

    log::debug!("{} of {} marker poses", poses.len(), detections.len());
    poses
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::PnpSolution;
    use fiducial_pose_board::build_board_layout;
    use nalgebra::{Matrix3, Vector3};
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingSolver {
        answer: Option<PnpSolution>,
        calls: RefCell<Vec<(Vec<Point3<f64>>, Vec<Point2<f64>>, Matrix3<f64>, [f64; 5])>>,
    }

    impl PnpSolver for RecordingSolver {
        fn solve(
            &self,
            object_points: &[Point3<f64>],
            image_points: &[Point2<f64>],
            camera_matrix: &Matrix3<f64>,
            dist_coeffs: &[f64; 5],
        ) -> Option<PnpSolution> {
            self.calls.borrow_mut().push((
                object_points.to_vec(),
                image_points.to_vec(),
                *camera_matrix,
                *dist_coeffs,
            ));
            self.answer
        }
    }

    fn answer() -> PnpSolution {
        PnpSolution {
            rotation: Vector3::new(0.1, 0.2, 0.3),
            translation: Vector3::new(0.0, 0.0, 0.9),
        }
    }

    fn layout() -> BoardLayout {
        build_board_layout(
            3,
            0.04,
            &[
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(0.1, 0.0, 0.0),
                Point3::new(0.0, -0.1, 0.0),
            ],
        )
        .expect("layout")
    }

    fn calibration() -> CameraCalibration {
        CameraCalibration {
            focal_length: nalgebra::Vector2::new(500.0, 510.0),
            principal_point: nalgebra::Vector2::new(320.0, 240.0),
            radial_distortion: Vector3::new(0.1, -0.2, 0.3),
            tangential_distortion: nalgebra::Vector2::new(0.01, -0.02),
            image_width: 640,
            image_height: 480,
        }
    }

    fn detection(id: u32, offset: f64) -> MarkerDetection {
        MarkerDetection {
            id,
            corners: [
                Point2::new(offset, offset),
                Point2::new(offset + 10.0, offset),
                Point2::new(offset + 10.0, offset + 10.0),
                Point2::new(offset, offset + 10.0),
            ],
        }
    }

    #[test]
    fn single_marker_gives_invalid_pose_without_solving() {
        let solver = RecordingSolver {
            answer: Some(answer()),
            ..Default::default()
        };
        let pose = estimate_pose(&[detection(1, 100.0)], &layout(), &calibration(), &solver);
        assert_eq!(pose, PoseEstimate::invalid());
        assert!(solver.calls.borrow().is_empty());
    }

    #[test]
    fn unknown_and_repeated_ids_do_not_count() {
        let solver = RecordingSolver {
            answer: Some(answer()),
            ..Default::default()
        };
        let dets = [detection(0, 10.0), detection(7, 50.0), detection(0, 90.0)];
        let pose = estimate_pose(&dets, &layout(), &calibration(), &solver);
        assert!(!pose.is_valid());
        assert!(solver.calls.borrow().is_empty());
    }

    #[test]
    fn solver_receives_ordered_correspondences_and_camera_model() {
        let solver = RecordingSolver {
            answer: Some(answer()),
            ..Default::default()
        };
        let lay = layout();
        let dets = [detection(2, 10.0), detection(9, 30.0), detection(0, 50.0)];
        let pose = estimate_pose(&dets, &lay, &calibration(), &solver);

        assert!(pose.is_valid());
        assert_eq!(pose.rotation, answer().rotation);
        assert_eq!(pose.translation, answer().translation);

        let calls = solver.calls.borrow();
        assert_eq!(calls.len(), 1);
        let (object, image, k, dist) = &calls[0];
        assert_eq!(object.len(), 8);
        assert_eq!(&object[..4], lay.corners(2).expect("marker 2").points());
        assert_eq!(&object[4..], lay.corners(0).expect("marker 0").points());
        assert_eq!(&image[..4], &dets[0].corners);
        assert_eq!(&image[4..], &dets[2].corners);
        assert_eq!(*k, calibration().intrinsics_matrix());
        assert_eq!(*dist, [0.1, -0.2, 0.01, -0.02, 0.3]);
    }

    #[test]
    fn solver_failure_is_an_invalid_pose() {
        let solver = RecordingSolver::default();
        let dets = [detection(0, 10.0), detection(1, 30.0)];
        let pose = estimate_pose(&dets, &layout(), &calibration(), &solver);
        assert_eq!(pose, PoseEstimate::invalid());
        assert_eq!(solver.calls.borrow().len(), 1);

        let nan = RecordingSolver {
            answer: Some(PnpSolution {
                rotation: Vector3::new(f64::NAN, 0.0, 0.0),
                translation: Vector3::zeros(),
            }),
            ..Default::default()
        };
        assert!(!estimate_pose(&dets, &layout(), &calibration(), &nan).is_valid());
    }

    #[test]
    fn min_markers_can_only_be_raised() {
        let solver = RecordingSolver {
            answer: Some(answer()),
            ..Default::default()
        };
        let dets = [detection(0, 10.0), detection(1, 30.0)];
        let lay = layout();
        let calib = calibration();
        assert!(!estimate_pose_with_min_markers(&dets, &lay, &calib, &solver, 3).is_valid());
        assert!(estimate_pose_with_min_markers(&dets, &lay, &calib, &solver, 0).is_valid());
    }

    #[test]
    fn marker_poses_use_the_centered_square() {
        let solver = RecordingSolver {
            answer: Some(answer()),
            ..Default::default()
        };
        let dets = [detection(4, 10.0), detection(11, 30.0)];
        let poses = estimate_marker_poses(&dets, 0.05, &calibration(), &solver);
        assert_eq!(poses.len(), 2);
        assert_eq!(poses[1].id, 11);
        assert_eq!(poses[1].as_estimate(), PoseEstimate::new(answer().rotation, answer().translation));

        let calls = solver.calls.borrow();
        assert_eq!(calls[0].0, MarkerCorners::centered(0.05).points().to_vec());
    }

    #[test]
    fn marker_poses_need_a_positive_size() {
        let solver = RecordingSolver {
            answer: Some(answer()),
            ..Default::default()
        };
        let dets = [detection(4, 10.0)];
        assert!(estimate_marker_poses(&dets, 0.0, &calibration(), &solver).is_empty());
        assert!(estimate_marker_poses(&dets, -1.0, &calibration(), &solver).is_empty());
        assert!(solver.calls.borrow().is_empty());

        let failing = RecordingSolver::default();
        assert!(estimate_marker_poses(&dets, 0.05, &calibration(), &failing).is_empty());
    }
}
