//! Point-pair collection for display-to-camera calibration.
//!
//! Each pair maps a point expressed in the head-relative camera frame to the
//! same physical point in the head-relative marker frame. Once enough pairs
//! are gathered the rigid transform between the two frames is solved with
//! [`compute_rigid_transform`].

use crate::rigid::{compute_rigid_transform, AlignmentError, RigidTransform};
use fiducial_pose_core::ErrorKind;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Smallest target count that can ever produce a transform.
pub const MIN_CORRESPONDENCES: usize = 3;

#[derive(thiserror::Error, Debug)]
pub enum CorrespondenceError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Alignment(#[from] AlignmentError),
    #[error("target count must be at least {MIN_CORRESPONDENCES} (got {0})")]
    InvalidTargetCount(usize),
}

impl CorrespondenceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CorrespondenceError::Alignment(e) => e.kind(),
            _ => ErrorKind::InvalidArgument,
        }
    }
}

/// Matched point pairs: `camera_points[i]` corresponds to `marker_points[i]`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrespondenceSet {
    pub camera_points: Vec<Point3<f64>>,
    pub marker_points: Vec<Point3<f64>>,
}

impl CorrespondenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            camera_points: Vec::with_capacity(n),
            marker_points: Vec::with_capacity(n),
        }
    }

    pub fn push(&mut self, camera: Point3<f64>, marker: Point3<f64>) {
        self.camera_points.push(camera);
        self.marker_points.push(marker);
    }

    /// Number of complete pairs.
    ///
    /// The fields are public, so a hand-built set can have unequal halves;
    /// [`validate`](Self::validate) reports that, and [`load_json`](Self::load_json)
    /// refuses such files.
    #[inline]
    pub fn len(&self) -> usize {
        self.camera_points.len().min(self.marker_points.len())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.camera_points.clear();
        self.marker_points.clear();
    }

    /// Both halves must have the same length.
    pub fn validate(&self) -> Result<(), AlignmentError> {
        let (a, b) = (self.camera_points.len(), self.marker_points.len());
        if a != b {
            return Err(AlignmentError::MismatchedLengths { a, b });
        }
        Ok(())
    }

    /// Rigid transform taking camera-frame points onto marker-frame points.
    pub fn compute_transform(&self) -> Result<RigidTransform, AlignmentError> {
        compute_rigid_transform(&self.camera_points, &self.marker_points)
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, CorrespondenceError> {
        let raw = fs::read_to_string(path)?;
        let set: Self = serde_json::from_str(&raw)?;
        set.validate()?;
        Ok(set)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), CorrespondenceError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// Progress reported by [`CorrespondenceCollector::add`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CollectStatus {
    Collecting { collected: usize, remaining: usize },
    Complete(RigidTransform),
}

/// Accumulates pairs until `target_count` is reached, then solves.
///
/// After the solve (successful or not) the collector starts over empty.
#[derive(Clone, Debug)]
pub struct CorrespondenceCollector {
    target_count: usize,
    set: CorrespondenceSet,
}

impl CorrespondenceCollector {
    pub fn new(target_count: usize) -> Result<Self, CorrespondenceError> {
        if target_count < MIN_CORRESPONDENCES {
            return Err(CorrespondenceError::InvalidTargetCount(target_count));
        }
        Ok(Self {
            target_count,
            set: CorrespondenceSet::with_capacity(target_count),
        })
    }

    #[inline]
    pub fn target_count(&self) -> usize {
        self.target_count
    }

    #[inline]
    pub fn collected(&self) -> usize {
        self.set.len()
    }

    /// Pairs gathered so far in the current round.
    #[inline]
    pub fn pending(&self) -> &CorrespondenceSet {
        &self.set
    }

    pub fn reset(&mut self) {
        self.set.clear();
    }

    pub fn add(
        &mut self,
        camera: Point3<f64>,
        marker: Point3<f64>,
    ) -> Result<CollectStatus, CorrespondenceError> {
        self.set.push(camera, marker);
        let collected = self.set.len();
        if collected < self.target_count {
            log::debug!("correspondence {collected}/{}", self.target_count);
            return Ok(CollectStatus::Collecting {
                collected,
                remaining: self.target_count - collected,
            });
        }

        let set = std::mem::replace(
            &mut self.set,
            CorrespondenceSet::with_capacity(self.target_count),
        );
        let transform = set.compute_transform()?;
        log::info!(
            "solved rigid transform from {collected} correspondences, det(R)={:.6}",
            transform.determinant()
        );
        Ok(CollectStatus::Complete(transform))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Eye {
    Right,
    Left,
}

/// Progress reported by [`StereoCalibration::add`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StereoStatus {
    Collecting {
        eye: Eye,
        collected: usize,
        remaining: usize,
    },
    /// One eye just finished; collection moves on to the next one.
    EyeComplete { eye: Eye, transform: RigidTransform },
    /// Both eyes are calibrated.
    Complete {
        right: RigidTransform,
        left: RigidTransform,
    },
}

/// Per-eye calibration, right eye first, then left.
#[derive(Clone, Debug)]
pub struct StereoCalibration {
    right: CorrespondenceCollector,
    left: CorrespondenceCollector,
    right_transform: Option<RigidTransform>,
    left_transform: Option<RigidTransform>,
}

impl StereoCalibration {
    pub fn new(points_per_eye: usize) -> Result<Self, CorrespondenceError> {
        Ok(Self {
            right: CorrespondenceCollector::new(points_per_eye)?,
            left: CorrespondenceCollector::new(points_per_eye)?,
            right_transform: None,
            left_transform: None,
        })
    }

    /// Eye currently collecting, `None` once both are done.
    pub fn current_eye(&self) -> Option<Eye> {
        match (self.right_transform, self.left_transform) {
            (None, _) => Some(Eye::Right),
            (Some(_), None) => Some(Eye::Left),
            (Some(_), Some(_)) => None,
        }
    }

    pub fn transform(&self, eye: Eye) -> Option<RigidTransform> {
        match eye {
            Eye::Right => self.right_transform,
            Eye::Left => self.left_transform,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.current_eye().is_none()
    }

    /// Feed one pair to the eye currently collecting.
    ///
    /// Once both eyes are done further pairs are ignored and the stored
    /// transforms are returned again.
    pub fn add(
        &mut self,
        camera: Point3<f64>,
        marker: Point3<f64>,
    ) -> Result<StereoStatus, CorrespondenceError> {
        let Some(eye) = self.current_eye() else {
            return Ok(self.complete_status());
        };
        let collector = match eye {
            Eye::Right => &mut self.right,
            Eye::Left => &mut self.left,
        };

        match collector.add(camera, marker)? {
            CollectStatus::Collecting {
                collected,
                remaining,
            } => Ok(StereoStatus::Collecting {
                eye,
                collected,
                remaining,
            }),
            CollectStatus::Complete(transform) => {
                log::info!("finished calibrating {eye:?} eye");
                match eye {
                    Eye::Right => {
                        self.right_transform = Some(transform);
                        Ok(StereoStatus::EyeComplete { eye, transform })
                    }
                    Eye::Left => {
                        self.left_transform = Some(transform);
                        Ok(self.complete_status())
                    }
                }
            }
        }
    }

    fn complete_status(&self) -> StereoStatus {
        StereoStatus::Complete {
            right: self.right_transform.unwrap_or_else(RigidTransform::identity),
            left: self.left_transform.unwrap_or_else(RigidTransform::identity),
        }
    }
}
