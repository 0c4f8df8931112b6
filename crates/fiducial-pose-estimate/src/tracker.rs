//! Frame-level tracking: image source, detector and solver behind one config.

use crate::backend::{MarkerDetection, MarkerDetector, PnpSolver};
use crate::dictionary::MarkerDictionary;
use crate::estimator::{estimate_marker_poses, estimate_pose_with_min_markers, MIN_BOARD_MARKERS};
use crate::pose::{MarkerPose, PoseEstimate};
use fiducial_pose_board::{BoardError, BoardLayout, BoardSpec};
use fiducial_pose_core::{CameraCalibration, ErrorKind, ImageSource};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Board(#[from] BoardError),
    #[error("single marker size must be finite and > 0 (got {0})")]
    InvalidMarkerSize(f64),
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidArgument
    }
}

fn default_min_board_markers() -> usize {
    MIN_BOARD_MARKERS
}

/// Everything a [`BoardTracker`] needs besides its backends.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Side length of a stand-alone marker, for [`BoardTracker::detect_markers`].
    pub marker_size: f64,
    #[serde(default)]
    pub dictionary: MarkerDictionary,
    pub board: BoardSpec,
    #[serde(default = "default_min_board_markers")]
    pub min_board_markers: usize,
}

impl TrackerConfig {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Validate the config and build the board layout.
    pub fn build_layout(&self) -> Result<BoardLayout, ConfigError> {
        if !self.marker_size.is_finite() || self.marker_size <= 0.0 {
            return Err(ConfigError::InvalidMarkerSize(self.marker_size));
        }
        Ok(self.board.build()?)
    }
}

/// Board and marker tracking over an [`ImageSource`].
///
/// Immutable after construction; every call works on the frame currently
/// offered by the source.
pub struct BoardTracker<D, S> {
    config: TrackerConfig,
    layout: BoardLayout,
    detector: D,
    solver: S,
}

impl<D: MarkerDetector, S: PnpSolver> BoardTracker<D, S> {
    pub fn new(config: TrackerConfig, detector: D, solver: S) -> Result<Self, ConfigError> {
        let layout = config.build_layout()?;
        log::info!(
            "tracking {} board markers ({}), single marker size {}",
            layout.marker_count(),
            config.dictionary,
            config.marker_size
        );
        Ok(Self {
            config,
            layout,
            detector,
            solver,
        })
    }

    #[inline]
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    #[inline]
    pub fn layout(&self) -> &BoardLayout {
        &self.layout
    }

    /// Raw detections in the current frame; `None` if there is no frame.
    pub fn detections(&self, source: &dyn ImageSource) -> Option<Vec<MarkerDetection>> {
        let Some(frame) = source.frame() else {
            log::debug!("no frame available");
            return None;
        };
        let gray = match frame.to_gray() {
            Ok(gray) => gray,
            Err(e) => {
                log::warn!("frame conversion failed: {e}");
                return None;
            }
        };
        let detections = self
            .detector
            .detect_markers(&gray.view(), self.config.dictionary);
        log::debug!("{} markers detected", detections.len());
        Some(detections)
    }

    /// Pose of the whole board in the current frame.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all))]
    pub fn detect_board(
        &self,
        source: &dyn ImageSource,
        calibration: &CameraCalibration,
    ) -> PoseEstimate {
        let Some(detections) = self.detections(source) else {
            return PoseEstimate::invalid();
        };
        estimate_pose_with_min_markers(
            &detections,
            &self.layout,
            calibration,
            &self.solver,
            self.config.min_board_markers,
        )
    }

    /// Pose of each marker in the current frame, board membership ignored.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all))]
    pub fn detect_markers(
        &self,
        source: &dyn ImageSource,
        calibration: &CameraCalibration,
    ) -> Vec<MarkerPose> {
        match self.detections(source) {
            Some(detections) => estimate_marker_poses(
                &detections,
                self.config.marker_size,
                calibration,
                &self.solver,
            ),
            None => Vec::new(),
        }
    }
}
