//! Board specification and marker corner layout.

use fiducial_pose_core::ErrorKind;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Four marker corners in board-local coordinates.
///
/// Order is clockwise starting at the top-left corner, with `+x` to the right
/// and `+y` up:
///
/// ```text
///   0 ______ 1
///    |      |
///    |      |
///    |______|
///   3        2
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkerCorners(pub [Point3<f64>; 4]);

impl MarkerCorners {
    /// Square of side `edge` whose top-left corner is `anchor`.
    pub fn from_top_left(anchor: Point3<f64>, edge: f64) -> Self {
        Self([
            anchor,
            anchor + Vector3::new(edge, 0.0, 0.0),
            anchor + Vector3::new(edge, -edge, 0.0),
            anchor + Vector3::new(0.0, -edge, 0.0),
        ])
    }

    /// Square of side `edge` centered on the origin of its own frame.
    ///
    /// This is the object geometry used for single-marker pose estimation.
    pub fn centered(edge: f64) -> Self {
        let h = edge * 0.5;
        Self([
            Point3::new(-h, h, 0.0),
            Point3::new(h, h, 0.0),
            Point3::new(h, -h, 0.0),
            Point3::new(-h, -h, 0.0),
        ])
    }

    #[inline]
    pub fn points(&self) -> &[Point3<f64>; 4] {
        &self.0
    }

    /// Lengths of the four edges `0-1, 1-2, 2-3, 3-0`.
    pub fn edge_lengths(&self) -> [f64; 4] {
        let p = &self.0;
        [
            (p[1] - p[0]).norm(),
            (p[2] - p[1]).norm(),
            (p[3] - p[2]).norm(),
            (p[0] - p[3]).norm(),
        ]
    }

    pub fn center(&self) -> Point3<f64> {
        let sum = self
            .0
            .iter()
            .fold(Vector3::zeros(), |acc, p| acc + p.coords);
        Point3::from(sum / 4.0)
    }
}

/// Board layout validation errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum BoardError {
    #[error("board needs at least one marker")]
    NoMarkers,
    #[error("marker edge length must be finite and > 0 (got {0})")]
    InvalidEdgeLength(f64),
    #[error("board has {expected} markers but {got} anchor points")]
    AnchorCountMismatch { expected: usize, got: usize },
    #[error("anchor point {index} is not finite")]
    NonFiniteAnchor { index: usize },
}

impl BoardError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidArgument
    }
}

/// Serializable board description: one top-left anchor per marker.
///
/// Marker ids are implicit: the anchor at index `i` belongs to marker `i`.
/// Every marker shares the board orientation; boards whose markers are
/// rotated relative to each other cannot be expressed with a single anchor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoardSpec {
    /// Marker side length, in the same units as the anchors.
    pub marker_edge_length: f64,
    /// Top-left corner of each marker in board coordinates.
    pub anchors: Vec<Point3<f64>>,
}

impl BoardSpec {
    #[inline]
    pub fn marker_count(&self) -> usize {
        self.anchors.len()
    }

    /// Validate and build the corner layout.
    pub fn build(&self) -> Result<BoardLayout, BoardError> {
        build_board_layout(self.marker_count(), self.marker_edge_length, &self.anchors)
    }
}

/// Known 3D corner geometry of every marker on a rigid board.
///
/// Built once at configuration time and shared read-only afterwards.
#[derive(Clone, Debug, Serialize)]
pub struct BoardLayout {
    marker_edge_length: f64,
    ids: Vec<u32>,
    corners: Vec<MarkerCorners>,
    #[serde(skip)]
    index: HashMap<u32, usize>,
}

impl BoardLayout {
    /// Marker ids in board order.
    #[inline]
    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    #[inline]
    pub fn marker_count(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn marker_edge_length(&self) -> f64 {
        self.marker_edge_length
    }

    #[inline]
    pub fn contains(&self, id: u32) -> bool {
        self.index.contains_key(&id)
    }

    /// Corner set for a marker id, if it is part of this board.
    pub fn corners(&self, id: u32) -> Option<&MarkerCorners> {
        self.index.get(&id).map(|&i| &self.corners[i])
    }

    /// `(id, corners)` pairs in board order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &MarkerCorners)> + '_ {
        self.ids.iter().copied().zip(self.corners.iter())
    }
}

/// Build a board layout from per-marker top-left anchors.
///
/// Marker `i` gets id `i` and the corners
/// `P, P + (s, 0, 0), P + (s, -s, 0), P + (0, -s, 0)` where `P` is
/// `anchors[i]` and `s` is `marker_edge_length`.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(anchors), fields(anchors = anchors.len()))
)]
pub fn build_board_layout(
    marker_count: usize,
    marker_edge_length: f64,
    anchors: &[Point3<f64>],
) -> Result<BoardLayout, BoardError> {
    if marker_count == 0 {
        return Err(BoardError::NoMarkers);
    }
    if anchors.len() != marker_count {
        return Err(BoardError::AnchorCountMismatch {
            expected: marker_count,
            got: anchors.len(),
        });
    }
    if !marker_edge_length.is_finite() || marker_edge_length <= 0.0 {
        return Err(BoardError::InvalidEdgeLength(marker_edge_length));
    }
    if let Some(index) = anchors
        .iter()
        .position(|p| !p.coords.iter().all(|c| c.is_finite()))
    {
        return Err(BoardError::NonFiniteAnchor { index });
    }

    let mut ids = Vec::with_capacity(marker_count);
    let mut corners = Vec::with_capacity(marker_count);
    let mut index = HashMap::with_capacity(marker_count);
    for (i, anchor) in anchors.iter().enumerate() {
        let id = i as u32;
        let set = MarkerCorners::from_top_left(*anchor, marker_edge_length);
        log::debug!("board marker {id}: {:?}", set.points());
        ids.push(id);
        corners.push(set);
        index.insert(id, i);
    }

    Ok(BoardLayout {
        marker_edge_length,
        ids,
        corners,
        index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn four_marker_anchors() -> Vec<Point3<f64>> {
        // four markers on the corners of a ~15 cm square, in meters
        vec![
            Point3::new(-0.0956, 0.0893, 0.0),
            Point3::new(0.0574, 0.0893, 0.0),
            Point3::new(0.0568, -0.0628, 0.0),
            Point3::new(-0.0952, -0.0631, 0.0),
        ]
    }

    #[test]
    fn corners_follow_clockwise_top_left_order() {
        let layout = build_board_layout(1, 2.0, &[Point3::new(1.0, 5.0, 3.0)]).expect("layout");
        let c = layout.corners(0).expect("marker 0");
        assert_eq!(
            c.points(),
            &[
                Point3::new(1.0, 5.0, 3.0),
                Point3::new(3.0, 5.0, 3.0),
                Point3::new(3.0, 3.0, 3.0),
                Point3::new(1.0, 3.0, 3.0),
            ]
        );
    }

    #[test]
    fn every_marker_is_a_planar_square() {
        let s = 0.04;
        let anchors = four_marker_anchors();
        let layout = build_board_layout(anchors.len(), s, &anchors).expect("layout");
        assert_eq!(layout.marker_count(), 4);
        assert_eq!(layout.ids(), &[0, 1, 2, 3]);

        for (id, corners) in layout.iter() {
            let p = corners.points();
            assert_eq!(p[0], anchors[id as usize]);
            assert!(p.iter().all(|c| c.z == p[0].z), "marker {id} not planar");
            for edge in corners.edge_lengths() {
                assert_relative_eq!(edge, s, epsilon = 1e-12);
            }
            assert_relative_eq!((p[2] - p[0]).norm(), s * 2f64.sqrt(), epsilon = 1e-12);
            assert_relative_eq!((p[3] - p[1]).norm(), s * 2f64.sqrt(), epsilon = 1e-12);
        }
    }

    #[test]
    fn rejects_invalid_arguments() {
        let anchors = four_marker_anchors();
        assert_eq!(
            build_board_layout(0, 0.04, &[]).unwrap_err(),
            BoardError::NoMarkers
        );
        assert_eq!(
            build_board_layout(3, 0.04, &anchors).unwrap_err(),
            BoardError::AnchorCountMismatch {
                expected: 3,
                got: 4
            }
        );
        let err = build_board_layout(4, 0.0, &anchors).unwrap_err();
        assert_eq!(err, BoardError::InvalidEdgeLength(0.0));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(build_board_layout(4, -1.0, &anchors).is_err());
        assert!(build_board_layout(4, f64::NAN, &anchors).is_err());

        let mut bad = anchors.clone();
        bad[2].x = f64::INFINITY;
        assert_eq!(
            build_board_layout(4, 0.04, &bad).unwrap_err(),
            BoardError::NonFiniteAnchor { index: 2 }
        );
    }

    #[test]
    fn unknown_ids_are_not_part_of_the_board() {
        let anchors = four_marker_anchors();
        let layout = build_board_layout(4, 0.04, &anchors).expect("layout");
        assert!(layout.contains(3));
        assert!(!layout.contains(4));
        assert!(layout.corners(17).is_none());
    }

    #[test]
    fn centered_square_has_origin_center() {
        let c = MarkerCorners::centered(0.08);
        assert_eq!(c.center(), Point3::origin());
        assert_eq!(c.points()[0], Point3::new(-0.04, 0.04, 0.0));
        for edge in c.edge_lengths() {
            assert_relative_eq!(edge, 0.08, epsilon = 1e-12);
        }
    }

    #[test]
    fn spec_deserializes_and_builds() {
        let raw = r#"{
            "marker_edge_length": 0.04,
            "anchors": [[0.0, 0.0, 0.0], [0.1, 0.0, 0.0]]
        }"#;
        let spec: BoardSpec = serde_json::from_str(raw).expect("spec");
        assert_eq!(spec.marker_count(), 2);
        let layout = spec.build().expect("layout");
        assert_eq!(
            layout.corners(1).expect("marker 1").points()[2],
            Point3::new(0.14, -0.04, 0.0)
        );
    }
}
