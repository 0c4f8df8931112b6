//! Predefined ArUco/AprilTag dictionary names.
//!
//! Only the identity of a dictionary lives here; the bit patterns belong to
//! whichever [`MarkerDetector`](crate::MarkerDetector) backend decodes them.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarkerDictionary {
    #[serde(rename = "dict_4x4_50")]
    Dict4x4_50,
    #[serde(rename = "dict_4x4_100")]
    Dict4x4_100,
    #[serde(rename = "dict_4x4_250")]
    Dict4x4_250,
    #[serde(rename = "dict_4x4_1000")]
    Dict4x4_1000,
    #[serde(rename = "dict_5x5_50")]
    Dict5x5_50,
    #[serde(rename = "dict_5x5_100")]
    Dict5x5_100,
    #[serde(rename = "dict_5x5_250")]
    Dict5x5_250,
    #[serde(rename = "dict_5x5_1000")]
    Dict5x5_1000,
    #[default]
    #[serde(rename = "dict_6x6_50")]
    Dict6x6_50,
    #[serde(rename = "dict_6x6_100")]
    Dict6x6_100,
    #[serde(rename = "dict_6x6_250")]
    Dict6x6_250,
    #[serde(rename = "dict_6x6_1000")]
    Dict6x6_1000,
    #[serde(rename = "dict_7x7_50")]
    Dict7x7_50,
    #[serde(rename = "dict_7x7_100")]
    Dict7x7_100,
    #[serde(rename = "dict_7x7_250")]
    Dict7x7_250,
    #[serde(rename = "dict_7x7_1000")]
    Dict7x7_1000,
    #[serde(rename = "aruco_original")]
    ArucoOriginal,
    #[serde(rename = "apriltag_16h5")]
    AprilTag16h5,
    #[serde(rename = "apriltag_25h9")]
    AprilTag25h9,
    #[serde(rename = "apriltag_36h10")]
    AprilTag36h10,
    #[serde(rename = "apriltag_36h11")]
    AprilTag36h11,
}

impl MarkerDictionary {
    /// All dictionaries, in OpenCV predefined-id order.
    pub const ALL: [MarkerDictionary; 21] = [
        Self::Dict4x4_50,
        Self::Dict4x4_100,
        Self::Dict4x4_250,
        Self::Dict4x4_1000,
        Self::Dict5x5_50,
        Self::Dict5x5_100,
        Self::Dict5x5_250,
        Self::Dict5x5_1000,
        Self::Dict6x6_50,
        Self::Dict6x6_100,
        Self::Dict6x6_250,
        Self::Dict6x6_1000,
        Self::Dict7x7_50,
        Self::Dict7x7_100,
        Self::Dict7x7_250,
        Self::Dict7x7_1000,
        Self::ArucoOriginal,
        Self::AprilTag16h5,
        Self::AprilTag25h9,
        Self::AprilTag36h10,
        Self::AprilTag36h11,
    ];

    /// OpenCV `PREDEFINED_DICTIONARY_NAME` value.
    #[inline]
    pub fn opencv_id(self) -> u32 {
        self as u32
    }

    pub fn from_opencv_id(id: u32) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    /// Name as used by OpenCV, e.g. `DICT_6X6_50`.
    pub fn name(self) -> &'static str {
        match self {
            Self::Dict4x4_50 => "DICT_4X4_50",
            Self::Dict4x4_100 => "DICT_4X4_100",
            Self::Dict4x4_250 => "DICT_4X4_250",
            Self::Dict4x4_1000 => "DICT_4X4_1000",
            Self::Dict5x5_50 => "DICT_5X5_50",
            Self::Dict5x5_100 => "DICT_5X5_100",
            Self::Dict5x5_250 => "DICT_5X5_250",
            Self::Dict5x5_1000 => "DICT_5X5_1000",
            Self::Dict6x6_50 => "DICT_6X6_50",
            Self::Dict6x6_100 => "DICT_6X6_100",
            Self::Dict6x6_250 => "DICT_6X6_250",
            Self::Dict6x6_1000 => "DICT_6X6_1000",
            Self::Dict7x7_50 => "DICT_7X7_50",
            Self::Dict7x7_100 => "DICT_7X7_100",
            Self::Dict7x7_250 => "DICT_7X7_250",
            Self::Dict7x7_1000 => "DICT_7X7_1000",
            Self::ArucoOriginal => "DICT_ARUCO_ORIGINAL",
            Self::AprilTag16h5 => "DICT_APRILTAG_16h5",
            Self::AprilTag25h9 => "DICT_APRILTAG_25h9",
            Self::AprilTag36h10 => "DICT_APRILTAG_36h10",
            Self::AprilTag36h11 => "DICT_APRILTAG_36h11",
        }
    }

    /// Inner bits per marker side.
    pub fn marker_bits(self) -> usize {
        match self {
            Self::Dict4x4_50 | Self::Dict4x4_100 | Self::Dict4x4_250 | Self::Dict4x4_1000 => 4,
            Self::Dict5x5_50 | Self::Dict5x5_100 | Self::Dict5x5_250 | Self::Dict5x5_1000 => 5,
            Self::Dict6x6_50 | Self::Dict6x6_100 | Self::Dict6x6_250 | Self::Dict6x6_1000 => 6,
            Self::Dict7x7_50 | Self::Dict7x7_100 | Self::Dict7x7_250 | Self::Dict7x7_1000 => 7,
            Self::ArucoOriginal => 5,
            Self::AprilTag16h5 => 4,
            Self::AprilTag25h9 => 5,
            Self::AprilTag36h10 | Self::AprilTag36h11 => 6,
        }
    }

    /// Number of distinct marker ids.
    pub fn marker_count(self) -> usize {
        match self {
            Self::Dict4x4_50 | Self::Dict5x5_50 | Self::Dict6x6_50 | Self::Dict7x7_50 => 50,
            Self::Dict4x4_100 | Self::Dict5x5_100 | Self::Dict6x6_100 | Self::Dict7x7_100 => 100,
            Self::Dict4x4_250 | Self::Dict5x5_250 | Self::Dict6x6_250 | Self::Dict7x7_250 => 250,
            Self::Dict4x4_1000 | Self::Dict5x5_1000 | Self::Dict6x6_1000 | Self::Dict7x7_1000 => {
                1000
            }
            Self::ArucoOriginal => 1024,
            Self::AprilTag16h5 => 30,
            Self::AprilTag25h9 => 35,
            Self::AprilTag36h10 => 2320,
            Self::AprilTag36h11 => 587,
        }
    }

    #[inline]
    pub fn contains(self, id: u32) -> bool {
        (id as usize) < self.marker_count()
    }
}

impl std::fmt::Display for MarkerDictionary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
