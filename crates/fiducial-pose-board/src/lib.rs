//! Rigid fiducial board geometry.
//!
//! A board is a set of square markers fixed relative to each other. Each
//! marker is described by its top-left corner (the *anchor*) and a shared
//! edge length; this crate expands that into the four 3D corners per marker
//! that a PnP solver consumes.
//!
//! All markers are assumed to share the board's orientation. Boards with
//! per-marker rotation would need a second corner per marker and are not
//! supported.

mod board;

pub use board::{build_board_layout, BoardError, BoardLayout, BoardSpec, MarkerCorners};
