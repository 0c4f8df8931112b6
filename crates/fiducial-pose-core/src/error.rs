use serde::{Deserialize, Serialize};

/// Coarse classification shared by every error type in the workspace.
///
/// Callers that only care about *how* to react (fix the input, skip the
/// frame, gather more points) can match on this instead of the concrete
/// error enums.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Shape/count mismatch or non-positive dimension. Caller error.
    InvalidArgument,
    /// Not enough rank or spread in the input for a unique solution.
    DegenerateInput,
    /// No pose could be produced for this frame.
    NoPoseFound,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::DegenerateInput => "degenerate input",
            ErrorKind::NoPoseFound => "no pose found",
        };
        f.write_str(name)
    }
}
