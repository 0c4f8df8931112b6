use fiducial_pose_core::ErrorKind;
use nalgebra::{Matrix3, Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Singular values below `RANK_TOLERANCE * sigma_max` count as zero.
const RANK_TOLERANCE: f64 = 1e-9;

/// Allowed deviation of `R^T R` from identity and of `det R` from 1 when a
/// transform is read back from rows.
const ROTATION_TOLERANCE: f64 = 1e-6;

/// Errors returned by [`compute_rigid_transform`].
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AlignmentError {
    #[error("point sets differ in length (a={a}, b={b})")]
    MismatchedLengths { a: usize, b: usize },
    #[error("point {index} is not finite")]
    NonFinitePoint { index: usize },
    #[error("need at least 3 correspondences, got {0}")]
    TooFewPoints(usize),
    #[error("cross-covariance has rank {rank}, need at least 2")]
    RankDeficient { rank: usize },
    #[error("svd of the cross-covariance did not converge")]
    SvdFailed,
}

/// A 4x4 matrix that is not a rigid transform.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("transform has non-finite entries")]
    NonFinite,
    #[error("bottom row must be [0, 0, 0, 1], got {0:?}")]
    BottomRow([f64; 4]),
    #[error("upper-left 3x3 block is not a rotation (det = {det})")]
    NotARotation { det: f64 },
}

impl TransformError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidArgument
    }
}

impl AlignmentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AlignmentError::MismatchedLengths { .. } | AlignmentError::NonFinitePoint { .. } => {
                ErrorKind::InvalidArgument
            }
            AlignmentError::TooFewPoints(_)
            | AlignmentError::RankDeficient { .. }
            | AlignmentError::SvdFailed => ErrorKind::DegenerateInput,
        }
    }
}

/// Homogeneous rigid transform
///
/// ```text
///   R R R t
///   R R R t
///   R R R t
///   0 0 0 1
/// ```
///
/// Serialized as four rows (row-major). Deserialization goes through
/// `TryFrom<[[f64; 4]; 4]>` and rejects anything that is not rigid.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[[f64; 4]; 4]", into = "[[f64; 4]; 4]")]
pub struct RigidTransform {
    matrix: Matrix4<f64>,
}

impl RigidTransform {
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    pub fn from_parts(rotation: &Matrix3<f64>, translation: &Vector3<f64>) -> Self {
        let mut matrix = Matrix4::identity();
        matrix.fixed_view_mut::<3, 3>(0, 0).copy_from(rotation);
        matrix.fixed_view_mut::<3, 1>(0, 3).copy_from(translation);
        Self { matrix }
    }

    #[inline]
    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    #[inline]
    pub fn rotation(&self) -> Matrix3<f64> {
        self.matrix.fixed_view::<3, 3>(0, 0).into_owned()
    }

    #[inline]
    pub fn translation(&self) -> Vector3<f64> {
        self.matrix.fixed_view::<3, 1>(0, 3).into_owned()
    }

    /// Determinant of the rotation block; `+1` up to rounding for every
    /// solver output and every deserialized value.
    pub fn determinant(&self) -> f64 {
        self.rotation().determinant()
    }

    pub fn apply(&self, p: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.rotation() * p.coords + self.translation())
    }

    /// Inverse rigid transform (`R^T, -R^T t`).
    pub fn inverse(&self) -> Self {
        let rt = self.rotation().transpose();
        Self::from_parts(&rt, &(-(rt * self.translation())))
    }

    pub fn to_row_major(&self) -> [[f64; 4]; 4] {
        let m = &self.matrix;
        std::array::from_fn(|r| std::array::from_fn(|c| m[(r, c)]))
    }
}

impl TryFrom<[[f64; 4]; 4]> for RigidTransform {
    type Error = TransformError;

    fn try_from(rows: [[f64; 4]; 4]) -> Result<Self, Self::Error> {
        if rows.iter().flatten().any(|v| !v.is_finite()) {
            return Err(TransformError::NonFinite);
        }
        if rows[3] != [0.0, 0.0, 0.0, 1.0] {
            return Err(TransformError::BottomRow(rows[3]));
        }
        let t = Self {
            matrix: Matrix4::from_fn(|r, c| rows[r][c]),
        };
        let rot = t.rotation();
        let det = rot.determinant();
        let off = (rot.transpose() * rot - Matrix3::identity()).amax();
        if off > ROTATION_TOLERANCE || (det - 1.0).abs() > ROTATION_TOLERANCE {
            return Err(TransformError::NotARotation { det });
        }
        Ok(t)
    }
}

impl From<RigidTransform> for [[f64; 4]; 4] {
    fn from(t: RigidTransform) -> Self {
        t.to_row_major()
    }
}

fn centroid(points: &[Point3<f64>]) -> Vector3<f64> {
    let sum = points
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords);
    sum / points.len() as f64
}

/// Best-fit rigid transform `T` with `T * a[i] ≈ b[i]` (Kabsch).
///
/// 1. centroids `ca`, `cb`,
/// 2. cross-covariance `H = sum (a[i] - ca)(b[i] - cb)^T`,
/// 3. `H = U S V^T` with singular values sorted descending,
/// 4. `R = V U^T`; if `det R < 0` the last column of `V` is negated and `R`
///    recomputed, so the result is never a reflection,
/// 5. `t = cb - R ca`.
///
/// Mismatched lengths and non-finite coordinates are rejected before any
/// arithmetic. Fewer than 3 points, or a cross-covariance of rank < 2
/// (coincident or collinear points), is reported as degenerate.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(points_a, points_b), fields(n = points_a.len()))
)]
pub fn compute_rigid_transform(
    points_a: &[Point3<f64>],
    points_b: &[Point3<f64>],
) -> Result<RigidTransform, AlignmentError> {
    if points_a.len() != points_b.len() {
        return Err(AlignmentError::MismatchedLengths {
            a: points_a.len(),
            b: points_b.len(),
        });
    }
    if let Some(index) = points_a
        .iter()
        .zip(points_b)
        .position(|(a, b)| !(a.coords.iter().chain(b.coords.iter()).all(|c| c.is_finite())))
    {
        return Err(AlignmentError::NonFinitePoint { index });
    }
    let n = points_a.len();
    if n < 3 {
        return Err(AlignmentError::TooFewPoints(n));
    }

    let ca = centroid(points_a);
    let cb = centroid(points_b);

    let mut h = Matrix3::<f64>::zeros();
    for (a, b) in points_a.iter().zip(points_b) {
        h += (a.coords - ca) * (b.coords - cb).transpose();
    }

    let svd = h
        .try_svd(true, true, f64::EPSILON, 0)
        .ok_or(AlignmentError::SvdFailed)?;
    let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
        return Err(AlignmentError::SvdFailed);
    };
    let sv = svd.singular_values;

    let mut order = [0usize, 1, 2];
    order.sort_by(|&i, &j| sv[j].total_cmp(&sv[i]));
    let u = Matrix3::from_columns(&order.map(|k| u.column(k).into_owned()));
    let v_unsorted = v_t.transpose();
    let mut v = Matrix3::from_columns(&order.map(|k| v_unsorted.column(k).into_owned()));

    let sigma_max = sv[order[0]];
    let rank = if sigma_max > f64::MIN_POSITIVE {
        order
            .iter()
            .filter(|&&k| sv[k] > sigma_max * RANK_TOLERANCE)
            .count()
    } else {
        0
    };
    log::debug!(
        "kabsch: n={n}, singular values=[{:.3e}, {:.3e}, {:.3e}], rank={rank}",
        sv[order[0]],
        sv[order[1]],
        sv[order[2]]
    );
    if rank < 2 {
        log::warn!("rigid alignment rejected: cross-covariance rank {rank}");
        return Err(AlignmentError::RankDeficient { rank });
    }

    let mut r = v * u.transpose();
    if r.determinant() < 0.0 {
        log::debug!("kabsch: correcting reflection");
        v.column_mut(2).neg_mut();
        r = v * u.transpose();
    }

    let t = cb - r * ca;
    Ok(RigidTransform::from_parts(&r, &t))
}
