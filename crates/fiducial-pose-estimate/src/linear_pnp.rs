//! Closed-form PnP: planar homography decomposition or 3D DLT.
//!
//! Image points are first mapped through `K^-1` and undistorted, so both
//! solvers work in normalized camera coordinates where `K = I`.

use crate::backend::{PnpSolution, PnpSolver};
use fiducial_pose_core::BrownConrady5;
use nalgebra::{DMatrix, DVector, Matrix3, Matrix3x4, Matrix4, Point2, Point3, Vector3, Vector4};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Linear PnP without iterative refinement.
///
/// Coplanar object points (at least 4) go through a normalized DLT homography
/// and its planar pose decomposition. Non-coplanar points (at least 6) go
/// through a normalized DLT on the 3x4 projection matrix. In both cases the
/// rotation is projected onto SO(3) and every object point must land in
/// front of the camera.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearPnpSolver {
    /// Fixed-point iterations for lens undistortion.
    pub undistort_iters: u32,
    /// Object points count as coplanar when their smallest principal spread
    /// is at most this fraction of the largest.
    pub planarity_tolerance: f64,
}

impl Default for LinearPnpSolver {
    fn default() -> Self {
        Self {
            undistort_iters: 8,
            planarity_tolerance: 1e-9,
        }
    }
}

/// Orthonormal frame of a point cloud: centroid plus principal axes
/// (columns, largest spread first, right-handed).
struct PrincipalFrame {
    origin: Vector3<f64>,
    axes: Matrix3<f64>,
    spread: [f64; 3],
}

enum ObjectShape {
    Planar(PrincipalFrame),
    General,
    Degenerate,
}

impl PnpSolver for LinearPnpSolver {
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip_all, fields(n = object_points.len()))
    )]
    fn solve(
        &self,
        object_points: &[Point3<f64>],
        image_points: &[Point2<f64>],
        camera_matrix: &Matrix3<f64>,
        dist_coeffs: &[f64; 5],
    ) -> Option<PnpSolution> {
        let n = object_points.len();
        if n != image_points.len() {
            log::warn!("pnp: {n} object points vs {} image points", image_points.len());
            return None;
        }
        if n < 4 {
            log::debug!("pnp: need at least 4 points, got {n}");
            return None;
        }
        let finite = object_points.iter().all(|p| p.coords.iter().all(|v| v.is_finite()))
            && image_points.iter().all(|p| p.coords.iter().all(|v| v.is_finite()));
        if !finite {
            log::warn!("pnp: non-finite input point");
            return None;
        }

        let k_inv = camera_matrix.try_inverse()?;
        let lens = BrownConrady5 {
            iters: self.undistort_iters,
            ..BrownConrady5::from_coefficients(dist_coeffs)
        };
        let normalized: Vec<Point2<f64>> = image_points
            .iter()
            .map(|px| {
                let v = k_inv * Vector3::new(px.x, px.y, 1.0);
                lens.undistort(&Point2::new(v.x / v.z, v.y / v.z))
            })
            .collect();

        let (r, t) = match classify(object_points, self.planarity_tolerance)? {
            ObjectShape::Planar(frame) => planar_pose(object_points, &normalized, &frame)?,
            ObjectShape::General if n >= 6 => dlt_pose(object_points, &normalized)?,
            ObjectShape::General => {
                log::debug!("pnp: non-planar object needs at least 6 points, got {n}");
                return None;
            }
            ObjectShape::Degenerate => {
                log::debug!("pnp: object points are coincident or collinear");
                return None;
            }
        };

        if object_points.iter().any(|p| (r * p.coords + t).z <= 0.0) {
            log::debug!("pnp: solution puts points behind the camera");
            return None;
        }

        let solution = PnpSolution::from_matrix(&r, t);
        solution.is_finite().then_some(solution)
    }
}

fn classify(points: &[Point3<f64>], tolerance: f64) -> Option<ObjectShape> {
    let frame = principal_frame(points)?;
    let [s0, s1, s2] = frame.spread;
    Some(if s0 <= f64::MIN_POSITIVE || s1 <= tolerance * s0 {
        ObjectShape::Degenerate
    } else if s2 <= tolerance * s0 {
        ObjectShape::Planar(frame)
    } else {
        ObjectShape::General
    })
}

fn principal_frame(points: &[Point3<f64>]) -> Option<PrincipalFrame> {
    let n = points.len();
    let origin = points.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / n as f64;
    let centered = DMatrix::from_fn(n, 3, |i, j| points[i][j] - origin[j]);
    let svd = centered.try_svd(false, true, f64::EPSILON, 0)?;
    let v_t = svd.v_t?;
    let sv = &svd.singular_values;

    let mut order = [0usize, 1, 2];
    order.sort_by(|&i, &j| sv[j].total_cmp(&sv[i]));
    let e0: Vector3<f64> = v_t.row(order[0]).transpose().fixed_rows::<3>(0).into_owned();
    let e1: Vector3<f64> = v_t.row(order[1]).transpose().fixed_rows::<3>(0).into_owned();
    let e2 = e0.cross(&e1);

    Some(PrincipalFrame {
        origin,
        axes: Matrix3::from_columns(&[e0, e1, e2]),
        spread: order.map(|k| sv[k]),
    })
}

/// Hartley normalization: centroid to the origin, mean distance `sqrt(2)`.
fn normalize_2d(pts: &[Point2<f64>]) -> Option<(Vec<Point2<f64>>, Matrix3<f64>)> {
    let n = pts.len() as f64;
    let c = pts.iter().fold(Vector3::zeros(), |acc, p| {
        acc + Vector3::new(p.x, p.y, 0.0)
    }) / n;
    let mean_dist = pts
        .iter()
        .map(|p| ((p.x - c.x).powi(2) + (p.y - c.y).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    if mean_dist <= 1e-12 {
        return None;
    }
    let s = 2f64.sqrt() / mean_dist;
    let t = Matrix3::new(s, 0.0, -s * c.x, 0.0, s, -s * c.y, 0.0, 0.0, 1.0);
    let out = pts
        .iter()
        .map(|p| Point2::new(s * (p.x - c.x), s * (p.y - c.y)))
        .collect();
    Some((out, t))
}

/// 3D counterpart of [`normalize_2d`], mean distance `sqrt(3)`.
fn normalize_3d(pts: &[Point3<f64>]) -> Option<(Vec<Point3<f64>>, Matrix4<f64>)> {
    let n = pts.len() as f64;
    let c = pts.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / n;
    let mean_dist = pts.iter().map(|p| (p.coords - c).norm()).sum::<f64>() / n;
    if mean_dist <= 1e-12 {
        return None;
    }
    let s = 3f64.sqrt() / mean_dist;
    #[rustfmt::skip]
    let t = Matrix4::new(
        s, 0.0, 0.0, -s * c.x,
        0.0, s, 0.0, -s * c.y,
        0.0, 0.0, s, -s * c.z,
        0.0, 0.0, 0.0, 1.0,
    );
    let out = pts.iter().map(|p| Point3::from((p.coords - c) * s)).collect();
    Some((out, t))
}

/// Right singular vector of the smallest singular value of `a`.
fn null_vector(a: DMatrix<f64>) -> Option<DVector<f64>> {
    let cols = a.ncols();
    let a = if a.nrows() < cols {
        let mut padded = DMatrix::zeros(cols, cols);
        padded.view_mut((0, 0), (a.nrows(), cols)).copy_from(&a);
        padded
    } else {
        a
    };
    let svd = a.try_svd(false, true, f64::EPSILON, 0)?;
    let v_t = svd.v_t?;
    let (idx, _) = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))?;
    Some(v_t.row(idx).transpose())
}

/// Closest rotation matrix in the Frobenius sense.
fn nearest_rotation(m: &Matrix3<f64>) -> Option<Matrix3<f64>> {
    let svd = m.try_svd(true, true, f64::EPSILON, 0)?;
    let mut u = svd.u?;
    let v_t = svd.v_t?;
    if (u * v_t).determinant() < 0.0 {
        u.column_mut(2).neg_mut();
    }
    Some(u * v_t)
}

/// `H` with `x_img ~ H * [x, y, 1]` from plane points to normalized image points.
fn dlt_homography(plane: &[Point2<f64>], image: &[Point2<f64>]) -> Option<Matrix3<f64>> {
    let (p, tp) = normalize_2d(plane)?;
    let (q, tq) = normalize_2d(image)?;

    let n = plane.len();
    let mut a = DMatrix::<f64>::zeros(2 * n, 9);
    for k in 0..n {
        let (x, y) = (p[k].x, p[k].y);
        let (u, v) = (q[k].x, q[k].y);

        a[(2 * k, 0)] = -x;
        a[(2 * k, 1)] = -y;
        a[(2 * k, 2)] = -1.0;
        a[(2 * k, 6)] = u * x;
        a[(2 * k, 7)] = u * y;
        a[(2 * k, 8)] = u;

        a[(2 * k + 1, 3)] = -x;
        a[(2 * k + 1, 4)] = -y;
        a[(2 * k + 1, 5)] = -1.0;
        a[(2 * k + 1, 6)] = v * x;
        a[(2 * k + 1, 7)] = v * y;
        a[(2 * k + 1, 8)] = v;
    }

    let h = null_vector(a)?;
    let hn = Matrix3::from_row_slice(h.as_slice());
    Some(tq.try_inverse()? * hn * tp)
}

fn planar_pose(
    object: &[Point3<f64>],
    image: &[Point2<f64>],
    frame: &PrincipalFrame,
) -> Option<(Matrix3<f64>, Vector3<f64>)> {
    // object points in the plane frame (z is ~0)
    let plane: Vec<Point2<f64>> = object
        .iter()
        .map(|p| {
            let q = frame.axes.transpose() * (p.coords - frame.origin);
            Point2::new(q.x, q.y)
        })
        .collect();

    let h = dlt_homography(&plane, image)?;
    let h1 = h.column(0).into_owned();
    let h2 = h.column(1).into_owned();
    let h3 = h.column(2).into_owned();

    let denom = 0.5 * (h1.norm() + h2.norm());
    if denom <= 1e-12 {
        return None;
    }
    let mut lambda = 1.0 / denom;
    // the plane origin is the object centroid, which must be in front
    if h3.z < 0.0 {
        lambda = -lambda;
    }
    let r1 = h1 * lambda;
    let r2 = h2 * lambda;
    let t_plane = h3 * lambda;
    let r3 = r1.cross(&r2);
    if r3.norm() <= 1e-12 {
        return None;
    }

    let r_plane = nearest_rotation(&Matrix3::from_columns(&[r1, r2, r3]))?;
    let r = r_plane * frame.axes.transpose();
    let t = t_plane - r * frame.origin;
    Some((r, t))
}

fn dlt_pose(
    object: &[Point3<f64>],
    image: &[Point2<f64>],
) -> Option<(Matrix3<f64>, Vector3<f64>)> {
    let (x, tx) = normalize_3d(object)?;
    let (q, tq) = normalize_2d(image)?;

    let n = object.len();
    let mut a = DMatrix::<f64>::zeros(2 * n, 12);
    for k in 0..n {
        let p = Vector4::new(x[k].x, x[k].y, x[k].z, 1.0);
        let (u, v) = (q[k].x, q[k].y);
        for j in 0..4 {
            a[(2 * k, j)] = p[j];
            a[(2 * k, 8 + j)] = -u * p[j];
            a[(2 * k + 1, 4 + j)] = p[j];
            a[(2 * k + 1, 8 + j)] = -v * p[j];
        }
    }

    let pv = null_vector(a)?;
    let pn = Matrix3x4::from_row_slice(pv.as_slice());
    let mut p = tq.try_inverse()? * pn * tx;

    let mut m = p.fixed_view::<3, 3>(0, 0).into_owned();
    if m.determinant() < 0.0 {
        p = -p;
        m = -m;
    }
    let scale = (m.row(0).norm() + m.row(1).norm() + m.row(2).norm()) / 3.0;
    if scale <= 1e-12 {
        return None;
    }

    let r = nearest_rotation(&(m / scale))?;
    let t = p.column(3).into_owned() / scale;
    Some((r, t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Rotation3;

    fn camera() -> (Matrix3<f64>, [f64; 5]) {
        let k = Matrix3::new(820.0, 0.0, 640.0, 0.0, 815.0, 360.0, 0.0, 0.0, 1.0);
        (k, [-0.08, 0.02, 0.0004, -0.0003, 0.0])
    }

    fn project(
        k: &Matrix3<f64>,
        dist: &[f64; 5],
        r: &Matrix3<f64>,
        t: &Vector3<f64>,
        object: &[Point3<f64>],
    ) -> Vec<Point2<f64>> {
        let lens = BrownConrady5::from_coefficients(dist);
        object
            .iter()
            .map(|p| {
                let c = r * p.coords + t;
                let d = lens.distort(&Point2::new(c.x / c.z, c.y / c.z));
                let px = k * Vector3::new(d.x, d.y, 1.0);
                Point2::new(px.x, px.y)
            })
            .collect()
    }

    fn assert_pose(sol: &PnpSolution, r: &Matrix3<f64>, t: &Vector3<f64>) {
        let r_est = *Rotation3::new(sol.rotation).matrix();
        assert_relative_eq!(r_est, *r, epsilon = 1e-6);
        assert_relative_eq!(sol.translation, *t, epsilon = 1e-6);
    }

    fn board_points(z: f64) -> Vec<Point3<f64>> {
        let mut pts = Vec::new();
        for (ax, ay) in [(-0.1, 0.1), (0.05, 0.1), (0.05, -0.05), (-0.1, -0.05)] {
            for (dx, dy) in [(0.0, 0.0), (0.04, 0.0), (0.04, -0.04), (0.0, -0.04)] {
                pts.push(Point3::new(ax + dx, ay + dy, z));
            }
        }
        pts
    }

    #[test]
    fn planar_board_pose_is_recovered() {
        let (k, dist) = camera();
        let r = *Rotation3::from_euler_angles(0.3, -0.2, 0.1).matrix();
        let t = Vector3::new(0.05, -0.02, 0.8);
        for z in [0.0, 0.03] {
            let object = board_points(z);
            let image = project(&k, &dist, &r, &t, &object);
            let sol = LinearPnpSolver::default()
                .solve(&object, &image, &k, &dist)
                .expect("pose");
            assert_pose(&sol, &r, &t);
        }
    }

    #[test]
    fn single_square_is_enough_for_a_planar_pose() {
        let (k, dist) = camera();
        let r = *Rotation3::from_euler_angles(-0.4, 0.1, 0.7).matrix();
        let t = Vector3::new(-0.03, 0.01, 0.5);
        let h = 0.025;
        let object = [
            Point3::new(-h, h, 0.0),
            Point3::new(h, h, 0.0),
            Point3::new(h, -h, 0.0),
            Point3::new(-h, -h, 0.0),
        ];
        let image = project(&k, &dist, &r, &t, &object);
        let sol = LinearPnpSolver::default()
            .solve(&object, &image, &k, &dist)
            .expect("pose");
        assert_pose(&sol, &r, &t);
    }

    #[test]
    fn tilted_plane_is_detected_as_planar() {
        let (k, _) = camera();
        let dist = [0.0; 5];
        let tilt = *Rotation3::from_euler_angles(0.5, 0.4, 0.0).matrix();
        let object: Vec<_> = board_points(0.0)
            .into_iter()
            .map(|p| Point3::from(tilt * p.coords))
            .collect();
        let r = *Rotation3::from_euler_angles(0.1, 0.2, 0.3).matrix();
        let t = Vector3::new(0.0, 0.0, 1.0);
        let image = project(&k, &dist, &r, &t, &object);
        let sol = LinearPnpSolver::default()
            .solve(&object, &image, &k, &dist)
            .expect("pose");
        assert_pose(&sol, &r, &t);
    }

    #[test]
    fn non_coplanar_points_use_dlt() {
        let (k, dist) = camera();
        let object = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.1, 0.0, 0.02),
            Point3::new(0.0, 0.1, -0.03),
            Point3::new(0.1, 0.1, 0.05),
            Point3::new(-0.05, 0.07, 0.1),
            Point3::new(0.08, -0.06, -0.04),
            Point3::new(-0.07, -0.02, 0.06),
            Point3::new(0.03, 0.12, 0.0),
        ];
        let r = *Rotation3::from_euler_angles(0.2, 0.3, -0.1).matrix();
        let t = Vector3::new(0.01, 0.02, 0.7);
        let image = project(&k, &dist, &r, &t, &object);
        let sol = LinearPnpSolver::default()
            .solve(&object, &image, &k, &dist)
            .expect("pose");
        assert_pose(&sol, &r, &t);
    }

    #[test]
    fn degenerate_inputs_give_no_pose() {
        let (k, dist) = camera();
        let solver = LinearPnpSolver::default();
        let object = board_points(0.0);
        let image = project(&k, &dist, &Matrix3::identity(), &Vector3::new(0.0, 0.0, 1.0), &object);

        // too few points
        assert!(solver.solve(&object[..3], &image[..3], &k, &dist).is_none());
        // length mismatch
        assert!(solver.solve(&object, &image[..8], &k, &dist).is_none());
        // singular intrinsics
        assert!(solver.solve(&object, &image, &Matrix3::zeros(), &dist).is_none());

        // collinear object points
        let line: Vec<_> = (0..6).map(|i| Point3::new(i as f64 * 0.01, 0.0, 0.0)).collect();
        let line_img: Vec<_> = (0..6).map(|i| Point2::new(600.0 + i as f64 * 8.0, 360.0)).collect();
        assert!(solver.solve(&line, &line_img, &k, &dist).is_none());

        // five non-coplanar points are not enough for the DLT
        let object5 = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.1, 0.0, 0.02),
            Point3::new(0.0, 0.1, -0.03),
            Point3::new(0.1, 0.1, 0.05),
            Point3::new(-0.05, 0.07, 0.1),
        ];
        let image5 = project(&k, &dist, &Matrix3::identity(), &Vector3::new(0.0, 0.0, 1.0), &object5);
        assert!(solver.solve(&object5, &image5, &k, &dist).is_none());
    }
}
