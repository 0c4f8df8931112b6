use nalgebra::Point2;
use serde::{Deserialize, Serialize};

const DEFAULT_UNDISTORT_ITERS: u32 = 8;

/// Brown–Conrady lens model with three radial and two tangential terms.
///
/// Operates on normalized image coordinates (`K^-1 * [u, v, 1]`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BrownConrady5 {
    pub k1: f64,
    pub k2: f64,
    pub k3: f64,
    pub p1: f64,
    pub p2: f64,
    /// Fixed-point iterations used by [`BrownConrady5::undistort`]; `0` means default.
    #[serde(default)]
    pub iters: u32,
}

impl BrownConrady5 {
    /// Build from a `[k1, k2, p1, p2, k3]` coefficient vector.
    pub fn from_coefficients(c: &[f64; 5]) -> Self {
        Self {
            k1: c[0],
            k2: c[1],
            p1: c[2],
            p2: c[3],
            k3: c[4],
            iters: DEFAULT_UNDISTORT_ITERS,
        }
    }

    fn distort_impl(&self, x: f64, y: f64) -> (f64, f64) {
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;

        let radial = 1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6;

        let x_tan = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
        let y_tan = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;

        (x * radial + x_tan, y * radial + y_tan)
    }

    /// Apply the lens model to an ideal normalized point.
    pub fn distort(&self, p: &Point2<f64>) -> Point2<f64> {
        let (x, y) = self.distort_impl(p.x, p.y);
        Point2::new(x, y)
    }

    /// Invert the lens model by fixed-point iteration.
    pub fn undistort(&self, p: &Point2<f64>) -> Point2<f64> {
        let mut x = p.x;
        let mut y = p.y;

        let iters = if self.iters == 0 {
            DEFAULT_UNDISTORT_ITERS
        } else {
            self.iters
        };
        for _ in 0..iters {
            let (xd, yd) = self.distort_impl(x, y);
            x -= xd - p.x;
            y -= yd - p.y;
        }
        Point2::new(x, y)
    }
}
