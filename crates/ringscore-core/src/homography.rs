use nalgebra::{Matrix3, Point2, SMatrix, SVector, Vector3};
use serde::{Deserialize, Serialize};

/// Planar projective transform `dst ~ h * src`, scaled so `h[(2, 2)] == 1`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    #[inline]
    pub fn apply(&self, p: Point2<f32>) -> Point2<f32> {
        let q = self.apply_f64(Point2::new(p.x as f64, p.y as f64));
        Point2::new(q.x as f32, q.y as f32)
    }

    #[inline]
    pub fn apply_f64(&self, p: Point2<f64>) -> Point2<f64> {
        let v = self.h * Vector3::new(p.x, p.y, 1.0);
        Point2::new(v.x / v.z, v.y / v.z)
    }
}

/// Similarity moving the centroid to the origin with mean distance sqrt(2).
fn conditioning(pts: &[Point2<f32>; 4]) -> ([Point2<f64>; 4], Matrix3<f64>) {
    let p64 = pts.map(|p| Point2::new(p.x as f64, p.y as f64));
    let c = p64.iter().fold(Vector3::zeros(), |acc, p| acc + Vector3::new(p.x, p.y, 0.0)) / 4.0;
    let spread = p64.iter().map(|p| (p.x - c.x).hypot(p.y - c.y)).sum::<f64>() / 4.0;
    let s = if spread > 1e-12 {
        std::f64::consts::SQRT_2 / spread
    } else {
        1.0
    };
    let t = Matrix3::new(s, 0.0, -s * c.x, 0.0, s, -s * c.y, 0.0, 0.0, 1.0);
    let conditioned = p64.map(|p| Point2::new(s * (p.x - c.x), s * (p.y - c.y)));
    (conditioned, t)
}

/// Exact homography with `dst[k] ~ H * src[k]` for four correspondences.
///
/// Points are conditioned before solving the 8x8 system. Returns `None` when
/// the configuration is degenerate (three collinear points, repeats).
pub fn homography_from_4pt(src: &[Point2<f32>; 4], dst: &[Point2<f32>; 4]) -> Option<Homography> {
    let (s, t_src) = conditioning(src);
    let (d, t_dst) = conditioning(dst);

    // Unknowns h11..h32 with h33 = 1; two rows per correspondence.
    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();
    for k in 0..4 {
        let (x, y, u, v) = (s[k].x, s[k].y, d[k].x, d[k].y);
        let (ru, rv) = (2 * k, 2 * k + 1);
        a.row_mut(ru)
            .copy_from_slice(&[x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y]);
        a.row_mut(rv)
            .copy_from_slice(&[0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y]);
        b[ru] = u;
        b[rv] = v;
    }

    let x = a.lu().solve(&b)?;
    if x.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let hn = Matrix3::new(x[0], x[1], x[2], x[3], x[4], x[5], x[6], x[7], 1.0);

    let h = t_dst.try_inverse()? * hn * t_src;
    let scale = h[(2, 2)];
    if scale.abs() < 1e-12 {
        return None;
    }
    Some(Homography::new(h / scale))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn square(side: f32) -> [Point2<f32>; 4] {
        [
            Point2::new(0.0, 0.0),
            Point2::new(side, 0.0),
            Point2::new(side, side),
            Point2::new(0.0, side),
        ]
    }

    #[test]
    fn canonical_square_maps_onto_tilted_quad() {
        let quad = [
            Point2::new(42.0_f32, 31.0),
            Point2::new(590.0, 60.0),
            Point2::new(560.0, 470.0),
            Point2::new(70.0, 520.0),
        ];
        let h = homography_from_4pt(&square(500.0), &quad).expect("homography");
        for (c, q) in square(500.0).iter().zip(quad.iter()) {
            let p = h.apply(*c);
            assert_abs_diff_eq!(p.x, q.x, epsilon = 1e-2);
            assert_abs_diff_eq!(p.y, q.y, epsilon = 1e-2);
        }
        assert_abs_diff_eq!(h.h[(2, 2)], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn scaling_between_squares_is_affine() {
        let h = homography_from_4pt(&square(500.0), &square(1000.0)).expect("homography");
        let p = h.apply_f64(Point2::new(125.0, 250.0));
        assert_abs_diff_eq!(p.x, 250.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p.y, 500.0, epsilon = 1e-9);
        assert_abs_diff_eq!(h.h[(2, 0)], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn collinear_points_are_rejected() {
        let line = [
            Point2::new(0.0_f32, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(3.0, 0.0),
        ];
        assert!(homography_from_4pt(&line, &square(10.0)).is_none());
    }
}
