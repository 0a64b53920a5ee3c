//! Contour geometry: polygon simplification, convexity, enclosing circles.
//!
//! Contours are closed point sequences in image coordinates (the last point
//! connects back to the first).

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// A circle in image coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub center: Point2<f32>,
    pub radius: f32,
}

/// Closed-polygon perimeter.
pub fn perimeter(poly: &[Point2<f32>]) -> f32 {
    closed_edges(poly).map(|(a, b)| (b - a).norm()).sum()
}

/// Length of the shortest edge of a closed polygon (0 for fewer than 2 points).
pub fn min_edge_length(poly: &[Point2<f32>]) -> f32 {
    if poly.len() < 2 {
        return 0.0;
    }
    closed_edges(poly)
        .map(|(a, b)| (b - a).norm())
        .fold(f32::INFINITY, f32::min)
}

/// True when every turn of the closed polygon has the same orientation.
///
/// Collinear vertices are tolerated; polygons with fewer than 3 points are not convex.
pub fn is_convex(poly: &[Point2<f32>]) -> bool {
    let n = poly.len();
    if n < 3 {
        return false;
    }
    let mut sign = 0i8;
    for i in 0..n {
        let a = poly[i];
        let b = poly[(i + 1) % n];
        let c = poly[(i + 2) % n];
        let cross = (b.x - a.x) * (c.y - b.y) - (b.y - a.y) * (c.x - b.x);
        let s = if cross > 0.0 {
            1
        } else if cross < 0.0 {
            -1
        } else {
            0
        };
        if s == 0 {
            continue;
        }
        if sign == 0 {
            sign = s;
        } else if s != sign {
            return false;
        }
    }
    sign != 0
}

/// Douglas-Peucker simplification of a closed contour.
///
/// The contour is split at its two mutually farthest points and each chain is
/// simplified independently, so the result does not depend on where the
/// contour tracing started. Vertices are returned in contour order.
pub fn approx_poly_closed(contour: &[Point2<f32>], epsilon: f32) -> Vec<Point2<f32>> {
    let n = contour.len();
    if n < 3 {
        return contour.to_vec();
    }

    let a = farthest_from(contour, contour[0]);
    let b = farthest_from(contour, contour[a]);
    if (contour[b] - contour[a]).norm() <= epsilon {
        return vec![contour[a]];
    }

    let mut keep = vec![false; n];
    keep[a] = true;
    keep[b] = true;
    simplify_chain(contour, a, b, epsilon, &mut keep);
    simplify_chain(contour, b, a, epsilon, &mut keep);

    (0..n)
        .map(|k| (a + k) % n)
        .filter(|&i| keep[i])
        .map(|i| contour[i])
        .collect()
}

/// Smallest circle containing every point, or `None` for an empty input.
///
/// Incremental Welzl construction over a fixed-seed shuffle of the input,
/// which keeps the expected running time linear for traced contours.
pub fn min_enclosing_circle(points: &[Point2<f32>]) -> Option<Circle> {
    if points.is_empty() {
        return None;
    }
    let mut pts: Vec<Point2<f64>> = points
        .iter()
        .map(|p| Point2::new(p.x as f64, p.y as f64))
        .collect();
    shuffle(&mut pts);

    let mut c = Disc {
        center: pts[0],
        radius: 0.0,
    };
    for i in 1..pts.len() {
        if c.contains(pts[i]) {
            continue;
        }
        c = Disc {
            center: pts[i],
            radius: 0.0,
        };
        for j in 0..i {
            if c.contains(pts[j]) {
                continue;
            }
            c = Disc::from_pair(pts[i], pts[j]);
            for k in 0..j {
                if !c.contains(pts[k]) {
                    c = Disc::from_triple(pts[i], pts[j], pts[k]);
                }
            }
        }
    }

    Some(Circle {
        center: Point2::new(c.center.x as f32, c.center.y as f32),
        radius: c.radius as f32,
    })
}

#[derive(Clone, Copy, Debug)]
struct Disc {
    center: Point2<f64>,
    radius: f64,
}

impl Disc {
    fn contains(&self, p: Point2<f64>) -> bool {
        (p - self.center).norm() <= self.radius * (1.0 + 1e-9) + 1e-9
    }

    fn from_pair(a: Point2<f64>, b: Point2<f64>) -> Self {
        let center = Point2::new(0.5 * (a.x + b.x), 0.5 * (a.y + b.y));
        Self {
            center,
            radius: 0.5 * (b - a).norm(),
        }
    }

    fn from_triple(a: Point2<f64>, b: Point2<f64>, c: Point2<f64>) -> Self {
        let bx = b.x - a.x;
        let by = b.y - a.y;
        let cx = c.x - a.x;
        let cy = c.y - a.y;
        let d = 2.0 * (bx * cy - by * cx);
        if d.abs() < 1e-12 {
            // Collinear: the widest pair spans the other point.
            return [(a, b), (a, c), (b, c)]
                .into_iter()
                .map(|(p, q)| Self::from_pair(p, q))
                .fold(Self::from_pair(a, a), |best, cand| {
                    if cand.radius > best.radius {
                        cand
                    } else {
                        best
                    }
                });
        }
        let b2 = bx * bx + by * by;
        let c2 = cx * cx + cy * cy;
        let ux = (cy * b2 - by * c2) / d;
        let uy = (bx * c2 - cx * b2) / d;
        Self {
            center: Point2::new(a.x + ux, a.y + uy),
            radius: ux.hypot(uy),
        }
    }
}

fn shuffle<T>(items: &mut [T]) {
    let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
    for i in (1..items.len()).rev() {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        let j = (state % (i as u64 + 1)) as usize;
        items.swap(i, j);
    }
}

fn closed_edges(
    poly: &[Point2<f32>],
) -> impl Iterator<Item = (Point2<f32>, Point2<f32>)> + '_ {
    let n = poly.len();
    (0..n).map(move |i| (poly[i], poly[(i + 1) % n]))
}

fn farthest_from(pts: &[Point2<f32>], origin: Point2<f32>) -> usize {
    let mut best = (0usize, -1.0f32);
    for (i, p) in pts.iter().enumerate() {
        let d = (p - origin).norm_squared();
        if d > best.1 {
            best = (i, d);
        }
    }
    best.0
}

fn simplify_chain(pts: &[Point2<f32>], start: usize, end: usize, eps: f32, keep: &mut [bool]) {
    let n = pts.len();
    let mut stack = vec![(start, end)];
    while let Some((s, e)) = stack.pop() {
        let span = (e + n - s) % n;
        if span < 2 {
            continue;
        }
        let (p, q) = (pts[s], pts[e]);
        let mut best = (0.0f32, s);
        for k in 1..span {
            let i = (s + k) % n;
            let d = distance_to_line(pts[i], p, q);
            if d > best.0 {
                best = (d, i);
            }
        }
        if best.0 > eps {
            keep[best.1] = true;
            stack.push((s, best.1));
            stack.push((best.1, e));
        }
    }
}

fn distance_to_line(p: Point2<f32>, a: Point2<f32>, b: Point2<f32>) -> f32 {
    let ab = b - a;
    let len = ab.norm();
    if len < 1e-6 {
        return (p - a).norm();
    }
    let ap = p - a;
    (ab.x * ap.y - ab.y * ap.x).abs() / len
}
