//! Quadrilateral candidates from a binarized frame.

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use nalgebra::Point2;
use ringscore_core::{approx_poly_closed, is_convex, min_edge_length, perimeter};
use serde::{Deserialize, Serialize};

/// Contour filtering parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuadParams {
    /// Minimum contour length as a fraction of the larger image side.
    pub min_contour_frac: f32,
    /// Douglas-Peucker tolerance as a fraction of the contour length.
    pub poly_epsilon_frac: f32,
    pub min_edge_px: f32,
    /// Candidates whose mean corner distance is below
    /// `max(min_corner_dist_px, min_corner_dist_frac * width)` are merged.
    pub min_corner_dist_px: f32,
    pub min_corner_dist_frac: f32,
}

impl Default for QuadParams {
    fn default() -> Self {
        Self {
            min_contour_frac: 0.03,
            poly_epsilon_frac: 0.05,
            min_edge_px: 10.0,
            min_corner_dist_px: 30.0,
            min_corner_dist_frac: 0.05,
        }
    }
}

/// Convex quads traced from the outer borders of `binary` (non-zero =
/// foreground), corners ordered clockwise in image space.
pub fn find_quad_candidates(binary: &GrayImage, params: &QuadParams) -> Vec<[Point2<f32>; 4]> {
    let (w, h) = binary.dimensions();
    let min_len = (w.max(h) as f32 * params.min_contour_frac).ceil() as usize;

    let mut quads = Vec::new();
    for contour in find_contours::<i32>(binary) {
        if !matches!(contour.border_type, BorderType::Outer) || contour.points.len() < min_len.max(4)
        {
            continue;
        }
        let pts: Vec<Point2<f32>> = contour
            .points
            .iter()
            .map(|p| Point2::new(p.x as f32, p.y as f32))
            .collect();
        let eps = pts.len() as f32 * params.poly_epsilon_frac;
        let poly = approx_poly_closed(&pts, eps);
        if poly.len() != 4 || !is_convex(&poly) || min_edge_length(&poly) < params.min_edge_px {
            continue;
        }
        let mut quad = [poly[0], poly[1], poly[2], poly[3]];
        order_clockwise(&mut quad);
        quads.push(quad);
    }

    let min_dist = params
        .min_corner_dist_px
        .max(params.min_corner_dist_frac * w as f32);
    drop_nested(quads, min_dist)
}

/// Clockwise on screen (y down): `cross(p1 - p0, p2 - p0) >= 0`.
fn order_clockwise(quad: &mut [Point2<f32>; 4]) {
    let d1 = quad[1] - quad[0];
    let d2 = quad[2] - quad[0];
    if d1.x * d2.y - d1.y * d2.x < 0.0 {
        quad.swap(1, 3);
    }
}

fn drop_nested(quads: Vec<[Point2<f32>; 4]>, min_dist: f32) -> Vec<[Point2<f32>; 4]> {
    let mut dropped = vec![false; quads.len()];
    for i in 0..quads.len() {
        for j in i + 1..quads.len() {
            let mean_sq = quads[i]
                .iter()
                .zip(&quads[j])
                .map(|(a, b)| (a - b).norm_squared())
                .sum::<f32>()
                / 4.0;
            if mean_sq >= min_dist * min_dist {
                continue;
            }
            if perimeter(&quads[i]) < perimeter(&quads[j]) {
                dropped[i] = true;
            } else {
                dropped[j] = true;
            }
        }
    }
    quads
        .into_iter()
        .zip(dropped)
        .filter_map(|(q, d)| (!d).then_some(q))
        .collect()
}
