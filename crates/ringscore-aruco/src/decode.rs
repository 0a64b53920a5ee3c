//! Bit decoding of a single marker from an image quad.

use crate::threshold::otsu_threshold_from_samples;
use crate::Matcher;
use nalgebra::Point2;
use ringscore_core::{homography_from_4pt, GrayImageView, Homography};
use serde::{Deserialize, Serialize};

/// Side of the canonical cell the quad is mapped from, in sample units.
const CANONICAL_SIDE: f32 = 64.0;
const MIN_SIDE_PX: f32 = 12.0;
/// Threshold samples per bit cell along each axis.
const THRESH_SUBDIV: usize = 3;

/// Sampling and acceptance parameters for one marker quad.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// Marker border width in cells.
    pub border_bits: usize,
    /// Fraction of the quad ignored near its edges.
    pub inset_frac: f32,
    /// Minimum fraction of border samples that must read black.
    pub min_border_score: f32,
    /// Also accept white-bordered (inverted) markers.
    pub allow_inverted: bool,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            border_bits: 1,
            inset_frac: 0.0,
            min_border_score: 0.85,
            allow_inverted: false,
        }
    }
}

/// A decoded marker with corners in the marker's own orientation.
#[derive(Clone, Debug, PartialEq)]
pub struct MarkerDecode {
    pub id: u32,
    pub rotation: u8,
    pub hamming: u8,
    pub score: f32,
    pub border_score: f32,
    /// Observed inner bits (row-major, white = 1) before undoing rotation.
    pub code: u64,
    pub inverted: bool,
    /// Top-left, top-right, bottom-right, bottom-left of the printed marker.
    pub corners: [Point2<f32>; 4],
}

/// Decode the marker inside `quad` (clockwise image corners, any start).
pub fn decode_marker_in_quad(
    image: &GrayImageView<'_>,
    quad: &[Point2<f32>; 4],
    cfg: &DecodeConfig,
    matcher: &Matcher,
) -> Option<MarkerDecode> {
    let bits = matcher.dictionary().marker_size;
    let grid = SampleGrid::new(cfg, bits)?;
    let h = homography_from_4pt(&cell_corners(), quad)?;
    let obs = grid.read(image, &h, cfg)?;

    let m = matcher.match_code(obs.code)?;
    let bit_count = matcher.dictionary().bit_count().max(1) as f32;
    let score = (obs.border_score * (1.0 - m.hamming as f32 / bit_count)).clamp(0.0, 1.0);

    // The dictionary corner k was observed at quad corner k + rotation.
    let r = m.rotation as usize;
    let corners = std::array::from_fn(|k| quad[(k + r) % 4]);

    Some(MarkerDecode {
        id: m.id,
        rotation: m.rotation,
        hamming: m.hamming,
        score,
        border_score: obs.border_score,
        code: obs.code,
        inverted: obs.inverted,
        corners,
    })
}

#[derive(Clone, Copy, Debug)]
struct Observation {
    code: u64,
    border_score: f32,
    inverted: bool,
}

struct SampleGrid {
    bits: usize,
    border: usize,
    cells: usize,
    points: Vec<Point2<f32>>, // row-major: cy * cells + cx
    threshold_points: Vec<Point2<f32>>,
}

impl SampleGrid {
    fn new(cfg: &DecodeConfig, bits: usize) -> Option<Self> {
        if bits == 0 || bits * bits > 64 {
            return None;
        }
        let border = cfg.border_bits;
        let cells = bits + 2 * border;

        let inset = (cfg.inset_frac * CANONICAL_SIDE).max(0.0);
        let side = CANONICAL_SIDE - 2.0 * inset;
        if side < MIN_SIDE_PX {
            return None;
        }

        Some(Self {
            bits,
            border,
            cells,
            points: centered_grid(inset, side, cells),
            threshold_points: centered_grid(inset, side, cells * THRESH_SUBDIV),
        })
    }

    fn read(
        &self,
        img: &GrayImageView<'_>,
        h: &Homography,
        cfg: &DecodeConfig,
    ) -> Option<Observation> {
        let samples = self
            .points
            .iter()
            .map(|p| {
                let q = h.apply(*p);
                sample_mean_3x3(img, q.x, q.y)
            })
            .collect::<Option<Vec<u8>>>()?;
        let thr_samples: Vec<u8> = self
            .threshold_points
            .iter()
            .filter_map(|p| {
                let q = h.apply(*p);
                sample_mean_3x3(img, q.x, q.y)
            })
            .collect();
        let thr = otsu_threshold_from_samples(&thr_samples);

        let polarities: &[bool] = if cfg.allow_inverted {
            &[false, true]
        } else {
            &[false]
        };

        let mut best: Option<Observation> = None;
        for &inverted in polarities {
            let obs = self.classify(&samples, thr, inverted);
            if obs.border_score < cfg.min_border_score {
                continue;
            }
            if best.is_none_or(|b| obs.border_score > b.border_score) {
                best = Some(obs);
            }
        }
        best
    }

    fn classify(&self, samples: &[u8], thr: u8, inverted: bool) -> Observation {
        let cells = self.cells;
        let mut border_ok = 0u32;
        let mut border_total = 0u32;
        let mut code = 0u64;

        for cy in 0..cells {
            for cx in 0..cells {
                let is_black = (samples[cy * cells + cx] < thr) != inverted;
                let on_border = cx < self.border
                    || cy < self.border
                    || cx >= cells - self.border
                    || cy >= cells - self.border;
                if on_border {
                    border_total += 1;
                    border_ok += is_black as u32;
                } else if !is_black {
                    let idx = (cy - self.border) * self.bits + (cx - self.border);
                    code |= 1u64 << idx;
                }
            }
        }

        let border_score = if border_total == 0 {
            1.0
        } else {
            border_ok as f32 / border_total as f32
        };
        Observation {
            code,
            border_score,
            inverted,
        }
    }
}

fn centered_grid(start: f32, side: f32, n: usize) -> Vec<Point2<f32>> {
    let step = side / n as f32;
    (0..n)
        .flat_map(|y| {
            (0..n).map(move |x| {
                Point2::new(
                    start + (x as f32 + 0.5) * step,
                    start + (y as f32 + 0.5) * step,
                )
            })
        })
        .collect()
}

fn cell_corners() -> [Point2<f32>; 4] {
    let s = CANONICAL_SIDE;
    [
        Point2::new(0.0, 0.0),
        Point2::new(s, 0.0),
        Point2::new(s, s),
        Point2::new(0.0, s),
    ]
}

fn sample_mean_3x3(img: &GrayImageView<'_>, x: f32, y: f32) -> Option<u8> {
    let ix = x.floor() as i32;
    let iy = y.floor() as i32;
    if ix < 1 || iy < 1 || ix + 1 >= img.width as i32 || iy + 1 >= img.height as i32 {
        return None;
    }
    let mut sum = 0u32;
    for dy in -1..=1 {
        for dx in -1..=1 {
            sum += img.get(ix + dx, iy + dy) as u32;
        }
    }
    Some((sum / 9) as u8)
}
