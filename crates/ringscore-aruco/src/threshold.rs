//! Global and local thresholding for marker detection.

use image::{GrayImage, Luma};
use imageproc::filter::box_filter;

/// Otsu threshold over a set of intensity samples.
///
/// Degenerate inputs fall back to simple rules: empty input gives 127, a flat
/// input gives its only value and a two-level input gives the midpoint.
pub(crate) fn otsu_threshold_from_samples(samples: &[u8]) -> u8 {
    let Some((&lo, &hi)) = samples.iter().min().zip(samples.iter().max()) else {
        return 127;
    };
    if lo == hi {
        return lo;
    }

    let mut hist = [0u32; 256];
    for &v in samples {
        hist[v as usize] += 1;
    }
    if hist.iter().filter(|&&h| h > 0).count() <= 2 {
        return ((lo as u16 + hi as u16) / 2) as u8;
    }

    let total = samples.len() as f64;
    let sum_total: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, &h)| i as f64 * h as f64)
        .sum();

    let mut sum_b = 0f64;
    let mut w_b = 0f64;
    let mut best = (-1f64, 127u8);
    for (t, &h) in hist.iter().enumerate() {
        w_b += h as f64;
        if w_b < 1.0 {
            continue;
        }
        let w_f = total - w_b;
        if w_f < 1.0 {
            break;
        }
        sum_b += t as f64 * h as f64;
        let m_b = sum_b / w_b;
        let m_f = (sum_total - sum_b) / w_f;
        let var_between = w_b * w_f * (m_b - m_f) * (m_b - m_f);
        if var_between > best.0 {
            best = (var_between, t as u8);
        }
    }
    best.1
}

/// Inverted local-mean threshold: a pixel becomes 255 when it is darker than
/// the mean of its `(2r + 1)²` neighbourhood by more than `offset`.
pub fn adaptive_threshold_inv(gray: &GrayImage, radius: u32, offset: u8) -> GrayImage {
    let mean = box_filter(gray, radius, radius);
    let mut out = GrayImage::new(gray.width(), gray.height());
    for (x, y, px) in gray.enumerate_pixels() {
        let local = mean.get_pixel(x, y)[0] as i16;
        if (px[0] as i16) < local - offset as i16 {
            out.put_pixel(x, y, Luma([255]));
        }
    }
    out
}
