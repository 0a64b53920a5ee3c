//! Pixel-level helpers shared by the rectifier and the impact detector.

use image::{GrayImage, Luma, Pixel, Rgb, RgbImage};
use imageproc::filter::separable_filter_equal;
use nalgebra::Point2;
use ringscore_core::Homography;

/// Normalized `[1, 4, 6, 4, 1] / 16` binomial taps.
const BLUR5_TAPS: [f32; 5] = [0.0625, 0.25, 0.375, 0.25, 0.0625];

/// ITU-R BT.601 luma.
pub fn to_gray(rgb: &RgbImage) -> GrayImage {
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let l = (299 * r as u32 + 587 * g as u32 + 114 * b as u32 + 500) / 1000;
        Luma([l as u8])
    })
}

/// Per-channel `|a - b|`, or `None` when the dimensions differ.
pub fn abs_diff(a: &RgbImage, b: &RgbImage) -> Option<RgbImage> {
    if a.dimensions() != b.dimensions() {
        return None;
    }
    let mut out = a.clone();
    for (o, q) in out.pixels_mut().zip(b.pixels()) {
        o.apply2(q, |u, v| u.abs_diff(v));
    }
    Some(out)
}

/// Fixed 5×5 binomial blur, the kernel a 5×5 Gaussian with automatic sigma uses.
pub fn blur5<P>(img: &image::ImageBuffer<P, Vec<u8>>) -> image::ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    separable_filter_equal(img, &BLUR5_TAPS)
}

/// Warp a color frame into an `out_w × out_h` canonical frame.
///
/// `h_img_from_canon` maps canonical pixel coordinates to source pixels;
/// samples are bilinear, black outside the source.
pub fn warp_perspective_rgb(
    src: &RgbImage,
    h_img_from_canon: &Homography,
    out_w: u32,
    out_h: u32,
) -> RgbImage {
    RgbImage::from_fn(out_w, out_h, |x, y| {
        let p = h_img_from_canon.apply_f64(Point2::new(x as f64, y as f64));
        sample_rgb_bilinear(src, p.x, p.y)
    })
}

fn sample_rgb_bilinear(src: &RgbImage, x: f64, y: f64) -> Rgb<u8> {
    if !x.is_finite() || !y.is_finite() {
        return Rgb([0, 0, 0]);
    }
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let at = |xi: i64, yi: i64| -> [f64; 3] {
        if xi < 0 || yi < 0 || xi >= src.width() as i64 || yi >= src.height() as i64 {
            return [0.0; 3];
        }
        src.get_pixel(xi as u32, yi as u32).0.map(f64::from)
    };

    let p00 = at(x0, y0);
    let p10 = at(x0 + 1, y0);
    let p01 = at(x0, y0 + 1);
    let p11 = at(x0 + 1, y0 + 1);
    Rgb(std::array::from_fn(|c| {
        let a = p00[c] + fx * (p10[c] - p00[c]);
        let b = p01[c] + fx * (p11[c] - p01[c]);
        (a + fy * (b - a)).round().clamp(0.0, 255.0) as u8
    }))
}
