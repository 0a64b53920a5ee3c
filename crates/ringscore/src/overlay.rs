//! Visualization: impact discs and the ring-count HUD.

use crate::impact::ImpactPoint;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut};
use imageproc::rect::Rect;

pub const OVERLAY_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
/// Vertical distance between HUD baselines.
pub const HUD_LINE_STEP: i32 = 20;
const GLYPH_SCALE: i32 = 2;
const GLYPH_W: i32 = 3;
const GLYPH_H: i32 = 5;

/// Rows of a 3×5 glyph, most significant of the three bits on the left.
fn glyph(c: char) -> Option<[u8; 5]> {
    Some(match c {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        _ => return None,
    })
}

/// Filled disc per impact, radius at least one pixel.
pub fn draw_impacts(img: &mut RgbImage, impacts: &[ImpactPoint]) {
    for p in impacts {
        let r = (p.radius as i32).max(1);
        draw_filled_circle_mut(img, (p.x, p.y), r, OVERLAY_COLOR);
    }
}

/// Draw `text` with its top-left corner at `(x, y)`. Unsupported characters
/// leave a blank cell.
pub fn draw_text(img: &mut RgbImage, x: i32, y: i32, text: &str) {
    let advance = (GLYPH_W + 1) * GLYPH_SCALE;
    for (i, c) in text.chars().enumerate() {
        let Some(rows) = glyph(c) else {
            continue;
        };
        let x0 = x + i as i32 * advance;
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_W {
                if (bits >> (GLYPH_W - 1 - col)) & 1 == 0 {
                    continue;
                }
                let rect = Rect::at(x0 + col * GLYPH_SCALE, y + row as i32 * GLYPH_SCALE)
                    .of_size(GLYPH_SCALE as u32, GLYPH_SCALE as u32);
                draw_filled_rect_mut(img, rect, OVERLAY_COLOR);
            }
        }
    }
}

/// One line per entry, baselines at 20, 40, ... px from the top.
pub fn draw_hud(img: &mut RgbImage, lines: &[String]) {
    for (i, line) in lines.iter().enumerate() {
        let baseline = HUD_LINE_STEP * (i as i32 + 1);
        draw_text(img, 0, baseline - GLYPH_H * GLYPH_SCALE, line);
    }
}
