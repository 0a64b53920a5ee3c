use crate::Dictionary;
use image::{GrayImage, Luma};

/// Render marker `id` with a one-cell black border and `quiet_cells` of white
/// margin on every side. Returns `None` for an unknown id or zero cell size.
pub fn draw_marker(dict: &Dictionary, id: u32, cell_px: u32, quiet_cells: u32) -> Option<GrayImage> {
    let code = dict.code(id)?;
    if cell_px == 0 {
        return None;
    }
    let n = dict.marker_size as u32;
    let cells = n + 2 + 2 * quiet_cells;
    let side = cells * cell_px;

    let img = GrayImage::from_fn(side, side, |x, y| {
        let cx = x / cell_px;
        let cy = y / cell_px;
        let inside = |c: u32| c >= quiet_cells && c < cells - quiet_cells;
        if !inside(cx) || !inside(cy) {
            return Luma([255]);
        }
        let (mx, my) = (cx - quiet_cells, cy - quiet_cells);
        if mx == 0 || my == 0 || mx == n + 1 || my == n + 1 {
            return Luma([0]);
        }
        let white = dict.is_white(code, (mx - 1) as usize, (my - 1) as usize);
        Luma([if white { 255 } else { 0 }])
    });
    Some(img)
}
