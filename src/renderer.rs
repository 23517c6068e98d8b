// ============================================================================
// COMPOSITE RENDERER — the frame shown for one canvas
// ============================================================================
//
// Layer order, back to front:
//   1. the canvas's own buffer (opaque)
//   2. its guide image, centered, faint
//   3. the linked canvas's buffer, origin-aligned, faint
//   4. the reference grid and center axes, faint
//
// The guide is centered but the linked buffer is not. Both canvases share one
// size today so the difference is invisible; keep it that way until the
// overlay alignment is decided explicitly.

use image::RgbaImage;

use crate::canvas::{BLACK, RasterCanvas};
use crate::ops::canvas_ops::{centered_offset, composite_layer};
use crate::ops::stroke::draw_axis_line;

pub const GUIDE_OPACITY: f32 = 0.1;
pub const LINKED_OPACITY: f32 = 0.1;
pub const GRID_OPACITY: f32 = 0.1;
/// Number of grid intervals along each axis.
pub const GRID_STEPS: u32 = 16;
pub const GRID_LINE_WIDTH: u32 = 1;
pub const AXIS_LINE_WIDTH: u32 = 2;

/// Display pixels for one canvas.
pub type Frame = RgbaImage;

/// Compose the frame for `canvas`, overlaying `linked`'s buffer.
///
/// Only reads its inputs; calling it any number of times leaves every buffer
/// untouched.
pub fn render_frame(canvas: &RasterCanvas, linked: &RasterCanvas) -> Frame {
    let mut frame = canvas.buffer().clone();
    let size = frame.dimensions();

    if let Some(guide) = canvas.guide() {
        let (x, y) = centered_offset(size, guide.dimensions());
        composite_layer(&mut frame, guide, x, y, GUIDE_OPACITY);
    }

    composite_layer(&mut frame, linked.buffer(), 0, 0, LINKED_OPACITY);

    draw_grid(&mut frame);
    frame
}

/// Procedural reference grid: one line per step on each axis, then the
/// thicker center axes.
fn draw_grid(frame: &mut Frame) {
    let (w, h) = frame.dimensions();
    for i in 0..GRID_STEPS {
        let y = (i + 1) * h / GRID_STEPS;
        let x = (i + 1) * w / GRID_STEPS;
        draw_axis_line(frame, y, GRID_LINE_WIDTH, true, BLACK, GRID_OPACITY);
        draw_axis_line(frame, x, GRID_LINE_WIDTH, false, BLACK, GRID_OPACITY);
    }
    draw_axis_line(frame, w / 2, AXIS_LINE_WIDTH, false, BLACK, GRID_OPACITY);
    draw_axis_line(frame, h / 2, AXIS_LINE_WIDTH, true, BLACK, GRID_OPACITY);
}
