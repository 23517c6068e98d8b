// ============================================================================
// STROKE RASTERIZATION — antialiased round-capped line segments
// ============================================================================

use image::{Rgba, RgbaImage};

use crate::canvas::blend_pixel;

/// Pen used for a single segment.
#[derive(Clone, Copy, Debug)]
pub struct Pen {
    pub color: Rgba<u8>,
    pub width: f32,
    pub anti_alias: bool,
}

impl Pen {
    pub fn new(color: Rgba<u8>, width: f32, anti_alias: bool) -> Self {
        Self {
            color,
            width,
            anti_alias,
        }
    }
}

/// Distance from `(px, py)` to the segment `a`→`b`.
///
/// A degenerate segment collapses to the distance to `a`.
#[inline]
fn sdf_line_segment(px: f32, py: f32, ax: f32, ay: f32, bx: f32, by: f32) -> f32 {
    let dx = bx - ax;
    let dy = by - ay;
    let len2 = dx * dx + dy * dy;
    let t = if len2 > 0.0 {
        (((px - ax) * dx + (py - ay) * dy) / len2).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let cx = ax + t * dx;
    let cy = ay + t * dy;
    ((px - cx) * (px - cx) + (py - cy) * (py - cy)).sqrt()
}

#[inline]
fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Draw a capsule (round cap, round join) from `from` to `to` into `image`.
///
/// Endpoints sit on pixel corners and each pixel is sampled at its center,
/// so a 3 px vertical line at `x = 10` fully covers columns 9 and 10 and half
/// covers 8 and 11. Pixels outside the image are clipped. A zero-length
/// segment draws nothing.
///
/// Returns `true` if any pixel was touched.
pub fn draw_segment(image: &mut RgbaImage, from: (i32, i32), to: (i32, i32), pen: &Pen) -> bool {
    if from == to {
        return false;
    }

    let (w, h) = image.dimensions();
    let half = pen.width * 0.5;
    // Padding for the capsule radius plus the AA ramp
    let pad = half + 1.0;

    let (ax, ay) = (from.0 as f32, from.1 as f32);
    let (bx, by) = (to.0 as f32, to.1 as f32);

    let x0 = ((ax.min(bx) - pad).floor() as i64).max(0);
    let y0 = ((ay.min(by) - pad).floor() as i64).max(0);
    let x1 = ((ax.max(bx) + pad).ceil() as i64).min(w as i64);
    let y1 = ((ay.max(by) + pad).ceil() as i64).min(h as i64);

    let mut touched = false;
    for y in y0..y1 {
        let py = y as f32 + 0.5;
        for x in x0..x1 {
            let px = x as f32 + 0.5;
            let d = sdf_line_segment(px, py, ax, ay, bx, by) - half;
            let coverage = if pen.anti_alias {
                smoothstep(0.5, -0.5, d)
            } else if d < 0.0 {
                1.0
            } else {
                0.0
            };
            if coverage <= 0.001 {
                continue;
            }
            let dst = image.get_pixel_mut(x as u32, y as u32);
            *dst = blend_pixel(*dst, pen.color, coverage);
            touched = true;
        }
    }
    touched
}

/// Fill an axis-aligned band of `thickness` pixels centered on `pos`, hard
/// edged, blended at `opacity`. Used for the reference grid.
///
/// `horizontal` lines span the full width at row `pos`; vertical lines span
/// the full height at column `pos`.
pub fn draw_axis_line(
    image: &mut RgbaImage,
    pos: u32,
    thickness: u32,
    horizontal: bool,
    color: Rgba<u8>,
    opacity: f32,
) {
    let (w, h) = image.dimensions();
    let start = pos.saturating_sub(thickness / 2);
    let end = start + thickness.max(1);
    let limit = if horizontal { h } else { w };
    for band in start..end.min(limit) {
        if horizontal {
            for x in 0..w {
                let dst = image.get_pixel_mut(x, band);
                *dst = blend_pixel(*dst, color, opacity);
            }
        } else {
            for y in 0..h {
                let dst = image.get_pixel_mut(band, y);
                *dst = blend_pixel(*dst, color, opacity);
            }
        }
    }
}
