// ============================================================================
// CANVAS-LEVEL OPERATIONS — symmetry, fitting, layer compositing
// ============================================================================

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::canvas::blend_pixel;

/// Mirror the left half of `src` onto its right half.
///
/// Source column `x` (for `x < width / 2`) lands at `width - 1 - x`; the left
/// half is copied through untouched. For odd widths the middle column keeps
/// its original value.
pub fn mirror_left_half(src: &RgbaImage) -> RgbaImage {
    let (w, h) = src.dimensions();
    let half = w / 2;
    let mut out = src.clone();
    for y in 0..h {
        for x in 0..half {
            out.put_pixel(w - 1 - x, y, *src.get_pixel(x, y));
        }
    }
    out
}

/// Scale `img` to `width` (aspect preserved, smooth) and center it on a
/// `width`×`height` canvas filled with `background`.
///
/// Images taller than the canvas after scaling are clipped top and bottom.
pub fn fit_width_centered(
    img: &RgbaImage,
    width: u32,
    height: u32,
    background: Rgba<u8>,
) -> RgbaImage {
    let scaled_h = ((img.height() as f64 * width as f64 / img.width().max(1) as f64).round()
        as u32)
        .max(1);
    let scaled = imageops::resize(img, width, scaled_h, FilterType::Triangle);

    let mut out = RgbaImage::from_pixel(width, height, background);
    let (x, y) = centered_offset((width, height), scaled.dimensions());
    imageops::overlay(&mut out, &scaled, x, y);
    out
}

/// Top-left offset that centers an image of `inner` size inside `outer`.
/// Negative when `inner` is larger.
pub fn centered_offset(outer: (u32, u32), inner: (u32, u32)) -> (i64, i64) {
    (
        (outer.0 as i64 - inner.0 as i64) / 2,
        (outer.1 as i64 - inner.1 as i64) / 2,
    )
}

/// Composite `layer` over `base` at `(x, y)` with `opacity`, clipping to
/// `base`. Rows are processed in parallel.
pub fn composite_layer(base: &mut RgbaImage, layer: &RgbaImage, x: i64, y: i64, opacity: f32) {
    let (bw, bh) = base.dimensions();
    let (lw, lh) = layer.dimensions();

    // Overlap in base coordinates
    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = (x + lw as i64).min(bw as i64);
    let y1 = (y + lh as i64).min(bh as i64);
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let row_bytes = bw as usize * 4;
    let layer_raw = layer.as_raw();
    let layer_row_bytes = lw as usize * 4;

    base.par_chunks_mut(row_bytes)
        .enumerate()
        .skip(y0 as usize)
        .take((y1 - y0) as usize)
        .for_each(|(row, row_buf)| {
            let ly = (row as i64 - y) as usize;
            for bx in x0..x1 {
                let lx = (bx - x) as usize;
                let s = ly * layer_row_bytes + lx * 4;
                let top = Rgba([
                    layer_raw[s],
                    layer_raw[s + 1],
                    layer_raw[s + 2],
                    layer_raw[s + 3],
                ]);
                let d = bx as usize * 4;
                let dst = Rgba([row_buf[d], row_buf[d + 1], row_buf[d + 2], row_buf[d + 3]]);
                let out = blend_pixel(dst, top, opacity);
                row_buf[d..d + 4].copy_from_slice(&out.0);
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{BLACK, WHITE};

    #[test]
    fn mirror_handles_odd_width() {
        let mut img = RgbaImage::from_pixel(5, 1, WHITE);
        img.put_pixel(0, 0, BLACK);
        img.put_pixel(2, 0, Rgba([9, 9, 9, 255]));
        img.put_pixel(4, 0, Rgba([1, 2, 3, 255]));
        let out = mirror_left_half(&img);
        assert_eq!(*out.get_pixel(4, 0), BLACK);
        assert_eq!(*out.get_pixel(2, 0), Rgba([9, 9, 9, 255]));
        assert_eq!(*out.get_pixel(3, 0), WHITE);
    }

    #[test]
    fn tall_image_is_clipped_when_fitted() {
        let img = RgbaImage::from_pixel(10, 40, BLACK);
        let out = fit_width_centered(&img, 20, 20, WHITE);
        assert_eq!(out.dimensions(), (20, 20));
        // 10x40 -> 20x80, taller than the canvas: every pixel covered
        assert!(out.pixels().all(|p| *p == BLACK));
    }

    #[test]
    fn centered_offset_may_be_negative() {
        assert_eq!(centered_offset((512, 512), (256, 128)), (128, 192));
        assert_eq!(centered_offset((512, 512), (600, 512)), (-44, 0));
    }

    #[test]
    fn composite_layer_clips_and_blends() {
        let mut base = RgbaImage::from_pixel(8, 8, WHITE);
        let layer = RgbaImage::from_pixel(4, 4, BLACK);
        composite_layer(&mut base, &layer, -2, 6, 1.0);
        assert_eq!(*base.get_pixel(0, 6), BLACK);
        assert_eq!(*base.get_pixel(1, 7), BLACK);
        assert_eq!(*base.get_pixel(2, 6), WHITE);
        assert_eq!(*base.get_pixel(0, 5), WHITE);

        let mut base = RgbaImage::from_pixel(4, 4, WHITE);
        composite_layer(&mut base, &layer, 0, 0, 0.5);
        let p = base.get_pixel(1, 1);
        assert!(p[0] > 120 && p[0] < 135);
    }

    #[test]
    fn composite_layer_entirely_outside_is_ignored() {
        let mut base = RgbaImage::from_pixel(4, 4, WHITE);
        let layer = RgbaImage::from_pixel(4, 4, BLACK);
        composite_layer(&mut base, &layer, 10, 10, 1.0);
        assert!(base.pixels().all(|p| *p == WHITE));
    }
}
