use std::path::Path;

use image::{Rgba, RgbaImage};

use crate::error::SketchError;
use crate::io;
use crate::ops::canvas_ops;
use crate::ops::stroke::{self, Pen};

/// Logical size of both drawing canvases.
pub const CANVAS_SIZE: u32 = 512;

/// Stroke pen width in pixels.
pub const BRUSH_WIDTH: f32 = 3.0;

pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Straight-alpha "source over" of `top` onto `base`, with `top`'s alpha
/// scaled by `opacity`.
pub fn blend_pixel(base: Rgba<u8>, top: Rgba<u8>, opacity: f32) -> Rgba<u8> {
    // Fast path: nothing to blend
    if top[3] == 0 || opacity <= 0.0 {
        return base;
    }

    // Fast path: opaque top at full opacity overwrites
    if opacity >= 1.0 && top[3] == 255 {
        return top;
    }

    let opacity = opacity.clamp(0.0, 1.0);
    let top_a = (top[3] as f32 / 255.0) * opacity;
    let base_a = base[3] as f32 / 255.0;
    let out_a = top_a + base_a * (1.0 - top_a);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let mut out = [0u8; 4];
    for c in 0..3 {
        let v = (top[c] as f32 * top_a + base[c] as f32 * base_a * (1.0 - top_a)) / out_a;
        out[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgba(out)
}

// ============================================================================
// CANVAS IDENTITY — the fixed front/side pair
// ============================================================================

/// One of the two drawing surfaces. The pairing is fixed: each canvas is
/// linked to the other one for the overlay layer, and that link never changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CanvasId {
    /// Left pane, front silhouette.
    Front,
    /// Right pane, side silhouette.
    Side,
}

impl CanvasId {
    pub const ALL: [CanvasId; 2] = [CanvasId::Front, CanvasId::Side];

    pub fn index(self) -> usize {
        match self {
            CanvasId::Front => 0,
            CanvasId::Side => 1,
        }
    }

    /// The canvas whose buffer is overlaid on this one.
    pub fn linked(self) -> CanvasId {
        match self {
            CanvasId::Front => CanvasId::Side,
            CanvasId::Side => CanvasId::Front,
        }
    }

    /// View tag used in exported file names (`sketch-F-0.png`).
    pub fn file_tag(self) -> &'static str {
        match self {
            CanvasId::Front => "F",
            CanvasId::Side => "S",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CanvasId::Front => "front",
            CanvasId::Side => "side",
        }
    }
}

/// Pointer button as seen by a canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

/// Transient state of one pointer drag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StrokeState {
    pub previous: (i32, i32),
    pub current: (i32, i32),
}

// ============================================================================
// RASTER CANVAS
// ============================================================================

pub struct RasterCanvas {
    id: CanvasId,
    /// Committed drawing.
    buffer: RgbaImage,
    /// Full copy of `buffer` taken at the last primary-button press.
    undo_buffer: RgbaImage,
    /// Reference image composited faintly and centered. Any size.
    guide: Option<RgbaImage>,
    /// Antialiased strokes when set.
    pub smoothing: bool,
    stroke: StrokeState,
}

impl RasterCanvas {
    pub fn new(id: CanvasId) -> Self {
        Self::with_size(id, CANVAS_SIZE, CANVAS_SIZE)
    }

    /// Canvas with a non-default buffer size.
    pub fn with_size(id: CanvasId, width: u32, height: u32) -> Self {
        let buffer = RgbaImage::from_pixel(width, height, WHITE);
        Self {
            id,
            undo_buffer: buffer.clone(),
            buffer,
            guide: None,
            smoothing: true,
            stroke: StrokeState::default(),
        }
    }

    pub fn id(&self) -> CanvasId {
        self.id
    }

    pub fn linked(&self) -> CanvasId {
        self.id.linked()
    }

    pub fn buffer(&self) -> &RgbaImage {
        &self.buffer
    }

    pub fn undo_buffer(&self) -> &RgbaImage {
        &self.undo_buffer
    }

    pub fn guide(&self) -> Option<&RgbaImage> {
        self.guide.as_ref()
    }

    pub fn stroke(&self) -> StrokeState {
        self.stroke
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    // ---- strokes ------------------------------------------------------------

    /// Pointer press. A primary press snapshots the buffer for the
    /// secondary-release restore.
    pub fn begin_stroke(&mut self, point: (i32, i32), button: PointerButton) {
        self.stroke = StrokeState {
            previous: point,
            current: point,
        };
        if button == PointerButton::Primary {
            self.undo_buffer = self.buffer.clone();
        }
    }

    /// Pointer move. Draws from the previous point when only the primary
    /// button is held; always advances the tracked point.
    ///
    /// Returns `true` if the buffer changed.
    pub fn continue_stroke(&mut self, point: (i32, i32), primary_held: bool) -> bool {
        self.stroke.current = point;
        let drawn = if primary_held {
            let pen = Pen::new(BLACK, BRUSH_WIDTH, self.smoothing);
            stroke::draw_segment(&mut self.buffer, self.stroke.previous, point, &pen)
        } else {
            false
        };
        self.stroke.previous = point;
        drawn
    }

    /// Pointer release. Releasing the secondary button throws away the whole
    /// stroke by restoring the last snapshot.
    ///
    /// Returns `true` if the buffer was restored.
    pub fn end_stroke(&mut self, button: PointerButton) -> bool {
        if button != PointerButton::Secondary {
            return false;
        }
        self.buffer.clone_from(&self.undo_buffer);
        true
    }

    // ---- whole-buffer operations --------------------------------------------

    /// Fill the buffer with white. The undo snapshot is left alone.
    pub fn clear(&mut self) {
        for p in self.buffer.pixels_mut() {
            *p = WHITE;
        }
    }

    /// Replace the guide image. No resizing is applied.
    pub fn load_guide(&mut self, path: &Path) -> Result<(), SketchError> {
        let img = io::decode_image(path)?;
        crate::log_info!(
            "{} guide loaded from {} ({}x{})",
            self.id.label(),
            path.display(),
            img.width(),
            img.height()
        );
        self.guide = Some(img);
        Ok(())
    }

    /// Replace the drawing with an image fitted to the canvas width and
    /// centered on white.
    pub fn load_drawing(&mut self, path: &Path) -> Result<(), SketchError> {
        let fitted = self.decode_drawing(path)?;
        self.commit_drawing(fitted);
        crate::log_info!("{} drawing loaded from {}", self.id.label(), path.display());
        Ok(())
    }

    /// Decode `path` and fit it to this canvas without touching the buffer.
    pub fn decode_drawing(&self, path: &Path) -> Result<RgbaImage, SketchError> {
        let img = io::decode_image(path)?;
        Ok(canvas_ops::fit_width_centered(&img, self.width(), self.height(), WHITE))
    }

    /// Install a drawing produced by [`RasterCanvas::decode_drawing`]. Images
    /// of another size are fitted again so the buffer keeps its dimensions.
    pub fn commit_drawing(&mut self, drawing: RgbaImage) {
        self.buffer = if drawing.dimensions() == self.buffer.dimensions() {
            drawing
        } else {
            canvas_ops::fit_width_centered(&drawing, self.width(), self.height(), WHITE)
        };
    }

    /// Symmetry tool: the left half is mirrored onto the right half.
    pub fn mirror_horizontally(&mut self) {
        self.buffer = canvas_ops::mirror_left_half(&self.buffer);
    }

    /// Write the buffer downscaled to `width_hint`, aspect preserved.
    pub fn export_scaled(&self, path: &Path, width_hint: u32) -> Result<(), SketchError> {
        let scaled = io::resize_to_width(&self.buffer, width_hint);
        io::write_image(&scaled, path)
    }

    /// Write the buffer as is.
    pub fn export_full_resolution(&self, path: &Path) -> Result<(), SketchError> {
        io::write_image(&self.buffer, path)
    }
}
