use std::collections::VecDeque;

use crate::canvas::{CanvasId, RasterCanvas};
use crate::renderer::{self, Frame};

/// Status lines kept for the status bar / CLI summary.
const STATUS_HISTORY: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusMessage {
    pub level: StatusLevel,
    pub text: String,
}

/// The two linked canvases and shared UI state for one program run.
pub struct Session {
    canvases: [RasterCanvas; 2],
    /// Last pointer position over a canvas, in canvas pixels.
    pointer: (i32, i32),
    /// Bumped whenever any buffer changes; both frames depend on both buffers.
    generation: u64,
    status: VecDeque<StatusMessage>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            canvases: [
                RasterCanvas::new(CanvasId::Front),
                RasterCanvas::new(CanvasId::Side),
            ],
            pointer: (0, 0),
            generation: 0,
            status: VecDeque::with_capacity(STATUS_HISTORY),
        }
    }

    pub fn canvas(&self, id: CanvasId) -> &RasterCanvas {
        &self.canvases[id.index()]
    }

    /// Mutable access to one canvas. Callers that change pixels must call
    /// [`Session::mark_changed`].
    pub fn canvas_mut(&mut self, id: CanvasId) -> &mut RasterCanvas {
        &mut self.canvases[id.index()]
    }

    /// The canvas overlaid on `id`'s frame.
    pub fn linked(&self, id: CanvasId) -> &RasterCanvas {
        &self.canvases[id.linked().index()]
    }

    pub fn render_frame(&self, id: CanvasId) -> Frame {
        renderer::render_frame(self.canvas(id), self.linked(id))
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn mark_changed(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    // ---- pointer label ------------------------------------------------------

    pub fn set_pointer(&mut self, point: (i32, i32)) {
        self.pointer = point;
    }

    pub fn pointer(&self) -> (i32, i32) {
        self.pointer
    }

    pub fn pointer_label(&self) -> String {
        format!("x: {},  y: {}", self.pointer.0, self.pointer.1)
    }

    // ---- status -------------------------------------------------------------

    pub fn info(&mut self, text: impl Into<String>) {
        let text = text.into();
        crate::log_info!("{}", text);
        self.push_status(StatusLevel::Info, text);
    }

    pub fn error(&mut self, text: impl Into<String>) {
        let text = text.into();
        crate::log_err!("{}", text);
        self.push_status(StatusLevel::Error, text);
    }

    fn push_status(&mut self, level: StatusLevel, text: String) {
        if self.status.len() == STATUS_HISTORY {
            self.status.pop_front();
        }
        self.status.push_back(StatusMessage { level, text });
    }

    pub fn last_status(&self) -> Option<&StatusMessage> {
        self.status.back()
    }

    pub fn status_history(&self) -> impl Iterator<Item = &StatusMessage> {
        self.status.iter()
    }

    pub fn error_count(&self) -> usize {
        self.status
            .iter()
            .filter(|m| m.level == StatusLevel::Error)
            .count()
    }
}
