// ============================================================================
// CANVAS VIEW — texture cache and pointer routing for the two canvases
// ============================================================================

use eframe::egui::{self, Color32, ColorImage, Pos2, Rect, Sense, Stroke, TextureOptions, Vec2};
use image::RgbaImage;

use crate::canvas::{CANVAS_SIZE, CanvasId, PointerButton};
use crate::session::Session;

/// Convert an `image::RgbaImage` into an egui `ColorImage`.
pub fn rgba_image_to_color_image(img: &RgbaImage) -> ColorImage {
    ColorImage::from_rgba_unmultiplied([img.width() as usize, img.height() as usize], img.as_raw())
}

/// Screen position to canvas pixel. Positions outside `rect` map outside the
/// canvas; drawing clips them.
pub fn screen_to_canvas(rect: Rect, pos: Pos2, size: (u32, u32)) -> (i32, i32) {
    let sx = size.0 as f32 / rect.width().max(1.0);
    let sy = size.1 as f32 / rect.height().max(1.0);
    (
        ((pos.x - rect.min.x) * sx).floor() as i32,
        ((pos.y - rect.min.y) * sy).floor() as i32,
    )
}

pub fn to_canvas_button(button: egui::PointerButton) -> Option<PointerButton> {
    match button {
        egui::PointerButton::Primary => Some(PointerButton::Primary),
        egui::PointerButton::Secondary => Some(PointerButton::Secondary),
        egui::PointerButton::Middle => Some(PointerButton::Middle),
        _ => None,
    }
}

/// One canvas on screen. The frame texture is re-uploaded only when the
/// session generation moves.
pub struct CanvasView {
    id: CanvasId,
    texture: Option<egui::TextureHandle>,
    last_generation: Option<u64>,
}

impl CanvasView {
    pub fn new(id: CanvasId) -> Self {
        Self {
            id,
            texture: None,
            last_generation: None,
        }
    }

    pub fn id(&self) -> CanvasId {
        self.id
    }

    pub fn is_stale(&self, generation: u64) -> bool {
        self.texture.is_none() || self.last_generation != Some(generation)
    }

    fn texture_id(&mut self, ctx: &egui::Context, session: &Session) -> egui::TextureId {
        let generation = session.generation();
        let stale = self.is_stale(generation);
        let texture = match self.texture.take() {
            Some(mut tex) => {
                if stale {
                    tex.set(
                        rgba_image_to_color_image(&session.render_frame(self.id)),
                        TextureOptions::NEAREST,
                    );
                }
                tex
            }
            None => ctx.load_texture(
                format!("canvas_{}", self.id.file_tag()),
                rgba_image_to_color_image(&session.render_frame(self.id)),
                TextureOptions::NEAREST,
            ),
        };
        self.last_generation = Some(generation);
        let id = texture.id();
        self.texture = Some(texture);
        id
    }

    /// Paint the canvas at its native size and return the screen rect it
    /// occupies.
    pub fn show(&mut self, ui: &mut egui::Ui, session: &Session, focused: bool) -> Rect {
        let (rect, _response) =
            ui.allocate_exact_size(Vec2::splat(CANVAS_SIZE as f32), Sense::click_and_drag());
        let tex = self.texture_id(ui.ctx(), session);
        let painter = ui.painter_at(rect.expand(2.0));
        painter.image(
            tex,
            rect,
            Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
            Color32::WHITE,
        );
        let border = if focused {
            ui.visuals().selection.stroke
        } else {
            Stroke::new(1.0, ui.visuals().widgets.noninteractive.bg_stroke.color)
        };
        painter.rect_stroke(rect.expand(1.0), 0.0, border);
        rect
    }
}

// ============================================================================
// POINTER ROUTING
// ============================================================================

/// Pointer input in screen coordinates, in arrival order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerEvent {
    Moved(Pos2),
    Pressed(Pos2, PointerButton),
    Released(Pos2, PointerButton),
}

impl PointerEvent {
    /// The canvas-relevant part of an egui event.
    pub fn from_egui(event: &egui::Event) -> Option<Self> {
        match *event {
            egui::Event::PointerMoved(pos) => Some(PointerEvent::Moved(pos)),
            egui::Event::PointerButton {
                pos,
                button,
                pressed,
                ..
            } => {
                let button = to_canvas_button(button)?;
                Some(if pressed {
                    PointerEvent::Pressed(pos, button)
                } else {
                    PointerEvent::Released(pos, button)
                })
            }
            _ => None,
        }
    }
}

/// Buttons held right now, as seen through the event stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeldButtons {
    primary: bool,
    secondary: bool,
    middle: bool,
}

impl HeldButtons {
    fn set(&mut self, button: PointerButton, down: bool) {
        match button {
            PointerButton::Primary => self.primary = down,
            PointerButton::Secondary => self.secondary = down,
            PointerButton::Middle => self.middle = down,
        }
    }

    pub fn any(self) -> bool {
        self.primary || self.secondary || self.middle
    }

    /// Strokes draw only while the primary button is the one button held.
    pub fn primary_only(self) -> bool {
        self.primary && !self.secondary && !self.middle
    }
}

/// Desktop-widget pointer semantics over the two canvases: a press focuses
/// the canvas under the pointer and grabs the pointer until every button is
/// released, so a drag that leaves the canvas keeps drawing into it.
#[derive(Debug, Default)]
pub struct PointerRouter {
    grabbed: Option<CanvasId>,
    focused: Option<CanvasId>,
    held: HeldButtons,
}

impl PointerRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn focused(&self) -> Option<CanvasId> {
        self.focused
    }

    pub fn grabbed(&self) -> Option<CanvasId> {
        self.grabbed
    }

    pub fn held(&self) -> HeldButtons {
        self.held
    }

    fn hit(rects: &[Rect; 2], pos: Pos2) -> Option<CanvasId> {
        CanvasId::ALL
            .into_iter()
            .find(|id| rects[id.index()].contains(pos))
    }

    fn point(session: &Session, rects: &[Rect; 2], id: CanvasId, pos: Pos2) -> (i32, i32) {
        let canvas = session.canvas(id);
        screen_to_canvas(rects[id.index()], pos, (canvas.width(), canvas.height()))
    }

    /// Apply a batch of events in order. Button state is tracked per event,
    /// so a press, drag and release inside one frame still draws.
    pub fn feed(
        &mut self,
        session: &mut Session,
        rects: &[Rect; 2],
        events: impl IntoIterator<Item = PointerEvent>,
    ) {
        for event in events {
            match event {
                PointerEvent::Moved(pos) => self.motion(session, rects, pos),
                PointerEvent::Pressed(pos, button) => self.press(session, rects, pos, button),
                PointerEvent::Released(_, button) => self.release(session, button),
            }
        }
    }

    /// Drop button and grab state when the window reports nothing held, in
    /// case a release happened where no event reached us.
    pub fn settle(&mut self, any_down: bool) {
        if !any_down && self.held.any() {
            self.held = HeldButtons::default();
            self.grabbed = None;
        }
    }

    pub fn press(
        &mut self,
        session: &mut Session,
        rects: &[Rect; 2],
        pos: Pos2,
        button: PointerButton,
    ) {
        self.held.set(button, true);
        let Some(id) = self.grabbed.or_else(|| Self::hit(rects, pos)) else {
            self.focused = None;
            return;
        };
        self.focused = Some(id);
        self.grabbed = Some(id);
        let point = Self::point(session, rects, id, pos);
        session.set_pointer(point);
        session.canvas_mut(id).begin_stroke(point, button);
    }

    /// Pointer motion. Goes to the grabbing canvas, or just updates the
    /// coordinate label when hovering.
    pub fn motion(&mut self, session: &mut Session, rects: &[Rect; 2], pos: Pos2) {
        match self.grabbed {
            Some(id) => {
                let point = Self::point(session, rects, id, pos);
                session.set_pointer(point);
                if session
                    .canvas_mut(id)
                    .continue_stroke(point, self.held.primary_only())
                {
                    session.mark_changed();
                }
            }
            None => {
                if let Some(id) = Self::hit(rects, pos) {
                    let point = Self::point(session, rects, id, pos);
                    session.set_pointer(point);
                }
            }
        }
    }

    /// Button release. The grab ends once no button is held any more.
    pub fn release(&mut self, session: &mut Session, button: PointerButton) {
        self.held.set(button, false);
        let Some(id) = self.grabbed else { return };
        if session.canvas_mut(id).end_stroke(button) {
            session.mark_changed();
        }
        if !self.held.any() {
            self.grabbed = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::WHITE;

    fn rects() -> [Rect; 2] {
        [
            Rect::from_min_size(Pos2::new(10.0, 40.0), Vec2::splat(512.0)),
            Rect::from_min_size(Pos2::new(540.0, 40.0), Vec2::splat(512.0)),
        ]
    }

    #[test]
    fn color_image_keeps_pixels() {
        let mut img = RgbaImage::from_pixel(3, 2, image::Rgba([255, 255, 255, 255]));
        img.put_pixel(2, 1, image::Rgba([10, 20, 30, 255]));
        let ci = rgba_image_to_color_image(&img);
        assert_eq!(ci.size, [3, 2]);
        assert_eq!(ci.pixels[5], Color32::from_rgb(10, 20, 30));
    }

    #[test]
    fn screen_mapping_is_one_to_one_at_native_size() {
        let r = rects()[1];
        assert_eq!(screen_to_canvas(r, Pos2::new(540.0, 40.0), (512, 512)), (0, 0));
        assert_eq!(screen_to_canvas(r, Pos2::new(600.5, 140.2), (512, 512)), (60, 100));
        assert_eq!(screen_to_canvas(r, Pos2::new(530.0, 30.0), (512, 512)), (-10, -10));
    }

    #[test]
    fn press_focuses_and_grabs_the_hit_canvas() {
        let mut session = Session::new();
        let mut router = PointerRouter::new();
        router.press(&mut session, &rects(), Pos2::new(600.0, 100.0), PointerButton::Primary);
        assert_eq!(router.focused(), Some(CanvasId::Side));
        assert_eq!(router.grabbed(), Some(CanvasId::Side));
        assert_eq!(session.pointer(), (60, 60));

        router.release(&mut session, PointerButton::Primary);
        assert_eq!(router.grabbed(), None);
        assert_eq!(router.focused(), Some(CanvasId::Side));

        router.press(&mut session, &rects(), Pos2::new(0.0, 0.0), PointerButton::Primary);
        assert_eq!(router.focused(), None);
    }

    #[test]
    fn drag_leaving_the_canvas_stays_on_it() {
        let mut session = Session::new();
        let mut router = PointerRouter::new();
        let r = rects();
        router.press(&mut session, &r, Pos2::new(400.0, 100.0), PointerButton::Primary);
        // Crosses into the side canvas's rect
        router.motion(&mut session, &r, Pos2::new(600.0, 100.0));

        assert!(session.generation() > 0);
        assert_ne!(session.canvas(CanvasId::Front).buffer().get_pixel(500, 60), &WHITE);
        assert!(session.canvas(CanvasId::Side).buffer().pixels().all(|p| *p == WHITE));
    }

    #[test]
    fn secondary_release_discards_the_stroke() {
        let mut session = Session::new();
        let mut router = PointerRouter::new();
        let r = rects();
        router.press(&mut session, &r, Pos2::new(100.0, 100.0), PointerButton::Primary);
        router.motion(&mut session, &r, Pos2::new(200.0, 100.0));
        let one_segment = session.canvas(CanvasId::Front).buffer().clone();

        // Both buttons held: the pointer moves but nothing is drawn
        router.press(&mut session, &r, Pos2::new(200.0, 100.0), PointerButton::Secondary);
        assert!(!router.held().primary_only());
        router.motion(&mut session, &r, Pos2::new(200.0, 300.0));
        assert_eq!(session.canvas(CanvasId::Front).buffer(), &one_segment);

        router.release(&mut session, PointerButton::Secondary);
        assert_eq!(router.grabbed(), Some(CanvasId::Front));
        router.release(&mut session, PointerButton::Primary);
        assert_eq!(router.grabbed(), None);

        assert!(session.canvas(CanvasId::Front).buffer().pixels().all(|p| *p == WHITE));
    }

    #[test]
    fn whole_drag_in_one_batch_draws() {
        let mut session = Session::new();
        let mut router = PointerRouter::new();
        router.feed(
            &mut session,
            &rects(),
            [
                PointerEvent::Moved(Pos2::new(110.0, 140.0)),
                PointerEvent::Pressed(Pos2::new(110.0, 140.0), PointerButton::Primary),
                PointerEvent::Moved(Pos2::new(110.0, 240.0)),
                PointerEvent::Moved(Pos2::new(110.0, 340.0)),
                PointerEvent::Released(Pos2::new(110.0, 340.0), PointerButton::Primary),
            ],
        );
        let front = session.canvas(CanvasId::Front).buffer();
        assert_ne!(front.get_pixel(100, 150), &WHITE);
        assert_ne!(front.get_pixel(100, 250), &WHITE);
        assert_eq!(router.grabbed(), None);
        assert!(!router.held().any());
    }

    #[test]
    fn settle_clears_a_lost_release() {
        let mut session = Session::new();
        let mut router = PointerRouter::new();
        router.press(&mut session, &rects(), Pos2::new(100.0, 100.0), PointerButton::Primary);
        router.settle(true);
        assert_eq!(router.grabbed(), Some(CanvasId::Front));
        router.settle(false);
        assert_eq!(router.grabbed(), None);
        assert!(!router.held().any());
    }

    #[test]
    fn egui_events_are_translated() {
        let pos = Pos2::new(3.0, 4.0);
        assert_eq!(
            PointerEvent::from_egui(&egui::Event::PointerMoved(pos)),
            Some(PointerEvent::Moved(pos))
        );
        let released = egui::Event::PointerButton {
            pos,
            button: egui::PointerButton::Secondary,
            pressed: false,
            modifiers: egui::Modifiers::NONE,
        };
        assert_eq!(
            PointerEvent::from_egui(&released),
            Some(PointerEvent::Released(pos, PointerButton::Secondary))
        );
        assert_eq!(PointerEvent::from_egui(&egui::Event::PointerGone), None);
    }

    #[test]
    fn hover_updates_label_only() {
        let mut session = Session::new();
        let mut router = PointerRouter::new();
        router.motion(&mut session, &rects(), Pos2::new(20.0, 45.0));
        assert_eq!(session.pointer_label(), "x: 10,  y: 5");
        assert_eq!(session.generation(), 0);
    }
}
