use std::sync::mpsc;

use eframe::egui;

use crate::canvas::CanvasId;
use crate::components::canvas_view::{CanvasView, PointerEvent, PointerRouter};
use crate::components::pipeline_panel::{self, PanelAction};
use crate::controller::SessionController;
use crate::io::FileHandler;
use crate::pipeline::PipelineOutcome;
use crate::session::StatusLevel;
use crate::settings::SketchSettings;

pub struct SketchApp {
    controller: SessionController,
    file_handler: FileHandler,
    views: [CanvasView; 2],
    router: PointerRouter,
    /// Screen rects of the canvases as laid out this frame.
    canvas_rects: [egui::Rect; 2],
    // Finished pipeline jobs come back here from the rayon pool
    job_sender: mpsc::Sender<PipelineOutcome>,
    job_receiver: mpsc::Receiver<PipelineOutcome>,
}

impl SketchApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, settings: SketchSettings) -> Self {
        let (job_sender, job_receiver) = mpsc::channel();
        Self {
            controller: SessionController::new(settings),
            file_handler: FileHandler::new(),
            views: [CanvasView::new(CanvasId::Front), CanvasView::new(CanvasId::Side)],
            router: PointerRouter::new(),
            canvas_rects: [egui::Rect::NOTHING; 2],
            job_sender,
            job_receiver,
        }
    }

    fn poll_jobs(&mut self) {
        while let Ok(outcome) = self.job_receiver.try_recv() {
            let _ = self.controller.complete(outcome);
        }
    }

    fn handle_pointer(&mut self, ctx: &egui::Context) {
        let (events, any_down) = ctx.input(|i| {
            let events: Vec<PointerEvent> =
                i.events.iter().filter_map(PointerEvent::from_egui).collect();
            (events, i.pointer.any_down())
        });
        let rects = self.canvas_rects;
        let session = self.controller.session_mut();
        self.router.feed(session, &rects, events);
        self.router.settle(any_down);
    }

    /// Space loads a guide, L a drawing, into the focused canvas.
    fn handle_keys(&mut self, ctx: &egui::Context) {
        let Some(id) = self.router.focused() else { return };
        if ctx.memory(|m| m.focus().is_some()) {
            return;
        }
        let (space, l) = ctx.input(|i| {
            (
                i.key_pressed(egui::Key::Space),
                i.key_pressed(egui::Key::L),
            )
        });
        if space
            && let Some(path) = self
                .file_handler
                .pick_image(&format!("Load {} guide", id.label()))
        {
            let _ = self.controller.load_guide(id, &path);
        }
        if l
            && let Some(path) = self
                .file_handler
                .pick_image(&format!("Load {} drawing", id.label()))
        {
            let _ = self.controller.load_drawing(id, &path);
        }
    }

    fn run_panel_action(&mut self, ctx: &egui::Context, action: PanelAction) {
        match action {
            PanelAction::Symmetric => self.controller.mirror(),
            PanelAction::Save => {
                self.controller.save();
            }
            PanelAction::Run(action) => {
                let repaint = ctx.clone();
                // Errors are already in the status log
                let _ = self.controller.dispatch(action, self.job_sender.clone(), move || {
                    repaint.request_repaint()
                });
            }
        }
    }

    fn status_bar(&self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if let Some(action) = self.controller.pipeline().in_flight() {
                ui.spinner();
                ui.label(format!("{}…", action));
            } else if let Some(msg) = self.controller.session().last_status() {
                let text = egui::RichText::new(&msg.text);
                let text = match msg.level {
                    StatusLevel::Error => text.color(ui.visuals().error_fg_color),
                    StatusLevel::Info => text,
                };
                ui.label(text);
            }
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.weak(format!(
                    "{} · {}",
                    self.controller.settings().dataset_id,
                    self.controller.pipeline().state().name()
                ));
            });
        });
    }
}

impl eframe::App for SketchApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_jobs();

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| self.status_bar(ui));

        let mut clicked = None;
        let mut clear = None;
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.label(self.controller.session().pointer_label());
            ui.add_space(4.0);
            ui.horizontal(|ui| {
                for view in &mut self.views {
                    let id = view.id();
                    ui.vertical(|ui| {
                        let focused = self.router.focused() == Some(id);
                        self.canvas_rects[id.index()] =
                            view.show(ui, self.controller.session(), focused);
                        if ui.button(format!("Clear {}", id.label())).clicked() {
                            clear = Some(id);
                        }
                    });
                    ui.add_space(12.0);
                }
            });
            ui.add_space(8.0);
            clicked = pipeline_panel::show(ui, self.controller.pipeline());
        });

        self.handle_pointer(ctx);
        self.handle_keys(ctx);

        if let Some(id) = clear {
            self.controller.clear(id);
        }
        if let Some(action) = clicked {
            self.run_panel_action(ctx, action);
        }
    }
}
