use eframe::egui;

use crate::pipeline::{Pipeline, PipelineAction};

/// Button row under the canvases.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PanelAction {
    Symmetric,
    Save,
    Run(PipelineAction),
}

/// Which buttons are clickable: canvas buttons always, pipeline buttons per
/// the state machine.
pub fn is_enabled(pipeline: &Pipeline, action: PanelAction) -> bool {
    match action {
        PanelAction::Symmetric | PanelAction::Save => true,
        PanelAction::Run(a) => pipeline.can(a),
    }
}

pub fn label(action: PanelAction) -> &'static str {
    match action {
        PanelAction::Symmetric => "Symmetric",
        PanelAction::Save => "Save",
        PanelAction::Run(a) => a.label(),
    }
}

const BUTTONS: [PanelAction; 5] = [
    PanelAction::Symmetric,
    PanelAction::Save,
    PanelAction::Run(PipelineAction::BuildGraph),
    PanelAction::Run(PipelineAction::ComputeGraph),
    PanelAction::Run(PipelineAction::Fuse),
];

/// Draw the row; returns the clicked action, if any.
pub fn show(ui: &mut egui::Ui, pipeline: &Pipeline) -> Option<PanelAction> {
    let mut clicked = None;
    ui.horizontal(|ui| {
        for action in BUTTONS {
            let button = egui::Button::new(label(action)).min_size(egui::vec2(110.0, 28.0));
            if ui.add_enabled(is_enabled(pipeline, action), button).clicked() {
                clicked = Some(action);
            }
        }
    });
    clicked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::graph::GraphHandle;
    use crate::pipeline::PipelineOutcome;

    #[test]
    fn buttons_follow_the_state_machine() {
        let mut p = Pipeline::new();
        let enabled = |p: &Pipeline| {
            BUTTONS
                .iter()
                .filter(|a| is_enabled(p, **a))
                .map(|a| label(*a))
                .collect::<Vec<_>>()
        };
        assert_eq!(enabled(&p), ["Symmetric", "Save", "Build Graph"]);

        p.begin(PipelineAction::BuildGraph).unwrap();
        assert_eq!(enabled(&p), ["Symmetric", "Save"]);

        p.finish(PipelineOutcome::GraphBuilt(Ok(GraphHandle {
            id: 0,
            dataset_id: "Character".into(),
        })))
        .unwrap();
        assert_eq!(enabled(&p), ["Symmetric", "Save", "Compute Graph"]);
    }
}
