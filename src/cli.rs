// ============================================================================
// SketchPair CLI — headless runs of the sketch → mesh session
// ============================================================================
//
// Usage examples:
//   sketchpair --front f.png --side s.png --save
//   sketchpair --front f.png --side s.png --mirror --save --pipeline
//   sketchpair --headless --dataset Chair --pipeline --verbose
//   sketchpair --headless --dataset Chair --save-config
//
// No window is opened. Pipeline jobs run synchronously on the current thread,
// in the same order the GUI buttons allow them.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use crate::canvas::CanvasId;
use crate::controller::SessionController;
use crate::pipeline::PipelineAction;
use crate::session::{Session, StatusLevel};
use crate::settings::SketchSettings;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// SketchPair headless runner.
///
/// Loads front/side drawings, optionally mirrors and saves them, and drives
/// the graph build → graph compute → fuse pipeline without the GUI.
#[derive(Parser, Debug)]
#[command(
    name = "sketchpair",
    about = "SketchPair headless sketch-to-mesh runner",
    long_about = "Load front and side sketches, save them into the dataset tree and run\n\
                  the reconstruction pipeline without opening the GUI.\n\n\
                  Example:\n  \
                  sketchpair --front f.png --side s.png --save --pipeline"
)]
pub struct CliArgs {
    /// Run without a window even when no drawing is given.
    #[arg(long)]
    pub headless: bool,

    /// Drawing loaded into the front canvas (fit to width, centered).
    #[arg(long, value_name = "IMAGE")]
    pub front: Option<PathBuf>,

    /// Drawing loaded into the side canvas.
    #[arg(long, value_name = "IMAGE")]
    pub side: Option<PathBuf>,

    /// Guide image shown faintly behind the front canvas.
    #[arg(long, value_name = "IMAGE")]
    pub guide_front: Option<PathBuf>,

    /// Guide image shown faintly behind the side canvas.
    #[arg(long, value_name = "IMAGE")]
    pub guide_side: Option<PathBuf>,

    /// Mirror the front view's left half onto its right half.
    #[arg(long)]
    pub mirror: bool,

    /// Export both views into the sketch and hi-res directories.
    #[arg(long)]
    pub save: bool,

    /// Build the graph, compute it and fuse the mesh.
    #[arg(long)]
    pub pipeline: bool,

    /// Settings file to use instead of the per-user one.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write the settings in effect (file plus overrides) back to --config,
    /// or to the per-user settings file.
    #[arg(long)]
    pub save_config: bool,

    /// Dataset id overriding the settings file.
    #[arg(long, value_name = "ID")]
    pub dataset: Option<String>,

    /// Print every status line, not only errors.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when any CLI-mode flag is present in the real process arguments.
    /// Used by `main()` to route before creating an eframe window.
    pub fn is_cli_mode() -> bool {
        Self::routes_to_cli(std::env::args().skip(1))
    }

    fn routes_to_cli(args: impl IntoIterator<Item = String>) -> bool {
        args.into_iter().any(|a| {
            ["--headless", "--front", "--side"]
                .iter()
                .any(|flag| a == *flag || a.starts_with(&format!("{flag}=")))
        })
    }

    /// Settings file (or the per-user one) with command-line overrides applied.
    pub fn settings(&self) -> SketchSettings {
        let mut settings = match &self.config {
            Some(path) => SketchSettings::load_from(path),
            None => SketchSettings::load(),
        };
        if let Some(dataset) = &self.dataset {
            settings.dataset_id = dataset.clone();
        }
        settings
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run the requested steps and return an OS exit code.
/// `0` = every requested step succeeded, `1` = at least one failed.
pub fn run(args: CliArgs) -> ExitCode {
    let settings = args.settings();
    crate::log_info!(
        "headless run, dataset {} under {}",
        settings.dataset_id,
        settings.data_root.display()
    );
    let mut controller = SessionController::new(settings);
    let ok = execute(&args, &mut controller);
    print_status(controller.session(), args.verbose);

    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Apply every requested step to `controller`. Returns `false` when any step
/// failed; loading and saving carry on past failures, the pipeline stops at
/// the first one.
pub fn execute(args: &CliArgs, controller: &mut SessionController) -> bool {
    let mut ok = true;

    if args.save_config {
        match args.config.clone().or_else(SketchSettings::settings_path) {
            Some(path) => ok &= controller.save_settings(&path).is_ok(),
            None => {
                controller
                    .session_mut()
                    .error("no settings location on this platform; pass --config");
                ok = false;
            }
        }
    }

    let guides = [
        (CanvasId::Front, &args.guide_front),
        (CanvasId::Side, &args.guide_side),
    ];
    for (id, path) in guides {
        if let Some(path) = path {
            ok &= controller.load_guide(id, path).is_ok();
        }
    }

    let drawings = [(CanvasId::Front, &args.front), (CanvasId::Side, &args.side)];
    for (id, path) in drawings {
        if let Some(path) = path {
            ok &= controller.load_drawing(id, path).is_ok();
        }
    }

    if args.mirror {
        controller.mirror();
    }

    if args.save {
        ok &= controller.save() == 0;
    }

    if args.pipeline {
        for action in PipelineAction::ALL {
            if controller.run_blocking(action).is_err() {
                ok = false;
                break;
            }
        }
    }

    ok
}

fn print_status(session: &Session, verbose: bool) {
    for msg in session.status_history() {
        match msg.level {
            StatusLevel::Error => eprintln!("error: {}", msg.text),
            StatusLevel::Info if verbose => println!("{}", msg.text),
            StatusLevel::Info => {}
        }
    }
}
