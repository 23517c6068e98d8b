use std::process::ExitCode;

use eframe::egui;
use sketchpair::app::SketchApp;
use sketchpair::cli;
use sketchpair::logger;
use sketchpair::settings::SketchSettings;

fn main() -> ExitCode {
    logger::init();

    // -- CLI / headless mode ---------------------------------------------
    if cli::CliArgs::is_cli_mode() {
        use clap::Parser;
        return cli::run(cli::CliArgs::parse());
    }

    // -- GUI mode -----------------------------------------------------
    let settings = SketchSettings::load();
    sketchpair::log_info!(
        "dataset {} under {}, settings file {}",
        settings.dataset_id,
        settings.data_root.display(),
        SketchSettings::settings_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none)".to_string())
    );

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 680.0])
            .with_min_inner_size([1060.0, 640.0])
            .with_title("SketchPair"),
        ..Default::default()
    };

    match eframe::run_native(
        "SketchPair",
        options,
        Box::new(|cc| Box::new(SketchApp::new(cc, settings))),
    ) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            sketchpair::log_err!("window closed with error: {}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
