use std::process::ExitCode;

use eframe::egui;
use mathcanvas::app::MathCanvasApp;
use mathcanvas::config::AppConfig;
use mathcanvas::{cli, logger};

/// Height reserved for the toolbar above the canvas.
const TOOLBAR_HEIGHT: f32 = 40.0;

fn main() -> ExitCode {
    // -- CLI / headless mode ---------------------------------------------
    if cli::CliArgs::is_cli_mode() {
        use clap::Parser;
        let args = cli::CliArgs::parse();
        logger::init_stderr(args.verbose);
        return cli::run(args);
    }

    // -- GUI mode -----------------------------------------------------

    // Config decides the log level, so it is read first and any error is
    // reported once the session log exists.
    let loaded = AppConfig::load();
    let mut config = loaded.as_ref().cloned().unwrap_or_default();
    logger::init(config.debug_logging);
    if let Err(e) = &loaded {
        tracing::warn!("config unavailable, using defaults: {:#}", e);
    }
    config.apply_overrides(AppConfig::env_service_url(), None);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([
                config.canvas_width as f32,
                config.canvas_height as f32 + TOOLBAR_HEIGHT,
            ])
            .with_title("MathCanvas"),
        ..Default::default()
    };

    match eframe::run_native(
        "MathCanvas",
        options,
        Box::new(move |cc| Box::new(MathCanvasApp::new(cc, config))),
    ) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("window closed with error: {}", e);
            ExitCode::FAILURE
        }
    }
}
