mod app;
mod color;
mod config;
mod data;
mod mapping;
mod state;
mod ui;

use std::path::PathBuf;

use app::AnnotatorApp;
use clap::Parser;
use config::AnnotatorConfig;
use eframe::egui;

/// Annotate peak vs. ipTM scatter plots of structure predictions.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Results table to open at start (.csv, .tsv, .json, .parquet, .xlsx).
    results: Option<PathBuf>,

    /// Annotation table to merge into the results.
    #[arg(long)]
    annotation: Option<PathBuf>,

    /// Viewer settings (TOML).
    #[arg(long, env = "IPTM_ANNOTATOR_CONFIG")]
    config: Option<PathBuf>,
}

fn main() -> eframe::Result {
    env_logger::init();
    let args = Args::parse();

    let (config, config_error) = match AnnotatorConfig::load(args.config.as_deref()) {
        Ok(config) => (config, None),
        Err(e) => {
            log::error!("{e}, falling back to defaults");
            (AnnotatorConfig::default(), Some(e.to_string()))
        }
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 820.0])
            .with_min_inner_size([640.0, 420.0]),
        ..Default::default()
    };

    eframe::run_native(
        "ipTM Annotator",
        options,
        Box::new(move |_cc| {
            let mut app = AnnotatorApp::new(config, args.results, args.annotation);
            if let Some(msg) = config_error {
                app.state.status_message = Some(msg);
            }
            Ok(Box::new(app))
        }),
    )
}
