use std::path::PathBuf;

use eframe::egui;

use crate::config::AnnotatorConfig;
use crate::state::AppState;
use crate::ui::{merge_dialog, panels, plot};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct AnnotatorApp {
    pub state: AppState,
}

impl AnnotatorApp {
    /// Start with the given config, optionally loading a results table and
    /// opening the merge form for an annotation table.
    pub fn new(
        config: AnnotatorConfig,
        results: Option<PathBuf>,
        annotation: Option<PathBuf>,
    ) -> Self {
        let mut state = AppState::new(config);
        if let Some(path) = results {
            state.load_results(&path);
            if let Some(path) = annotation {
                state.begin_merge(&path);
            }
        } else if annotation.is_some() {
            log::warn!("--annotation ignored: no results table given");
        }
        Self { state }
    }
}

impl eframe::App for AnnotatorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: axes, encoding, selection ----
        egui::SidePanel::left("control_panel")
            .default_width(260.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Merge form (floating) ----
        merge_dialog::merge_window(ctx, &mut self.state);

        // ---- Central panel: scatter plot ----
        egui::CentralPanel::default().show(ctx, |ui| {
            plot::scatter_plot(ui, &mut self.state);
        });
    }
}
