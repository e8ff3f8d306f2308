use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use crate::data::model::CellValue;
use crate::data::select::SelectionMode;
use crate::mapping::Channel;
use crate::state::AppState;

const SUPPORTED_EXTENSIONS: [&str; 9] = [
    "csv", "tsv", "txt", "json", "parquet", "pq", "xls", "xlsx", "xlsm",
];

// ---------------------------------------------------------------------------
// Left side panel – axes, visual channels, selection
// ---------------------------------------------------------------------------

/// Render the left control panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Plot");
    ui.separator();

    let table = match &state.table {
        Some(t) => t,
        None => {
            ui.label("No results loaded.");
            return;
        }
    };

    // Clone what we need so we can mutate state inside the scroll area.
    let columns = table.column_names.clone();
    let numeric: Vec<String> = columns
        .iter()
        .filter(|c| table.is_numeric_column(c))
        .cloned()
        .collect();
    let text_columns = table.text_columns();
    let complexes: Vec<String> = state
        .selector
        .complex_column
        .as_ref()
        .and_then(|c| table.unique_values.get(c))
        .map(|vals| vals.iter().filter_map(CellValue::as_text).collect())
        .unwrap_or_default();

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            // ---- Axes and identifier ----
            ui.strong("Axes");
            if let Some(x) = column_combo(ui, "x_axis", "X", state.x_column.as_deref(), &numeric, false) {
                let y = state.y_column.clone();
                state.set_axes(x, y);
            }
            if let Some(y) = column_combo(ui, "y_axis", "Y", state.y_column.as_deref(), &numeric, false) {
                let x = state.x_column.clone();
                state.set_axes(x, y);
            }
            if let Some(id) = column_combo(ui, "id_column", "Label", state.id_column.as_deref(), &columns, false) {
                state.id_column = id;
            }
            ui.separator();

            // ---- Visual channels ----
            ui.strong("Encoding");
            for channel in Channel::ALL {
                let current = state.encoding.get(channel).map(str::to_string);
                let salt = format!("{channel:?}_channel");
                if let Some(col) =
                    column_combo(ui, &salt, &channel.to_string(), current.as_deref(), &columns, true)
                {
                    state.set_channel(channel, col);
                }
            }

            if let Some(mapper) = &state.mapper {
                for (label, color) in mapper.legend_entries() {
                    ui.label(RichText::new(format!("● {label}")).color(color));
                }
            }
            ui.separator();

            selection_controls(ui, state, &columns, &text_columns, &complexes);
        });
}

/// Column picker; returns the new choice when the user changed it.
fn column_combo(
    ui: &mut Ui,
    id_salt: &str,
    label: &str,
    current: Option<&str>,
    columns: &[String],
    allow_none: bool,
) -> Option<Option<String>> {
    let mut changed = None;
    ui.horizontal(|ui: &mut Ui| {
        ui.label(label);
        egui::ComboBox::from_id_salt(id_salt)
            .selected_text(current.unwrap_or("(none)"))
            .show_ui(ui, |ui: &mut Ui| {
                if allow_none && ui.selectable_label(current.is_none(), "(none)").clicked() {
                    changed = Some(None);
                }
                for col in columns {
                    if ui
                        .selectable_label(current == Some(col.as_str()), col)
                        .clicked()
                    {
                        changed = Some(Some(col.clone()));
                    }
                }
            });
    });
    changed
}

// ---------------------------------------------------------------------------
// Selection controls
// ---------------------------------------------------------------------------

fn selection_controls(
    ui: &mut Ui,
    state: &mut AppState,
    columns: &[String],
    text_columns: &[String],
    complexes: &[String],
) {
    ui.strong("Select");
    ui.horizontal(|ui: &mut Ui| {
        for mode in SelectionMode::ALL {
            ui.selectable_value(&mut state.selector.mode, mode, mode.to_string());
        }
    });

    let mut run = false;
    match state.selector.mode {
        SelectionMode::Lasso => {
            ui.label("Drag on the plot to draw a lasso.");
        }
        SelectionMode::TextSearch => {
            let response = ui.text_edit_singleline(&mut state.selector.text.query);
            run |= response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            ui.horizontal(|ui: &mut Ui| {
                ui.checkbox(&mut state.selector.text.exact, "Exact");
                ui.checkbox(&mut state.selector.text.case_sensitive, "Match case");
            });
            let selected_columns = &mut state.selector.text.columns;
            let header = if selected_columns.is_empty() {
                "Columns (all text)".to_string()
            } else {
                format!("Columns ({})", selected_columns.len())
            };
            egui::CollapsingHeader::new(header)
                .id_salt("text_columns")
                .show(ui, |ui: &mut Ui| {
                    for col in text_columns {
                        let mut checked = selected_columns.contains(col);
                        if ui.checkbox(&mut checked, col).changed() {
                            if checked {
                                selected_columns.push(col.clone());
                            } else {
                                selected_columns.retain(|c| c != col);
                            }
                        }
                    }
                });
            run |= ui.button("Search").clicked();
        }
        SelectionMode::IndexMatch => {
            ui.label("Row indices or identifiers:");
            ui.add(
                egui::TextEdit::multiline(&mut state.selector.index_input)
                    .hint_text("0, 4, 17  or  P12345 Q67890")
                    .desired_rows(3),
            );
            run |= ui.button("Match").clicked();
        }
        SelectionMode::ComplexMembership => {
            if let Some(col) = column_combo(
                ui,
                "complex_column",
                "Complex column",
                state.selector.complex_column.as_deref(),
                columns,
                false,
            ) {
                state.selector.complex_column = col;
                state.selector.complex_name.clear();
            }
            if state.selector.complex_column.is_none() {
                ui.label("Merge a complex annotation table first.");
            } else {
                let current = state.selector.complex_name.clone();
                egui::ComboBox::from_id_salt("complex_name")
                    .selected_text(if current.is_empty() { "(choose)" } else { current.as_str() })
                    .width(ui.available_width())
                    .show_ui(ui, |ui: &mut Ui| {
                        for name in complexes {
                            if ui.selectable_label(current == *name, name).clicked() {
                                state.selector.complex_name = name.clone();
                                run = true;
                            }
                        }
                    });
            }
        }
    }
    if run {
        state.run_selector();
    }

    ui.add_space(4.0);
    ui.horizontal(|ui: &mut Ui| {
        if ui.button("Clear selection").clicked() {
            state.clear_selection();
        }
        let ids = state.selected_identifiers();
        if ui
            .add_enabled(!ids.is_empty(), egui::Button::new("Copy selected IDs"))
            .clicked()
        {
            ui.ctx().copy_text(ids.join("\n"));
        }
    });

    if let Some(sel) = &state.selection {
        if sel.is_empty() {
            ui.label(format!("{}: no rows matched", sel.query.mode()));
        } else {
            ui.label(format!("{}: {} rows selected", sel.query.mode(), sel.len()));
        }
    }
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open results…").clicked() {
                open_results_dialog(state);
                ui.close_menu();
            }
            if ui
                .add_enabled(state.table.is_some(), egui::Button::new("Merge annotation…"))
                .clicked()
            {
                open_annotation_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        if let Some(table) = &state.table {
            let (rows, cols) = table.shape();
            let source = state
                .source
                .as_ref()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            ui.label(format!("{source}  {rows} rows × {cols} columns"));
            if let Some(sel) = &state.selection {
                ui.separator();
                ui.label(format!("{} selected", sel.len()));
            }
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

fn table_dialog(title: &str) -> rfd::FileDialog {
    rfd::FileDialog::new()
        .set_title(title)
        .add_filter("Supported files", &SUPPORTED_EXTENSIONS)
        .add_filter("CSV", &["csv"])
        .add_filter("TSV", &["tsv", "txt"])
        .add_filter("JSON", &["json"])
        .add_filter("Parquet", &["parquet", "pq"])
        .add_filter("Excel", &["xls", "xlsx", "xlsm"])
}

pub fn open_results_dialog(state: &mut AppState) {
    if let Some(path) = table_dialog("Open results table").pick_file() {
        state.load_results(&path);
    }
}

pub fn open_annotation_dialog(state: &mut AppState) {
    if let Some(path) = table_dialog("Open annotation table").pick_file() {
        state.begin_merge(&path);
    }
}
