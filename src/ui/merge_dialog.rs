use eframe::egui::{self, Color32, Ui};
use egui_extras::{Column, TableBuilder};

use crate::data::merge::JoinKind;
use crate::data::model::DataTable;
use crate::state::AppState;

/// Rows of the annotation table shown before merging.
const PREVIEW_ROWS: usize = 5;

enum MergeAction {
    Merge,
    Cancel,
}

// ---------------------------------------------------------------------------
// Merge window
// ---------------------------------------------------------------------------

/// Floating window for the pending annotation merge, if any.
pub fn merge_window(ctx: &egui::Context, state: &mut AppState) {
    if state.pending_merge.is_none() {
        return;
    }

    let mut open = true;
    let mut action = None;
    let AppState {
        table,
        pending_merge,
        ..
    } = &mut *state;

    egui::Window::new("Merge annotation")
        .open(&mut open)
        .default_width(600.0)
        .resizable(true)
        .show(ctx, |ui: &mut Ui| {
            let (Some(results), Some(pending)) = (table.as_ref(), pending_merge.as_mut()) else {
                return;
            };

            let (rows, cols) = pending.annotation.shape();
            ui.label(format!("{}: {rows} rows × {cols} columns", pending.file_name()));
            ui.label(format!("First {PREVIEW_ROWS} rows:"));
            preview_table(ui, &pending.annotation, PREVIEW_ROWS);
            ui.separator();

            let mut key_changed = false;
            egui::Grid::new("merge_form")
                .num_columns(2)
                .spacing([8.0, 6.0])
                .show(ui, |ui: &mut Ui| {
                    ui.label("Results column");
                    key_combo(ui, "merge_left_on", &mut pending.left_on, &results.column_names);
                    ui.end_row();

                    ui.label("Annotation column");
                    key_changed |= key_combo(
                        ui,
                        "merge_right_on",
                        &mut pending.right_on,
                        &pending.annotation.column_names,
                    );
                    ui.end_row();

                    ui.checkbox(&mut pending.use_delimiter, "Multiple IDs, delimiter");
                    ui.add_enabled(
                        pending.use_delimiter,
                        egui::TextEdit::singleline(&mut pending.delimiter).desired_width(40.0),
                    );
                    ui.end_row();

                    ui.label("");
                    ui.add_enabled(
                        pending.use_delimiter,
                        egui::Checkbox::new(
                            &mut pending.strip_stoichiometry,
                            "Strip stoichiometry, e.g. P12345(2)",
                        ),
                    );
                    ui.end_row();

                    ui.label("Join");
                    ui.horizontal(|ui: &mut Ui| {
                        for how in JoinKind::ALL {
                            ui.selectable_value(&mut pending.how, how, how.to_string());
                        }
                    });
                    ui.end_row();
                });

            if key_changed {
                pending.refresh(results);
            }

            if pending.double_merge {
                ui.colored_label(
                    Color32::YELLOW,
                    "All columns from the external file (except the merge column) already \
                     exist in the results table. This might be a double merge.",
                );
                ui.checkbox(&mut pending.confirm_double_merge, "Proceed with the merge anyway");
            }

            ui.separator();
            ui.horizontal(|ui: &mut Ui| {
                let allowed = !pending.double_merge || pending.confirm_double_merge;
                if ui.add_enabled(allowed, egui::Button::new("Merge")).clicked() {
                    action = Some(MergeAction::Merge);
                }
                if ui.button("Cancel").clicked() {
                    action = Some(MergeAction::Cancel);
                }
            });
        });

    if !open {
        action = Some(MergeAction::Cancel);
    }
    match action {
        Some(MergeAction::Merge) => state.confirm_merge(),
        Some(MergeAction::Cancel) => state.cancel_merge(),
        None => {}
    }
}

/// Column picker bound to `value`; true when the user picked a new column.
fn key_combo(ui: &mut Ui, id_salt: &str, value: &mut String, columns: &[String]) -> bool {
    let mut changed = false;
    egui::ComboBox::from_id_salt(id_salt)
        .selected_text(value.as_str())
        .show_ui(ui, |ui: &mut Ui| {
            for col in columns {
                if ui.selectable_label(value == col, col).clicked() && value != col {
                    *value = col.clone();
                    changed = true;
                }
            }
        });
    changed
}

fn preview_table(ui: &mut Ui, table: &DataTable, n: usize) {
    egui::ScrollArea::horizontal()
        .id_salt("merge_preview")
        .show(ui, |ui: &mut Ui| {
            TableBuilder::new(ui)
                .striped(true)
                .vscroll(false)
                .columns(Column::auto().at_least(60.0), table.column_names.len())
                .header(20.0, |mut header| {
                    for name in &table.column_names {
                        header.col(|ui: &mut Ui| {
                            ui.strong(name);
                        });
                    }
                })
                .body(|mut body| {
                    for row in table.head(n) {
                        body.row(18.0, |mut table_row| {
                            for cell in row {
                                table_row.col(|ui: &mut Ui| {
                                    ui.label(cell.to_string());
                                });
                            }
                        });
                    }
                });
        });
}
