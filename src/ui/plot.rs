use std::collections::BTreeMap;

use eframe::egui::{Align2, Color32, PointerButton, Ui};
use egui_plot::{Line, Plot, PlotPoint, PlotPoints, Points, Text};

use crate::data::select::SelectionMode;
use crate::state::AppState;

const LASSO_COLOR: Color32 = Color32::from_rgb(255, 140, 0);

/// Minimum plot-space distance, relative to the visible width, between two
/// consecutive lasso vertices.
const LASSO_MIN_STEP: f64 = 0.002;

// ---------------------------------------------------------------------------
// Scatter plot (central panel)
// ---------------------------------------------------------------------------

/// Render the peak / ipTM scatter plot in the central panel.
pub fn scatter_plot(ui: &mut Ui, state: &mut AppState) {
    if state.table.is_none() {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open a results table to plot it  (File → Open results…)");
        });
        return;
    }

    // Points sharing colour and radius are drawn as one item; selected
    // groups sort last so they stay on top.
    let mut groups: BTreeMap<(bool, [u8; 4], u32), Vec<[f64; 2]>> = BTreeMap::new();
    let mut labels: Vec<([f64; 2], String)> = Vec::new();
    for (row, point) in state.points.iter().enumerate() {
        let (Some(point), Some(style)) = (point, state.point_style(row)) else {
            continue;
        };
        let selected = state.selection.as_ref().is_some_and(|s| s.contains(row));
        let key = (
            selected,
            style.to_color32().to_array(),
            (style.radius * 4.0).round() as u32,
        );
        groups.entry(key).or_default().push(*point);

        if selected && labels.len() < state.config.label_limit {
            labels.push((*point, state.label_for(row)));
        }
    }

    let lasso_mode = state.selector.mode == SelectionMode::Lasso;
    let mut lasso = state.selector.lasso.clone();
    if let Some(&first) = lasso.first() {
        lasso.push(first);
    }

    let label_color = ui.visuals().strong_text_color();
    let x_label = state.x_column.clone().unwrap_or_default();
    let y_label = state.y_column.clone().unwrap_or_default();
    let (fx, fy) = (x_label.clone(), y_label.clone());

    let response = Plot::new("scatter_plot")
        .x_axis_label(x_label)
        .y_axis_label(y_label)
        .label_formatter(move |name, value| {
            let head = if name.is_empty() {
                String::new()
            } else {
                format!("{name}\n")
            };
            format!("{head}{fx}: {:.3}\n{fy}: {:.3}", value.x, value.y)
        })
        .allow_boxed_zoom(true)
        .allow_drag(!lasso_mode)
        .allow_scroll(true)
        .allow_zoom(true)
        .show(ui, |plot_ui| {
            for ((_, rgba, radius), pts) in groups {
                let [r, g, b, a] = rgba;
                plot_ui.points(
                    Points::new(PlotPoints::new(pts))
                        .color(Color32::from_rgba_premultiplied(r, g, b, a))
                        .radius(radius as f32 / 4.0)
                        .filled(true),
                );
            }

            for ([x, y], label) in labels {
                plot_ui.text(
                    Text::new(PlotPoint::new(x, y), label)
                        .anchor(Align2::LEFT_BOTTOM)
                        .color(label_color),
                );
            }

            if lasso.len() > 1 {
                plot_ui.line(Line::new(PlotPoints::new(lasso)).color(LASSO_COLOR).width(1.5));
            }
        });

    if !lasso_mode {
        return;
    }

    // ---- Lasso drawing ----
    let r = &response.response;
    if r.drag_started_by(PointerButton::Primary) {
        state.selector.lasso.clear();
    }
    if r.dragged_by(PointerButton::Primary) {
        if let Some(pos) = r.interact_pointer_pos() {
            let p = response.transform.value_from_position(pos);
            let min_step = response.transform.bounds().width() * LASSO_MIN_STEP;
            let far_enough = state
                .selector
                .lasso
                .last()
                .map_or(true, |&[lx, ly]| (p.x - lx).hypot(p.y - ly) >= min_step);
            if far_enough {
                state.selector.lasso.push([p.x, p.y]);
            }
        }
    }
    if r.drag_stopped_by(PointerButton::Primary) {
        state.finish_lasso();
    }
}
