use std::path::{Path, PathBuf};

use crate::config::AnnotatorConfig;
use crate::data::loader::load_file;
use crate::data::merge::{JoinKind, MergeSpec, is_double_merge, key_overlap, merge};
use crate::data::model::DataTable;
use crate::data::select::{
    IndexQuery, Selection, SelectionMode, SelectionQuery, TextQuery, select,
};
use crate::mapping::{Channel, PointStyle, VisualEncoding, VisualMapper};

// ---------------------------------------------------------------------------
// Selector inputs
// ---------------------------------------------------------------------------

/// What the user has typed or drawn for each selection mode.
#[derive(Debug, Clone, Default)]
pub struct SelectorInputs {
    pub mode: SelectionMode,
    pub text: TextQuery,
    pub index_input: String,
    pub complex_column: Option<String>,
    pub complex_name: String,
    /// Lasso vertices in plot coordinates while a drag is in progress.
    pub lasso: Vec<[f64; 2]>,
}

// ---------------------------------------------------------------------------
// Pending merge
// ---------------------------------------------------------------------------

/// An annotation table that has been read but not yet merged.
#[derive(Debug, Clone)]
pub struct PendingMerge {
    pub path: PathBuf,
    pub annotation: DataTable,
    pub left_on: String,
    pub right_on: String,
    pub use_delimiter: bool,
    pub delimiter: String,
    pub strip_stoichiometry: bool,
    pub how: JoinKind,
    /// Every annotation column is already present in the results.
    pub double_merge: bool,
    pub confirm_double_merge: bool,
}

impl PendingMerge {
    fn new(
        path: PathBuf,
        annotation: DataTable,
        results: &DataTable,
        left_on: &str,
        config: &AnnotatorConfig,
    ) -> Self {
        let delimiter = config.multiple_id_delimiter.clone();
        let right_on = if annotation.has_column(left_on) {
            left_on.to_string()
        } else {
            // Column sharing the most IDs with the results; ties keep the first.
            annotation
                .column_names
                .iter()
                .map(|c| (key_overlap(results, left_on, &annotation, c, Some(delimiter.as_str())), c))
                .fold(None, |best: Option<(usize, &String)>, (n, c)| match best {
                    Some((m, _)) if m >= n => best,
                    _ => Some((n, c)),
                })
                .map(|(_, c)| c.clone())
                .unwrap_or_default()
        };
        let use_delimiter = !delimiter.is_empty()
            && annotation.column(&right_on).is_some_and(|mut cells| {
                cells.any(|c| c.as_key().is_some_and(|k| k.contains(delimiter.as_str())))
            });
        let mut pending = PendingMerge {
            path,
            annotation,
            left_on: left_on.to_string(),
            right_on,
            use_delimiter,
            delimiter,
            strip_stoichiometry: use_delimiter,
            how: JoinKind::Left,
            double_merge: false,
            confirm_double_merge: false,
        };
        pending.refresh(results);
        pending
    }

    /// Re-run the double-merge check after the key column changed.
    pub fn refresh(&mut self, results: &DataTable) {
        self.double_merge = is_double_merge(results, &self.annotation, &self.right_on);
        if !self.double_merge {
            self.confirm_double_merge = false;
        }
    }

    pub fn spec(&self) -> MergeSpec {
        MergeSpec {
            left_on: self.left_on.clone(),
            right_on: self.right_on.clone(),
            delimiter: self.use_delimiter.then(|| self.delimiter.clone()),
            strip_stoichiometry: self.use_delimiter && self.strip_stoichiometry,
            how: self.how,
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    pub config: AnnotatorConfig,

    /// Loaded (and possibly merged) results table.
    pub table: Option<DataTable>,

    /// File the results were read from.
    pub source: Option<PathBuf>,

    pub id_column: Option<String>,
    pub x_column: Option<String>,
    pub y_column: Option<String>,

    /// Plot coordinates per row (cached); `None` when either value is missing.
    pub points: Vec<Option<[f64; 2]>>,

    /// Which columns drive colour, size and opacity.
    pub encoding: VisualEncoding,

    /// Mapper built from `encoding` against the current table.
    pub mapper: Option<VisualMapper>,

    /// The single active selection.
    pub selection: Option<Selection>,

    pub selector: SelectorInputs,

    /// Annotation table waiting for the user to confirm the merge.
    pub pending_merge: Option<PendingMerge>,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(AnnotatorConfig::default())
    }
}

impl AppState {
    pub fn new(config: AnnotatorConfig) -> Self {
        Self {
            config,
            table: None,
            source: None,
            id_column: None,
            x_column: None,
            y_column: None,
            points: Vec::new(),
            encoding: VisualEncoding::default(),
            mapper: None,
            selection: None,
            selector: SelectorInputs::default(),
            pending_merge: None,
            status_message: None,
        }
    }

    // -- Loading ------------------------------------------------------------

    /// Read a results table and make it current.
    pub fn load_results(&mut self, path: &Path) {
        match load_file(path) {
            Ok(table) => {
                if table.is_empty() {
                    log::warn!("{} has a header but no rows", path.display());
                }
                log::info!(
                    "Loaded {} rows with columns {:?}",
                    table.len(),
                    table.column_names
                );
                self.source = Some(path.to_path_buf());
                self.set_table(table);
                self.status_message = None;
            }
            Err(e) => self.report_error("Failed to load results", e),
        }
    }

    /// Ingest a table: keep column choices that still exist, otherwise fall
    /// back to the configured names or the first suitable columns.
    pub fn set_table(&mut self, table: DataTable) {
        let numeric: Vec<&String> = table
            .column_names
            .iter()
            .filter(|c| table.is_numeric_column(c))
            .collect();
        let text = table.text_columns();

        let pick = |current: &Option<String>, preferred: &str, fallback: Option<&String>| {
            current
                .as_ref()
                .filter(|c| table.has_column(c))
                .cloned()
                .or_else(|| table.has_column(preferred).then(|| preferred.to_string()))
                .or_else(|| fallback.cloned())
        };
        self.id_column = pick(&self.id_column, &self.config.id_column, text.first());
        self.x_column = pick(&self.x_column, &self.config.x_column, numeric.first().copied());
        self.y_column = pick(&self.y_column, &self.config.y_column, numeric.get(1).copied());

        for channel in Channel::ALL {
            if let Some(col) = self.encoding.get(channel) {
                if !table.has_column(col) {
                    self.encoding.set(channel, None);
                }
            }
        }

        let complex = &self.config.complex_column;
        self.selector.complex_column = self
            .selector
            .complex_column
            .take()
            .filter(|c| table.has_column(c))
            .or_else(|| table.has_column(complex).then(|| complex.clone()));
        self.selector.text.columns.retain(|c| table.has_column(c));

        // Row indices are only meaningful for the table they were made on.
        self.selection = None;
        self.selector.lasso.clear();

        self.table = Some(table);
        self.recompute_points();
        self.rebuild_mapper();
    }

    // -- Axes and visual channels --------------------------------------------

    pub fn set_axes(&mut self, x: Option<String>, y: Option<String>) {
        self.x_column = x;
        self.y_column = y;
        self.recompute_points();
    }

    /// Recompute cached plot coordinates from the axis columns.
    pub fn recompute_points(&mut self) {
        let Some(table) = &self.table else {
            self.points.clear();
            return;
        };
        let axis = |col: &Option<String>| {
            col.as_deref()
                .and_then(|c| table.numeric_column(c))
                .unwrap_or_else(|| vec![None; table.len()])
        };
        let xs = axis(&self.x_column);
        let ys = axis(&self.y_column);
        self.points = xs
            .into_iter()
            .zip(ys)
            .map(|(x, y)| Some([x?, y?]))
            .collect();
    }

    /// Set the column for one channel (or unset it) and rebuild the mapper.
    pub fn set_channel(&mut self, channel: Channel, column: Option<String>) {
        self.encoding.set(channel, column);
        self.rebuild_mapper();
    }

    pub fn rebuild_mapper(&mut self) {
        self.mapper = self
            .table
            .as_ref()
            .map(|t| VisualMapper::new(t, &self.encoding, &self.config));
    }

    /// Style of a row including selection dimming.
    pub fn point_style(&self, row: usize) -> Option<PointStyle> {
        let table = self.table.as_ref()?;
        let mapper = self.mapper.as_ref()?;
        let mut style = mapper.style_for(table.rows.get(row)?);
        if let Some(sel) = &self.selection {
            if !sel.contains(row) {
                style.alpha *= self.config.dim_factor;
            }
        }
        Some(style)
    }

    // -- Selection ------------------------------------------------------------

    /// Resolve `query` and make it the only active selection.
    pub fn apply_selection(&mut self, query: SelectionQuery) {
        let Some(table) = &self.table else {
            return;
        };
        match select(table, &self.points, self.id_column.as_deref(), query) {
            Ok(selection) => {
                self.selection = Some(selection);
                self.status_message = None;
            }
            Err(e) => self.report_error("Selection failed", e),
        }
    }

    /// Build a query from the current text/index/complex inputs and apply it.
    pub fn run_selector(&mut self) {
        let query = match self.selector.mode {
            SelectionMode::Lasso => return self.finish_lasso(),
            SelectionMode::TextSearch => SelectionQuery::Text(self.selector.text.clone()),
            SelectionMode::IndexMatch => {
                SelectionQuery::Index(IndexQuery::parse(&self.selector.index_input))
            }
            SelectionMode::ComplexMembership => {
                let Some(column) = self.selector.complex_column.clone() else {
                    self.status_message =
                        Some("Merge a complex annotation table first".to_string());
                    return;
                };
                SelectionQuery::Complex {
                    column,
                    name: self.selector.complex_name.clone(),
                }
            }
        };
        self.apply_selection(query);
    }

    /// Close the drawn lasso and select what it encloses.
    pub fn finish_lasso(&mut self) {
        let polygon = std::mem::take(&mut self.selector.lasso);
        if polygon.len() >= 3 {
            self.apply_selection(SelectionQuery::Lasso(polygon));
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
        self.selector.lasso.clear();
    }

    /// Identifier text of every selected row, in row order.
    pub fn selected_identifiers(&self) -> Vec<String> {
        let (Some(table), Some(sel), Some(id)) = (&self.table, &self.selection, &self.id_column)
        else {
            return Vec::new();
        };
        let Some(col) = table.column_index(id) else {
            return Vec::new();
        };
        sel.indices
            .iter()
            .filter_map(|&row| table.value(row, col).as_text())
            .collect()
    }

    /// Label drawn next to a point: its identifier, or its row index.
    pub fn label_for(&self, row: usize) -> String {
        self.table
            .as_ref()
            .zip(self.id_column.as_deref())
            .and_then(|(t, id)| t.value(row, t.column_index(id)?).as_text())
            .unwrap_or_else(|| format!("#{row}"))
    }

    // -- Merging --------------------------------------------------------------

    /// Read an annotation table and open the merge form for it.
    pub fn begin_merge(&mut self, path: &Path) {
        let Some(results) = &self.table else {
            self.status_message = Some("Open a results table before merging".to_string());
            return;
        };
        match load_file(path) {
            Ok(annotation) => {
                let left_on = self
                    .id_column
                    .clone()
                    .or_else(|| results.column_names.first().cloned())
                    .unwrap_or_default();
                self.pending_merge = Some(PendingMerge::new(
                    path.to_path_buf(),
                    annotation,
                    results,
                    &left_on,
                    &self.config,
                ));
                self.status_message = None;
            }
            Err(e) => self.report_error("Failed to read annotation file", e),
        }
    }

    /// Merge the pending annotation table into the results.  The form stays
    /// open when the merge is refused.
    pub fn confirm_merge(&mut self) {
        let (Some(results), Some(pending)) = (&self.table, &self.pending_merge) else {
            return;
        };
        match merge(
            results,
            &pending.annotation,
            &pending.spec(),
            pending.confirm_double_merge,
        ) {
            Ok(merged) => {
                log::info!("Merged {} ({} rows)", pending.file_name(), merged.len());
                self.status_message = None;
                self.pending_merge = None;
                self.set_table(merged);
            }
            Err(e) => self.report_error("Merge refused", e),
        }
    }

    pub fn cancel_merge(&mut self) {
        if self.pending_merge.take().is_some() {
            log::info!("Merge operation canceled");
        }
    }

    fn report_error(&mut self, what: &str, e: impl std::fmt::Display) {
        log::error!("{what}: {e:#}");
        self.status_message = Some(format!("{what}: {e:#}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::CellValue;

    fn s(v: &str) -> CellValue {
        CellValue::String(v.to_string())
    }

    fn state_with_results() -> AppState {
        let mut state = AppState::default();
        state.set_table(DataTable::from_rows(
            vec!["id".into(), "peak".into(), "iptm".into()],
            vec![
                vec![s("P1"), CellValue::Float(0.9), CellValue::Float(0.8)],
                vec![s("P2"), CellValue::Float(0.5), CellValue::Null],
                vec![s("P3"), CellValue::Float(0.2), CellValue::Float(0.1)],
            ],
        ));
        state
    }

    fn write_portal(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("complexes.tsv");
        std::fs::write(
            &path,
            "#Complex ac\tRecommended name\tmembers\nCPX-1\tComplexA\tP1(1)|P9(1)\n",
        )
        .unwrap();
        path
    }

    #[test]
    fn set_table_picks_configured_columns_and_points() {
        let state = state_with_results();
        assert_eq!(state.id_column.as_deref(), Some("id"));
        assert_eq!(state.x_column.as_deref(), Some("peak"));
        assert_eq!(state.y_column.as_deref(), Some("iptm"));
        assert_eq!(
            state.points,
            vec![Some([0.9, 0.8]), None, Some([0.2, 0.1])]
        );
    }

    #[test]
    fn new_selection_replaces_the_previous_one() {
        let mut state = state_with_results();
        state.selector.mode = SelectionMode::IndexMatch;
        state.selector.index_input = "0, 2".into();
        state.run_selector();
        assert_eq!(state.selection.as_ref().unwrap().len(), 2);

        state.selector.lasso = vec![[0.0, 0.0], [0.5, 0.0], [0.5, 0.5], [0.0, 0.5]];
        state.finish_lasso();
        let sel = state.selection.as_ref().unwrap();
        assert_eq!(sel.query.mode(), SelectionMode::Lasso);
        assert_eq!(sel.indices.iter().copied().collect::<Vec<_>>(), vec![2]);
        assert!(state.selector.lasso.is_empty());
        assert_eq!(state.selected_identifiers(), vec!["P3".to_string()]);
    }

    #[test]
    fn unselected_points_are_dimmed() {
        let mut state = state_with_results();
        let before = state.point_style(1).unwrap().alpha;
        state.apply_selection(SelectionQuery::Index(IndexQuery::Indices(vec![0])));
        assert_eq!(state.point_style(0).unwrap().alpha, before);
        assert!(state.point_style(1).unwrap().alpha < before);
        state.clear_selection();
        assert_eq!(state.point_style(1).unwrap().alpha, before);
    }

    #[test]
    fn merge_complex_portal_then_select_membership() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state_with_results();
        state.apply_selection(SelectionQuery::Index(IndexQuery::Indices(vec![1])));

        state.begin_merge(&write_portal(&dir));
        let pending = state.pending_merge.as_ref().unwrap();
        assert_eq!(pending.right_on, "members");
        assert!(pending.use_delimiter && pending.strip_stoichiometry);
        assert!(!pending.double_merge);

        state.confirm_merge();
        assert!(state.pending_merge.is_none());
        assert!(state.selection.is_none());
        let table = state.table.as_ref().unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(
            state.selector.complex_column.as_deref(),
            Some("Recommended name")
        );

        state.selector.mode = SelectionMode::ComplexMembership;
        state.selector.complex_name = "ComplexA".into();
        state.run_selector();
        let sel = state.selection.as_ref().unwrap();
        assert_eq!(sel.indices.iter().copied().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn double_merge_needs_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("again.csv");
        std::fs::write(&path, "id,peak\nP1,0.3\n").unwrap();

        let mut state = state_with_results();
        state.begin_merge(&path);
        assert!(state.pending_merge.as_ref().unwrap().double_merge);

        state.confirm_merge();
        assert!(state.pending_merge.is_some());
        assert!(state.status_message.as_deref().unwrap().contains("double merge"));
        assert_eq!(state.table.as_ref().unwrap().column_names.len(), 3);

        state.pending_merge.as_mut().unwrap().confirm_double_merge = true;
        state.confirm_merge();
        assert!(state.pending_merge.is_none());
        let table = state.table.as_ref().unwrap();
        assert!(table.has_column("peak_x") && table.has_column("peak_y"));
        // The x axis column was renamed, so the first numeric column takes over.
        assert_eq!(state.x_column.as_deref(), Some("peak_x"));
    }

    #[test]
    fn complex_selection_without_annotation_reports_status() {
        let mut state = state_with_results();
        state.selector.mode = SelectionMode::ComplexMembership;
        state.run_selector();
        assert!(state.selection.is_none());
        assert!(state.status_message.is_some());
    }
}
