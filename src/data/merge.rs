use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use thiserror::Error;

use super::model::{CellValue, DataTable};

// ---------------------------------------------------------------------------
// Merge options
// ---------------------------------------------------------------------------

/// Which rows survive a key join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinKind {
    #[default]
    Left,
    Right,
    Inner,
    Outer,
}

impl JoinKind {
    pub const ALL: [JoinKind; 4] = [JoinKind::Left, JoinKind::Right, JoinKind::Inner, JoinKind::Outer];
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JoinKind::Left => "left",
            JoinKind::Right => "right",
            JoinKind::Inner => "inner",
            JoinKind::Outer => "outer",
        };
        write!(f, "{name}")
    }
}

/// Which side of a merge a column was expected on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableSide {
    Primary,
    Annotation,
}

impl fmt::Display for TableSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableSide::Primary => write!(f, "results table"),
            TableSide::Annotation => write!(f, "annotation table"),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum MergeError {
    #[error("column '{column}' not found in the {side}")]
    ColumnNotFound { column: String, side: TableSide },
    #[error("multiple-ID delimiter must not be empty")]
    EmptyDelimiter,
    #[error(
        "all columns of the annotation table (except '{key}') already exist in the results table; \
         this looks like a double merge"
    )]
    DoubleMerge { key: String },
}

/// Columns and options for joining an annotation table onto the results.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeSpec {
    /// Key column in the results table.
    pub left_on: String,
    /// Key column in the annotation table.
    pub right_on: String,
    /// Split the annotation key on this delimiter before joining.
    pub delimiter: Option<String>,
    /// Drop `(n)` stoichiometry suffixes from expanded IDs.
    pub strip_stoichiometry: bool,
    pub how: JoinKind,
}

impl MergeSpec {
    pub fn validate(&self, left: &DataTable, right: &DataTable) -> Result<(), MergeError> {
        if !left.has_column(&self.left_on) {
            return Err(MergeError::ColumnNotFound {
                column: self.left_on.clone(),
                side: TableSide::Primary,
            });
        }
        if !right.has_column(&self.right_on) {
            return Err(MergeError::ColumnNotFound {
                column: self.right_on.clone(),
                side: TableSide::Annotation,
            });
        }
        if self.delimiter.as_deref() == Some("") {
            return Err(MergeError::EmptyDelimiter);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Double-merge detection
// ---------------------------------------------------------------------------

/// True when every annotation column other than the key is already present
/// in the results table.
pub fn is_double_merge(left: &DataTable, right: &DataTable, right_on: &str) -> bool {
    let existing: BTreeSet<&str> = left.column_names.iter().map(String::as_str).collect();
    right
        .column_names
        .iter()
        .filter(|c| c.as_str() != right_on)
        .all(|c| existing.contains(c.as_str()))
}

// ---------------------------------------------------------------------------
// Multiple-ID expansion
// ---------------------------------------------------------------------------

/// Split a key column holding several delimiter-separated IDs so that each ID
/// gets its own row.  IDs are trimmed and empty tokens dropped; null keys
/// stay as a single null row.
pub fn expand_multiple_ids(
    table: &DataTable,
    column: &str,
    delimiter: &str,
    strip_stoichiometry: bool,
) -> Result<DataTable, MergeError> {
    if delimiter.is_empty() {
        return Err(MergeError::EmptyDelimiter);
    }
    let col = table
        .column_index(column)
        .ok_or_else(|| MergeError::ColumnNotFound {
            column: column.to_string(),
            side: TableSide::Annotation,
        })?;

    let mut rows = Vec::with_capacity(table.len());
    for row in &table.rows {
        let Some(text) = row[col].as_key() else {
            rows.push(row.clone());
            continue;
        };
        for token in text.split(delimiter) {
            let mut id = token.trim();
            if strip_stoichiometry {
                id = strip_suffix_group(id);
            }
            if id.is_empty() {
                continue;
            }
            let mut expanded = row.clone();
            expanded[col] = CellValue::String(id.to_string());
            rows.push(expanded);
        }
    }

    Ok(DataTable::from_rows(table.column_names.clone(), rows))
}

/// Number of annotation rows whose key (split on `delimiter` when given)
/// hits at least one key of the results table.  Used to guess the merge
/// column of a freshly opened annotation file.
pub fn key_overlap(
    left: &DataTable,
    left_on: &str,
    right: &DataTable,
    right_on: &str,
    delimiter: Option<&str>,
) -> usize {
    let (Some(left_keys), Some(right_cells)) = (left.column(left_on), right.column(right_on)) else {
        return 0;
    };
    let left_keys: HashSet<String> = left_keys.filter_map(CellValue::as_key).collect();
    right_cells
        .filter_map(CellValue::as_key)
        .filter(|text| match delimiter.filter(|d| !d.is_empty()) {
            Some(d) => text
                .split(d)
                .any(|t| left_keys.contains(strip_suffix_group(t.trim()))),
            None => left_keys.contains(text.as_str()),
        })
        .count()
}

/// `P12345(2)` -> `P12345`.
fn strip_suffix_group(id: &str) -> &str {
    if id.ends_with(')') {
        if let Some(open) = id.rfind('(') {
            return id[..open].trim_end();
        }
    }
    id
}

// ---------------------------------------------------------------------------
// Key join
// ---------------------------------------------------------------------------

/// Join `right` onto `left` following `spec`.
///
/// Output columns are the results columns followed by the annotation
/// columns.  When both keys share a name the key appears once; any other
/// clashing names get `_x` / `_y` suffixes.  Null keys never match.
pub fn merge(
    left: &DataTable,
    right: &DataTable,
    spec: &MergeSpec,
    allow_double_merge: bool,
) -> Result<DataTable, MergeError> {
    spec.validate(left, right)?;

    if is_double_merge(left, right, &spec.right_on) {
        if !allow_double_merge {
            return Err(MergeError::DoubleMerge {
                key: spec.right_on.clone(),
            });
        }
        log::warn!("Proceeding with a likely double merge on '{}'", spec.right_on);
    }

    let expanded;
    let right = match &spec.delimiter {
        Some(delim) => {
            expanded = expand_multiple_ids(right, &spec.right_on, delim, spec.strip_stoichiometry)?;
            &expanded
        }
        None => right,
    };

    // validate() guarantees both lookups succeed.
    let left_key = left.column_index(&spec.left_on).unwrap_or_default();
    let right_key = right.column_index(&spec.right_on).unwrap_or_default();
    let shared_key = spec.left_on == spec.right_on;

    let layout = ColumnLayout::new(left, right, right_key, shared_key);

    let mut right_index: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, row) in right.rows.iter().enumerate() {
        if let Some(key) = row[right_key].as_key() {
            right_index.entry(key).or_default().push(i);
        }
    }

    let mut rows = Vec::new();
    let mut matched_right = vec![false; right.len()];

    if spec.how == JoinKind::Right {
        let mut left_index: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, row) in left.rows.iter().enumerate() {
            if let Some(key) = row[left_key].as_key() {
                left_index.entry(key).or_default().push(i);
            }
        }
        for (ri, rrow) in right.rows.iter().enumerate() {
            let hits = rrow[right_key]
                .as_key()
                .and_then(|k| left_index.get(&k))
                .map(Vec::as_slice)
                .unwrap_or_default();
            if hits.is_empty() {
                rows.push(layout.combine(None, Some(rrow)));
            }
            for &li in hits {
                rows.push(layout.combine(Some(&left.rows[li]), Some(&right.rows[ri])));
            }
        }
    } else {
        for lrow in &left.rows {
            let hits = lrow[left_key]
                .as_key()
                .and_then(|k| right_index.get(&k))
                .map(Vec::as_slice)
                .unwrap_or_default();
            if hits.is_empty() {
                if spec.how != JoinKind::Inner {
                    rows.push(layout.combine(Some(lrow), None));
                }
                continue;
            }
            for &ri in hits {
                matched_right[ri] = true;
                rows.push(layout.combine(Some(lrow), Some(&right.rows[ri])));
            }
        }
        if spec.how == JoinKind::Outer {
            for (ri, rrow) in right.rows.iter().enumerate() {
                if !matched_right[ri] {
                    rows.push(layout.combine(None, Some(rrow)));
                }
            }
        }
    }

    let merged = DataTable::from_rows(layout.names, rows);
    let (n_rows, n_cols) = merged.shape();
    log::info!(
        "Merged DataFrame shape: ({n_rows}, {n_cols}) using how='{}' on '{}' = '{}'",
        spec.how,
        spec.left_on,
        spec.right_on
    );
    Ok(merged)
}

/// Output column names and how to fill them from a (left, right) row pair.
struct ColumnLayout {
    names: Vec<String>,
    left_width: usize,
    left_key: Option<usize>,
    /// Annotation column indices copied after the results columns.
    right_cols: Vec<usize>,
    right_key: usize,
}

impl ColumnLayout {
    fn new(left: &DataTable, right: &DataTable, right_key: usize, shared_key: bool) -> Self {
        let right_cols: Vec<usize> = (0..right.column_names.len())
            .filter(|&i| !(shared_key && i == right_key))
            .collect();

        let right_names: BTreeSet<&str> = right_cols
            .iter()
            .map(|&i| right.column_names[i].as_str())
            .collect();
        let left_names: BTreeSet<&str> = left.column_names.iter().map(String::as_str).collect();

        let mut names: Vec<String> = left
            .column_names
            .iter()
            .map(|c| {
                if right_names.contains(c.as_str()) {
                    format!("{c}_x")
                } else {
                    c.clone()
                }
            })
            .collect();
        names.extend(right_cols.iter().map(|&i| {
            let c = &right.column_names[i];
            if left_names.contains(c.as_str()) {
                format!("{c}_y")
            } else {
                c.clone()
            }
        }));

        let left_key = if shared_key {
            left.column_index(&right.column_names[right_key])
        } else {
            None
        };

        ColumnLayout {
            names,
            left_width: left.column_names.len(),
            left_key,
            right_cols,
            right_key,
        }
    }

    fn combine(&self, left: Option<&Vec<CellValue>>, right: Option<&Vec<CellValue>>) -> Vec<CellValue> {
        let mut out = match left {
            Some(l) => l.clone(),
            None => vec![CellValue::Null; self.left_width],
        };
        if let (None, Some(r), Some(k)) = (left, right, self.left_key) {
            out[k] = r[self.right_key].clone();
        }
        match right {
            Some(r) => out.extend(self.right_cols.iter().map(|&i| r[i].clone())),
            None => out.extend(std::iter::repeat(CellValue::Null).take(self.right_cols.len())),
        }
        out
    }
}
