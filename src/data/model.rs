use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// ---------------------------------------------------------------------------
// CellValue – a single cell of a table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value mirroring common dataframe dtypes.
/// Using `BTreeMap` / `BTreeSet` downstream so `CellValue` must be `Ord`.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

// -- Manual Eq/Ord so we can put CellValue in BTreeSet --

impl Eq for CellValue {}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use CellValue::*;
        fn discriminant(v: &CellValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for CellValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            CellValue::String(s) => s.hash(state),
            CellValue::Integer(i) => i.hash(state),
            CellValue::Float(f) => f.to_bits().hash(state),
            CellValue::Bool(b) => b.hash(state),
            CellValue::Null => {}
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::String(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v:.4}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Null => write!(f, "<null>"),
        }
    }
}

impl CellValue {
    /// Try to interpret the value as an `f64` for plotting and numeric mapping.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) => Some(*v),
            CellValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Canonical text used to compare join keys across tables, so that an
    /// integer `1` in one file matches the string `"1"` in another.
    pub fn as_key(&self) -> Option<String> {
        match self {
            CellValue::String(s) => Some(s.trim().to_string()),
            CellValue::Integer(i) => Some(i.to_string()),
            CellValue::Float(v) => Some(v.to_string()),
            CellValue::Bool(b) => Some(b.to_string()),
            CellValue::Null => None,
        }
    }

    /// Text used for searching and labelling; `None` for nulls.
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::String(s) => Some(s.clone()),
            CellValue::Null => None,
            other => Some(other.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

/// Shared null returned for out-of-range lookups.
pub static NULL_CELL: CellValue = CellValue::Null;

// ---------------------------------------------------------------------------
// DataTable – a loaded results or annotation table
// ---------------------------------------------------------------------------

/// Row-major table with ordered columns and pre-computed unique values.
#[derive(Debug, Clone, Default)]
pub struct DataTable {
    /// Ordered column names, as they appear in the source file.
    pub column_names: Vec<String>,
    /// Cells; every row has exactly `column_names.len()` entries.
    pub rows: Vec<Vec<CellValue>>,
    /// For each column the sorted set of unique values.
    pub unique_values: BTreeMap<String, BTreeSet<CellValue>>,
}

impl DataTable {
    /// Build a table, padding short rows with nulls and indexing unique values.
    pub fn from_rows(column_names: Vec<String>, mut rows: Vec<Vec<CellValue>>) -> Self {
        let width = column_names.len();
        for row in &mut rows {
            row.resize(width, CellValue::Null);
        }

        let mut unique_values: BTreeMap<String, BTreeSet<CellValue>> = column_names
            .iter()
            .map(|c| (c.clone(), BTreeSet::new()))
            .collect();
        for row in &rows {
            for (col, val) in column_names.iter().zip(row) {
                if let Some(set) = unique_values.get_mut(col) {
                    set.insert(val.clone());
                }
            }
        }

        DataTable {
            column_names,
            rows,
            unique_values,
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// `(rows, columns)`, the way dataframes report it.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.column_names.len())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.column_names.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Cell at `(row, column)`; out-of-range lookups read as null.
    pub fn value(&self, row: usize, column: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&NULL_CELL)
    }

    /// Iterate one column's cells by name.
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &CellValue> + '_> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |r| &r[idx]))
    }

    /// Numeric view of a column (non-numeric and null cells are `None`).
    pub fn numeric_column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        Some(self.column(name)?.map(CellValue::as_f64).collect())
    }

    /// True when every non-null value of the column is numeric and at least
    /// one value is present.
    pub fn is_numeric_column(&self, name: &str) -> bool {
        let Some(values) = self.unique_values.get(name) else {
            return false;
        };
        let mut any = false;
        for v in values.iter().filter(|v| !v.is_null()) {
            if v.as_f64().is_none() {
                return false;
            }
            any = true;
        }
        any
    }

    /// Columns holding at least one string cell (identifiers, annotations).
    pub fn text_columns(&self) -> Vec<String> {
        self.column_names
            .iter()
            .filter(|c| {
                self.unique_values
                    .get(*c)
                    .is_some_and(|vals| vals.iter().any(|v| matches!(v, CellValue::String(_))))
            })
            .cloned()
            .collect()
    }

    /// The first `n` rows, for previews.
    pub fn head(&self, n: usize) -> &[Vec<CellValue>] {
        &self.rows[..n.min(self.rows.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> CellValue {
        CellValue::String(v.to_string())
    }

    #[test]
    fn ordering_groups_by_type_then_value() {
        let mut set = BTreeSet::new();
        set.insert(s("b"));
        set.insert(CellValue::Float(0.5));
        set.insert(CellValue::Null);
        set.insert(CellValue::Integer(3));
        set.insert(s("a"));
        let ordered: Vec<_> = set.into_iter().collect();
        assert_eq!(
            ordered,
            vec![
                CellValue::Null,
                CellValue::Integer(3),
                CellValue::Float(0.5),
                s("a"),
                s("b")
            ]
        );
    }

    #[test]
    fn keys_compare_across_types() {
        assert_eq!(CellValue::Integer(7).as_key(), s("7").as_key());
        assert_eq!(s("  P1 ").as_key().as_deref(), Some("P1"));
        assert_eq!(CellValue::Null.as_key(), None);
    }

    #[test]
    fn from_rows_pads_and_indexes() {
        let table = DataTable::from_rows(
            vec!["id".into(), "peak".into(), "note".into()],
            vec![
                vec![s("P1"), CellValue::Float(0.9)],
                vec![s("P2"), CellValue::Float(0.5), s("x")],
            ],
        );
        assert_eq!(table.shape(), (2, 3));
        assert_eq!(table.value(0, 2), &CellValue::Null);
        assert!(table.is_numeric_column("peak"));
        assert!(!table.is_numeric_column("id"));
        assert!(!table.is_numeric_column("missing"));
        assert_eq!(table.text_columns(), vec!["id".to_string(), "note".to_string()]);
        assert_eq!(
            table.numeric_column("peak"),
            Some(vec![Some(0.9), Some(0.5)])
        );
        assert_eq!(table.head(10).len(), 2);
    }
}
