use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

use super::model::DataTable;

// ---------------------------------------------------------------------------
// Selection queries
// ---------------------------------------------------------------------------

/// The four ways of picking points.  Only one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    #[default]
    Lasso,
    TextSearch,
    IndexMatch,
    ComplexMembership,
}

impl SelectionMode {
    pub const ALL: [SelectionMode; 4] = [
        SelectionMode::Lasso,
        SelectionMode::TextSearch,
        SelectionMode::IndexMatch,
        SelectionMode::ComplexMembership,
    ];
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SelectionMode::Lasso => "Lasso",
            SelectionMode::TextSearch => "Text",
            SelectionMode::IndexMatch => "Index",
            SelectionMode::ComplexMembership => "Complex",
        };
        write!(f, "{label}")
    }
}

/// Text search against one or more columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextQuery {
    pub query: String,
    /// Columns to search; empty means every text column.
    pub columns: Vec<String>,
    /// Whole-cell match instead of substring.
    pub exact: bool,
    pub case_sensitive: bool,
}

/// A user supplied list of row indices or identifiers.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexQuery {
    Indices(Vec<usize>),
    Identifiers(Vec<String>),
}

impl IndexQuery {
    /// Split on commas and whitespace.  All-numeric input is a list of row
    /// indices; anything else is matched against the identifier column.
    pub fn parse(input: &str) -> Self {
        let tokens: Vec<&str> = input
            .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .collect();
        let indices: Option<Vec<usize>> = tokens.iter().map(|t| t.parse().ok()).collect();
        match indices {
            Some(indices) if !indices.is_empty() => IndexQuery::Indices(indices),
            _ => IndexQuery::Identifiers(tokens.into_iter().map(str::to_string).collect()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectionQuery {
    /// Closed polygon in plot coordinates.
    Lasso(Vec<[f64; 2]>),
    Text(TextQuery),
    Index(IndexQuery),
    Complex { column: String, name: String },
}

impl SelectionQuery {
    pub fn mode(&self) -> SelectionMode {
        match self {
            SelectionQuery::Lasso(_) => SelectionMode::Lasso,
            SelectionQuery::Text(_) => SelectionMode::TextSearch,
            SelectionQuery::Index(_) => SelectionMode::IndexMatch,
            SelectionQuery::Complex { .. } => SelectionMode::ComplexMembership,
        }
    }
}

/// The active selection: what was asked and which rows it resolved to.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub query: SelectionQuery,
    pub indices: BTreeSet<usize>,
}

impl Selection {
    pub fn contains(&self, row: usize) -> bool {
        self.indices.contains(&row)
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SelectError {
    #[error("column '{0}' not found")]
    ColumnNotFound(String),
    #[error("no identifier column is set")]
    NoIdentifierColumn,
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Resolve a query to a set of row indices.
///
/// `points` holds each row's plot coordinates (`None` when either axis value
/// is missing) and is only used for lasso queries.
pub fn select(
    table: &DataTable,
    points: &[Option<[f64; 2]>],
    id_column: Option<&str>,
    query: SelectionQuery,
) -> Result<Selection, SelectError> {
    let indices = match &query {
        SelectionQuery::Lasso(polygon) => lasso(points, polygon),
        SelectionQuery::Text(text) => text_search(table, text)?,
        SelectionQuery::Index(index) => index_match(table, id_column, index)?,
        SelectionQuery::Complex { column, name } => complex_membership(table, column, name)?,
    };
    log::info!("{} selection matched {} rows", query.mode(), indices.len());
    Ok(Selection { query, indices })
}

/// Rows whose point lies inside `polygon`.  Fewer than three vertices
/// select nothing.
pub fn lasso(points: &[Option<[f64; 2]>], polygon: &[[f64; 2]]) -> BTreeSet<usize> {
    if polygon.len() < 3 {
        return BTreeSet::new();
    }
    points
        .iter()
        .enumerate()
        .filter_map(|(i, p)| {
            let p = (*p)?;
            point_in_polygon(p, polygon).then_some(i)
        })
        .collect()
}

/// Even-odd ray casting; independent of vertex winding and start vertex.
pub fn point_in_polygon(p: [f64; 2], polygon: &[[f64; 2]]) -> bool {
    let [x, y] = p;
    if !x.is_finite() || !y.is_finite() {
        return false;
    }
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        // Lower end first so an edge gives the same crossing whichever
        // direction it is walked in.
        let (a, b) = if (polygon[i][1], polygon[i][0]) < (polygon[j][1], polygon[j][0]) {
            (polygon[i], polygon[j])
        } else {
            (polygon[j], polygon[i])
        };
        let [xa, ya] = a;
        let [xb, yb] = b;
        if (ya > y) != (yb > y) {
            let x_cross = xa + (y - ya) * (xb - xa) / (yb - ya);
            if x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Rows where any searched column contains (or equals) the query text.
pub fn text_search(table: &DataTable, query: &TextQuery) -> Result<BTreeSet<usize>, SelectError> {
    let needle = query.query.trim();
    if needle.is_empty() {
        return Ok(BTreeSet::new());
    }
    let columns = if query.columns.is_empty() {
        table.text_columns()
    } else {
        query.columns.clone()
    };
    let col_indices = columns
        .iter()
        .map(|c| {
            table
                .column_index(c)
                .ok_or_else(|| SelectError::ColumnNotFound(c.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let fold = |s: &str| {
        if query.case_sensitive {
            s.to_string()
        } else {
            s.to_lowercase()
        }
    };
    let needle = fold(needle);

    Ok(table
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| {
            col_indices.iter().any(|&c| {
                row[c].as_text().is_some_and(|text| {
                    let text = fold(text.trim());
                    if query.exact {
                        text == needle
                    } else {
                        text.contains(&needle)
                    }
                })
            })
        })
        .map(|(i, _)| i)
        .collect())
}

/// Explicit indices are intersected with the table's rows; identifiers are
/// matched exactly against `id_column`.
pub fn index_match(
    table: &DataTable,
    id_column: Option<&str>,
    query: &IndexQuery,
) -> Result<BTreeSet<usize>, SelectError> {
    match query {
        IndexQuery::Indices(indices) => Ok(indices
            .iter()
            .copied()
            .filter(|&i| i < table.len())
            .collect()),
        IndexQuery::Identifiers(ids) => {
            let column = id_column.ok_or(SelectError::NoIdentifierColumn)?;
            let col = table
                .column_index(column)
                .ok_or_else(|| SelectError::ColumnNotFound(column.to_string()))?;
            let wanted: BTreeSet<&str> = ids.iter().map(String::as_str).collect();
            Ok(table
                .rows
                .iter()
                .enumerate()
                .filter(|(_, row)| {
                    row[col]
                        .as_key()
                        .is_some_and(|key| wanted.contains(key.as_str()))
                })
                .map(|(i, _)| i)
                .collect())
        }
    }
}

/// Rows whose complex annotation equals `name`.
pub fn complex_membership(
    table: &DataTable,
    column: &str,
    name: &str,
) -> Result<BTreeSet<usize>, SelectError> {
    let col = table
        .column_index(column)
        .ok_or_else(|| SelectError::ColumnNotFound(column.to_string()))?;
    let name = name.trim();
    Ok(table
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| row[col].as_key().is_some_and(|v| v == name))
        .map(|(i, _)| i)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::merge::{JoinKind, MergeSpec, merge};
    use crate::data::model::CellValue;

    fn s(v: &str) -> CellValue {
        CellValue::String(v.to_string())
    }

    fn results() -> DataTable {
        DataTable::from_rows(
            vec!["id".into(), "peak".into(), "iptm".into(), "gene".into()],
            vec![
                vec![s("P1"), CellValue::Float(0.9), CellValue::Float(0.8), s("RPA1")],
                vec![s("P2"), CellValue::Float(0.5), CellValue::Float(0.4), s("rpa2")],
                vec![s("P3"), CellValue::Float(0.2), CellValue::Float(0.1), s("POLD1")],
            ],
        )
    }

    #[test]
    fn complex_membership_after_merge() {
        let annotations = DataTable::from_rows(
            vec!["protein".into(), "complex_name".into()],
            vec![vec![s("P1"), s("ComplexA")]],
        );
        let spec = MergeSpec {
            left_on: "id".into(),
            right_on: "protein".into(),
            delimiter: None,
            strip_stoichiometry: false,
            how: JoinKind::Left,
        };
        let merged = merge(&results(), &annotations, &spec, false).unwrap();
        let selection = select(
            &merged,
            &[],
            Some("id"),
            SelectionQuery::Complex {
                column: "complex_name".into(),
                name: "ComplexA".into(),
            },
        )
        .unwrap();
        assert_eq!(selection.indices, BTreeSet::from([0]));
        assert_eq!(selection.query.mode(), SelectionMode::ComplexMembership);
    }

    #[test]
    fn complex_membership_unknown_column() {
        assert_eq!(
            complex_membership(&results(), "complex_name", "ComplexA"),
            Err(SelectError::ColumnNotFound("complex_name".into()))
        );
    }

    #[test]
    fn index_match_intersects_with_existing_rows() {
        let table = results();
        let got = index_match(&table, None, &IndexQuery::Indices(vec![2, 0, 7, 2])).unwrap();
        assert_eq!(got, BTreeSet::from([0, 2]));
    }

    #[test]
    fn index_match_by_identifier() {
        let table = results();
        let query = IndexQuery::parse("P3, P1 unknown");
        assert_eq!(
            query,
            IndexQuery::Identifiers(vec!["P3".into(), "P1".into(), "unknown".into()])
        );
        assert_eq!(
            index_match(&table, Some("id"), &query).unwrap(),
            BTreeSet::from([0, 2])
        );
        assert_eq!(
            index_match(&table, None, &query),
            Err(SelectError::NoIdentifierColumn)
        );
    }

    #[test]
    fn parses_index_lists() {
        assert_eq!(IndexQuery::parse("1, 2;3 4"), IndexQuery::Indices(vec![1, 2, 3, 4]));
        assert_eq!(IndexQuery::parse("  "), IndexQuery::Identifiers(vec![]));
        assert_eq!(
            IndexQuery::parse("1 -2"),
            IndexQuery::Identifiers(vec!["1".into(), "-2".into()])
        );
    }

    #[test]
    fn text_search_substring_and_exact() {
        let table = results();
        let substring = TextQuery {
            query: "rpa".into(),
            ..Default::default()
        };
        assert_eq!(text_search(&table, &substring).unwrap(), BTreeSet::from([0, 1]));

        let case_sensitive = TextQuery {
            case_sensitive: true,
            ..substring.clone()
        };
        assert_eq!(text_search(&table, &case_sensitive).unwrap(), BTreeSet::from([1]));

        let exact = TextQuery {
            query: "p2".into(),
            columns: vec!["id".into()],
            exact: true,
            case_sensitive: false,
        };
        assert_eq!(text_search(&table, &exact).unwrap(), BTreeSet::from([1]));

        let empty = TextQuery::default();
        assert!(text_search(&table, &empty).unwrap().is_empty());

        let missing = TextQuery {
            query: "x".into(),
            columns: vec!["nope".into()],
            ..Default::default()
        };
        assert_eq!(
            text_search(&table, &missing),
            Err(SelectError::ColumnNotFound("nope".into()))
        );
    }

    #[test]
    fn lasso_ignores_vertex_order() {
        let points = vec![
            Some([0.5, 0.5]),
            Some([2.0, 0.5]),
            None,
            Some([0.1, 0.9]),
            Some([f64::NAN, 0.5]),
        ];
        let square = vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        let expected = BTreeSet::from([0, 3]);
        assert_eq!(lasso(&points, &square), expected);

        let mut reversed = square.clone();
        reversed.reverse();
        assert_eq!(lasso(&points, &reversed), expected);

        let mut rotated = square.clone();
        rotated.rotate_left(2);
        assert_eq!(lasso(&points, &rotated), expected);
    }

    #[test]
    fn lasso_handles_concave_polygons_and_degenerate_input() {
        // "C" shape opening to the right.
        let c_shape = vec![
            [0.0, 0.0],
            [3.0, 0.0],
            [3.0, 1.0],
            [1.0, 1.0],
            [1.0, 2.0],
            [3.0, 2.0],
            [3.0, 3.0],
            [0.0, 3.0],
        ];
        let points = vec![Some([2.0, 1.5]), Some([0.5, 1.5]), Some([2.0, 0.5])];
        assert_eq!(lasso(&points, &c_shape), BTreeSet::from([1, 2]));
        assert!(lasso(&points, &c_shape[..2]).is_empty());
    }

    #[test]
    fn points_on_edges_agree_for_every_vertex_order() {
        // xorshift64, fixed seed
        let mut state = 0x9E37_79B9_7F4A_7C15_u64;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 11) as f64 / (1u64 << 53) as f64
        };

        for _ in 0..5_000 {
            let quad: Vec<[f64; 2]> = (0..4).map(|_| [next(), next()]).collect();
            let t = next();
            let [ax, ay] = quad[0];
            let [bx, by] = quad[1];
            let on_edge = [ax + t * (bx - ax), ay + t * (by - ay)];
            let test_points = [on_edge, quad[2], [next(), next()]];

            let reversed: Vec<[f64; 2]> = quad.iter().rev().copied().collect();
            let mut rotated = quad.clone();
            rotated.rotate_left(1);

            for p in test_points {
                let expected = point_in_polygon(p, &quad);
                assert_eq!(point_in_polygon(p, &reversed), expected, "{p:?} in {quad:?}");
                assert_eq!(point_in_polygon(p, &rotated), expected, "{p:?} in {quad:?}");
            }
        }
    }

    #[test]
    fn unmatched_queries_give_an_empty_selection() {
        let table = results();
        let points = vec![None; table.len()];
        let query = SelectionQuery::Text(TextQuery {
            query: "no such gene".into(),
            ..TextQuery::default()
        });
        let sel = select(&table, &points, Some("id"), query).unwrap();
        assert!(sel.is_empty());
        assert_eq!(sel.len(), 0);

        let no_rows = DataTable::from_rows(table.column_names.clone(), Vec::new());
        assert!(no_rows.is_empty());
        let query = SelectionQuery::Index(IndexQuery::parse("0 1"));
        let sel = select(&no_rows, &[], Some("id"), query).unwrap();
        assert!(sel.is_empty());
    }
}
