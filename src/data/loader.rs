use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{
    Array, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array,
    StringArray,
};
use arrow::datatypes::DataType;
use calamine::{Data, Range, Reader, open_workbook_auto};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{CellValue, DataTable};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a results or annotation table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`           – comma separated with a header row
/// * `.tsv` / `.txt`  – tab separated with a header row (Complex Portal exports)
/// * `.json`          – `[{ "id": "P1", "peak": 0.9, ... }, ...]`
/// * `.parquet`       – flat columns written by Pandas or Polars
/// * `.xls` / `.xlsx` – first worksheet, header in the first row
pub fn load_file(path: &Path) -> Result<DataTable> {
    if !path.is_file() {
        bail!("File not found: {}", path.display());
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let table = match ext.as_str() {
        "csv" => load_delimited(path, b',')?,
        "tsv" | "txt" => load_delimited(path, b'\t')?,
        "json" => load_json(path)?,
        "parquet" | "pq" => load_parquet(path)?,
        "xls" | "xlsx" | "xlsm" => load_excel(path)?,
        other => bail!("Unsupported file extension: .{other}"),
    };

    let (rows, cols) = table.shape();
    log::info!("Read {}: {rows} rows x {cols} columns", path.display());
    Ok(table)
}

// ---------------------------------------------------------------------------
// CSV / TSV loader
// ---------------------------------------------------------------------------

/// Header row with column names; every cell is type-guessed.
fn load_delimited(path: &Path, delimiter: u8) -> Result<DataTable> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)
        .context("opening delimited file")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("row {row_no}"))?;
        if record.len() > headers.len() {
            bail!(
                "Row {row_no}: {} fields but the header has {}",
                record.len(),
                headers.len()
            );
        }
        rows.push(record.iter().map(guess_cell_type).collect());
    }

    Ok(DataTable::from_rows(headers, rows))
}

fn guess_cell_type(s: &str) -> CellValue {
    let s = s.trim();
    if s.is_empty() {
        return CellValue::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return CellValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return CellValue::Float(f);
    }
    if s == "true" || s == "false" {
        return CellValue::Bool(s == "true");
    }
    CellValue::String(s.to_string())
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, the default `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "id": "P12345", "peak": 0.91, "iptm": 0.82 },
///   ...
/// ]
/// ```
fn load_json(path: &Path) -> Result<DataTable> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root
        .as_array()
        .context("Expected top-level JSON array")?;

    let mut column_names: Vec<String> = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        for key in obj.keys() {
            if !column_names.contains(key) {
                column_names.push(key.clone());
            }
        }
    }

    let rows = records
        .iter()
        .filter_map(|rec| rec.as_object())
        .map(|obj| {
            column_names
                .iter()
                .map(|col| obj.get(col).map(json_to_cell).unwrap_or(CellValue::Null))
                .collect()
        })
        .collect();

    Ok(DataTable::from_rows(column_names, rows))
}

fn json_to_cell(val: &JsonValue) -> CellValue {
    match val {
        JsonValue::String(s) => CellValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CellValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                CellValue::Float(f)
            } else {
                CellValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => CellValue::Bool(*b),
        JsonValue::Null => CellValue::Null,
        other => CellValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with flat scalar columns.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).  Nested columns are rendered as their
/// Arrow type name.
fn load_parquet(path: &Path) -> Result<DataTable> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;
    let column_names: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut rows = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        for row in 0..batch.num_rows() {
            rows.push(
                batch
                    .columns()
                    .iter()
                    .map(|col| extract_cell(col, row))
                    .collect(),
            );
        }
    }

    Ok(DataTable::from_rows(column_names, rows))
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_cell(col: &Arc<dyn Array>, row: usize) -> CellValue {
    if col.is_null(row) {
        return CellValue::Null;
    }
    let any = col.as_any();
    match col.data_type() {
        DataType::Utf8 => any
            .downcast_ref::<StringArray>()
            .map(|s| CellValue::String(s.value(row).to_string()))
            .unwrap_or(CellValue::Null),
        DataType::LargeUtf8 => {
            let s = col.as_string::<i64>();
            CellValue::String(s.value(row).to_string())
        }
        DataType::Int32 => any
            .downcast_ref::<Int32Array>()
            .map(|a| CellValue::Integer(a.value(row) as i64))
            .unwrap_or(CellValue::Null),
        DataType::Int64 => any
            .downcast_ref::<Int64Array>()
            .map(|a| CellValue::Integer(a.value(row)))
            .unwrap_or(CellValue::Null),
        DataType::Float32 => any
            .downcast_ref::<Float32Array>()
            .map(|a| CellValue::Float(a.value(row) as f64))
            .unwrap_or(CellValue::Null),
        DataType::Float64 => any
            .downcast_ref::<Float64Array>()
            .map(|a| CellValue::Float(a.value(row)))
            .unwrap_or(CellValue::Null),
        DataType::Boolean => any
            .downcast_ref::<BooleanArray>()
            .map(|a| CellValue::Bool(a.value(row)))
            .unwrap_or(CellValue::Null),
        other => CellValue::String(format!("{other:?}")),
    }
}

// ---------------------------------------------------------------------------
// Excel loader
// ---------------------------------------------------------------------------

/// Read the first worksheet of an Excel workbook.
fn load_excel(path: &Path) -> Result<DataTable> {
    let mut workbook = open_workbook_auto(path).context("opening Excel workbook")?;
    let range = workbook
        .worksheet_range_at(0)
        .context("Workbook has no worksheets")?
        .context("reading first worksheet")?;
    Ok(sheet_to_table(&range))
}

/// First row is the header; blank header cells get pandas-style
/// `Unnamed: <n>` names.
fn sheet_to_table(range: &Range<Data>) -> DataTable {
    let mut rows = range.rows();
    let column_names: Vec<String> = match rows.next() {
        Some(header) => header
            .iter()
            .enumerate()
            .map(|(i, cell)| match cell.to_string().trim() {
                "" => format!("Unnamed: {i}"),
                name => name.to_string(),
            })
            .collect(),
        None => Vec::new(),
    };
    let rows = rows.map(|row| row.iter().map(excel_to_cell).collect()).collect();
    DataTable::from_rows(column_names, rows)
}

/// Excel stores every number as a float; whole numbers come back as
/// integers so they join against integer keys.
fn excel_to_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Null,
        Data::Int(i) => CellValue::Integer(*i),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => CellValue::Integer(*f as i64),
        Data::Float(f) => CellValue::Float(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::String(s) if s.trim().is_empty() => CellValue::Null,
        Data::String(s) => CellValue::String(s.clone()),
        Data::Error(_) => CellValue::Null,
        other => CellValue::String(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn guesses_cell_types() {
        assert_eq!(guess_cell_type(""), CellValue::Null);
        assert_eq!(guess_cell_type("42"), CellValue::Integer(42));
        assert_eq!(guess_cell_type("0.83"), CellValue::Float(0.83));
        assert_eq!(guess_cell_type("true"), CellValue::Bool(true));
        assert_eq!(
            guess_cell_type(" P12345 "),
            CellValue::String("P12345".into())
        );
    }

    #[test]
    fn loads_csv_results() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "results.csv", "id,peak,iptm\nP1,0.9,0.8\nP2,0.5,\n");
        let table = load_file(&path).unwrap();
        assert_eq!(table.column_names, vec!["id", "peak", "iptm"]);
        assert_eq!(table.shape(), (2, 3));
        assert_eq!(table.value(1, 2), &CellValue::Null);
        assert_eq!(table.value(0, 1), &CellValue::Float(0.9));
    }

    #[test]
    fn loads_complex_portal_tsv() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "complexes.tsv",
            "#Complex ac\tRecommended name\tIdentifiers (and stoichiometry) of molecules in complex\n\
             CPX-1\tComplexA\tP1(1)|P4(2)\n",
        );
        let table = load_file(&path).unwrap();
        assert_eq!(table.column_names[1], "Recommended name");
        assert_eq!(
            table.value(0, 2),
            &CellValue::String("P1(1)|P4(2)".into())
        );
    }

    #[test]
    fn rejects_rows_wider_than_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "bad.csv", "id,peak\nP1,0.9,extra\n");
        assert!(load_file(&path).is_err());
    }

    #[test]
    fn loads_json_records_in_first_seen_column_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "results.json",
            r#"[{"id": "P1", "peak": 0.9}, {"id": "P2", "peak": 1, "note": null}]"#,
        );
        let table = load_file(&path).unwrap();
        assert_eq!(table.shape(), (2, 3));
        assert_eq!(table.value(1, 1), &CellValue::Integer(1));
        assert_eq!(table.value(0, 2), &CellValue::Null);
    }

    #[test]
    fn reports_missing_and_unsupported_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = load_file(&dir.path().join("nope.csv")).unwrap_err();
        assert!(format!("{missing:#}").contains("File not found"));

        let path = write(&dir, "table.docx", "");
        let unsupported = load_file(&path).unwrap_err();
        assert!(format!("{unsupported:#}").contains("Unsupported file extension"));
    }

    #[test]
    fn json_columns_keep_first_seen_order_not_alphabetical() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "results.json",
            r#"[{"peak": 0.9, "iptm": 0.8, "id": "P1"}, {"n_models": 5, "id": "P2"}]"#,
        );
        let table = load_file(&path).unwrap();
        assert_eq!(table.column_names, vec!["peak", "iptm", "id", "n_models"]);
        assert_eq!(table.value(1, 2), &CellValue::String("P2".into()));
        assert_eq!(table.value(1, 0), &CellValue::Null);
    }

    #[test]
    fn loads_parquet_scalar_columns() {
        use arrow::array::ArrayRef;
        use arrow::datatypes::{Field, Schema};
        use arrow::record_batch::RecordBatch;
        use parquet::arrow::ArrowWriter;

        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("n_models", DataType::Int64, false),
            Field::new("iptm", DataType::Float64, true),
            Field::new("converged", DataType::Boolean, false),
        ]));
        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(vec!["P1", "P2"])),
            Arc::new(Int64Array::from(vec![5, 3])),
            Arc::new(Float64Array::from(vec![Some(0.82), None])),
            Arc::new(BooleanArray::from(vec![true, false])),
        ];
        let batch = RecordBatch::try_new(schema.clone(), columns).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.parquet");
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let table = load_file(&path).unwrap();
        assert_eq!(table.column_names, vec!["id", "n_models", "iptm", "converged"]);
        assert_eq!(table.shape(), (2, 4));
        assert_eq!(table.value(0, 0), &CellValue::String("P1".into()));
        assert_eq!(table.value(1, 1), &CellValue::Integer(3));
        assert_eq!(table.value(0, 2), &CellValue::Float(0.82));
        assert_eq!(table.value(1, 2), &CellValue::Null);
        assert_eq!(table.value(0, 3), &CellValue::Bool(true));
    }

    #[test]
    fn excel_sheet_header_and_cells() {
        let mut range: Range<Data> = Range::new((0, 0), (2, 2));
        range.set_value((0, 0), Data::String("Entry".into()));
        range.set_value((0, 1), Data::String("Complex".into()));
        range.set_value((1, 0), Data::String("P1".into()));
        range.set_value((1, 1), Data::String("ComplexA".into()));
        range.set_value((1, 2), Data::Float(2.0));
        range.set_value((2, 0), Data::Float(1.5));
        range.set_value((2, 2), Data::Bool(true));

        let table = sheet_to_table(&range);
        assert_eq!(table.column_names, vec!["Entry", "Complex", "Unnamed: 2"]);
        assert_eq!(table.shape(), (2, 3));
        assert_eq!(table.value(0, 1), &CellValue::String("ComplexA".into()));
        assert_eq!(table.value(0, 2), &CellValue::Integer(2));
        assert_eq!(table.value(1, 0), &CellValue::Float(1.5));
        assert_eq!(table.value(1, 1), &CellValue::Null);
        assert_eq!(table.value(1, 2), &CellValue::Bool(true));
    }

    #[test]
    fn corrupt_workbook_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "annotations.xlsx", "not a zip archive");
        let err = load_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("opening Excel workbook"));
    }
}
