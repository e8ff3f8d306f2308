/// Data layer: core types, loading, merging and selection.
///
/// Architecture:
/// ```text
///  .csv / .tsv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → DataTable
///   └──────────┘
///        │            annotation DataTable
///        ▼                 │
///   ┌──────────┐           │
///   │  merge    │ ◄────────┘  key join (left/right/inner/outer)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  select   │  lasso / text / index / complex → row indices
///   └──────────┘
/// ```

pub mod loader;
pub mod merge;
pub mod model;
pub mod select;
