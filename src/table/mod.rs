//! In-memory tabular dataset with named, typed columns.

mod loader;
pub mod stats;

use std::{collections::HashSet, fmt};

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

pub use loader::{load, load_csv, load_parquet};

#[derive(Debug, Error)]
pub enum TableError {
    #[error("Unsupported file format: {0}. Please provide .csv or .parquet.")]
    UnsupportedFormat(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error("column `{column}` has {found} rows, expected {expected}")]
    RaggedColumn { column: String, expected: usize, found: usize },
}

/// Inferred column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Numeric,
    Categorical,
    Datetime,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ColumnType::Numeric => "numeric",
            ColumnType::Categorical => "categorical",
            ColumnType::Datetime => "datetime",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric { values: Vec<Option<f64>>, integer: bool },
    Categorical(Vec<Option<String>>),
    Datetime(Vec<Option<NaiveDateTime>>),
}

/// A single parsed cell prior to column type inference.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Missing,
    Number(f64),
    Timestamp(NaiveDateTime),
    Text(String),
}

const MISSING_MARKERS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "null", "NULL", "None", "<NA>", "#N/A",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

impl Cell {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if MISSING_MARKERS.contains(&trimmed) {
            return Cell::Missing;
        }
        if let Ok(v) = trimmed.parse::<f64>() {
            if v.is_nan() {
                return Cell::Missing;
            }
            return Cell::Number(v);
        }
        if let Some(ts) = parse_datetime(trimmed) {
            return Cell::Timestamp(ts);
        }
        Cell::Text(raw.to_string())
    }

    fn render(&self) -> Option<String> {
        match self {
            Cell::Missing => None,
            Cell::Number(v) => Some(format_number(*v)),
            Cell::Timestamp(ts) => Some(format_timestamp(ts)),
            Cell::Text(s) => Some(s.clone()),
        }
    }
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0);
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ts);
        }
    }
    chrono::DateTime::parse_from_rfc3339(s).ok().map(|d| d.naive_utc())
}

pub(crate) fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

pub(crate) fn format_timestamp(ts: &NaiveDateTime) -> String {
    if ts.time() == chrono::NaiveTime::MIN {
        ts.format("%Y-%m-%d").to_string()
    } else {
        ts.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self { name: name.into(), data }
    }

    pub fn numeric(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        let integer = values.iter().all(|v| matches!(v, Some(x) if x.fract() == 0.0));
        Self::new(name, ColumnData::Numeric { values, integer })
    }

    pub fn categorical<S: Into<String>>(name: impl Into<String>, values: Vec<Option<S>>) -> Self {
        let values = values.into_iter().map(|v| v.map(Into::into)).collect();
        Self::new(name, ColumnData::Categorical(values))
    }

    /// Infers the column type: all-numeric, then all-datetime, otherwise categorical.
    pub fn from_cells(name: impl Into<String>, cells: Vec<Cell>) -> Self {
        let present = || cells.iter().filter(|c| !matches!(c, Cell::Missing));
        let has_values = present().next().is_some();

        if has_values && present().all(|c| matches!(c, Cell::Number(_))) {
            let values = cells
                .iter()
                .map(|c| match c {
                    Cell::Number(v) => Some(*v),
                    _ => None,
                })
                .collect();
            return Self::numeric(name, values);
        }
        if has_values && present().all(|c| matches!(c, Cell::Timestamp(_))) {
            let values = cells
                .iter()
                .map(|c| match c {
                    Cell::Timestamp(ts) => Some(*ts),
                    _ => None,
                })
                .collect();
            return Self::new(name, ColumnData::Datetime(values));
        }
        let values = cells.iter().map(Cell::render).collect();
        Self::new(name, ColumnData::Categorical(values))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    pub fn kind(&self) -> ColumnType {
        match self.data {
            ColumnData::Numeric { .. } => ColumnType::Numeric,
            ColumnData::Categorical(_) => ColumnType::Categorical,
            ColumnData::Datetime(_) => ColumnType::Datetime,
        }
    }

    /// dtype label in the familiar dataframe vocabulary.
    pub fn dtype(&self) -> &'static str {
        match &self.data {
            ColumnData::Numeric { integer: true, .. } => "int64",
            ColumnData::Numeric { .. } => "float64",
            ColumnData::Categorical(_) => "object",
            ColumnData::Datetime(_) => "datetime64[ns]",
        }
    }

    pub fn len(&self) -> usize {
        match &self.data {
            ColumnData::Numeric { values, .. } => values.len(),
            ColumnData::Categorical(v) => v.len(),
            ColumnData::Datetime(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn missing_count(&self) -> usize {
        match &self.data {
            ColumnData::Numeric { values, .. } => values.iter().filter(|v| v.is_none()).count(),
            ColumnData::Categorical(v) => v.iter().filter(|v| v.is_none()).count(),
            ColumnData::Datetime(v) => v.iter().filter(|v| v.is_none()).count(),
        }
    }

    pub fn as_numeric(&self) -> Option<&[Option<f64>]> {
        match &self.data {
            ColumnData::Numeric { values, .. } => Some(values),
            _ => None,
        }
    }

    /// Numeric view usable as a plotting axis: numbers as-is, datetimes as epoch seconds.
    pub fn as_axis(&self) -> Option<Vec<Option<f64>>> {
        match &self.data {
            ColumnData::Numeric { values, .. } => Some(values.clone()),
            ColumnData::Datetime(values) => Some(
                values
                    .iter()
                    .map(|v| v.map(|ts| ts.and_utc().timestamp() as f64))
                    .collect(),
            ),
            ColumnData::Categorical(_) => None,
        }
    }

    /// Cell rendered as text, `None` when missing.
    pub fn text_at(&self, row: usize) -> Option<String> {
        match &self.data {
            ColumnData::Numeric { values, .. } => values.get(row).copied().flatten().map(format_number),
            ColumnData::Categorical(v) => v.get(row).cloned().flatten(),
            ColumnData::Datetime(v) => v.get(row).copied().flatten().map(|ts| format_timestamp(&ts)),
        }
    }

    /// Distinct present values in display order: sorted for numeric and datetime
    /// columns, first appearance for categorical ones.
    pub fn categories(&self) -> Vec<String> {
        match &self.data {
            ColumnData::Numeric { values, .. } => {
                let mut present: Vec<f64> = values.iter().flatten().copied().collect();
                present.sort_by(|a, b| a.total_cmp(b));
                present.dedup();
                present.into_iter().map(format_number).collect()
            }
            ColumnData::Datetime(values) => {
                let mut present: Vec<NaiveDateTime> = values.iter().flatten().copied().collect();
                present.sort();
                present.dedup();
                present.iter().map(format_timestamp).collect()
            }
            ColumnData::Categorical(values) => {
                let mut seen: HashSet<&str> = HashSet::new();
                values
                    .iter()
                    .flatten()
                    .filter(|v| seen.insert(v.as_str()))
                    .cloned()
                    .collect()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    rows: usize,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Result<Self, TableError> {
        let rows = columns.first().map(Column::len).unwrap_or(0);
        if let Some(bad) = columns.iter().find(|c| c.len() != rows) {
            return Err(TableError::RaggedColumn {
                column: bad.name.clone(),
                expected: rows,
                found: bad.len(),
            });
        }
        Ok(Self { columns, rows })
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.columns.len())
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inference_prefers_numeric_then_datetime() {
        let nums = Column::from_cells("n", ["1", "", "2.5"].iter().map(|s| Cell::parse(s)).collect());
        assert_eq!(nums.kind(), ColumnType::Numeric);
        assert_eq!(nums.dtype(), "float64");
        assert_eq!(nums.missing_count(), 1);

        let ints = Column::from_cells("i", ["1", "2"].iter().map(|s| Cell::parse(s)).collect());
        assert_eq!(ints.dtype(), "int64");

        let dates = Column::from_cells(
            "d",
            ["2024-01-01", "2024-02-01 10:30:00"].iter().map(|s| Cell::parse(s)).collect(),
        );
        assert_eq!(dates.kind(), ColumnType::Datetime);

        let mixed = Column::from_cells("m", ["1", "Delhi"].iter().map(|s| Cell::parse(s)).collect());
        assert_eq!(mixed.kind(), ColumnType::Categorical);
        assert_eq!(mixed.text_at(0).as_deref(), Some("1"));
    }

    #[test]
    fn categories_keep_first_appearance_order_at_scale() {
        let names: Vec<String> = (0..20_000).map(|i| format!("id-{i:05}")).collect();
        let mut values: Vec<Option<&str>> = names.iter().map(|n| Some(n.as_str())).collect();
        values.push(Some("id-00000"));
        values.push(None);
        let col = Column::categorical("id", values);

        let cats = col.categories();
        assert_eq!(cats.len(), 20_000);
        assert_eq!(cats[0], "id-00000");
        assert_eq!(cats[19_999], "id-19999");
    }

    #[test]
    fn ragged_columns_are_rejected() {
        let err = Table::new(vec![
            Column::numeric("a", vec![Some(1.0), Some(2.0)]),
            Column::numeric("b", vec![Some(1.0)]),
        ])
        .unwrap_err();
        assert!(matches!(err, TableError::RaggedColumn { found: 1, .. }));
    }

    #[test]
    fn categories_keep_first_appearance() {
        let col = Column::categorical("city", vec![Some("Pune"), Some("Agra"), None, Some("Pune")]);
        assert_eq!(col.categories(), vec!["Pune", "Agra"]);
        let num = Column::numeric("n", vec![Some(3.0), Some(1.0), Some(3.0)]);
        assert_eq!(num.categories(), vec!["1", "3"]);
    }
}
