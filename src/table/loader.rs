//! CSV and Parquet readers producing a typed [`Table`].

use std::{fs::File, path::Path};

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta};
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::Field;
use tracing::info;

use super::{Cell, Column, Table, TableError};

/// Loads a dataset, dispatching on the file extension.
pub fn load(path: impl AsRef<Path>) -> Result<Table, TableError> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    let table = match ext.as_str() {
        "csv" => load_csv(path)?,
        "parquet" => load_parquet(path)?,
        _ => return Err(TableError::UnsupportedFormat(path.display().to_string())),
    };
    let (rows, cols) = table.shape();
    info!(path = %path.display(), rows, cols, "dataset loaded");
    Ok(table)
}

pub fn load_csv(path: impl AsRef<Path>) -> Result<Table, TableError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| TableError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(file);

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let mut cells: Vec<Vec<Cell>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record?;
        for (i, raw) in record.iter().enumerate() {
            cells[i].push(Cell::parse(raw));
        }
    }

    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(name, col)| Column::from_cells(name, col))
        .collect();
    Table::new(columns)
}

pub fn load_parquet(path: impl AsRef<Path>) -> Result<Table, TableError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| TableError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let reader = SerializedFileReader::new(file)?;
    let names: Vec<String> = reader
        .metadata()
        .file_metadata()
        .schema_descr()
        .root_schema()
        .get_fields()
        .iter()
        .map(|f| f.name().to_string())
        .collect();

    let mut cells: Vec<Vec<Cell>> = vec![Vec::new(); names.len()];
    for row in reader.get_row_iter(None)? {
        let row = row?;
        for (i, (_, field)) in row.get_column_iter().enumerate() {
            if let Some(col) = cells.get_mut(i) {
                col.push(field_to_cell(field));
            }
        }
    }

    let columns = names
        .into_iter()
        .zip(cells)
        .map(|(name, col)| Column::from_cells(name, col))
        .collect();
    Table::new(columns)
}

fn field_to_cell(field: &Field) -> Cell {
    match field {
        Field::Null => Cell::Missing,
        Field::Byte(v) => Cell::Number(*v as f64),
        Field::Short(v) => Cell::Number(*v as f64),
        Field::Int(v) => Cell::Number(*v as f64),
        Field::Long(v) => Cell::Number(*v as f64),
        Field::UByte(v) => Cell::Number(*v as f64),
        Field::UShort(v) => Cell::Number(*v as f64),
        Field::UInt(v) => Cell::Number(*v as f64),
        Field::ULong(v) => Cell::Number(*v as f64),
        Field::Float(v) if v.is_nan() => Cell::Missing,
        Field::Float(v) => Cell::Number(*v as f64),
        Field::Double(v) if v.is_nan() => Cell::Missing,
        Field::Double(v) => Cell::Number(*v),
        Field::Str(s) => Cell::Text(s.clone()),
        Field::Bool(b) => Cell::Text(b.to_string()),
        Field::Date(days) => epoch_date(*days)
            .map(Cell::Timestamp)
            .unwrap_or(Cell::Missing),
        Field::TimestampMillis(ms) => DateTime::from_timestamp_millis(*ms)
            .map(|d| Cell::Timestamp(d.naive_utc()))
            .unwrap_or(Cell::Missing),
        Field::TimestampMicros(us) => DateTime::from_timestamp_micros(*us)
            .map(|d| Cell::Timestamp(d.naive_utc()))
            .unwrap_or(Cell::Missing),
        // Decimals, half floats and nested values go through their display form.
        other => {
            let text = other.to_string();
            match text.parse::<f64>() {
                Ok(v) if v.is_finite() => Cell::Number(v),
                _ => Cell::Text(text),
            }
        }
    }
}

fn epoch_date(days: i32) -> Option<NaiveDateTime> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
    epoch
        .checked_add_signed(TimeDelta::try_days(days as i64)?)?
        .and_hms_opt(0, 0, 0)
}
