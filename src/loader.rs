use std::fs;
use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use tracing::{debug, info};

use crate::error::{DashboardError, LoadError, SchemaError};
use crate::models::{Dataset, Record};

pub const REQUIRED_COLUMNS: [&str; 6] = [
    "username",
    "region_name",
    "woreda_name",
    "event_organizer_name",
    "event_id",
    "received_on",
];

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Spreadsheet,
    Csv,
}

pub fn source_format(path: &Path) -> Result<SourceFormat, LoadError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("xlsx" | "xlsm" | "xlsb" | "xls" | "ods") => Ok(SourceFormat::Spreadsheet),
        Some("csv") => Ok(SourceFormat::Csv),
        _ => Err(LoadError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

pub fn normalize_column(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.naive_local());
    }

    for format in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Some(ts);
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Converts an Excel serial date (1900 system) to a timestamp.
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch.checked_add_signed(Duration::milliseconds(millis))
}

#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Timestamp(NaiveDateTime),
}

impl Cell {
    fn from_data(data: &Data) -> Cell {
        match data {
            Data::Empty | Data::Error(_) => Cell::Empty,
            Data::String(s) => Cell::Text(s.clone()),
            Data::Float(f) => Cell::Number(*f),
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Bool(b) => Cell::Text(b.to_string()),
            Data::DateTime(dt) => excel_serial_to_datetime(dt.as_f64())
                .map(Cell::Timestamp)
                .unwrap_or(Cell::Number(dt.as_f64())),
            Data::DateTimeIso(s) => parse_timestamp(s)
                .map(Cell::Timestamp)
                .unwrap_or_else(|| Cell::Text(s.clone())),
            Data::DurationIso(s) => Cell::Text(s.clone()),
        }
    }

    fn from_field(field: &str) -> Cell {
        if field.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(field.to_string())
        }
    }

    fn text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) if s.is_empty() => None,
            Cell::Text(s) => Some(s.clone()),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Some(format!("{}", *n as i64)),
            Cell::Number(n) => Some(n.to_string()),
            Cell::Timestamp(ts) => Some(ts.format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }

    fn timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Cell::Timestamp(ts) => Some(*ts),
            Cell::Text(s) => parse_timestamp(s),
            Cell::Empty | Cell::Number(_) => None,
        }
    }
}

#[derive(Debug, Default)]
struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

pub fn load_dataset(path: &Path) -> Result<Dataset, DashboardError> {
    let table = read_table(path)?;
    let dataset = build_dataset(&table)?;
    info!(path = %path.display(), rows = dataset.len(), "loaded dataset");
    Ok(dataset)
}

fn read_table(path: &Path) -> Result<Table, LoadError> {
    if !path.exists() {
        return Err(LoadError::NotFound {
            path: path.to_path_buf(),
        });
    }

    match source_format(path)? {
        SourceFormat::Spreadsheet => read_spreadsheet(path),
        SourceFormat::Csv => read_csv(path),
    }
}

fn read_spreadsheet(path: &Path) -> Result<Table, LoadError> {
    let spreadsheet_error = |message: String| LoadError::Spreadsheet {
        path: path.to_path_buf(),
        message,
    };

    // The workbook kind is sniffed from the bytes, so a stored copy keeps
    // loading whatever extension it was saved under.
    let bytes = fs::read(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| spreadsheet_error(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| LoadError::EmptyWorkbook {
            path: path.to_path_buf(),
        })?
        .map_err(|e| spreadsheet_error(e.to_string()))?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .map(|header| {
            header
                .iter()
                .map(|cell| Cell::from_data(cell).text().unwrap_or_default())
                .collect()
        })
        .unwrap_or_default();

    let rows: Vec<Vec<Cell>> = rows
        .map(|row| row.iter().map(Cell::from_data).collect())
        .collect();

    Ok(Table { headers, rows })
}

fn read_csv(path: &Path) -> Result<Table, LoadError> {
    let csv_error = |source: csv::Error| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(csv_error)?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(csv_error)?;
        rows.push(record.iter().map(Cell::from_field).collect());
    }

    Ok(Table { headers, rows })
}

struct ColumnIndex {
    username: usize,
    region_name: usize,
    woreda_name: usize,
    event_organizer_name: usize,
    event_id: usize,
    received_on: usize,
}

impl ColumnIndex {
    fn resolve(headers: &[String]) -> Result<Self, SchemaError> {
        let find = |column: &str| {
            headers
                .iter()
                .position(|h| h == column)
                .ok_or_else(|| SchemaError::MissingColumn {
                    column: column.to_string(),
                    available: headers.to_vec(),
                })
        };

        Ok(Self {
            username: find(REQUIRED_COLUMNS[0])?,
            region_name: find(REQUIRED_COLUMNS[1])?,
            woreda_name: find(REQUIRED_COLUMNS[2])?,
            event_organizer_name: find(REQUIRED_COLUMNS[3])?,
            event_id: find(REQUIRED_COLUMNS[4])?,
            received_on: find(REQUIRED_COLUMNS[5])?,
        })
    }
}

fn build_dataset(table: &Table) -> Result<Dataset, SchemaError> {
    let headers: Vec<String> = table.headers.iter().map(|h| normalize_column(h)).collect();
    let columns = ColumnIndex::resolve(&headers)?;

    let mut records = Vec::with_capacity(table.rows.len());
    let mut skipped = 0usize;

    for row in &table.rows {
        if row.iter().all(|cell| cell.text().is_none()) {
            skipped += 1;
            continue;
        }

        let cell = |idx: usize| row.get(idx).unwrap_or(&Cell::Empty);
        records.push(Record {
            username: cell(columns.username).text(),
            region_name: cell(columns.region_name).text(),
            woreda_name: cell(columns.woreda_name).text(),
            event_organizer_name: cell(columns.event_organizer_name).text(),
            event_id: cell(columns.event_id).text(),
            received_on: cell(columns.received_on).timestamp(),
        });
    }

    if skipped > 0 {
        debug!(skipped, "skipped blank rows");
    }

    Ok(Dataset::new(records))
}
