// 📂 Record Loader - trainings report + roster CSV → typed records
// Only the header is validated. Bad cells degrade to absent values and
// unreadable rows are skipped; neither fails the batch.

use crate::config::SourceSettings;
use crate::error::{LoadError, Result, SourceKind};
use crate::records::{EmployeeRecord, TrainingRecord};
use chrono::{NaiveDate, NaiveDateTime};
use csv::{ByteRecord, ReaderBuilder, StringRecord};
use encoding_rs::WINDOWS_1252;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

/// Accepted date layouts, tried in order
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y", "%m/%d/%Y"];

/// Accepted timestamp layouts (spreadsheet exports keep the time part)
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

// ============================================================================
// PUBLIC ENTRY POINTS
// ============================================================================

/// Load the trainings report from `path`
pub fn load_trainings(path: &Path, settings: &SourceSettings) -> Result<Vec<TrainingRecord>> {
    let file = open_source(path, SourceKind::Trainings)?;
    let records = read_trainings(file, settings)?;
    info!(
        source = %path.display(),
        rows = records.len(),
        "loaded trainings"
    );
    Ok(records)
}

/// Load the employee roster from `path`
pub fn load_employees(path: &Path, settings: &SourceSettings) -> Result<Vec<EmployeeRecord>> {
    let file = open_source(path, SourceKind::Roster)?;
    let records = read_employees(file, settings)?;
    info!(
        source = %path.display(),
        rows = records.len(),
        "loaded roster"
    );
    Ok(records)
}

/// Read trainings from any reader (used by tests and the server reload)
pub fn read_trainings<R: Read>(reader: R, settings: &SourceSettings) -> Result<Vec<TrainingRecord>> {
    let kind = SourceKind::Trainings;
    let columns = &settings.training_columns;
    let mut rdr = ReaderBuilder::new()
        .delimiter(settings.delimiter_byte())
        .flexible(true)
        .from_reader(reader);

    let headers = rdr
        .byte_headers()
        .map_err(|error| LoadError::Csv { source_kind: kind, error })?;
    let headers = decode_record(headers, kind, 0);

    let name_idx = require_column(&headers, &columns.participant_name, kind)?;
    let label_idx = require_column(&headers, &columns.training_label, kind)?;
    let completed_idx = require_column(&headers, &columns.completion_date, kind)?;
    let valid_idx = require_column(&headers, &columns.valid_until, kind)?;
    let interval_idx = require_column(&headers, &columns.interval_months, kind)?;

    let mut records = Vec::new();

    for (index, result) in rdr.byte_records().enumerate() {
        let line_number = index + 1;
        let Some(row) = readable_row(result, kind, line_number) else {
            continue;
        };

        let participant_name = cell(&row, name_idx).unwrap_or_default().to_string();
        let training_label = cell(&row, label_idx).unwrap_or_default().to_string();

        let completion_date = cell(&row, completed_idx)
            .and_then(|raw| parse_date_cell(raw, &columns.completion_date, line_number));
        let explicit_valid_until = cell(&row, valid_idx)
            .and_then(|raw| parse_date_cell(raw, &columns.valid_until, line_number));
        let interval_months = cell(&row, interval_idx).and_then(|raw| {
            let parsed = parse_interval(raw);
            if parsed.is_none() {
                warn!(
                    line = line_number,
                    column = %columns.interval_months,
                    value = raw,
                    "unparseable interval treated as absent"
                );
            }
            parsed
        });

        records.push(TrainingRecord {
            participant_name,
            training_label,
            completion_date,
            explicit_valid_until,
            interval_months,
            line_number,
        });
    }

    Ok(records)
}

/// Read the roster from any reader. Rows without a name are skipped.
pub fn read_employees<R: Read>(reader: R, settings: &SourceSettings) -> Result<Vec<EmployeeRecord>> {
    let kind = SourceKind::Roster;
    let columns = &settings.roster_columns;
    let mut rdr = ReaderBuilder::new()
        .delimiter(settings.delimiter_byte())
        .flexible(true)
        .from_reader(reader);

    let headers = rdr
        .byte_headers()
        .map_err(|error| LoadError::Csv { source_kind: kind, error })?;
    let headers = decode_record(headers, kind, 0);

    let name_idx = require_column(&headers, &columns.name, kind)?;
    let id_idx = require_column(&headers, &columns.employee_id, kind)?;

    let mut employees = Vec::new();
    let mut skipped = 0usize;

    for (index, result) in rdr.byte_records().enumerate() {
        let Some(row) = readable_row(result, kind, index + 1) else {
            continue;
        };

        let Some(name) = cell(&row, name_idx) else {
            skipped += 1;
            continue;
        };

        employees.push(EmployeeRecord {
            name: name.to_string(),
            employee_id: cell(&row, id_idx).unwrap_or_default().to_string(),
        });
    }

    if skipped > 0 {
        warn!(skipped, "roster rows without a name were skipped");
    }

    Ok(employees)
}

// ============================================================================
// HELPERS
// ============================================================================

fn open_source(path: &Path, kind: SourceKind) -> Result<File> {
    match File::open(path) {
        Ok(file) => Ok(file),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(LoadError::SourceNotFound {
            source_kind: kind,
            path: path.to_path_buf(),
        }),
        Err(err) => Err(LoadError::Io(err)),
    }
}

/// Decode a row, or log and drop it when the reader could not split it
fn readable_row(
    result: std::result::Result<ByteRecord, csv::Error>,
    kind: SourceKind,
    line_number: usize,
) -> Option<StringRecord> {
    match result {
        Ok(row) => Some(decode_record(&row, kind, line_number)),
        Err(error) => {
            warn!(
                source_kind = %kind,
                line = line_number,
                error = %error,
                "unreadable row skipped"
            );
            None
        }
    }
}

/// UTF-8 cells pass through. Anything else is read as Windows-1252,
/// the usual encoding of spreadsheet exports on German systems.
fn decode_record(row: &ByteRecord, kind: SourceKind, line_number: usize) -> StringRecord {
    let mut fallback = false;
    let cells: Vec<String> = row
        .iter()
        .map(|bytes| match std::str::from_utf8(bytes) {
            Ok(text) => text.to_string(),
            Err(_) => {
                fallback = true;
                let (text, _, _) = WINDOWS_1252.decode(bytes);
                text.into_owned()
            }
        })
        .collect();

    if fallback {
        warn!(
            source_kind = %kind,
            line = line_number,
            "cell is not UTF-8, decoded as Windows-1252"
        );
    }

    StringRecord::from(cells)
}

/// Strip surrounding whitespace and a UTF-8 byte order mark
fn normalize_header(raw: &str) -> &str {
    raw.trim().trim_matches('\u{feff}').trim()
}

fn require_column(headers: &StringRecord, column: &str, kind: SourceKind) -> Result<usize> {
    let wanted = normalize_header(column);
    headers
        .iter()
        .position(|header| normalize_header(header) == wanted)
        .ok_or_else(|| LoadError::SourceMalformed {
            source_kind: kind,
            column: column.to_string(),
        })
}

/// Trimmed, non-empty cell value
fn cell(row: &StringRecord, index: usize) -> Option<&str> {
    row.get(index).map(str::trim).filter(|value| !value.is_empty())
}

fn parse_date_cell(raw: &str, column: &str, line_number: usize) -> Option<NaiveDate> {
    let parsed = parse_date(raw);
    if parsed.is_none() {
        warn!(
            line = line_number,
            column,
            value = raw,
            "unparseable date treated as absent"
        );
    }
    parsed
}

/// Parse a date cell (supports YYYY-MM-DD, DD.MM.YYYY, MM/DD/YYYY, with optional time)
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date);
        }
    }

    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(value, format) {
            return Some(datetime.date());
        }
    }

    None
}

/// Parse an interval cell. Integral decimals such as "12.0" are accepted.
pub fn parse_interval(raw: &str) -> Option<i64> {
    let value = raw.trim();

    if let Ok(months) = value.parse::<i64>() {
        return Some(months);
    }

    let decimal = value.replace(',', ".").parse::<f64>().ok()?;
    if decimal.is_finite() && decimal.fract() == 0.0 && decimal.abs() < i64::MAX as f64 {
        Some(decimal as i64)
    } else {
        None
    }
}

// ============================================================================
// TESTS
// ============================================================================
