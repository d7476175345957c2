// 📤 Exports - CSV and JSON renderings of the compliance table
// Output is deterministic: same table in, same bytes out.

use crate::pipeline::ComplianceTable;
use crate::projection::{flat_rows, FlatRow, StatusMatrix};
use crate::records::{ClassifiedRecord, Status};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Byte order mark prepended to CSV downloads so spreadsheet tools pick UTF-8
pub const UTF8_BOM: &str = "\u{feff}";

// ============================================================================
// EXPORT FORMAT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ExportFormat {
    /// One row per employee/training pair with every field
    DetailsCsv,
    /// Employee × training status matrix
    MatrixCsv,
    /// Flat rows as a JSON array
    Json,
    /// Per-employee dictionary keyed by employee id
    EmployeesJson,
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::DetailsCsv | ExportFormat::MatrixCsv => "text/csv; charset=utf-8",
            ExportFormat::Json | ExportFormat::EmployeesJson => "application/json",
        }
    }

    /// Dated default file name, e.g. `compliance_matrix_20240201.csv`
    pub fn file_name(&self, as_of: NaiveDate) -> String {
        let stamp = as_of.format("%Y%m%d");
        match self {
            ExportFormat::DetailsCsv => format!("compliance_list_{}.csv", stamp),
            ExportFormat::MatrixCsv => format!("compliance_matrix_{}.csv", stamp),
            ExportFormat::Json => format!("compliance_rows_{}.json", stamp),
            ExportFormat::EmployeesJson => format!("compliance_employees_{}.json", stamp),
        }
    }

    /// Render the table. CSV output starts with a UTF-8 BOM.
    pub fn render(&self, table: &ComplianceTable) -> Result<String> {
        match self {
            ExportFormat::DetailsCsv => Ok(format!("{}{}", UTF8_BOM, details_csv(&table.rows)?)),
            ExportFormat::MatrixCsv => Ok(format!(
                "{}{}",
                UTF8_BOM,
                matrix_csv(&StatusMatrix::build(&table.rows))?
            )),
            ExportFormat::Json => rows_json(&table.rows),
            ExportFormat::EmployeesJson => employees_json(&table.rows),
        }
    }
}

// ============================================================================
// CSV
// ============================================================================

/// Flat detail list, header taken from `FlatRow` field names
pub fn details_csv(records: &[ClassifiedRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(Vec::new());

    for row in flat_rows(records) {
        wtr.serialize(&row).context("Failed to serialize row")?;
    }

    into_string(wtr)
}

/// Matrix with one column per training. Empty cell = never completed.
pub fn matrix_csv(matrix: &StatusMatrix) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(Vec::new());

    let mut header = vec!["Employee".to_string(), "Employee ID".to_string()];
    header.extend(matrix.trainings.iter().cloned());
    wtr.write_record(&header).context("Failed to write matrix header")?;

    for row in &matrix.rows {
        let mut record = vec![
            row.employee.clone(),
            row.employee_id.clone().unwrap_or_default(),
        ];
        record.extend(
            row.cells
                .iter()
                .map(|cell| cell.map(|status| status.label().to_string()).unwrap_or_default()),
        );
        wtr.write_record(&record).context("Failed to write matrix row")?;
    }

    into_string(wtr)
}

fn into_string(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = wtr.into_inner().context("Failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

// ============================================================================
// JSON
// ============================================================================

pub fn rows_json(records: &[ClassifiedRecord]) -> Result<String> {
    let rows: Vec<FlatRow> = flat_rows(records);
    serde_json::to_string_pretty(&rows).context("Failed to serialize rows")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingEntry {
    pub status: Status,
    pub status_code: u8,
    pub completed_on: Option<NaiveDate>,
    pub valid_until: Option<NaiveDate>,
    pub remaining_days: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeEntry {
    pub name: String,
    pub trainings: BTreeMap<String, TrainingEntry>,
}

/// Per-employee dictionary keyed by employee id.
/// Unmatched rows are keyed by participant name.
pub fn employee_dictionary(records: &[ClassifiedRecord]) -> BTreeMap<String, EmployeeEntry> {
    let mut dictionary: BTreeMap<String, EmployeeEntry> = BTreeMap::new();

    for record in records {
        let key = record
            .employee_id()
            .unwrap_or_else(|| record.participant_name())
            .to_string();

        let entry = dictionary.entry(key).or_insert_with(|| EmployeeEntry {
            name: record.participant_name().to_string(),
            trainings: BTreeMap::new(),
        });

        entry
            .trainings
            .entry(record.training_label().to_string())
            .or_insert(TrainingEntry {
                status: record.status,
                status_code: record.status.code(),
                completed_on: record.completion_date(),
                valid_until: record.effective_valid_until(),
                remaining_days: record.remaining_days,
            });
    }

    dictionary
}

pub fn employees_json(records: &[ClassifiedRecord]) -> Result<String> {
    serde_json::to_string_pretty(&employee_dictionary(records))
        .context("Failed to serialize employee dictionary")
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{InputSnapshot, Pipeline};
    use crate::records::{EmployeeRecord, TrainingRecord};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_table() -> ComplianceTable {
        let snapshot = InputSnapshot::new(
            vec![
                TrainingRecord::new("Anna Muster", "Fire Safety")
                    .completed_on(date(2023, 1, 10))
                    .every_months(12),
                TrainingRecord::new("Anna Muster", "First Aid")
                    .completed_on(date(2023, 9, 1))
                    .valid_until(date(2025, 9, 1)),
                TrainingRecord::new("Zoe Fremd", "First Aid"),
            ],
            vec![EmployeeRecord::new("Anna Muster", "1001")],
        );
        Pipeline::new().run_on(&snapshot, date(2024, 2, 1))
    }

    #[test]
    fn test_details_csv() {
        let csv = details_csv(&sample_table().rows).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(
            lines[0],
            "employee_id,participant_name,training_label,completion_date,explicit_valid_until,\
interval_months,effective_valid_until,expiry_source,status,status_code,remaining_days"
        );
        assert_eq!(
            lines[1],
            "1001,Anna Muster,Fire Safety,2023-01-10,,12,2024-01-10,interval,expired,3,-22"
        );
        assert_eq!(
            lines[2],
            "1001,Anna Muster,First Aid,2023-09-01,2025-09-01,,2025-09-01,explicit,valid,1,578"
        );
        assert_eq!(lines[3], ",Zoe Fremd,First Aid,,,,,unresolved,unknown,0,");
    }

    #[test]
    fn test_matrix_csv() {
        let table = sample_table();
        let csv = matrix_csv(&StatusMatrix::build(&table.rows)).unwrap();

        assert_eq!(
            csv,
            "Employee,Employee ID,Fire Safety,First Aid\n\
Anna Muster,1001,expired,valid\n\
Zoe Fremd,,,unknown\n"
        );
    }

    #[test]
    fn test_render_csv_has_bom() {
        let rendered = ExportFormat::MatrixCsv.render(&sample_table()).unwrap();
        assert!(rendered.starts_with(UTF8_BOM));
    }

    #[test]
    fn test_employee_dictionary() {
        let dictionary = employee_dictionary(&sample_table().rows);

        assert_eq!(dictionary.len(), 2);

        let anna = &dictionary["1001"];
        assert_eq!(anna.name, "Anna Muster");
        assert_eq!(anna.trainings["Fire Safety"].status, Status::Expired);
        assert_eq!(anna.trainings["Fire Safety"].remaining_days, Some(-22));
        assert_eq!(anna.trainings["First Aid"].valid_until, Some(date(2025, 9, 1)));

        let zoe = &dictionary["Zoe Fremd"];
        assert_eq!(zoe.trainings["First Aid"].status_code, 0);
        assert_eq!(zoe.trainings["First Aid"].completed_on, None);
    }

    #[test]
    fn test_employees_json_shape() {
        let json = employees_json(&sample_table().rows).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["1001"]["trainings"]["Fire Safety"]["status"], "expired");
        assert_eq!(value["1001"]["trainings"]["Fire Safety"]["valid_until"], "2024-01-10");
        assert!(value["Zoe Fremd"]["trainings"]["First Aid"]["remaining_days"].is_null());
    }

    #[test]
    fn test_export_is_deterministic() {
        for format in [
            ExportFormat::DetailsCsv,
            ExportFormat::MatrixCsv,
            ExportFormat::Json,
            ExportFormat::EmployeesJson,
        ] {
            let first = format.render(&sample_table()).unwrap();
            let second = format.render(&sample_table()).unwrap();
            assert_eq!(first, second, "{:?}", format);
        }
    }

    #[test]
    fn test_file_names() {
        let as_of = date(2024, 2, 1);
        assert_eq!(
            ExportFormat::MatrixCsv.file_name(as_of),
            "compliance_matrix_20240201.csv"
        );
        assert_eq!(
            ExportFormat::EmployeesJson.file_name(as_of),
            "compliance_employees_20240201.json"
        );
    }
}
