//! Load CSV reports from disk, run the pipeline and render every export.

use chrono::NaiveDate;
use std::fs;
use std::path::Path;
use training_matrix::{
    expired_by_training, upcoming_expirations, ExportFormat, InputSnapshot, LoadError, Pipeline,
    RecordFilter, Settings, SourceKind, Status, StatusMatrix, StatusSummary,
};

const TRAININGS: &str = "\
Teilnehmer;Ausbildung (Bezeichnung);Datum der Durchführung;Gültig bis;Intervall
Anna Muster;Fire Safety;10.01.2022;;12
Anna Muster;Fire Safety;10.01.2023;;12
Anna Muster;First Aid;2023-03-01 00:00:00;2026-03-01 00:00:00;
Ben Beispiel;Fire Safety;15.12.2023;;3
Ben Beispiel;Forklift;;;24
Zoe Fremd;Fire Safety;01.01.2024;;12
Carla Test;Forklift;31.01.2023;;13
";

const ROSTER: &str = "\
Name;Personalnummer
Anna Muster;1001
Ben Beispiel;1002
Carla Test;1003
Dora Nord;1004
";

fn write_sources(dir: &Path) -> Settings {
    let trainings = dir.join("Bericht_Ausbildungen.csv");
    let roster = dir.join("Bericht_User.csv");
    fs::write(&trainings, TRAININGS).unwrap();
    fs::write(&roster, ROSTER).unwrap();

    let mut settings = Settings::default();
    settings.sources.trainings_path = trainings;
    settings.sources.roster_path = roster;
    settings.sources.delimiter = ";".to_string();
    settings
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn full_run_from_files() {
    let dir = tempfile::tempdir().unwrap();
    let settings = write_sources(dir.path());

    let snapshot = InputSnapshot::load(&settings).unwrap();
    assert_eq!(snapshot.trainings.len(), 7);
    assert_eq!(snapshot.employees.len(), 4);

    let table = Pipeline::from_settings(&settings).run_on(&snapshot, date(2024, 2, 1));

    // Anna's two Fire Safety rows collapse into one
    assert_eq!(table.len(), 6);

    let matrix = StatusMatrix::build(&table.rows);
    assert_eq!(matrix.cell("Anna Muster", "Fire Safety"), Some(Status::Expired));
    assert_eq!(matrix.cell("Anna Muster", "First Aid"), Some(Status::Valid));
    // 2023-12-15 + 3 months = 2024-03-15, 43 days out
    assert_eq!(matrix.cell("Ben Beispiel", "Fire Safety"), Some(Status::SoonExpiring));
    assert_eq!(matrix.cell("Ben Beispiel", "Forklift"), Some(Status::Unknown));
    assert_eq!(matrix.cell("Zoe Fremd", "Fire Safety"), Some(Status::Valid));
    // 2023-01-31 + 13 months clamps to 2024-02-29, 28 days out
    assert_eq!(matrix.cell("Carla Test", "Forklift"), Some(Status::SoonExpiring));
    assert_eq!(matrix.cell("Dora Nord", "Fire Safety"), None);

    let summary = StatusSummary::from_table(&table);
    assert_eq!(summary.roster_size, 4);
    assert_eq!(summary.distinct_trainings, 3);
    assert_eq!(summary.counts.expired, 1);
    assert_eq!(summary.counts.soon_expiring, 2);
    assert_eq!(summary.counts.valid, 2);
    assert_eq!(summary.counts.unknown, 1);
    assert_eq!(summary.unmatched_training_rows, 1);
    assert_eq!(table.join.unmatched_names, vec!["Zoe Fremd".to_string()]);

    let upcoming = upcoming_expirations(&table, 180);
    assert_eq!(upcoming.len(), 2);
    assert_eq!(upcoming[0].participant_name(), "Carla Test");

    let ranking = expired_by_training(&table, 10);
    assert_eq!(ranking.len(), 1);
    assert_eq!(ranking[0].training_label, "Fire Safety");

    let anna = RecordFilter {
        employee: Some("Anna Muster".to_string()),
        ..RecordFilter::default()
    };
    assert_eq!(anna.apply(&table).len(), 2);
}

#[test]
fn every_export_renders() {
    let dir = tempfile::tempdir().unwrap();
    let settings = write_sources(dir.path());
    let snapshot = InputSnapshot::load(&settings).unwrap();
    let table = Pipeline::from_settings(&settings).run_on(&snapshot, date(2024, 2, 1));

    let details = ExportFormat::DetailsCsv.render(&table).unwrap();
    assert_eq!(details.lines().count(), table.len() + 1);

    let matrix = ExportFormat::MatrixCsv.render(&table).unwrap();
    assert!(!matrix.contains("Dora Nord"));
    assert!(matrix.contains("Zoe Fremd,,valid,,"));

    let rows: serde_json::Value =
        serde_json::from_str(&ExportFormat::Json.render(&table).unwrap()).unwrap();
    assert_eq!(rows.as_array().unwrap().len(), table.len());

    let employees: serde_json::Value =
        serde_json::from_str(&ExportFormat::EmployeesJson.render(&table).unwrap()).unwrap();
    assert_eq!(employees["1002"]["trainings"]["Forklift"]["status"], "unknown");
    assert_eq!(employees["1003"]["trainings"]["Forklift"]["valid_until"], "2024-02-29");
}

#[test]
fn missing_roster_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = write_sources(dir.path());
    settings.sources.roster_path = dir.path().join("absent.csv");

    let err = InputSnapshot::load(&settings).unwrap_err();
    assert!(matches!(
        err,
        LoadError::SourceNotFound { source_kind: SourceKind::Roster, .. }
    ));
}

#[test]
fn wrong_delimiter_is_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = write_sources(dir.path());
    settings.sources.delimiter = ",".to_string();

    let err = InputSnapshot::load(&settings).unwrap_err();
    assert!(matches!(
        err,
        LoadError::SourceMalformed { source_kind: SourceKind::Trainings, .. }
    ));
}
