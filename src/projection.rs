// 📊 Projections - views over the classified table for the presentation layer
// Flat rows, the employee × training matrix, summary counts and filters.

use crate::join::RosterIndex;
use crate::pipeline::ComplianceTable;
use crate::records::{ClassifiedRecord, ExpirySource, Status};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

// ============================================================================
// FLAT ROW
// ============================================================================

/// One classified record as a flat field → scalar mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatRow {
    pub employee_id: Option<String>,
    pub participant_name: String,
    pub training_label: String,
    pub completion_date: Option<NaiveDate>,
    pub explicit_valid_until: Option<NaiveDate>,
    pub interval_months: Option<i64>,
    pub effective_valid_until: Option<NaiveDate>,
    pub expiry_source: ExpirySource,
    pub status: Status,
    pub status_code: u8,
    pub remaining_days: Option<i64>,
}

impl From<&ClassifiedRecord> for FlatRow {
    fn from(record: &ClassifiedRecord) -> Self {
        let training = record.latest.training();
        FlatRow {
            employee_id: record.employee_id().map(str::to_string),
            participant_name: training.participant_name.clone(),
            training_label: training.training_label.clone(),
            completion_date: training.completion_date,
            explicit_valid_until: training.explicit_valid_until,
            interval_months: training.interval_months,
            effective_valid_until: record.latest.effective_valid_until,
            expiry_source: record.latest.expiry_source,
            status: record.status,
            status_code: record.status.code(),
            remaining_days: record.remaining_days,
        }
    }
}

pub fn flat_rows<'a, I>(records: I) -> Vec<FlatRow>
where
    I: IntoIterator<Item = &'a ClassifiedRecord>,
{
    records.into_iter().map(FlatRow::from).collect()
}

// ============================================================================
// STATUS MATRIX
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixRow {
    /// Participant name (the roster name for matched rows)
    pub employee: String,
    pub employee_id: Option<String>,
    /// One cell per training column; None = never completed
    pub cells: Vec<Option<Status>>,
}

/// Pivot: rows = employees, columns = training labels, cell = status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMatrix {
    pub trainings: Vec<String>,
    pub rows: Vec<MatrixRow>,
}

impl StatusMatrix {
    /// Build the pivot. Rows are sorted by name then id, columns by label.
    /// If several records land in one cell the first one is shown.
    pub fn build(records: &[ClassifiedRecord]) -> Self {
        let trainings: Vec<String> = records
            .iter()
            .map(|r| r.training_label().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let column_of: HashMap<&str, usize> = trainings
            .iter()
            .enumerate()
            .map(|(i, label)| (label.as_str(), i))
            .collect();

        let mut rows: BTreeMap<(String, Option<String>), Vec<Option<Status>>> = BTreeMap::new();

        for record in records {
            let key = (
                record.participant_name().to_string(),
                record.employee_id().map(str::to_string),
            );
            let cells = rows
                .entry(key)
                .or_insert_with(|| vec![None; trainings.len()]);

            if let Some(&column) = column_of.get(record.training_label()) {
                if cells[column].is_none() {
                    cells[column] = Some(record.status);
                }
            }
        }

        let rows = rows
            .into_iter()
            .map(|((employee, employee_id), cells)| MatrixRow {
                employee,
                employee_id,
                cells,
            })
            .collect();

        StatusMatrix { trainings, rows }
    }

    pub fn cell(&self, employee: &str, training: &str) -> Option<Status> {
        let column = self.trainings.iter().position(|t| t == training)?;
        self.rows
            .iter()
            .find(|row| row.employee == employee)
            .and_then(|row| row.cells[column])
    }
}

// ============================================================================
// SUMMARY
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub valid: usize,
    pub soon_expiring: usize,
    pub expired: usize,
    pub unknown: usize,
}

impl StatusCounts {
    pub fn get(&self, status: Status) -> usize {
        match status {
            Status::Valid => self.valid,
            Status::SoonExpiring => self.soon_expiring,
            Status::Expired => self.expired,
            Status::Unknown => self.unknown,
        }
    }

    fn increment(&mut self, status: Status) {
        match status {
            Status::Valid => self.valid += 1,
            Status::SoonExpiring => self.soon_expiring += 1,
            Status::Expired => self.expired += 1,
            Status::Unknown => self.unknown += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.valid + self.soon_expiring + self.expired + self.unknown
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub as_of: NaiveDate,
    pub roster_size: usize,
    pub distinct_trainings: usize,
    pub total_rows: usize,
    pub counts: StatusCounts,
    /// Input training rows without a roster match (before deduplication)
    pub unmatched_training_rows: usize,
    /// Output rows without an employee id
    pub unmatched_rows: usize,
}

impl StatusSummary {
    pub fn from_table(table: &ComplianceTable) -> Self {
        let mut counts = StatusCounts::default();
        for record in &table.rows {
            counts.increment(record.status);
        }

        let distinct_trainings = table
            .rows
            .iter()
            .map(ClassifiedRecord::training_label)
            .collect::<BTreeSet<_>>()
            .len();

        StatusSummary {
            as_of: table.as_of,
            roster_size: table.roster_size,
            distinct_trainings,
            total_rows: table.rows.len(),
            counts,
            unmatched_training_rows: table.join.unmatched,
            unmatched_rows: table
                .rows
                .iter()
                .filter(|r| r.employee_id().is_none())
                .count(),
        }
    }
}

// ============================================================================
// FILTERS
// ============================================================================

/// Row filter for the detail list. Empty / None fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilter {
    pub statuses: Vec<Status>,
    pub employee: Option<String>,
    pub training: Option<String>,
}

impl RecordFilter {
    /// An employee name resolves to its first roster id, so every row under
    /// that id matches. Names missing from the roster match on participant name.
    pub fn matches(&self, record: &ClassifiedRecord, roster: &RosterIndex) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&record.status) {
            return false;
        }

        if let Some(employee) = &self.employee {
            let same_employee = match roster.employee_id(employee) {
                Some(id) => record.employee_id() == Some(id),
                None => record.participant_name() == employee,
            };
            if !same_employee {
                return false;
            }
        }

        if let Some(training) = &self.training {
            if record.training_label() != training {
                return false;
            }
        }

        true
    }

    pub fn apply<'a>(&self, table: &'a ComplianceTable) -> Vec<&'a ClassifiedRecord> {
        table
            .rows
            .iter()
            .filter(|r| self.matches(r, &table.roster))
            .collect()
    }
}

// ============================================================================
// RANKINGS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingCount {
    pub training_label: String,
    pub count: usize,
}

/// Trainings with the most expired rows, descending, at most `limit` entries
pub fn expired_by_training(table: &ComplianceTable, limit: usize) -> Vec<TrainingCount> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for record in table.rows.iter().filter(|r| r.status == Status::Expired) {
        *counts.entry(record.training_label()).or_insert(0) += 1;
    }

    let mut ranking: Vec<TrainingCount> = counts
        .into_iter()
        .map(|(label, count)| TrainingCount {
            training_label: label.to_string(),
            count,
        })
        .collect();

    // Stable sort keeps alphabetical order among equal counts
    ranking.sort_by(|a, b| b.count.cmp(&a.count));
    ranking.truncate(limit);
    ranking
}

/// Rows expiring within `horizon_days` (0 ..= horizon), soonest first
pub fn upcoming_expirations(table: &ComplianceTable, horizon_days: i64) -> Vec<&ClassifiedRecord> {
    let mut upcoming: Vec<&ClassifiedRecord> = table
        .rows
        .iter()
        .filter(|r| matches!(r.remaining_days, Some(days) if (0..=horizon_days).contains(&days)))
        .collect();

    upcoming.sort_by_key(|r| r.effective_valid_until());
    upcoming
}

// ============================================================================
// TESTS
// ============================================================================
