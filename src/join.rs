// 🔗 Roster Join - link training records to employee ids by name
//
// Left join on exact name equality. Free-text names are not a stable key:
// two people with the same name collapse onto the first roster entry, and a
// spelling difference leaves the row unmatched. Both outcomes are counted in
// the JoinReport instead of being hidden.

use crate::records::{EmployeeRecord, JoinedRecord, TrainingRecord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

// ============================================================================
// JOIN REPORT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinReport {
    /// Training rows linked to a roster entry
    pub matched: usize,

    /// Training rows with no roster entry of the same name
    pub unmatched: usize,

    /// Distinct participant names that found no roster entry (sorted)
    pub unmatched_names: Vec<String>,

    /// Roster names that occur more than once (sorted)
    pub ambiguous_names: Vec<String>,
}

impl JoinReport {
    pub fn total(&self) -> usize {
        self.matched + self.unmatched
    }

    /// Share of training rows without a roster match (0.0 - 1.0)
    pub fn unmatched_rate(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.unmatched as f64 / self.total() as f64
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{} rows matched, {} unmatched ({:.1}%), {} ambiguous roster names",
            self.matched,
            self.unmatched,
            self.unmatched_rate() * 100.0,
            self.ambiguous_names.len()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub records: Vec<JoinedRecord>,
    pub report: JoinReport,
    pub roster: RosterIndex,
}

// ============================================================================
// ROSTER INDEX
// ============================================================================

/// Name → employee id lookup. The first roster entry wins for duplicate names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterIndex {
    by_name: HashMap<String, String>,
    ambiguous: BTreeSet<String>,
}

impl RosterIndex {
    pub fn new(employees: &[EmployeeRecord]) -> Self {
        let mut by_name: HashMap<String, String> = HashMap::with_capacity(employees.len());
        let mut ambiguous = BTreeSet::new();

        for employee in employees {
            if by_name.contains_key(&employee.name) {
                debug!(
                    name = %employee.name,
                    "duplicate roster name, keeping first entry"
                );
                ambiguous.insert(employee.name.clone());
                continue;
            }
            by_name.insert(employee.name.clone(), employee.employee_id.clone());
        }

        RosterIndex { by_name, ambiguous }
    }

    pub fn employee_id(&self, name: &str) -> Option<&str> {
        self.by_name.get(name).map(String::as_str)
    }

    pub fn ambiguous_names(&self) -> Vec<String> {
        self.ambiguous.iter().cloned().collect()
    }
}

// ============================================================================
// JOIN
// ============================================================================

/// Left-join every training record to the roster. Output order equals input order.
pub fn join(trainings: &[TrainingRecord], employees: &[EmployeeRecord]) -> JoinOutcome {
    let index = RosterIndex::new(employees);

    let mut report = JoinReport {
        ambiguous_names: index.ambiguous_names(),
        ..JoinReport::default()
    };
    let mut unmatched_names = BTreeSet::new();

    let records: Vec<JoinedRecord> = trainings
        .iter()
        .map(|training| {
            let employee_id = index
                .employee_id(&training.participant_name)
                .map(str::to_string);

            if employee_id.is_some() {
                report.matched += 1;
            } else {
                report.unmatched += 1;
                unmatched_names.insert(training.participant_name.clone());
            }

            JoinedRecord {
                training: training.clone(),
                employee_id,
            }
        })
        .collect();

    report.unmatched_names = unmatched_names.into_iter().collect();

    info!(
        matched = report.matched,
        unmatched = report.unmatched,
        ambiguous = report.ambiguous_names.len(),
        "joined trainings to roster"
    );

    JoinOutcome {
        records,
        report,
        roster: index,
    }
}

// ============================================================================
// TESTS
// ============================================================================
