// 🧮 Compliance Pipeline - Loader → Join → Expiry → Deduplicate → Classify
// Pure function of the two input tables, the settings and the reference date.

use crate::config::Settings;
use crate::deduplication::{DeduplicationEngine, UnmatchedGrouping};
use crate::error::Result;
use crate::expiry::ExpiryResolver;
use crate::join::{join, JoinReport, RosterIndex};
use crate::loader::{load_employees, load_trainings};
use crate::records::{ClassifiedRecord, EmployeeRecord, TrainingRecord};
use crate::status::StatusClassifier;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{info, info_span};

// ============================================================================
// INPUT SNAPSHOT
// ============================================================================

/// The two input tables as loaded. Treated as immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSnapshot {
    pub trainings: Vec<TrainingRecord>,
    pub employees: Vec<EmployeeRecord>,
}

impl InputSnapshot {
    pub fn new(trainings: Vec<TrainingRecord>, employees: Vec<EmployeeRecord>) -> Self {
        InputSnapshot {
            trainings,
            employees,
        }
    }

    /// Load both sources named in the settings. Either one missing aborts.
    pub fn load(settings: &Settings) -> Result<Self> {
        let sources = &settings.sources;
        let trainings = load_trainings(&sources.trainings_path, sources)?;
        let employees = load_employees(&sources.roster_path, sources)?;
        Ok(InputSnapshot::new(trainings, employees))
    }
}

// ============================================================================
// OUTPUT TABLE
// ============================================================================

/// Result of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceTable {
    /// Reference date the statuses were computed against
    pub as_of: NaiveDate,

    /// One row per surviving (employee, training) pair
    pub rows: Vec<ClassifiedRecord>,

    pub join: JoinReport,

    /// Number of roster entries
    pub roster_size: usize,

    /// Name → id lookup the rows were joined with
    #[serde(skip)]
    pub roster: RosterIndex,
}

impl ComplianceTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

pub struct Pipeline {
    resolver: ExpiryResolver,
    deduplicator: DeduplicationEngine,
    classifier: StatusClassifier,
}

impl Pipeline {
    pub fn new() -> Self {
        Pipeline {
            resolver: ExpiryResolver::new(),
            deduplicator: DeduplicationEngine::new(),
            classifier: StatusClassifier::new(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Pipeline {
            resolver: ExpiryResolver::new(),
            deduplicator: DeduplicationEngine::with_grouping(settings.grouping.unmatched),
            classifier: StatusClassifier::with_window(
                settings.classification.soon_expiring_days,
            ),
        }
    }

    pub fn with_resolver(mut self, resolver: ExpiryResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_window(mut self, soon_expiring_days: i64) -> Self {
        self.classifier = StatusClassifier::with_window(soon_expiring_days);
        self
    }

    pub fn with_grouping(mut self, unmatched: UnmatchedGrouping) -> Self {
        self.deduplicator = DeduplicationEngine::with_grouping(unmatched);
        self
    }

    /// Run against a reference instant. Only its calendar date is used.
    pub fn run(&self, snapshot: &InputSnapshot, now: NaiveDateTime) -> ComplianceTable {
        self.run_on(snapshot, now.date())
    }

    /// Run against a reference date
    pub fn run_on(&self, snapshot: &InputSnapshot, today: NaiveDate) -> ComplianceTable {
        let span = info_span!("pipeline", as_of = %today);
        let _guard = span.enter();

        let joined = join(&snapshot.trainings, &snapshot.employees);
        let resolved = self.resolver.resolve_all(joined.records);
        let latest = self.deduplicator.latest(resolved);
        let rows = self.classifier.classify_all(latest, today);

        info!(rows = rows.len(), "classified compliance table");

        ComplianceTable {
            as_of: today,
            rows,
            join: joined.report,
            roster_size: snapshot.employees.len(),
            roster: joined.roster,
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
