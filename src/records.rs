// 📋 Record types - one struct per pipeline stage
// Every stage wraps the previous one, so nothing is mutated after creation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ============================================================================
// INPUT RECORDS
// ============================================================================

/// One completed training, as read from the trainings report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingRecord {
    /// Free-text participant name. Not a stable key.
    pub participant_name: String,

    /// Training/course label, used as grouping key
    pub training_label: String,

    /// When the training was completed
    pub completion_date: Option<NaiveDate>,

    /// Authoritative validity end, if the report carries one
    pub explicit_valid_until: Option<NaiveDate>,

    /// Recurrence interval in months
    pub interval_months: Option<i64>,

    /// 1-based data row in the source file (header excluded)
    pub line_number: usize,
}

impl TrainingRecord {
    pub fn new(participant_name: &str, training_label: &str) -> Self {
        TrainingRecord {
            participant_name: participant_name.to_string(),
            training_label: training_label.to_string(),
            completion_date: None,
            explicit_valid_until: None,
            interval_months: None,
            line_number: 0,
        }
    }

    /// Builder pattern: add completion date
    pub fn completed_on(mut self, date: NaiveDate) -> Self {
        self.completion_date = Some(date);
        self
    }

    /// Builder pattern: add explicit valid-until date
    pub fn valid_until(mut self, date: NaiveDate) -> Self {
        self.explicit_valid_until = Some(date);
        self
    }

    /// Builder pattern: add recurrence interval
    pub fn every_months(mut self, months: i64) -> Self {
        self.interval_months = Some(months);
        self
    }

    pub fn at_line(mut self, line_number: usize) -> Self {
        self.line_number = line_number;
        self
    }
}

/// One roster entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeRecord {
    /// Join key, compared by exact string equality
    pub name: String,

    /// Stable identifier (opaque)
    pub employee_id: String,
}

impl EmployeeRecord {
    pub fn new(name: &str, employee_id: &str) -> Self {
        EmployeeRecord {
            name: name.to_string(),
            employee_id: employee_id.to_string(),
        }
    }
}

// ============================================================================
// DERIVED RECORDS
// ============================================================================

/// Training record linked to the roster. `employee_id` is None for unmatched rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinedRecord {
    pub training: TrainingRecord,
    pub employee_id: Option<String>,
}

impl JoinedRecord {
    pub fn is_matched(&self) -> bool {
        self.employee_id.is_some()
    }
}

/// Where an effective valid-until date came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpirySource {
    /// Taken from the explicit valid-until column
    Explicit,
    /// Completion date plus recurrence interval
    Interval,
    /// No rule applied
    Unresolved,
    /// A rule applied but the date could not be computed
    Invalid,
}

/// Joined record with its effective valid-until date computed once
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRecord {
    pub joined: JoinedRecord,
    pub effective_valid_until: Option<NaiveDate>,
    pub expiry_source: ExpirySource,
}

impl ResolvedRecord {
    pub fn training(&self) -> &TrainingRecord {
        &self.joined.training
    }

    pub fn employee_id(&self) -> Option<&str> {
        self.joined.employee_id.as_deref()
    }
}

/// A resolved record that survived deduplication
pub type LatestRecord = ResolvedRecord;

// ============================================================================
// STATUS
// ============================================================================

/// Compliance status of the latest completion for one employee/training pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Valid,
    SoonExpiring,
    Expired,
    Unknown,
}

impl Status {
    pub const ALL: [Status; 4] = [
        Status::Valid,
        Status::SoonExpiring,
        Status::Expired,
        Status::Unknown,
    ];

    /// Stable numeric code used by exports
    pub fn code(&self) -> u8 {
        match self {
            Status::Unknown => 0,
            Status::Valid => 1,
            Status::SoonExpiring => 2,
            Status::Expired => 3,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Status::Valid => "valid",
            Status::SoonExpiring => "soon_expiring",
            Status::Expired => "expired",
            Status::Unknown => "unknown",
        }
    }

    pub fn from_label(label: &str) -> Option<Status> {
        let normalized = label.trim().to_lowercase().replace(['-', ' '], "_");
        Status::ALL
            .into_iter()
            .find(|status| status.label() == normalized)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Final pipeline row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedRecord {
    pub latest: LatestRecord,
    pub status: Status,
    /// Whole days from the reference date to the valid-until date. None iff Unknown.
    pub remaining_days: Option<i64>,
}

impl ClassifiedRecord {
    pub fn participant_name(&self) -> &str {
        &self.latest.joined.training.participant_name
    }

    pub fn training_label(&self) -> &str {
        &self.latest.joined.training.training_label
    }

    pub fn employee_id(&self) -> Option<&str> {
        self.latest.employee_id()
    }

    pub fn completion_date(&self) -> Option<NaiveDate> {
        self.latest.joined.training.completion_date
    }

    pub fn effective_valid_until(&self) -> Option<NaiveDate> {
        self.latest.effective_valid_until
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_are_stable() {
        assert_eq!(Status::Unknown.code(), 0);
        assert_eq!(Status::Valid.code(), 1);
        assert_eq!(Status::SoonExpiring.code(), 2);
        assert_eq!(Status::Expired.code(), 3);
    }

    #[test]
    fn test_status_from_label() {
        assert_eq!(Status::from_label("expired"), Some(Status::Expired));
        assert_eq!(Status::from_label("Soon-Expiring"), Some(Status::SoonExpiring));
        assert_eq!(Status::from_label(" valid "), Some(Status::Valid));
        assert_eq!(Status::from_label("green"), None);
    }

    #[test]
    fn test_status_serializes_as_label() {
        let json = serde_json::to_string(&Status::SoonExpiring).unwrap();
        assert_eq!(json, "\"soon_expiring\"");
    }

    #[test]
    fn test_training_record_builder() {
        let date = NaiveDate::from_ymd_opt(2023, 1, 10).unwrap();
        let record = TrainingRecord::new("Anna Muster", "Fire Safety")
            .completed_on(date)
            .every_months(12)
            .at_line(4);

        assert_eq!(record.completion_date, Some(date));
        assert_eq!(record.interval_months, Some(12));
        assert_eq!(record.explicit_valid_until, None);
        assert_eq!(record.line_number, 4);
    }
}
