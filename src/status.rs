// 🚦 Status Classifier - valid / soon expiring / expired / unknown
//
// remaining_days = calendar days from the reference date to the valid-until
// date. The time of day of the reference instant is discarded, so a record
// expiring today has 0 days left and is still SoonExpiring.

use crate::records::{ClassifiedRecord, LatestRecord, Status};
use chrono::NaiveDate;

pub const DEFAULT_SOON_EXPIRING_DAYS: i64 = 90;

pub struct StatusClassifier {
    /// Inclusive upper bound of the soon-expiring window (default: 90)
    pub soon_expiring_days: i64,
}

impl StatusClassifier {
    pub fn new() -> Self {
        StatusClassifier {
            soon_expiring_days: DEFAULT_SOON_EXPIRING_DAYS,
        }
    }

    pub fn with_window(soon_expiring_days: i64) -> Self {
        StatusClassifier { soon_expiring_days }
    }

    /// Status for a given number of remaining days
    pub fn status_for(&self, remaining_days: Option<i64>) -> Status {
        match remaining_days {
            None => Status::Unknown,
            Some(days) if days < 0 => Status::Expired,
            Some(days) if days <= self.soon_expiring_days => Status::SoonExpiring,
            Some(_) => Status::Valid,
        }
    }

    pub fn classify(&self, record: LatestRecord, today: NaiveDate) -> ClassifiedRecord {
        let remaining_days = record
            .effective_valid_until
            .map(|valid_until| (valid_until - today).num_days());

        ClassifiedRecord {
            status: self.status_for(remaining_days),
            remaining_days,
            latest: record,
        }
    }

    pub fn classify_all(&self, records: Vec<LatestRecord>, today: NaiveDate) -> Vec<ClassifiedRecord> {
        records
            .into_iter()
            .map(|record| self.classify(record, today))
            .collect()
    }
}

impl Default for StatusClassifier {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
