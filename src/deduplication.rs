// 🔍 Deduplication Engine - keep the latest completion per employee/training
//
// Group key: (employee, training label). Within a group the most recent
// completion date wins, a missing date loses to any date, and ties keep
// the record that came first in the input.

use crate::records::{LatestRecord, ResolvedRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

// ============================================================================
// GROUPING
// ============================================================================

/// How rows without a roster match are grouped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedGrouping {
    /// Unmatched rows group by raw participant name, so one person's repeated
    /// completions collapse but different people stay apart
    #[default]
    ByParticipantName,

    /// Every unmatched row is its own group
    PerRecord,
}

/// Identity half of the grouping key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum GroupKey {
    /// Matched row, keyed by employee id
    Employee(String),

    /// Unmatched row, keyed by participant name
    Participant(String),

    /// Unmatched row kept on its own (input position)
    Record(usize),
}

impl GroupKey {
    pub fn is_matched(&self) -> bool {
        matches!(self, GroupKey::Employee(_))
    }
}

// ============================================================================
// DEDUPLICATION ENGINE
// ============================================================================

pub struct DeduplicationEngine {
    pub unmatched: UnmatchedGrouping,
}

impl DeduplicationEngine {
    /// Create engine with the default unmatched grouping (by participant name)
    pub fn new() -> Self {
        DeduplicationEngine {
            unmatched: UnmatchedGrouping::default(),
        }
    }

    pub fn with_grouping(unmatched: UnmatchedGrouping) -> Self {
        DeduplicationEngine { unmatched }
    }

    /// Grouping key of the record at `position` in the input
    pub fn group_key(&self, record: &ResolvedRecord, position: usize) -> GroupKey {
        match (record.employee_id(), self.unmatched) {
            (Some(id), _) => GroupKey::Employee(id.to_string()),
            (None, UnmatchedGrouping::ByParticipantName) => {
                GroupKey::Participant(record.training().participant_name.clone())
            }
            (None, UnmatchedGrouping::PerRecord) => GroupKey::Record(position),
        }
    }

    /// Keep one record per (group key, training label).
    ///
    /// Output is ordered by group key, then training label.
    pub fn latest(&self, records: Vec<ResolvedRecord>) -> Vec<LatestRecord> {
        let input_count = records.len();

        // Index of the current winner per group
        let mut winners: BTreeMap<(GroupKey, String), usize> = BTreeMap::new();

        for (position, record) in records.iter().enumerate() {
            let key = (
                self.group_key(record, position),
                record.training().training_label.clone(),
            );

            let replace = match winners.get(&key) {
                Some(&current) => Self::supersedes(record, &records[current]),
                None => true,
            };
            if replace {
                winners.insert(key, position);
            }
        }

        let mut keep = vec![false; input_count];
        let order: Vec<usize> = winners.into_values().collect();
        for &position in &order {
            keep[position] = true;
        }

        let mut slots: Vec<Option<ResolvedRecord>> = records
            .into_iter()
            .zip(keep)
            .map(|(record, kept)| kept.then_some(record))
            .collect();

        let latest: Vec<LatestRecord> = order
            .into_iter()
            .filter_map(|position| slots[position].take())
            .collect();

        info!(
            input = input_count,
            kept = latest.len(),
            dropped = input_count - latest.len(),
            "kept latest completion per employee and training"
        );

        latest
    }

    /// Strictly more recent completion. None sorts below every date.
    fn supersedes(candidate: &ResolvedRecord, current: &ResolvedRecord) -> bool {
        candidate.training().completion_date > current.training().completion_date
    }
}

impl Default for DeduplicationEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{ExpirySource, JoinedRecord, TrainingRecord};
    use chrono::NaiveDate;
    use std::collections::HashSet;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn create_test_record(
        name: &str,
        employee_id: Option<&str>,
        label: &str,
        completed: Option<NaiveDate>,
        line: usize,
    ) -> ResolvedRecord {
        let mut training = TrainingRecord::new(name, label).at_line(line);
        training.completion_date = completed;

        ResolvedRecord {
            joined: JoinedRecord {
                training,
                employee_id: employee_id.map(str::to_string),
            },
            effective_valid_until: None,
            expiry_source: ExpirySource::Unresolved,
        }
    }

    #[test]
    fn test_keeps_most_recent_completion() {
        let engine = DeduplicationEngine::new();
        let records = vec![
            create_test_record("Anna Muster", Some("1001"), "Fire Safety", Some(date(2022, 1, 10)), 1),
            create_test_record("Anna Muster", Some("1001"), "Fire Safety", Some(date(2023, 1, 10)), 2),
            create_test_record("Anna Muster", Some("1001"), "Fire Safety", Some(date(2021, 1, 10)), 3),
        ];

        let latest = engine.latest(records);

        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].training().completion_date, Some(date(2023, 1, 10)));
        assert_eq!(latest[0].training().line_number, 2);
    }

    #[test]
    fn test_missing_date_loses() {
        let engine = DeduplicationEngine::new();
        let records = vec![
            create_test_record("Anna Muster", Some("1001"), "Fire Safety", None, 1),
            create_test_record("Anna Muster", Some("1001"), "Fire Safety", Some(date(2019, 5, 1)), 2),
            create_test_record("Anna Muster", Some("1001"), "Fire Safety", None, 3),
        ];

        let latest = engine.latest(records);

        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].training().line_number, 2);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let engine = DeduplicationEngine::new();
        let records = vec![
            create_test_record("Anna Muster", Some("1001"), "Fire Safety", Some(date(2023, 1, 10)), 1),
            create_test_record("Anna Muster", Some("1001"), "Fire Safety", Some(date(2023, 1, 10)), 2),
            create_test_record("Ben Beispiel", Some("1002"), "Fire Safety", None, 3),
            create_test_record("Ben Beispiel", Some("1002"), "Fire Safety", None, 4),
        ];

        let latest = engine.latest(records);

        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].training().line_number, 1);
        assert_eq!(latest[1].training().line_number, 3);
    }

    #[test]
    fn test_groups_by_employee_and_training() {
        let engine = DeduplicationEngine::new();
        let records = vec![
            create_test_record("Anna Muster", Some("1001"), "Fire Safety", Some(date(2023, 1, 10)), 1),
            create_test_record("Anna Muster", Some("1001"), "First Aid", Some(date(2023, 2, 10)), 2),
            create_test_record("Ben Beispiel", Some("1002"), "Fire Safety", Some(date(2023, 3, 10)), 3),
        ];

        let latest = engine.latest(records);
        assert_eq!(latest.len(), 3);

        let keys: HashSet<(Option<&str>, &str)> = latest
            .iter()
            .map(|r| (r.employee_id(), r.training().training_label.as_str()))
            .collect();
        assert_eq!(keys.len(), 3);
    }

    #[test]
    fn test_unmatched_grouped_by_participant_name() {
        let engine = DeduplicationEngine::with_grouping(UnmatchedGrouping::ByParticipantName);
        let records = vec![
            create_test_record("Zoe Fremd", None, "Fire Safety", Some(date(2022, 1, 1)), 1),
            create_test_record("Zoe Fremd", None, "Fire Safety", Some(date(2023, 1, 1)), 2),
            create_test_record("Yann Fremd", None, "Fire Safety", Some(date(2021, 1, 1)), 3),
        ];

        let latest = engine.latest(records);

        // Two different people stay apart, Zoe's records collapse
        assert_eq!(latest.len(), 2);
        let zoe = latest
            .iter()
            .find(|r| r.training().participant_name == "Zoe Fremd")
            .unwrap();
        assert_eq!(zoe.training().line_number, 2);
    }

    #[test]
    fn test_unmatched_per_record_keeps_every_row() {
        let engine = DeduplicationEngine::with_grouping(UnmatchedGrouping::PerRecord);
        let records = vec![
            create_test_record("Zoe Fremd", None, "Fire Safety", Some(date(2022, 1, 1)), 1),
            create_test_record("Zoe Fremd", None, "Fire Safety", Some(date(2023, 1, 1)), 2),
            create_test_record("Anna Muster", Some("1001"), "Fire Safety", Some(date(2023, 1, 1)), 3),
        ];

        let latest = engine.latest(records);
        assert_eq!(latest.len(), 3);
    }

    #[test]
    fn test_output_order_is_matched_first_then_by_label() {
        let engine = DeduplicationEngine::new();
        let records = vec![
            create_test_record("Zoe Fremd", None, "Fire Safety", None, 1),
            create_test_record("Ben Beispiel", Some("1002"), "Forklift", None, 2),
            create_test_record("Anna Muster", Some("1001"), "Fire Safety", None, 3),
            create_test_record("Ben Beispiel", Some("1002"), "Fire Safety", None, 4),
        ];

        let lines: Vec<usize> = engine
            .latest(records)
            .iter()
            .map(|r| r.training().line_number)
            .collect();

        assert_eq!(lines, vec![3, 4, 2, 1]);
    }

    #[test]
    fn test_empty_input() {
        let engine = DeduplicationEngine::new();
        assert!(engine.latest(Vec::new()).is_empty());
    }
}
