// ⏳ Expiry Resolver - effective valid-until date per record
// Rules are tried in order; the first one that applies decides.
//
//   1. Explicit valid-until date from the report
//   2. Completion date + interval (calendar months, clamped to month end)
//   3. Nothing → no date, status will be Unknown

use crate::records::{ExpirySource, JoinedRecord, ResolvedRecord};
use chrono::{Months, NaiveDate};
use tracing::warn;

// ============================================================================
// RULE OUTCOME
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    /// The rule produced a date
    Resolved(NaiveDate),

    /// The rule does not apply to this record, try the next one
    NotApplicable,

    /// The rule applies but the date cannot be computed
    Invalid(String),
}

/// One tier of the fallback chain
pub trait ExpiryRule: Send + Sync {
    /// Short identifier for diagnostics
    fn name(&self) -> &str;

    /// Which source tag a resolved date from this rule carries
    fn source(&self) -> ExpirySource;

    fn evaluate(&self, record: &JoinedRecord) -> RuleOutcome;
}

// ============================================================================
// BUILT-IN RULES
// ============================================================================

/// The report's own valid-until column is authoritative
pub struct ExplicitValidUntil;

impl ExpiryRule for ExplicitValidUntil {
    fn name(&self) -> &str {
        "explicit_valid_until"
    }

    fn source(&self) -> ExpirySource {
        ExpirySource::Explicit
    }

    fn evaluate(&self, record: &JoinedRecord) -> RuleOutcome {
        match record.training.explicit_valid_until {
            Some(date) => RuleOutcome::Resolved(date),
            None => RuleOutcome::NotApplicable,
        }
    }
}

/// Completion date plus a positive recurrence interval
pub struct IntervalFromCompletion;

impl ExpiryRule for IntervalFromCompletion {
    fn name(&self) -> &str {
        "interval_from_completion"
    }

    fn source(&self) -> ExpirySource {
        ExpirySource::Interval
    }

    fn evaluate(&self, record: &JoinedRecord) -> RuleOutcome {
        let training = &record.training;
        let (Some(completed), Some(months)) = (training.completion_date, training.interval_months)
        else {
            return RuleOutcome::NotApplicable;
        };

        if months <= 0 {
            return RuleOutcome::NotApplicable;
        }

        match add_months(completed, months) {
            Some(date) => RuleOutcome::Resolved(date),
            None => RuleOutcome::Invalid(format!(
                "{} + {} months is out of range",
                completed, months
            )),
        }
    }
}

/// Add calendar months. The day is clamped to the last day of a shorter target month.
pub fn add_months(date: NaiveDate, months: i64) -> Option<NaiveDate> {
    let months = u32::try_from(months).ok()?;
    date.checked_add_months(Months::new(months))
}

// ============================================================================
// RESOLVER
// ============================================================================

pub struct ExpiryResolver {
    rules: Vec<Box<dyn ExpiryRule>>,
}

impl ExpiryResolver {
    /// Resolver with the default chain: explicit date, then interval
    pub fn new() -> Self {
        ExpiryResolver {
            rules: vec![Box::new(ExplicitValidUntil), Box::new(IntervalFromCompletion)],
        }
    }

    /// Resolver with a caller-defined chain
    pub fn with_rules(rules: Vec<Box<dyn ExpiryRule>>) -> Self {
        ExpiryResolver { rules }
    }

    /// Append a fallback tier after the existing ones
    pub fn push_rule(&mut self, rule: Box<dyn ExpiryRule>) {
        self.rules.push(rule);
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }

    /// Resolve one record. Never fails; anomalies yield no date.
    pub fn resolve(&self, record: JoinedRecord) -> ResolvedRecord {
        for rule in &self.rules {
            match rule.evaluate(&record) {
                RuleOutcome::Resolved(date) => {
                    return ResolvedRecord {
                        joined: record,
                        effective_valid_until: Some(date),
                        expiry_source: rule.source(),
                    };
                }
                RuleOutcome::NotApplicable => continue,
                RuleOutcome::Invalid(reason) => {
                    warn!(
                        line = record.training.line_number,
                        rule = rule.name(),
                        %reason,
                        "date arithmetic invalid, valid-until left empty"
                    );
                    return ResolvedRecord {
                        joined: record,
                        effective_valid_until: None,
                        expiry_source: ExpirySource::Invalid,
                    };
                }
            }
        }

        ResolvedRecord {
            joined: record,
            effective_valid_until: None,
            expiry_source: ExpirySource::Unresolved,
        }
    }

    pub fn resolve_all(&self, records: Vec<JoinedRecord>) -> Vec<ResolvedRecord> {
        records.into_iter().map(|record| self.resolve(record)).collect()
    }
}

impl Default for ExpiryResolver {
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
    use crate::records::TrainingRecord;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn joined(training: TrainingRecord) -> JoinedRecord {
        JoinedRecord {
            training,
            employee_id: Some("1001".to_string()),
        }
    }

    #[test]
    fn test_explicit_date_wins_over_interval() {
        let resolver = ExpiryResolver::new();
        let record = joined(
            TrainingRecord::new("Anna Muster", "Fire Safety")
                .completed_on(date(2023, 1, 10))
                .every_months(12)
                .valid_until(date(2023, 6, 30)),
        );

        let resolved = resolver.resolve(record);

        assert_eq!(resolved.effective_valid_until, Some(date(2023, 6, 30)));
        assert_eq!(resolved.expiry_source, ExpirySource::Explicit);
    }

    #[test]
    fn test_interval_added_to_completion() {
        let resolver = ExpiryResolver::new();
        let record = joined(
            TrainingRecord::new("Anna Muster", "Fire Safety")
                .completed_on(date(2023, 1, 10))
                .every_months(12),
        );

        let resolved = resolver.resolve(record);

        assert_eq!(resolved.effective_valid_until, Some(date(2024, 1, 10)));
        assert_eq!(resolved.expiry_source, ExpirySource::Interval);
    }

    #[test]
    fn test_month_end_clamping() {
        assert_eq!(add_months(date(2023, 1, 31), 1), Some(date(2023, 2, 28)));
        assert_eq!(add_months(date(2024, 1, 31), 1), Some(date(2024, 2, 29)));
        assert_eq!(add_months(date(2023, 8, 31), 3), Some(date(2023, 11, 30)));
        assert_eq!(add_months(date(2023, 3, 15), 36), Some(date(2026, 3, 15)));
    }

    #[test]
    fn test_zero_or_negative_interval_is_unresolved() {
        let resolver = ExpiryResolver::new();

        for months in [0, -12] {
            let record = joined(
                TrainingRecord::new("Anna Muster", "Fire Safety")
                    .completed_on(date(2023, 1, 10))
                    .every_months(months),
            );
            let resolved = resolver.resolve(record);

            assert_eq!(resolved.effective_valid_until, None);
            assert_eq!(resolved.expiry_source, ExpirySource::Unresolved);
        }
    }

    #[test]
    fn test_interval_without_completion_is_unresolved() {
        let resolver = ExpiryResolver::new();
        let record = joined(TrainingRecord::new("Anna Muster", "Fire Safety").every_months(12));

        let resolved = resolver.resolve(record);
        assert_eq!(resolved.effective_valid_until, None);
        assert_eq!(resolved.expiry_source, ExpirySource::Unresolved);
    }

    #[test]
    fn test_out_of_range_interval_is_invalid_not_fatal() {
        let resolver = ExpiryResolver::new();
        let records = vec![
            joined(
                TrainingRecord::new("Anna Muster", "Fire Safety")
                    .completed_on(date(2023, 1, 10))
                    .every_months(i64::from(u32::MAX) + 1),
            ),
            joined(
                TrainingRecord::new("Anna Muster", "First Aid")
                    .completed_on(NaiveDate::MAX)
                    .every_months(1),
            ),
            joined(
                TrainingRecord::new("Ben Beispiel", "First Aid")
                    .completed_on(date(2023, 1, 10))
                    .every_months(24),
            ),
        ];

        let resolved = resolver.resolve_all(records);

        assert_eq!(resolved.len(), 3);
        assert_eq!(resolved[0].expiry_source, ExpirySource::Invalid);
        assert_eq!(resolved[0].effective_valid_until, None);
        assert_eq!(resolved[1].expiry_source, ExpirySource::Invalid);
        assert_eq!(resolved[2].effective_valid_until, Some(date(2025, 1, 10)));
    }

    struct FixedFallback(NaiveDate);

    impl ExpiryRule for FixedFallback {
        fn name(&self) -> &str {
            "fixed_fallback"
        }

        fn source(&self) -> ExpirySource {
            ExpirySource::Interval
        }

        fn evaluate(&self, _record: &JoinedRecord) -> RuleOutcome {
            RuleOutcome::Resolved(self.0)
        }
    }

    #[test]
    fn test_additional_tier_runs_last() {
        let mut resolver = ExpiryResolver::new();
        resolver.push_rule(Box::new(FixedFallback(date(2030, 1, 1))));

        assert_eq!(
            resolver.rule_names(),
            vec!["explicit_valid_until", "interval_from_completion", "fixed_fallback"]
        );

        let bare = resolver.resolve(joined(TrainingRecord::new("Anna Muster", "Fire Safety")));
        assert_eq!(bare.effective_valid_until, Some(date(2030, 1, 1)));

        let explicit = resolver.resolve(joined(
            TrainingRecord::new("Anna Muster", "Fire Safety").valid_until(date(2024, 5, 1)),
        ));
        assert_eq!(explicit.effective_valid_until, Some(date(2024, 5, 1)));
    }
}
