// 🗃️ Snapshot Cache - reuse a computed table while the inputs are unchanged
// Keyed by a SHA-256 fingerprint of both input tables plus the reference date.

use crate::pipeline::{ComplianceTable, InputSnapshot, Pipeline};
use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

const FIELD_SEPARATOR: &[u8] = b"\x1f";
const RECORD_SEPARATOR: &[u8] = b"\x1e";

impl InputSnapshot {
    /// Content hash of both tables. Equal inputs give equal fingerprints.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();

        hasher.update(b"trainings");
        for training in &self.trainings {
            let fields = [
                training.line_number.to_string(),
                training.participant_name.clone(),
                training.training_label.clone(),
                optional(training.completion_date),
                optional(training.explicit_valid_until),
                optional(training.interval_months),
            ];
            for field in &fields {
                hasher.update(field.as_bytes());
                hasher.update(FIELD_SEPARATOR);
            }
            hasher.update(RECORD_SEPARATOR);
        }

        hasher.update(b"roster");
        for employee in &self.employees {
            hasher.update(employee.name.as_bytes());
            hasher.update(FIELD_SEPARATOR);
            hasher.update(employee.employee_id.as_bytes());
            hasher.update(RECORD_SEPARATOR);
        }

        format!("{:x}", hasher.finalize())
    }
}

fn optional<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "\u{0}".to_string())
}

// ============================================================================
// CACHE
// ============================================================================

/// Tables computed by one pipeline. The cache owns that pipeline, so every
/// entry for a given (fingerprint, date) was produced with the same settings.
pub struct SnapshotCache {
    pipeline: Pipeline,
    entries: HashMap<(String, NaiveDate), Arc<ComplianceTable>>,

    /// Entries kept before the cache is cleared (default: 16)
    pub max_entries: usize,

    pub hits: u64,
    pub misses: u64,
}

impl SnapshotCache {
    pub fn new(pipeline: Pipeline) -> Self {
        SnapshotCache {
            pipeline,
            entries: HashMap::new(),
            max_entries: 16,
            hits: 0,
            misses: 0,
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Return the cached table for (snapshot, today) or run the pipeline once
    pub fn get_or_compute(&mut self, snapshot: &InputSnapshot, today: NaiveDate) -> Arc<ComplianceTable> {
        let fingerprint = snapshot.fingerprint();
        self.get_or_compute_with(&fingerprint, snapshot, today)
    }

    /// Same as `get_or_compute` for callers that already hold the snapshot's
    /// fingerprint. `fingerprint` must equal `snapshot.fingerprint()`.
    pub fn get_or_compute_with(
        &mut self,
        fingerprint: &str,
        snapshot: &InputSnapshot,
        today: NaiveDate,
    ) -> Arc<ComplianceTable> {
        let key = (fingerprint.to_string(), today);

        if let Some(table) = self.entries.get(&key) {
            self.hits += 1;
            debug!(fingerprint, "snapshot cache hit");
            return Arc::clone(table);
        }

        self.misses += 1;
        if self.entries.len() >= self.max_entries {
            self.entries.clear();
        }

        let table = Arc::new(self.pipeline.run_on(snapshot, today));
        self.entries.insert(key, Arc::clone(&table));
        table
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new(Pipeline::new())
    }
}

// ============================================================================
// TESTS
// ============================================================================
