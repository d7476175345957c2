// Training Compliance Matrix - Core Library
// Exposes the pipeline modules for the CLI, the API server and tests

pub mod error;
pub mod config;
pub mod logging;
pub mod records;
pub mod loader;         // Record Loader - CSV reports → typed records
pub mod join;           // Roster Join - name → employee id
pub mod expiry;         // Expiry Resolver - rule chain for valid-until
pub mod deduplication;  // Deduplication Engine - latest completion per pair
pub mod status;         // Status Classifier
pub mod pipeline;       // Loader → Join → Expiry → Dedup → Classify
pub mod projection;     // Matrix, summary, filters
pub mod export;         // CSV / JSON exports
pub mod cache;          // Snapshot cache

// Re-export commonly used types
pub use error::{LoadError, SourceKind};
pub use config::{Settings, SourceSettings, ClassificationSettings, GroupingSettings, ServerSettings};
pub use records::{
    TrainingRecord, EmployeeRecord, JoinedRecord, ResolvedRecord, LatestRecord,
    ClassifiedRecord, ExpirySource, Status,
};
pub use loader::{load_trainings, load_employees, read_trainings, read_employees};
pub use join::{join, JoinOutcome, JoinReport, RosterIndex};
pub use expiry::{ExpiryResolver, ExpiryRule, RuleOutcome, ExplicitValidUntil, IntervalFromCompletion};
pub use deduplication::{DeduplicationEngine, GroupKey, UnmatchedGrouping};
pub use status::StatusClassifier;
pub use pipeline::{ComplianceTable, InputSnapshot, Pipeline};
pub use projection::{
    FlatRow, MatrixRow, StatusMatrix, StatusCounts, StatusSummary, RecordFilter, TrainingCount,
    expired_by_training, upcoming_expirations,
};
pub use export::{ExportFormat, EmployeeEntry, TrainingEntry};
pub use cache::SnapshotCache;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
