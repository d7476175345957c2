// ⚠️ Error kinds for the compliance pipeline
// Only loading can fail a run. Per-record anomalies degrade to Unknown status.

use std::path::PathBuf;
use thiserror::Error;

/// Which of the two input tables an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Trainings,
    Roster,
}

impl SourceKind {
    pub fn name(&self) -> &str {
        match self {
            SourceKind::Trainings => "trainings",
            SourceKind::Roster => "roster",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Fatal loader errors. The pipeline does not run when one of these is returned.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{source_kind} source not found: {}", path.display())]
    SourceNotFound {
        source_kind: SourceKind,
        path: PathBuf,
    },

    #[error("{source_kind} source is missing required column '{column}'")]
    SourceMalformed {
        source_kind: SourceKind,
        column: String,
    },

    #[error("failed to read {source_kind} source: {error}")]
    Csv {
        source_kind: SourceKind,
        #[source]
        error: csv::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = LoadError> = std::result::Result<T, E>;
