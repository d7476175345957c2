// ⚙️ Settings - TOML file layered with TRAINING_MATRIX__* environment variables
// Every field has a default, so running without a config file works.

use crate::deduplication::UnmatchedGrouping;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "training-matrix.toml";
pub const ENV_PREFIX: &str = "TRAINING_MATRIX";

// ============================================================================
// COLUMN NAMES
// ============================================================================

/// Header names of the trainings report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingColumns {
    pub participant_name: String,
    pub training_label: String,
    pub completion_date: String,
    pub valid_until: String,
    pub interval_months: String,
}

impl Default for TrainingColumns {
    fn default() -> Self {
        TrainingColumns {
            participant_name: "Teilnehmer".to_string(),
            training_label: "Ausbildung (Bezeichnung)".to_string(),
            completion_date: "Datum der Durchführung".to_string(),
            valid_until: "Gültig bis".to_string(),
            interval_months: "Intervall".to_string(),
        }
    }
}

/// Header names of the roster report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterColumns {
    pub name: String,
    pub employee_id: String,
}

impl Default for RosterColumns {
    fn default() -> Self {
        RosterColumns {
            name: "Name".to_string(),
            employee_id: "Personalnummer".to_string(),
        }
    }
}

// ============================================================================
// SECTIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub trainings_path: PathBuf,
    pub roster_path: PathBuf,
    /// Single-byte field delimiter, e.g. "," or ";"
    pub delimiter: String,
    pub training_columns: TrainingColumns,
    pub roster_columns: RosterColumns,
}

impl SourceSettings {
    /// Delimiter as the byte the csv reader expects.
    /// Anything but a single ASCII character falls back to ','.
    pub fn delimiter_byte(&self) -> u8 {
        match self.delimiter.as_bytes() {
            [byte] if byte.is_ascii() => *byte,
            _ => b',',
        }
    }
}

impl Default for SourceSettings {
    fn default() -> Self {
        SourceSettings {
            trainings_path: PathBuf::from("trainings.csv"),
            roster_path: PathBuf::from("roster.csv"),
            delimiter: ",".to_string(),
            training_columns: TrainingColumns::default(),
            roster_columns: RosterColumns::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationSettings {
    /// Upper bound (inclusive) of the soon-expiring window
    pub soon_expiring_days: i64,

    /// Horizon for the upcoming-expirations view
    pub upcoming_horizon_days: i64,

    /// Number of trainings listed in the expired ranking
    pub expired_top_n: usize,
}

impl Default for ClassificationSettings {
    fn default() -> Self {
        ClassificationSettings {
            soon_expiring_days: 90,
            upcoming_horizon_days: 180,
            expired_top_n: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GroupingSettings {
    pub unmatched: UnmatchedGrouping,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            bind: "0.0.0.0:3000".to_string(),
        }
    }
}

// ============================================================================
// SETTINGS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub sources: SourceSettings,
    pub classification: ClassificationSettings,
    pub grouping: GroupingSettings,
    pub server: ServerSettings,
}

impl Settings {
    /// Load settings from an optional TOML file and the environment.
    ///
    /// A missing file is not an error; every value falls back to its default.
    /// Environment variables use `TRAINING_MATRIX__SECTION__FIELD`, e.g.
    /// `TRAINING_MATRIX__SOURCES__DELIMITER=";"`.
    pub fn load(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .with_context(|| format!("failed to read config file {}", path.display()))?;

        settings
            .try_deserialize()
            .context("failed to deserialise Settings")
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_report_headers() {
        let settings = Settings::default();

        assert_eq!(settings.sources.training_columns.participant_name, "Teilnehmer");
        assert_eq!(settings.sources.roster_columns.employee_id, "Personalnummer");
        assert_eq!(settings.classification.soon_expiring_days, 90);
        assert_eq!(settings.classification.upcoming_horizon_days, 180);
        assert_eq!(settings.classification.expired_top_n, 10);
        assert_eq!(settings.grouping.unmatched, UnmatchedGrouping::ByParticipantName);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_file_overrides_selected_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("training-matrix.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[sources]
delimiter = ";"
trainings_path = "data/Bericht_Ausbildungen.csv"

[sources.roster_columns]
employee_id = "Staff No"

[classification]
soon_expiring_days = 30

[grouping]
unmatched = "per_record"
"#
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();

        assert_eq!(settings.sources.delimiter_byte(), b';');
        assert_eq!(
            settings.sources.trainings_path,
            PathBuf::from("data/Bericht_Ausbildungen.csv")
        );
        assert_eq!(settings.sources.roster_columns.employee_id, "Staff No");
        assert_eq!(settings.sources.roster_columns.name, "Name");
        assert_eq!(settings.classification.soon_expiring_days, 30);
        assert_eq!(settings.classification.upcoming_horizon_days, 180);
        assert_eq!(settings.grouping.unmatched, UnmatchedGrouping::PerRecord);
    }

    #[test]
    fn test_non_ascii_delimiter_falls_back_to_comma() {
        let sources = SourceSettings {
            delimiter: "§".to_string(),
            ..SourceSettings::default()
        };
        assert_eq!(sources.delimiter_byte(), b',');
    }
}
