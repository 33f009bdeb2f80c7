//! Migration engine error types

use crate::version::SchemaVersion;
use thiserror::Error;

/// Errors surfaced by the migration engine.
///
/// Every variant names the offending version and script where one exists,
/// so operators can diagnose without inspecting the ledger table.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Ledger storage failure, propagated unmodified and never retried
    #[error("Ledger storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Baseline initialization refused because the ledger already has rows
    #[error("Schema already initialized. Current version: {version}")]
    AlreadyInitialized { version: SchemaVersion },

    /// Baseline initialization was given the latest sentinel instead of a
    /// concrete version to stamp
    #[error("Baseline version must be a concrete version, not the latest sentinel")]
    BaselineNotConcrete,

    /// The most recent migration is recorded FAILED and blocks forward progress
    #[error(
        "Migration '{script}' (version {version}) previously failed.\n\
         No further migrations will run until the failure is manually resolved.\n\
         Repair the schema and remove or correct the failed ledger row, then retry."
    )]
    FailedMigrationBlocks { version: SchemaVersion, script: String },

    /// Recorded and resolved checksums disagree for an applied migration
    #[error(
        "Migration '{script}' (version {version}) has been modified after being applied.\n\
         Ledger checksum: {}\n\
         Resolved checksum: {}",
        fmt_checksum(.recorded),
        fmt_checksum(.resolved)
    )]
    ChecksumDrift {
        version: SchemaVersion,
        script: String,
        recorded: Option<i32>,
        resolved: Option<i32>,
    },

    /// A migration payload failed while executing
    #[error("Migration '{script}' (version {version}) failed during execution: {source}")]
    ExecutionFailed {
        version: SchemaVersion,
        script: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl MigrationError {
    /// Storage failure carrying only a message, for row-decode problems
    /// with no underlying driver error.
    pub(crate) fn storage_msg(message: impl Into<String>) -> Self {
        MigrationError::Storage(message.into().into())
    }
}

fn fmt_checksum(checksum: &Option<i32>) -> String {
    match checksum {
        Some(value) => value.to_string(),
        None => "none".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_name_the_offending_version() {
        let err = MigrationError::AlreadyInitialized {
            version: SchemaVersion::with_description("2.1", "baseline"),
        };
        assert!(err.to_string().contains("2.1"));

        let err = MigrationError::FailedMigrationBlocks {
            version: SchemaVersion::new("1.3"),
            script: "V1_3__add_index.sql".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("1.3"));
        assert!(message.contains("V1_3__add_index.sql"));
        assert!(message.contains("manually resolved"));
    }

    #[test]
    fn test_drift_message_shows_both_checksums() {
        let err = MigrationError::ChecksumDrift {
            version: SchemaVersion::new("1"),
            script: "V1__init.sql".to_string(),
            recorded: Some(42),
            resolved: None,
        };
        let message = err.to_string();
        assert!(message.contains("42"));
        assert!(message.contains("none"));
        assert!(message.contains("modified after being applied"));
    }

    #[test]
    fn test_storage_message_helper() {
        let err = MigrationError::storage_msg("row 3 has no version column");
        assert!(err.to_string().contains("row 3 has no version column"));
    }
}
