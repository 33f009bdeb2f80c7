//! `LedgerRecord` - one row of the migration ledger

use crate::error::MigrationError;
use crate::executor::SqlRow;
use crate::migration::MigrationKind;
use crate::state::MigrationState;
use crate::version::SchemaVersion;
use chrono::{DateTime, Utc};

/// Script identifier recorded for synthesized baseline rows.
pub const BASELINE_SCRIPT: &str = "<< baseline >>";

/// One persisted record of a migration attempt.
///
/// Rows are append-only: the ledger never updates or deletes them. The
/// is-current marker lives only in the stored table and is managed by
/// the ledger, not carried on this struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRecord {
    /// Version the row records (carries the description)
    pub version: SchemaVersion,

    /// What kind of change was applied
    pub kind: MigrationKind,

    /// Script identifier (file name or type name)
    pub script: String,

    /// 32-bit checksum of the payload, if the kind has one
    pub checksum: Option<i32>,

    /// When the row was written; assigned by the store on insert
    pub installed_on: Option<DateTime<Utc>>,

    /// Execution time in milliseconds (`None` if not recorded)
    pub execution_time_ms: Option<i64>,

    /// Outcome recorded for this attempt
    pub state: MigrationState,
}

impl LedgerRecord {
    /// Record for a migration that was just run.
    pub fn applied(
        descriptor: &crate::migration::MigrationDescriptor,
        execution_time_ms: i64,
        state: MigrationState,
    ) -> Self {
        Self {
            version: descriptor.version.clone(),
            kind: descriptor.kind,
            script: descriptor.script.clone(),
            checksum: descriptor.checksum,
            installed_on: None,
            execution_time_ms: Some(execution_time_ms),
            state,
        }
    }

    /// Synthesized row stamped by the initializer.
    pub fn baseline(version: SchemaVersion) -> Self {
        Self {
            version,
            kind: MigrationKind::Baseline,
            script: BASELINE_SCRIPT.to_string(),
            checksum: None,
            installed_on: None,
            execution_time_ms: Some(0),
            state: MigrationState::Success,
        }
    }

    /// Decode a ledger row.
    ///
    /// Expected column order: `version`, `description`, `kind`, `script`,
    /// `checksum`, `installed_on`, `execution_time_ms`, `state`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if a required column is missing, a
    /// timestamp, kind or state fails to parse, or a checksum does not
    /// fit in 32 bits.
    pub fn from_row(row: &SqlRow) -> Result<Self, MigrationError> {
        let raw_version = row
            .text(0)
            .ok_or_else(|| MigrationError::storage_msg("ledger row has no version column"))?;
        let version = match row.text(1) {
            Some(description) => SchemaVersion::with_description(raw_version, description),
            None => SchemaVersion::new(raw_version),
        };

        let kind = row
            .text(2)
            .and_then(MigrationKind::parse)
            .ok_or_else(|| {
                MigrationError::storage_msg(format!("ledger row {version} has an unknown kind"))
            })?;
        let script = row
            .text(3)
            .ok_or_else(|| {
                MigrationError::storage_msg(format!("ledger row {version} has no script column"))
            })?
            .to_string();
        let checksum = match row.integer(4) {
            Some(value) => Some(i32::try_from(value).map_err(|_| {
                MigrationError::storage_msg(format!(
                    "ledger row {version} has a checksum outside 32-bit range: {value}"
                ))
            })?),
            None => None,
        };

        let installed_on = match row.text(5) {
            Some(timestamp) => Some(parse_timestamp(timestamp)?),
            None => None,
        };
        let execution_time_ms = row.integer(6);

        let state = row
            .text(7)
            .and_then(MigrationState::parse)
            .ok_or_else(|| {
                MigrationError::storage_msg(format!("ledger row {version} has an unknown state"))
            })?;

        Ok(Self {
            version,
            kind,
            script,
            checksum,
            installed_on,
            execution_time_ms,
            state,
        })
    }
}

/// Parse a stored timestamp to `DateTime<Utc>`.
///
/// Stores return timestamps as text in slightly different shapes, so a
/// few formats are tried in order.
fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, MigrationError> {
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f") {
        Ok(naive.and_utc())
    } else if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        Ok(naive.and_utc())
    } else if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(naive.and_utc())
    } else if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        Ok(naive.and_utc())
    } else {
        Err(MigrationError::storage_msg(format!(
            "Failed to parse timestamp '{value}': unrecognized format"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::SqlValue;
    use crate::migration::MigrationDescriptor;

    fn row(values: Vec<SqlValue>) -> SqlRow {
        SqlRow::new(values)
    }

    #[test]
    fn test_from_row_decodes_all_columns() {
        let record = LedgerRecord::from_row(&row(vec![
            SqlValue::from("1.2"),
            SqlValue::from("add users"),
            SqlValue::from("SQL"),
            SqlValue::from("V1_2__add_users.sql"),
            SqlValue::from(42i32),
            SqlValue::from("2024-03-01 10:15:30"),
            SqlValue::from(125i64),
            SqlValue::from("SUCCESS"),
        ]))
        .expect("well-formed row");

        assert_eq!(record.version, SchemaVersion::new("1.2"));
        assert_eq!(record.version.description(), Some("add users"));
        assert_eq!(record.kind, MigrationKind::Sql);
        assert_eq!(record.script, "V1_2__add_users.sql");
        assert_eq!(record.checksum, Some(42));
        assert_eq!(record.execution_time_ms, Some(125));
        assert_eq!(record.state, MigrationState::Success);
        assert!(record.installed_on.is_some());
    }

    #[test]
    fn test_from_row_accepts_fractional_and_iso_timestamps() {
        for timestamp in [
            "2024-03-01 10:15:30.250",
            "2024-03-01T10:15:30",
            "2024-03-01T10:15:30.000001",
        ] {
            let record = LedgerRecord::from_row(&row(vec![
                SqlValue::from("1"),
                SqlValue::Null,
                SqlValue::from("SQL"),
                SqlValue::from("V1__init.sql"),
                SqlValue::Null,
                SqlValue::from(timestamp),
                SqlValue::Null,
                SqlValue::from("SUCCESS"),
            ]))
            .expect("timestamp format should be accepted");
            assert!(record.installed_on.is_some(), "{timestamp} should parse");
        }
    }

    #[test]
    fn test_from_row_rejects_garbage_timestamp() {
        let result = LedgerRecord::from_row(&row(vec![
            SqlValue::from("1"),
            SqlValue::Null,
            SqlValue::from("SQL"),
            SqlValue::from("V1__init.sql"),
            SqlValue::Null,
            SqlValue::from("yesterday"),
            SqlValue::Null,
            SqlValue::from("SUCCESS"),
        ]));
        let err = result.expect_err("garbage timestamp must not decode");
        assert!(err.to_string().contains("unrecognized format"));
    }

    #[test]
    fn test_from_row_rejects_unknown_state() {
        let result = LedgerRecord::from_row(&row(vec![
            SqlValue::from("1"),
            SqlValue::Null,
            SqlValue::from("SQL"),
            SqlValue::from("V1__init.sql"),
            SqlValue::Null,
            SqlValue::Null,
            SqlValue::Null,
            SqlValue::from("RETRYING"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_from_row_rejects_checksum_outside_32_bit_range() {
        // The column is 64-bit in some stores; a value that does not fit
        // i32 must surface instead of wrapping into a different checksum.
        let result = LedgerRecord::from_row(&row(vec![
            SqlValue::from("1"),
            SqlValue::Null,
            SqlValue::from("SQL"),
            SqlValue::from("V1__init.sql"),
            SqlValue::Integer(i64::from(i32::MAX) + 1),
            SqlValue::Null,
            SqlValue::Null,
            SqlValue::from("SUCCESS"),
        ]));
        let err = result.expect_err("oversized checksum must not decode");
        assert!(err.to_string().contains("32-bit range"));
    }

    #[test]
    fn test_baseline_record_shape() {
        let record = LedgerRecord::baseline(SchemaVersion::with_description("2", "initial schema"));
        assert_eq!(record.kind, MigrationKind::Baseline);
        assert_eq!(record.script, BASELINE_SCRIPT);
        assert_eq!(record.checksum, None);
        assert_eq!(record.execution_time_ms, Some(0));
        assert_eq!(record.state, MigrationState::Success);
    }

    #[test]
    fn test_applied_record_copies_descriptor_identity() {
        let descriptor = MigrationDescriptor::new(
            SchemaVersion::new("3"),
            MigrationKind::Code,
            "V3__backfill",
            Some(7),
        );
        let record = LedgerRecord::applied(&descriptor, 88, MigrationState::Failed);
        assert_eq!(record.version, descriptor.version);
        assert_eq!(record.script, "V3__backfill");
        assert_eq!(record.checksum, Some(7));
        assert_eq!(record.execution_time_ms, Some(88));
        assert_eq!(record.state, MigrationState::Failed);
    }
}
