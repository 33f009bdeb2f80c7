//! Resolved migration status, the merged view of available and applied

use crate::migration::MigrationKind;
use crate::state::MigrationState;
use crate::version::SchemaVersion;
use chrono::{DateTime, Utc};

/// A checksum disagreement between a resolved migration and the ledger
/// row recorded for the same version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumDrift {
    pub version: SchemaVersion,
    pub script: String,
    /// Checksum stored in the ledger when the migration ran
    pub recorded: Option<i32>,
    /// Checksum of the migration as it resolves today
    pub resolved: Option<i32>,
}

/// One migration as the resolver classified it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationInfo {
    pub version: SchemaVersion,
    pub kind: MigrationKind,
    pub script: String,
    pub checksum: Option<i32>,
    pub state: MigrationState,
    /// When the ledger row was written, for applied migrations
    pub installed_on: Option<DateTime<Utc>>,
    pub execution_time_ms: Option<i64>,
}

/// The complete resolved picture, ordered by version ascending.
#[derive(Debug, Clone, Default)]
pub struct MigrationInfoSet {
    infos: Vec<MigrationInfo>,
    drift: Vec<ChecksumDrift>,
}

impl MigrationInfoSet {
    pub(crate) fn new(infos: Vec<MigrationInfo>, drift: Vec<ChecksumDrift>) -> Self {
        Self { infos, drift }
    }

    /// Every migration the resolver saw, ascending by version.
    pub fn all(&self) -> &[MigrationInfo] {
        &self.infos
    }

    /// The newest migration that was actually attempted, whether it
    /// succeeded or failed. Pending entries above it do not count.
    /// `None` when nothing was ever applied.
    pub fn current(&self) -> Option<&MigrationInfo> {
        self.infos.iter().rev().find(|info| info.state.is_applied())
    }

    /// Migrations still waiting to run, ascending by version.
    pub fn pending(&self) -> Vec<&MigrationInfo> {
        self.infos
            .iter()
            .filter(|info| info.state == MigrationState::Pending)
            .collect()
    }

    /// Checksum drift found while resolving.
    pub fn drift(&self) -> &[ChecksumDrift] {
        &self.drift
    }

    /// True when nothing is pending.
    pub fn is_up_to_date(&self) -> bool {
        self.pending().is_empty()
    }
}
