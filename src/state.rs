//! Migration lifecycle states

use std::fmt;

/// Lifecycle state of a migration.
///
/// `Pending` is implicit: a migration known to the resolver with no ledger
/// row. `Success` and `Failed` are terminal and only ever come from a
/// completed ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MigrationState {
    /// Known but not yet applied
    Pending,
    /// Applied and recorded as successful
    Success,
    /// Attempted and recorded as failed
    Failed,
}

impl MigrationState {
    /// Text stored in the ledger's `state` column.
    pub fn as_str(self) -> &'static str {
        match self {
            MigrationState::Pending => "PENDING",
            MigrationState::Success => "SUCCESS",
            MigrationState::Failed => "FAILED",
        }
    }

    /// Parse the ledger's text encoding.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(MigrationState::Pending),
            "SUCCESS" => Some(MigrationState::Success),
            "FAILED" => Some(MigrationState::Failed),
            _ => None,
        }
    }

    /// Whether this state records a completed attempt.
    pub fn is_applied(self) -> bool {
        matches!(self, MigrationState::Success | MigrationState::Failed)
    }
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
