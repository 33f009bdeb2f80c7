//! Migration descriptors and the executable migration trait

use crate::checksum::checksum_of;
use crate::error::MigrationError;
use crate::executor::SqlExecutor;
use crate::version::SchemaVersion;
use std::fmt;

/// What kind of change a migration is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MigrationKind {
    /// Synthesized baseline row stamped by the initializer
    Baseline,
    /// Raw SQL script
    Sql,
    /// Code-defined migration
    Code,
}

impl MigrationKind {
    /// Text stored in the ledger's `kind` column.
    pub fn as_str(self) -> &'static str {
        match self {
            MigrationKind::Baseline => "BASELINE",
            MigrationKind::Sql => "SQL",
            MigrationKind::Code => "CODE",
        }
    }

    /// Parse the ledger's text encoding.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "BASELINE" => Some(MigrationKind::Baseline),
            "SQL" => Some(MigrationKind::Sql),
            "CODE" => Some(MigrationKind::Code),
            _ => None,
        }
    }
}

impl fmt::Display for MigrationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Data view of an available migration, as the resolver consumes it.
///
/// Descriptors come from whatever discovers migrations (a file scanner,
/// a static registry, hand-built lists); the engine itself never
/// discovers anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationDescriptor {
    /// Version this migration takes the schema to (carries the description)
    pub version: SchemaVersion,
    pub kind: MigrationKind,
    /// Script identifier: file name, type name, whatever names the payload
    pub script: String,
    /// 32-bit content checksum for drift detection, if the kind has one
    pub checksum: Option<i32>,
}

impl MigrationDescriptor {
    pub fn new(
        version: SchemaVersion,
        kind: MigrationKind,
        script: impl Into<String>,
        checksum: Option<i32>,
    ) -> Self {
        Self {
            version,
            kind,
            script: script.into(),
            checksum,
        }
    }

    /// Descriptor for an executable migration.
    pub fn of(migration: &dyn ExecutableMigration) -> Self {
        Self {
            version: migration.version().clone(),
            kind: migration.kind(),
            script: migration.script().to_string(),
            checksum: migration.checksum(),
        }
    }
}

/// Trait implemented by runnable migrations.
///
/// The engine never inspects the payload; `migrate` receives the executor
/// for the unit of work the runner opened and does whatever the migration
/// needs through it.
pub trait ExecutableMigration {
    /// Version this migration takes the schema to.
    fn version(&self) -> &SchemaVersion;

    /// Script identifier recorded in the ledger.
    fn script(&self) -> &str;

    /// Content checksum for drift detection; `None` opts out.
    fn checksum(&self) -> Option<i32> {
        None
    }

    fn kind(&self) -> MigrationKind {
        MigrationKind::Code
    }

    /// Apply the migration through `executor`.
    fn migrate(&self, executor: &dyn SqlExecutor) -> Result<(), MigrationError>;
}

/// Migration that applies a raw SQL batch.
#[derive(Debug, Clone)]
pub struct SqlMigration {
    version: SchemaVersion,
    script: String,
    sql: String,
}

impl SqlMigration {
    pub fn new(version: SchemaVersion, script: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            version,
            script: script.into(),
            sql: sql.into(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}

impl ExecutableMigration for SqlMigration {
    fn version(&self) -> &SchemaVersion {
        &self.version
    }

    fn script(&self) -> &str {
        &self.script
    }

    fn checksum(&self) -> Option<i32> {
        Some(checksum_of(&self.sql))
    }

    fn kind(&self) -> MigrationKind {
        MigrationKind::Sql
    }

    fn migrate(&self, executor: &dyn SqlExecutor) -> Result<(), MigrationError> {
        executor.execute_batch(&self.sql)
    }
}
