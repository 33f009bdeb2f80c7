//! Baseline initialization for schemas that predate the ledger

use crate::config::MigrationConfig;
use crate::dialect::Dialect;
use crate::error::MigrationError;
use crate::executor::SqlExecutor;
use crate::ledger::MigrationLedger;
use crate::record::LedgerRecord;
use crate::version::SchemaVersion;

/// Adopts an existing schema by stamping a baseline row.
///
/// Everything at or below the stamped version is treated as already
/// applied from then on; the runner only executes migrations above it.
pub struct SchemaInitializer<'a> {
    executor: &'a dyn SqlExecutor,
    dialect: &'a dyn Dialect,
    table: String,
}

impl<'a> SchemaInitializer<'a> {
    pub fn new(
        executor: &'a dyn SqlExecutor,
        dialect: &'a dyn Dialect,
        table: impl Into<String>,
    ) -> Self {
        Self {
            executor,
            dialect,
            table: table.into(),
        }
    }

    /// Create the ledger if needed and stamp the baseline row.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::AlreadyInitialized`] naming the current
    /// version when the ledger already has rows, whether from an earlier
    /// baseline or from applied migrations. Initialization is for
    /// untracked schemas only. Returns
    /// [`MigrationError::BaselineNotConcrete`] when `version` is the
    /// latest sentinel, before touching the store.
    pub fn init(&self, version: &SchemaVersion) -> Result<(), MigrationError> {
        if version.is_latest() {
            return Err(MigrationError::BaselineNotConcrete);
        }

        let ledger = MigrationLedger::new(self.executor, self.dialect, self.table.clone());
        ledger.create_if_not_exists()?;

        self.executor.within_transaction(&mut || {
            ledger.lock()?;
            if let Some(current) = ledger.latest_applied()? {
                return Err(MigrationError::AlreadyInitialized {
                    version: current.version,
                });
            }
            ledger.insert(&LedgerRecord::baseline(version.clone()))
        })?;

        log::info!(
            "schema ledger {} initialized at baseline version {}",
            self.table,
            version
        );
        Ok(())
    }

    /// Stamp the baseline configured in `[migrations]`.
    pub fn init_from_config(&self, config: &MigrationConfig) -> Result<(), MigrationError> {
        let version = SchemaVersion::with_description(
            &config.baseline_version,
            &config.baseline_description,
        );
        self.init(&version)
    }
}
