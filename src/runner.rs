//! Applies pending migrations, one unit of work at a time

use std::time::Instant;

use crate::config::{DriftPolicy, FailurePolicy, MigrationConfig};
use crate::dialect::Dialect;
use crate::error::MigrationError;
use crate::executor::SqlExecutor;
use crate::info::{MigrationInfo, MigrationInfoSet};
use crate::ledger::MigrationLedger;
use crate::migration::{ExecutableMigration, MigrationDescriptor};
use crate::record::LedgerRecord;
use crate::resolver;
use crate::state::MigrationState;
use crate::version::SchemaVersion;

/// Drives a schema forward by applying pending migrations in order.
///
/// Each migration runs in its own unit of work: the ledger is locked,
/// re-read and re-resolved inside it, so concurrent runners serialize
/// and the loser of the race sees the winner's rows instead of applying
/// the same migration twice.
pub struct MigrationRunner<'a> {
    executor: &'a dyn SqlExecutor,
    dialect: &'a dyn Dialect,
    config: MigrationConfig,
}

impl<'a> MigrationRunner<'a> {
    pub fn new(
        executor: &'a dyn SqlExecutor,
        dialect: &'a dyn Dialect,
        config: MigrationConfig,
    ) -> Self {
        Self {
            executor,
            dialect,
            config,
        }
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    fn ledger(&self) -> MigrationLedger<'a> {
        MigrationLedger::new(self.executor, self.dialect, self.config.table.clone())
    }

    /// Apply every pending migration, up to the highest version available.
    ///
    /// Returns the number of migrations applied.
    pub fn migrate(
        &self,
        migrations: &[&dyn ExecutableMigration],
    ) -> Result<usize, MigrationError> {
        self.migrate_to(migrations, &SchemaVersion::LATEST)
    }

    /// Apply pending migrations at or below `target`, lowest first.
    ///
    /// Creates the ledger on first contact. Terminates when nothing is
    /// eligible and returns the number of migrations applied.
    ///
    /// # Errors
    ///
    /// Stops with [`MigrationError::FailedMigrationBlocks`] when the
    /// ledger records a FAILED migration as current, with
    /// [`MigrationError::ChecksumDrift`] under the fail drift policy,
    /// and with [`MigrationError::ExecutionFailed`] when a migration
    /// payload fails. On payload failure the unit of work rolls back;
    /// under the mark-failed policy a FAILED row is then recorded in a
    /// fresh transaction before the error surfaces.
    pub fn migrate_to(
        &self,
        migrations: &[&dyn ExecutableMigration],
        target: &SchemaVersion,
    ) -> Result<usize, MigrationError> {
        let start = Instant::now();
        let ledger = self.ledger();
        ledger.create_if_not_exists()?;

        let available: Vec<MigrationDescriptor> = migrations
            .iter()
            .map(|migration| MigrationDescriptor::of(*migration))
            .collect();

        let mut applied_count = 0usize;
        loop {
            let mut applied_version: Option<SchemaVersion> = None;
            let mut failed_record: Option<LedgerRecord> = None;

            let outcome = self.executor.within_transaction(&mut || {
                ledger.lock()?;
                let records = ledger.all_applied()?;
                let status = resolver::resolve(&available, &records);

                if let Some(current) = status.current() {
                    if current.state == MigrationState::Failed {
                        return Err(MigrationError::FailedMigrationBlocks {
                            version: current.version.clone(),
                            script: current.script.clone(),
                        });
                    }
                    log::debug!("current schema version: {}", current.version);
                }

                self.enforce_drift_policy(&status)?;

                let current_version = status.current().map(|info| info.version.clone());
                let Some(next) = self.next_eligible(&status, current_version.as_ref(), target)
                else {
                    return Ok(());
                };

                let migration = find_migration(migrations, &next.version)?;
                let descriptor = MigrationDescriptor::of(migration);
                log::info!(
                    "applying migration {} ({})",
                    descriptor.version,
                    descriptor.script
                );

                let clock = Instant::now();
                match migration.migrate(self.executor) {
                    Ok(()) => {
                        let elapsed = clock.elapsed().as_millis() as i64;
                        let record =
                            LedgerRecord::applied(&descriptor, elapsed, MigrationState::Success);
                        ledger.insert(&record)?;
                        log::info!("migrated to version {} in {elapsed}ms", descriptor.version);
                        applied_version = Some(descriptor.version.clone());
                        Ok(())
                    }
                    Err(err) => {
                        let elapsed = clock.elapsed().as_millis() as i64;
                        if self.config.on_failure == FailurePolicy::MarkFailed {
                            failed_record = Some(LedgerRecord::applied(
                                &descriptor,
                                elapsed,
                                MigrationState::Failed,
                            ));
                        }
                        Err(MigrationError::ExecutionFailed {
                            version: descriptor.version.clone(),
                            script: descriptor.script.clone(),
                            source: Box::new(err),
                        })
                    }
                }
            });

            match outcome {
                Ok(()) => {
                    if applied_version.is_none() {
                        break;
                    }
                    applied_count += 1;
                }
                Err(err) => {
                    // The failed unit of work is rolled back by now; the
                    // FAILED marker goes in through its own transaction
                    if let Some(record) = failed_record.take() {
                        self.record_failure(&ledger, &record);
                    }
                    return Err(err);
                }
            }
        }

        if applied_count == 0 {
            log::info!("schema is up to date, no migrations applied");
        } else {
            log::info!(
                "successfully applied {applied_count} migration(s) in {}ms",
                start.elapsed().as_millis()
            );
        }
        Ok(applied_count)
    }

    /// Resolve the current status without taking the lock or writing
    /// anything. A store without a ledger reads as empty, so every
    /// available migration resolves PENDING.
    pub fn info(
        &self,
        migrations: &[&dyn ExecutableMigration],
    ) -> Result<MigrationInfoSet, MigrationError> {
        let available: Vec<MigrationDescriptor> = migrations
            .iter()
            .map(|migration| MigrationDescriptor::of(*migration))
            .collect();
        let records = self.ledger().all_applied()?;
        Ok(resolver::resolve(&available, &records))
    }

    fn enforce_drift_policy(&self, status: &MigrationInfoSet) -> Result<(), MigrationError> {
        for drift in status.drift() {
            match self.config.drift {
                DriftPolicy::Warn => log::warn!(
                    "migration {} ({}) changed after being applied, ledger checksum {:?}, resolved {:?}",
                    drift.version,
                    drift.script,
                    drift.recorded,
                    drift.resolved
                ),
                DriftPolicy::Fail => {
                    return Err(MigrationError::ChecksumDrift {
                        version: drift.version.clone(),
                        script: drift.script.clone(),
                        recorded: drift.recorded,
                        resolved: drift.resolved,
                    })
                }
            }
        }
        Ok(())
    }

    /// The lowest pending migration at or below `target`. Pending
    /// versions below current are skipped unless out-of-order mode is on.
    fn next_eligible(
        &self,
        status: &MigrationInfoSet,
        current: Option<&SchemaVersion>,
        target: &SchemaVersion,
    ) -> Option<MigrationInfo> {
        for info in status.pending() {
            if info.version > *target {
                break;
            }
            if let Some(current) = current {
                if info.version < *current && !self.config.out_of_order {
                    log::warn!(
                        "skipping pending migration {} below current version {current}, \
                         enable out_of_order to apply it",
                        info.version
                    );
                    continue;
                }
            }
            return Some(info.clone());
        }
        None
    }

    fn record_failure(&self, ledger: &MigrationLedger<'_>, record: &LedgerRecord) {
        let result = self.executor.within_transaction(&mut || {
            ledger.lock()?;
            ledger.insert(record)
        });
        if let Err(err) = result {
            log::error!(
                "could not record FAILED row for version {}: {err}",
                record.version
            );
        }
    }
}

fn find_migration<'m>(
    migrations: &[&'m dyn ExecutableMigration],
    version: &SchemaVersion,
) -> Result<&'m dyn ExecutableMigration, MigrationError> {
    migrations
        .iter()
        .find(|migration| migration.version() == version)
        .copied()
        .ok_or_else(|| {
            MigrationError::storage_msg(format!(
                "no executable migration found for resolved version {version}"
            ))
        })
}
