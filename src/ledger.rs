//! Persistent migration ledger over a store table

use crate::dialect::Dialect;
use crate::error::MigrationError;
use crate::executor::{SqlExecutor, SqlValue};
use crate::record::LedgerRecord;

/// Columns read back into a [`LedgerRecord`], in decode order.
const SELECT_COLUMNS: &str =
    "version, description, kind, script, checksum, installed_on, execution_time_ms, state";

/// The append-only ledger of applied migrations.
///
/// Rows are only ever inserted. Exactly one row carries the is-current
/// marker: the most recently inserted one, which is not necessarily the
/// highest version when migrations ran out of order.
pub struct MigrationLedger<'a> {
    executor: &'a dyn SqlExecutor,
    dialect: &'a dyn Dialect,
    table: String,
}

impl<'a> MigrationLedger<'a> {
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

    /// Name of the backing table.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Whether the backing table exists in the store.
    pub fn exists(&self) -> Result<bool, MigrationError> {
        self.dialect.table_exists(self.executor, &self.table)
    }

    /// Create the backing table if this store has never seen one.
    pub fn create_if_not_exists(&self) -> Result<(), MigrationError> {
        if self.exists()? {
            return Ok(());
        }
        log::info!("creating migration ledger table {}", self.table);
        self.executor
            .execute_batch(&self.dialect.create_ledger_ddl(&self.table))
    }

    /// Take an exclusive lock on the ledger for the current unit of work.
    ///
    /// The lock is released when the unit of work commits or rolls back.
    /// A concurrent caller blocks here until then. Stores without row
    /// locks serialize writers through their transactions instead, so
    /// this degrades to a no-op.
    pub fn lock(&self) -> Result<(), MigrationError> {
        if self.dialect.supports_select_for_update() {
            let sql = format!("SELECT script FROM {} FOR UPDATE", self.table);
            self.executor.query(&sql, &[])?;
        } else {
            log::debug!(
                "store {} has no row locks, relying on its single-writer transactions",
                self.dialect.name()
            );
        }
        Ok(())
    }

    /// Append a record and move the is-current marker onto it.
    pub fn insert(&self, record: &LedgerRecord) -> Result<(), MigrationError> {
        let clear_marker = format!(
            "UPDATE {} SET is_current = 0 WHERE is_current = 1",
            self.table
        );
        self.executor.execute(&clear_marker, &[])?;

        let insert = format!(
            "INSERT INTO {} (version, description, kind, script, checksum, installed_by, installed_on, execution_time_ms, state, is_current) \
             VALUES (?, ?, ?, ?, ?, {}, CURRENT_TIMESTAMP, ?, ?, 1)",
            self.table,
            self.dialect.current_user_expr(),
        );
        self.executor.execute(
            &insert,
            &[
                SqlValue::from(record.version.version()),
                SqlValue::from(record.version.description()),
                SqlValue::from(record.kind.as_str()),
                SqlValue::from(record.script.as_str()),
                SqlValue::from(record.checksum),
                SqlValue::from(record.execution_time_ms),
                SqlValue::from(record.state.as_str()),
            ],
        )?;
        Ok(())
    }

    /// The record carrying the is-current marker, the most recently
    /// inserted row. `None` when the table does not exist or is empty.
    pub fn latest_applied(&self) -> Result<Option<LedgerRecord>, MigrationError> {
        if !self.exists()? {
            return Ok(None);
        }
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM {} WHERE is_current = 1",
            self.table
        );
        let rows = self.executor.query(&sql, &[])?;
        rows.first().map(LedgerRecord::from_row).transpose()
    }

    /// Every record in the ledger, ordered by version.
    ///
    /// Version strings do not sort textually, so rows are sorted in
    /// memory after the read. Returns an empty list when the table does
    /// not exist.
    pub fn all_applied(&self) -> Result<Vec<LedgerRecord>, MigrationError> {
        if !self.exists()? {
            return Ok(Vec::new());
        }
        let sql = format!("SELECT {SELECT_COLUMNS} FROM {}", self.table);
        let rows = self.executor.query(&sql, &[])?;
        let mut records = rows
            .iter()
            .map(LedgerRecord::from_row)
            .collect::<Result<Vec<_>, _>>()?;
        records.sort_by(|a, b| a.version.cmp(&b.version));
        Ok(records)
    }
}
