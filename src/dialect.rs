//! Store capability seam
//!
//! Backing stores differ in a handful of small ways: how to probe for a
//! table, whether `SELECT ... FOR UPDATE` exists, whether DDL rolls back
//! with the transaction, and how to name the connected user. Everything
//! else the ledger does is plain SQL, so those differences sit behind one
//! narrow trait implemented once per store.

use crate::error::MigrationError;
use crate::executor::{SqlExecutor, SqlValue};

/// Capabilities and SQL fragments that vary per backing store.
pub trait Dialect {
    /// Short name used in log messages.
    fn name(&self) -> &'static str;

    /// Whether the store supports `SELECT ... FOR UPDATE` row locking.
    ///
    /// When this is `false` the ledger's `lock()` is a no-op and the
    /// at-most-one-writer guarantee falls to whatever serialization the
    /// store itself provides.
    fn supports_select_for_update(&self) -> bool;

    /// Whether DDL statements roll back with the enclosing transaction.
    fn supports_transactional_ddl(&self) -> bool;

    /// SQL expression yielding the connected user name, or `NULL`.
    fn current_user_expr(&self) -> &'static str;

    /// Check whether `table` exists.
    fn table_exists(&self, executor: &dyn SqlExecutor, table: &str) -> Result<bool, MigrationError>;

    /// DDL creating the ledger table when absent (`IF NOT EXISTS`).
    fn create_ledger_ddl(&self, table: &str) -> String;
}

/// PostgreSQL fragments for callers bringing their own session executor.
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn supports_select_for_update(&self) -> bool {
        true
    }

    fn supports_transactional_ddl(&self) -> bool {
        true
    }

    fn current_user_expr(&self) -> &'static str {
        "current_user"
    }

    fn table_exists(&self, executor: &dyn SqlExecutor, table: &str) -> Result<bool, MigrationError> {
        let rows = executor.query(
            "SELECT 1 FROM information_schema.tables WHERE table_name = ?",
            &[SqlValue::from(table)],
        )?;
        Ok(!rows.is_empty())
    }

    fn create_ledger_ddl(&self, table: &str) -> String {
        // is_current is SMALLINT rather than BOOLEAN so the ledger can
        // write 0/1 literals identically on every store
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                version VARCHAR(100) NOT NULL PRIMARY KEY,
                description VARCHAR(200),
                kind VARCHAR(20) NOT NULL,
                script VARCHAR(1000) NOT NULL,
                checksum INTEGER,
                installed_by VARCHAR(100),
                installed_on TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                execution_time_ms BIGINT,
                state VARCHAR(15) NOT NULL,
                is_current SMALLINT NOT NULL DEFAULT 0
            )
            "#
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postgres_capabilities() {
        let dialect = PostgresDialect;
        assert!(dialect.supports_select_for_update());
        assert!(dialect.supports_transactional_ddl());
        assert_eq!(dialect.current_user_expr(), "current_user");
    }

    #[test]
    fn test_postgres_ddl_names_the_table_and_columns() {
        let ddl = PostgresDialect.create_ledger_ddl("schema_version");
        assert!(ddl.contains("CREATE TABLE IF NOT EXISTS schema_version"));
        for column in [
            "version",
            "description",
            "kind",
            "script",
            "checksum",
            "installed_by",
            "installed_on",
            "execution_time_ms",
            "state",
            "is_current",
        ] {
            assert!(ddl.contains(column), "missing column {column}");
        }
    }
}
