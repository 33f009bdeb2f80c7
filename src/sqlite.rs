//! SQLite-backed session, the embedded reference store

use crate::dialect::Dialect;
use crate::error::MigrationError;
use crate::executor::{SqlExecutor, SqlRow, SqlValue};
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

/// How long a writer waits on a locked database before the store gives
/// up with a busy error.
const BUSY_TIMEOUT: Duration = Duration::from_secs(60);

impl From<rusqlite::Error> for MigrationError {
    fn from(err: rusqlite::Error) -> Self {
        MigrationError::Storage(Box::new(err))
    }
}

impl rusqlite::types::ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Owned(Value::Null),
            SqlValue::Integer(value) => ToSqlOutput::Owned(Value::Integer(*value)),
            SqlValue::Text(value) => ToSqlOutput::Borrowed(ValueRef::Text(value.as_bytes())),
        })
    }
}

/// A session over one SQLite connection.
///
/// SQLite transactions are connection-scoped, so the session satisfies
/// the session-bound requirement of [`SqlExecutor`] directly. Units of
/// work open with `BEGIN IMMEDIATE`: the write lock is taken up front
/// and a competing writer queues (up to the busy timeout) instead of
/// failing mid-run.
pub struct SqliteSession {
    conn: Connection,
}

impl SqliteSession {
    /// Open a session backed by a database file, creating it if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MigrationError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(Self { conn })
    }

    /// Open an in-memory session (for testing).
    pub fn open_in_memory() -> Result<Self, MigrationError> {
        let conn = Connection::open_in_memory()?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(Self { conn })
    }
}

impl SqlExecutor for SqliteSession {
    fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64, MigrationError> {
        let mut stmt = self.conn.prepare(sql)?;
        let affected = stmt.execute(rusqlite::params_from_iter(params.iter()))?;
        Ok(affected as u64)
    }

    fn execute_batch(&self, sql: &str) -> Result<(), MigrationError> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<SqlRow>, MigrationError> {
        let mut stmt = self.conn.prepare(sql)?;
        let column_count = stmt.column_count();
        let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(column_count);
            for index in 0..column_count {
                values.push(read_value(row, index)?);
            }
            out.push(SqlRow::new(values));
        }
        Ok(out)
    }

    fn within_transaction(
        &self,
        work: &mut dyn FnMut() -> Result<(), MigrationError>,
    ) -> Result<(), MigrationError> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        match work() {
            Ok(()) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(())
            }
            Err(err) => {
                // Keep the original failure even if the rollback itself fails
                if let Err(rollback_err) = self.conn.execute_batch("ROLLBACK") {
                    log::warn!("rollback after failed unit of work also failed: {rollback_err}");
                }
                Err(err)
            }
        }
    }
}

/// Map a column to the executor value model. The ledger reads integers
/// and text; anything else degrades to text or null.
fn read_value(row: &rusqlite::Row<'_>, index: usize) -> Result<SqlValue, MigrationError> {
    let value = match row.get_ref(index)? {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(value) => SqlValue::Integer(value),
        ValueRef::Real(value) => SqlValue::Text(value.to_string()),
        ValueRef::Text(bytes) => SqlValue::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(_) => SqlValue::Null,
    };
    Ok(value)
}

/// SQLite capabilities.
///
/// SQLite has no `SELECT ... FOR UPDATE`; exclusive writing falls to the
/// store's single-writer transactions, which `BEGIN IMMEDIATE` engages
/// up front.
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn supports_select_for_update(&self) -> bool {
        false
    }

    fn supports_transactional_ddl(&self) -> bool {
        true
    }

    fn current_user_expr(&self) -> &'static str {
        "NULL"
    }

    fn table_exists(&self, executor: &dyn SqlExecutor, table: &str) -> Result<bool, MigrationError> {
        let rows = executor.query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
            &[SqlValue::from(table)],
        )?;
        Ok(!rows.is_empty())
    }

    fn create_ledger_ddl(&self, table: &str) -> String {
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                version TEXT NOT NULL PRIMARY KEY,
                description TEXT,
                kind TEXT NOT NULL,
                script TEXT NOT NULL,
                checksum INTEGER,
                installed_by TEXT,
                installed_on TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                execution_time_ms INTEGER,
                state TEXT NOT NULL,
                is_current INTEGER NOT NULL DEFAULT 0
            )
            "#
        )
    }
}
