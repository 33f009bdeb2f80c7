//! Storage executor contract
//!
//! The engine talks to its backing store through `SqlExecutor`, a narrow
//! trait covering exactly what the ledger needs: statement execution,
//! queries returning plain rows, and a transactional unit of work. No
//! driver types leak through the trait, so any session-bound database
//! handle can implement it.

use crate::error::MigrationError;
use std::fmt;

/// A single value bound to or read from a ledger statement.
///
/// The ledger's columns are text and integers; richer driver types map
/// onto these three variants.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Text(String),
}

impl SqlValue {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SqlValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Integer(value) => write!(f, "{value}"),
            SqlValue::Text(value) => f.write_str(value),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Integer(i64::from(value))
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl<T> From<Option<T>> for SqlValue
where
    T: Into<SqlValue>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(inner) => inner.into(),
            None => SqlValue::Null,
        }
    }
}

/// One row returned by a query, addressed by column position.
#[derive(Debug, Clone, Default)]
pub struct SqlRow {
    values: Vec<SqlValue>,
}

impl SqlRow {
    pub fn new(values: Vec<SqlValue>) -> Self {
        Self { values }
    }

    pub fn get(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    /// Integer at `index`; `None` when the column is null, missing or text.
    pub fn integer(&self, index: usize) -> Option<i64> {
        self.values.get(index).and_then(SqlValue::as_integer)
    }

    /// Text at `index`; `None` when the column is null, missing or numeric.
    pub fn text(&self, index: usize) -> Option<&str> {
        self.values.get(index).and_then(SqlValue::as_text)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Trait for executing database operations against a session-bound store.
///
/// Placeholders in statements are positional `?`; implementations over
/// drivers with another placeholder syntax translate before executing.
///
/// Implementations must be session-bound: statements issued through the
/// same executor while `within_transaction` runs its work are part of
/// that transaction. Units of work do not nest.
pub trait SqlExecutor {
    /// Execute a statement, returning the number of rows affected.
    fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64, MigrationError>;

    /// Execute a batch of semicolon-separated statements with no parameters.
    fn execute_batch(&self, sql: &str) -> Result<(), MigrationError>;

    /// Run a query, returning every row.
    fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<SqlRow>, MigrationError>;

    /// Run `work` as one unit of work: a transaction opens before the
    /// closure, commits when it returns `Ok` and rolls back on every
    /// `Err` path. Row locks taken inside release when the transaction
    /// ends, on either path.
    fn within_transaction(
        &self,
        work: &mut dyn FnMut() -> Result<(), MigrationError>,
    ) -> Result<(), MigrationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_accessors() {
        assert_eq!(SqlValue::Integer(7).as_integer(), Some(7));
        assert_eq!(SqlValue::Text("seven".to_string()).as_text(), Some("seven"));
        assert!(SqlValue::Null.is_null());
        assert_eq!(SqlValue::Null.as_integer(), None);
        assert_eq!(SqlValue::Integer(7).as_text(), None);
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(SqlValue::from(3i64), SqlValue::Integer(3));
        assert_eq!(SqlValue::from(3i32), SqlValue::Integer(3));
        assert_eq!(SqlValue::from("abc"), SqlValue::Text("abc".to_string()));
        assert_eq!(SqlValue::from(None::<i32>), SqlValue::Null);
        assert_eq!(SqlValue::from(Some(5i32)), SqlValue::Integer(5));
    }

    #[test]
    fn test_row_access_by_position() {
        let row = SqlRow::new(vec![
            SqlValue::Text("1.2".to_string()),
            SqlValue::Integer(250),
            SqlValue::Null,
        ]);
        assert_eq!(row.text(0), Some("1.2"));
        assert_eq!(row.integer(1), Some(250));
        assert_eq!(row.text(2), None);
        assert_eq!(row.integer(3), None);
        assert_eq!(row.len(), 3);
    }
}
