//! Backing Store Interface
//!
//! The harness only needs three narrow capabilities from a store, each used
//! on an independently checked-out connection:
//!
//! - `execute_ddl` for schema reset
//! - `bulk_populate` for server-side seeding
//! - `execute` for the parameterized statements issued by work units
//!
//! Statements are typed (`Ddl`, `Query`) rather than free-form strings so a
//! non-SQL backend such as [`crate::MemoryManager`] can interpret them.

use crate::error::StoreError;

/// Name of the single benchmark table.
pub const TABLE_NAME: &str = "bench_storage";

/// A scalar statement parameter or column value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// 64-bit integer
    Int(i64),
    /// UTF-8 text
    Text(String),
    /// SQL NULL
    Null,
}

impl Value {
    /// Integer payload, if any.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Text payload, if any.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Option<String>> for Value {
    fn from(v: Option<String>) -> Self {
        v.map(Value::Text).unwrap_or(Value::Null)
    }
}

/// A single result row, columns in table order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row(pub Vec<Value>);

impl Row {
    /// Column value by index.
    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.0.get(idx)
    }
}

/// Schema statements issued by [`crate::SchemaReset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ddl {
    /// Drop the benchmark table if it exists.
    DropTable,
    /// Create the benchmark table.
    CreateTable,
}

impl Ddl {
    /// SQL text for SQL backends.
    pub fn sql(self) -> &'static str {
        match self {
            Ddl::DropTable => "DROP TABLE IF EXISTS bench_storage",
            Ddl::CreateTable => {
                "CREATE TABLE bench_storage (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    short_val INTEGER NOT NULL,
                    long_val TEXT
                )"
            }
        }
    }
}

/// Parameterized statements issued by work units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Query {
    /// `[id]` -> full row or nothing
    SelectById,
    /// `[long_val, id]`
    UpdateLongValById,
    /// `[short_val, long_val, id]` (full-row flush used by the mapper)
    UpdateRecord,
    /// `[short_val, long_val]`
    Insert,
    /// `[]` -> single row holding the row count
    Count,
}

impl Query {
    /// SQL text for SQL backends.
    pub fn sql(self) -> &'static str {
        match self {
            Query::SelectById => "SELECT id, short_val, long_val FROM bench_storage WHERE id = ?1",
            Query::UpdateLongValById => "UPDATE bench_storage SET long_val = ?1 WHERE id = ?2",
            Query::UpdateRecord => {
                "UPDATE bench_storage SET short_val = ?1, long_val = ?2 WHERE id = ?3"
            }
            Query::Insert => "INSERT INTO bench_storage (short_val, long_val) VALUES (?1, ?2)",
            Query::Count => "SELECT COUNT(*) FROM bench_storage",
        }
    }

    /// Number of positional parameters the statement binds.
    pub fn param_count(self) -> usize {
        match self {
            Query::SelectById => 1,
            Query::UpdateLongValById | Query::Insert => 2,
            Query::UpdateRecord => 3,
            Query::Count => 0,
        }
    }

    /// Reject parameter lists of the wrong arity.
    pub fn check_params(self, params: &[Value]) -> Result<(), StoreError> {
        if params.len() != self.param_count() {
            return Err(StoreError::Backend(format!(
                "{:?} expects {} parameters, got {}",
                self,
                self.param_count(),
                params.len()
            )));
        }
        Ok(())
    }
}

/// `long_val` of seeded row `i`. Bulk population must produce exactly this.
pub fn seeded_long_val(i: u64) -> String {
    format!("value {i}")
}

/// A row of the benchmark table as seen by the mapper layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchRecord {
    /// Primary key
    pub id: i64,
    /// Non-null integer payload
    pub short_val: i64,
    /// Nullable text payload
    pub long_val: Option<String>,
}

impl TryFrom<Row> for BenchRecord {
    type Error = StoreError;

    fn try_from(row: Row) -> Result<Self, Self::Error> {
        let mut cols = row.0.into_iter();
        let (Some(id), Some(short_val), Some(long_val)) = (cols.next(), cols.next(), cols.next())
        else {
            return Err(StoreError::RowShape("expected 3 columns".to_string()));
        };
        let id = id
            .as_int()
            .ok_or_else(|| StoreError::RowShape(format!("id is not an integer: {id:?}")))?;
        let short_val = short_val.as_int().ok_or_else(|| {
            StoreError::RowShape(format!("short_val is not an integer: {short_val:?}"))
        })?;
        let long_val = match long_val {
            Value::Text(s) => Some(s),
            Value::Null => None,
            other => {
                return Err(StoreError::RowShape(format!(
                    "long_val is not text: {other:?}"
                )));
            }
        };
        Ok(BenchRecord {
            id,
            short_val,
            long_val,
        })
    }
}

/// A record that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    /// Non-null integer payload
    pub short_val: i64,
    /// Nullable text payload
    pub long_val: Option<String>,
}

impl NewRecord {
    /// Insert parameters in `Query::Insert` order.
    pub fn params(&self) -> Vec<Value> {
        vec![Value::Int(self.short_val), self.long_val.clone().into()]
    }
}

/// One open connection to the backing store.
///
/// Sessions are autocommit unless `begin` has been called.
pub trait Session: Send {
    /// Execute a schema statement.
    fn execute_ddl(&mut self, ddl: Ddl) -> Result<(), StoreError>;

    /// Insert rows `1..=row_count` with `short_val = i` and
    /// `long_val = seeded_long_val(i)`, generated inside the store.
    /// Returns the number of rows written.
    fn bulk_populate(&mut self, row_count: u64) -> Result<u64, StoreError>;

    /// Execute one parameterized statement, returning the first row if the
    /// statement produces rows.
    fn execute(&mut self, query: Query, params: &[Value]) -> Result<Option<Row>, StoreError>;

    /// Execute one statement once per parameter set. Returns rows affected.
    fn execute_many(&mut self, query: Query, rows: &[Vec<Value>]) -> Result<u64, StoreError>;

    /// Open an explicit transaction that may write.
    fn begin(&mut self) -> Result<(), StoreError>;

    /// Open an explicit transaction that only reads. Stores with separate
    /// read and write locks take only the read lock.
    fn begin_read(&mut self) -> Result<(), StoreError> {
        self.begin()
    }

    /// Commit the open transaction. No-op outside a transaction.
    fn commit(&mut self) -> Result<(), StoreError>;

    /// Roll back the open transaction. No-op outside a transaction.
    fn rollback(&mut self) -> Result<(), StoreError>;

    /// Number of rows in the benchmark table.
    fn row_count(&mut self) -> Result<u64, StoreError> {
        let row = self
            .execute(Query::Count, &[])?
            .ok_or_else(|| StoreError::RowShape("COUNT returned no row".to_string()))?;
        row.get(0)
            .and_then(Value::as_int)
            .map(|n| n as u64)
            .ok_or_else(|| StoreError::RowShape("COUNT is not an integer".to_string()))
    }
}

/// Opens new sessions for a [`crate::Pool`].
pub trait ConnectionManager: Send + Sync + 'static {
    /// Session type produced by this manager.
    type Session: Session;

    /// Open a fresh connection.
    fn connect(&self) -> Result<Self::Session, StoreError>;

    /// Short human-readable description (backend and location).
    fn describe(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_from_row() {
        let row = Row(vec![
            Value::Int(7),
            Value::Int(70),
            Value::Text("value 7".to_string()),
        ]);
        let record = BenchRecord::try_from(row).unwrap();
        assert_eq!(record.id, 7);
        assert_eq!(record.short_val, 70);
        assert_eq!(record.long_val.as_deref(), Some("value 7"));
    }

    #[test]
    fn test_record_from_row_null_long_val() {
        let row = Row(vec![Value::Int(1), Value::Int(2), Value::Null]);
        let record = BenchRecord::try_from(row).unwrap();
        assert_eq!(record.long_val, None);
    }

    #[test]
    fn test_record_from_short_row_fails() {
        let row = Row(vec![Value::Int(1)]);
        assert!(matches!(
            BenchRecord::try_from(row),
            Err(StoreError::RowShape(_))
        ));
    }

    #[test]
    fn test_param_counts_match_sql_placeholders() {
        for query in [
            Query::SelectById,
            Query::UpdateLongValById,
            Query::UpdateRecord,
            Query::Insert,
            Query::Count,
        ] {
            let placeholders = (1..=9)
                .filter(|i| query.sql().contains(&format!("?{i}")))
                .count();
            assert_eq!(placeholders, query.param_count(), "{query:?}");
        }
    }
}
