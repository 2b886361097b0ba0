//! One SQLite connection implementing `Session`.

use crate::store_error;
use pairbench_core::{Ddl, Query, Row, Session, StoreError, Value};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, params_from_iter};

const BULK_POPULATE: &str = "WITH RECURSIVE gs(x) AS (
        SELECT 1 UNION ALL SELECT x + 1 FROM gs WHERE x < ?1
    )
    INSERT INTO bench_storage (id, short_val, long_val)
    SELECT x, x, 'value ' || x FROM gs";

/// A pooled SQLite connection.
#[derive(Debug)]
pub struct SqliteSession {
    conn: Connection,
    in_transaction: bool,
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Int(v) => SqlValue::Integer(*v),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Null => SqlValue::Null,
    }
}

fn from_sql(value: ValueRef<'_>) -> Result<Value, StoreError> {
    match value {
        ValueRef::Integer(v) => Ok(Value::Int(v)),
        ValueRef::Text(bytes) => Ok(Value::Text(String::from_utf8_lossy(bytes).into_owned())),
        ValueRef::Null => Ok(Value::Null),
        other => Err(StoreError::RowShape(format!(
            "unsupported column type {:?}",
            other.data_type()
        ))),
    }
}

impl SqliteSession {
    pub(crate) fn new(conn: Connection) -> Self {
        Self {
            conn,
            in_transaction: false,
        }
    }

    fn run(&self, query: Query, params: &[Value]) -> Result<Option<Row>, StoreError> {
        query.check_params(params)?;
        let mut stmt = self.conn.prepare_cached(query.sql()).map_err(store_error)?;
        let args = params_from_iter(params.iter().map(to_sql));

        if stmt.column_count() == 0 {
            stmt.execute(args).map_err(store_error)?;
            return Ok(None);
        }

        let columns = stmt.column_count();
        let mut rows = stmt.query(args).map_err(store_error)?;
        let Some(row) = rows.next().map_err(store_error)? else {
            return Ok(None);
        };
        let mut values = Vec::with_capacity(columns);
        for idx in 0..columns {
            values.push(from_sql(row.get_ref(idx).map_err(store_error)?)?);
        }
        Ok(Some(Row(values)))
    }

    fn open_transaction(&mut self, sql: &str) -> Result<(), StoreError> {
        if self.in_transaction {
            return Err(StoreError::Backend(
                "cannot start a transaction within a transaction".to_string(),
            ));
        }
        self.conn.execute_batch(sql).map_err(store_error)?;
        self.in_transaction = true;
        Ok(())
    }

    fn run_many(&self, query: Query, rows: &[Vec<Value>]) -> Result<u64, StoreError> {
        let mut stmt = self.conn.prepare_cached(query.sql()).map_err(store_error)?;
        let mut affected = 0u64;
        for params in rows {
            query.check_params(params)?;
            affected += stmt
                .execute(params_from_iter(params.iter().map(to_sql)))
                .map_err(store_error)? as u64;
        }
        Ok(affected)
    }
}

impl Session for SqliteSession {
    fn execute_ddl(&mut self, ddl: Ddl) -> Result<(), StoreError> {
        self.conn.execute_batch(ddl.sql()).map_err(store_error)?;
        // Cached statements may reference the dropped table.
        self.conn.flush_prepared_statement_cache();
        Ok(())
    }

    fn bulk_populate(&mut self, row_count: u64) -> Result<u64, StoreError> {
        let limit = i64::try_from(row_count)
            .map_err(|_| StoreError::Backend(format!("row count {row_count} out of range")))?;
        let written = self
            .conn
            .execute(BULK_POPULATE, [limit])
            .map_err(store_error)?;
        Ok(written as u64)
    }

    fn execute(&mut self, query: Query, params: &[Value]) -> Result<Option<Row>, StoreError> {
        self.run(query, params)
    }

    fn execute_many(&mut self, query: Query, rows: &[Vec<Value>]) -> Result<u64, StoreError> {
        if self.in_transaction {
            return self.run_many(query, rows);
        }
        self.begin()?;
        match self.run_many(query, rows) {
            Ok(affected) => {
                self.commit()?;
                Ok(affected)
            }
            Err(e) => {
                if let Err(rollback) = self.rollback() {
                    tracing::warn!(error = %rollback, "rollback after failed batch failed");
                }
                Err(e)
            }
        }
    }

    fn begin(&mut self) -> Result<(), StoreError> {
        // Take the write lock up front; a deferred transaction that later
        // writes fails with SQLITE_BUSY instead of waiting.
        self.open_transaction("BEGIN IMMEDIATE")
    }

    fn begin_read(&mut self) -> Result<(), StoreError> {
        // WAL readers share the database; no lock is taken until first read.
        self.open_transaction("BEGIN DEFERRED")
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        if !self.in_transaction {
            return Ok(());
        }
        self.conn.execute_batch("COMMIT").map_err(store_error)?;
        self.in_transaction = false;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        if !self.in_transaction {
            return Ok(());
        }
        self.in_transaction = false;
        self.conn.execute_batch("ROLLBACK").map_err(store_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SqliteManager;
    use pairbench_core::{ConnectionManager, NewRecord, UnitOfWork};
    use std::time::Duration;
    use tempfile::TempDir;

    fn ready() -> (TempDir, SqliteManager, SqliteSession) {
        let dir = tempfile::tempdir().unwrap();
        let manager = SqliteManager::new(dir.path().join("bench.db"));
        let mut session = manager.connect().unwrap();
        session.execute_ddl(Ddl::DropTable).unwrap();
        session.execute_ddl(Ddl::CreateTable).unwrap();
        (dir, manager, session)
    }

    #[test]
    fn test_bulk_populate_matches_seed_format() {
        let (_dir, _manager, mut session) = ready();
        assert_eq!(session.bulk_populate(1000).unwrap(), 1000);
        assert_eq!(session.row_count().unwrap(), 1000);

        let row = session
            .execute(Query::SelectById, &[Value::Int(777)])
            .unwrap()
            .unwrap();
        assert_eq!(
            row,
            Row(vec![
                Value::Int(777),
                Value::Int(777),
                Value::Text("value 777".to_string())
            ])
        );
    }

    #[test]
    fn test_insert_after_seed_gets_next_id() {
        let (_dir, _manager, mut session) = ready();
        session.bulk_populate(5).unwrap();
        session
            .execute(Query::Insert, &[Value::Int(100), Value::from("hello")])
            .unwrap();
        let row = session
            .execute(Query::SelectById, &[Value::Int(6)])
            .unwrap()
            .unwrap();
        assert_eq!(row.get(1), Some(&Value::Int(100)));
    }

    #[test]
    fn test_update_and_missing_row() {
        let (_dir, _manager, mut session) = ready();
        session.bulk_populate(3).unwrap();
        session
            .execute(
                Query::UpdateLongValById,
                &[Value::from("New long value"), Value::Int(2)],
            )
            .unwrap();
        let row = session
            .execute(Query::SelectById, &[Value::Int(2)])
            .unwrap()
            .unwrap();
        assert_eq!(row.get(2).and_then(Value::as_text), Some("New long value"));
        assert!(
            session
                .execute(Query::SelectById, &[Value::Int(4)])
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_not_null_is_constraint_error() {
        let (_dir, _manager, mut session) = ready();
        let err = session
            .execute(Query::Insert, &[Value::Null, Value::Null])
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)), "{err}");
    }

    #[test]
    fn test_execute_many_is_atomic() {
        let (_dir, _manager, mut session) = ready();
        let rows = vec![
            vec![Value::Int(1), Value::Null],
            vec![Value::Null, Value::Null],
        ];
        assert!(session.execute_many(Query::Insert, &rows).is_err());
        assert_eq!(session.row_count().unwrap(), 0);
    }

    #[test]
    fn test_recreate_after_drop_with_cached_statements() {
        let (_dir, _manager, mut session) = ready();
        session.bulk_populate(2).unwrap();
        session.execute(Query::Count, &[]).unwrap();
        session.execute_ddl(Ddl::DropTable).unwrap();
        session.execute_ddl(Ddl::CreateTable).unwrap();
        assert_eq!(session.row_count().unwrap(), 0);
    }

    #[test]
    fn test_unit_of_work_visible_to_other_connection() {
        let (_dir, manager, mut session) = ready();
        let mut uow = UnitOfWork::new(&mut session);
        uow.add_all((0..100).map(|i| NewRecord {
            short_val: i,
            long_val: Some("value ".repeat(100)),
        }));
        assert_eq!(uow.commit().unwrap(), 100);

        let mut other = manager.connect().unwrap();
        assert_eq!(other.row_count().unwrap(), 100);
    }

    #[test]
    fn test_mapper_reads_do_not_block_each_other() {
        let (_dir, manager, mut session) = ready();
        session.bulk_populate(10).unwrap();
        let manager = manager.with_busy_timeout(Duration::from_millis(50));
        let mut first = manager.connect().unwrap();
        let mut second = manager.connect().unwrap();

        let mut held = UnitOfWork::new(&mut first);
        assert!(held.find(1).unwrap().is_some());

        let mut other = UnitOfWork::new(&mut second);
        assert!(other.find(2).unwrap().is_some());
        assert_eq!(other.commit().unwrap(), 0);

        // A writer is not blocked by the open read either.
        session
            .execute(Query::UpdateLongValById, &[Value::from("changed"), Value::Int(3)])
            .unwrap();
        assert_eq!(held.commit().unwrap(), 0);
    }

    #[test]
    fn test_mapper_update_after_read() {
        let (_dir, manager, mut session) = ready();
        session.bulk_populate(5).unwrap();
        let mut reader = manager.connect().unwrap();
        let mut open_read = UnitOfWork::new(&mut reader);
        open_read.find(4).unwrap();

        let mut uow = UnitOfWork::new(&mut session);
        let mut record = uow.find(4).unwrap().unwrap();
        record.long_val = Some("New long value".to_string());
        uow.update(record);
        assert_eq!(uow.commit().unwrap(), 1);
        drop(open_read);

        let row = session
            .execute(Query::SelectById, &[Value::Int(4)])
            .unwrap()
            .unwrap();
        assert_eq!(row.get(2).and_then(Value::as_text), Some("New long value"));
    }

    #[test]
    fn test_rollback_discards_writes() {
        let (_dir, _manager, mut session) = ready();
        session.begin().unwrap();
        session
            .execute(Query::Insert, &[Value::Int(1), Value::Null])
            .unwrap();
        session.rollback().unwrap();
        assert_eq!(session.row_count().unwrap(), 0);
    }
}
