//! In-Memory Store
//!
//! A process-local implementation of the store interface. Every session of
//! one [`MemoryManager`] shares the same table behind a mutex, so it behaves
//! like a single shared database for concurrency tests and dry runs.
//!
//! Sessions are autocommit. Inside `begin`/`commit` writes are buffered and
//! applied atomically on commit; reads see committed state only.

use crate::error::StoreError;
use crate::store::{ConnectionManager, Ddl, Query, Row, Session, Value, seeded_long_val};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Table {
    rows: BTreeMap<i64, (i64, Option<String>)>,
    next_id: i64,
}

#[derive(Debug, Default)]
struct Database {
    table: Option<Table>,
}

/// Manager for the in-memory store. Clones share one database.
#[derive(Debug, Clone, Default)]
pub struct MemoryManager {
    db: Arc<Mutex<Database>>,
}

impl MemoryManager {
    /// Empty database with no table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every row as `(id, short_val, long_val)`, ordered by id.
    /// `None` when the table does not exist.
    pub fn snapshot(&self) -> Option<Vec<(i64, i64, Option<String>)>> {
        let db = lock(&self.db).ok()?;
        db.table.as_ref().map(|t| {
            t.rows
                .iter()
                .map(|(id, (short_val, long_val))| (*id, *short_val, long_val.clone()))
                .collect()
        })
    }
}

impl ConnectionManager for MemoryManager {
    type Session = MemorySession;

    fn connect(&self) -> Result<Self::Session, StoreError> {
        Ok(MemorySession {
            db: Arc::clone(&self.db),
            pending: None,
        })
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// One connection to a [`MemoryManager`] database.
#[derive(Debug)]
pub struct MemorySession {
    db: Arc<Mutex<Database>>,
    pending: Option<Vec<(Query, Vec<Value>)>>,
}

fn lock(db: &Mutex<Database>) -> Result<MutexGuard<'_, Database>, StoreError> {
    db.lock()
        .map_err(|_| StoreError::Unavailable("memory store poisoned".to_string()))
}

fn no_table() -> StoreError {
    StoreError::Backend("no such table: bench_storage".to_string())
}

fn int_param(params: &[Value], idx: usize) -> Result<i64, StoreError> {
    params[idx]
        .as_int()
        .ok_or_else(|| StoreError::Backend(format!("parameter {} is not an integer", idx + 1)))
}

fn text_param(params: &[Value], idx: usize) -> Result<Option<String>, StoreError> {
    match &params[idx] {
        Value::Text(s) => Ok(Some(s.clone())),
        Value::Null => Ok(None),
        Value::Int(_) => Err(StoreError::Backend(format!(
            "parameter {} is not text",
            idx + 1
        ))),
    }
}

impl Table {
    fn apply(&mut self, query: Query, params: &[Value]) -> Result<Option<Row>, StoreError> {
        query.check_params(params)?;
        match query {
            Query::SelectById => {
                let id = int_param(params, 0)?;
                Ok(self.rows.get(&id).map(|(short_val, long_val)| {
                    Row(vec![
                        Value::Int(id),
                        Value::Int(*short_val),
                        long_val.clone().into(),
                    ])
                }))
            }
            Query::UpdateLongValById => {
                let long_val = text_param(params, 0)?;
                let id = int_param(params, 1)?;
                if let Some(row) = self.rows.get_mut(&id) {
                    row.1 = long_val;
                }
                Ok(None)
            }
            Query::UpdateRecord => {
                let short_val = int_param(params, 0)?;
                let long_val = text_param(params, 1)?;
                let id = int_param(params, 2)?;
                if let Some(row) = self.rows.get_mut(&id) {
                    *row = (short_val, long_val);
                }
                Ok(None)
            }
            Query::Insert => {
                let short_val = params[0].as_int().ok_or_else(|| {
                    StoreError::Constraint("NOT NULL constraint failed: short_val".to_string())
                })?;
                let long_val = text_param(params, 1)?;
                self.next_id += 1;
                self.rows.insert(self.next_id, (short_val, long_val));
                Ok(None)
            }
            Query::Count => Ok(Some(Row(vec![Value::Int(self.rows.len() as i64)]))),
        }
    }

    /// Row a write statement would touch, if any.
    fn target_id(&self, query: Query, params: &[Value]) -> Option<i64> {
        match query {
            Query::UpdateLongValById => params.get(1).and_then(Value::as_int),
            Query::UpdateRecord => params.get(2).and_then(Value::as_int),
            Query::Insert => Some(self.next_id + 1),
            Query::SelectById | Query::Count => None,
        }
    }

    /// Apply every write or none of them. Touched rows are saved before each
    /// write and restored in reverse order on the first failure.
    fn apply_all<'p>(
        &mut self,
        writes: impl IntoIterator<Item = (Query, &'p [Value])>,
    ) -> Result<u64, StoreError> {
        let next_id = self.next_id;
        let mut undo: Vec<(i64, Option<(i64, Option<String>)>)> = Vec::new();
        let mut applied = 0u64;

        for (query, params) in writes {
            if let Some(id) = self.target_id(query, params) {
                undo.push((id, self.rows.get(&id).cloned()));
            }
            if let Err(e) = self.apply(query, params) {
                for (id, prior) in undo.into_iter().rev() {
                    match prior {
                        Some(row) => self.rows.insert(id, row),
                        None => self.rows.remove(&id),
                    };
                }
                self.next_id = next_id;
                return Err(e);
            }
            applied += 1;
        }
        Ok(applied)
    }
}

impl MemorySession {
    fn with_table<T>(
        &self,
        f: impl FnOnce(&mut Table) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut db = lock(&self.db)?;
        let table = db.table.as_mut().ok_or_else(no_table)?;
        f(table)
    }

    fn is_read(query: Query) -> bool {
        matches!(query, Query::SelectById | Query::Count)
    }
}

impl Session for MemorySession {
    fn execute_ddl(&mut self, ddl: Ddl) -> Result<(), StoreError> {
        let mut db = lock(&self.db)?;
        match ddl {
            Ddl::DropTable => db.table = None,
            Ddl::CreateTable => {
                if db.table.is_some() {
                    return Err(StoreError::Backend(
                        "table bench_storage already exists".to_string(),
                    ));
                }
                db.table = Some(Table::default());
            }
        }
        Ok(())
    }

    fn bulk_populate(&mut self, row_count: u64) -> Result<u64, StoreError> {
        self.with_table(|table| {
            for i in 1..=row_count {
                let id = i as i64;
                if table.rows.contains_key(&id) {
                    return Err(StoreError::Constraint(format!(
                        "UNIQUE constraint failed: bench_storage.id ({id})"
                    )));
                }
                table.rows.insert(id, (id, Some(seeded_long_val(i))));
            }
            table.next_id = table.next_id.max(row_count as i64);
            Ok(row_count)
        })
    }

    fn execute(&mut self, query: Query, params: &[Value]) -> Result<Option<Row>, StoreError> {
        if let Some(pending) = self.pending.as_mut() {
            if !Self::is_read(query) {
                query.check_params(params)?;
                pending.push((query, params.to_vec()));
                return Ok(None);
            }
        }
        self.with_table(|table| table.apply(query, params))
    }

    fn execute_many(&mut self, query: Query, rows: &[Vec<Value>]) -> Result<u64, StoreError> {
        if let Some(pending) = self.pending.as_mut() {
            for params in rows {
                query.check_params(params)?;
                pending.push((query, params.clone()));
            }
            return Ok(rows.len() as u64);
        }
        self.with_table(|table| table.apply_all(rows.iter().map(|p| (query, p.as_slice()))))
    }

    fn begin(&mut self) -> Result<(), StoreError> {
        if self.pending.is_some() {
            return Err(StoreError::Backend(
                "cannot start a transaction within a transaction".to_string(),
            ));
        }
        self.pending = Some(Vec::new());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        let Some(pending) = self.pending.take() else {
            return Ok(());
        };
        self.with_table(|table| {
            table.apply_all(pending.iter().map(|(q, p)| (*q, p.as_slice())))?;
            Ok(())
        })
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        self.pending = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_session() -> (MemoryManager, MemorySession) {
        let manager = MemoryManager::new();
        let mut session = manager.connect().unwrap();
        session.execute_ddl(Ddl::CreateTable).unwrap();
        (manager, session)
    }

    #[test]
    fn test_bulk_populate_and_select() {
        let (_manager, mut session) = ready_session();
        assert_eq!(session.bulk_populate(10).unwrap(), 10);
        assert_eq!(session.row_count().unwrap(), 10);

        let row = session
            .execute(Query::SelectById, &[Value::Int(3)])
            .unwrap()
            .unwrap();
        assert_eq!(
            row,
            Row(vec![
                Value::Int(3),
                Value::Int(3),
                Value::Text("value 3".to_string())
            ])
        );
        assert!(
            session
                .execute(Query::SelectById, &[Value::Int(11)])
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_insert_continues_after_seeded_ids() {
        let (manager, mut session) = ready_session();
        session.bulk_populate(2).unwrap();
        session
            .execute(Query::Insert, &[Value::Int(100), Value::from("hello")])
            .unwrap();
        let rows = manager.snapshot().unwrap();
        assert_eq!(rows.last().unwrap().0, 3);
    }

    #[test]
    fn test_rollback_discards_buffered_writes() {
        let (manager, mut session) = ready_session();
        session.begin().unwrap();
        session
            .execute(Query::Insert, &[Value::Int(1), Value::Null])
            .unwrap();
        session.rollback().unwrap();
        assert!(manager.snapshot().unwrap().is_empty());

        session.begin().unwrap();
        session
            .execute(Query::Insert, &[Value::Int(1), Value::Null])
            .unwrap();
        session.commit().unwrap();
        assert_eq!(manager.snapshot().unwrap().len(), 1);
    }

    #[test]
    fn test_failed_commit_leaves_table_untouched() {
        let (manager, mut session) = ready_session();
        session.bulk_populate(2).unwrap();

        session.begin().unwrap();
        session
            .execute(Query::UpdateLongValById, &[Value::from("changed"), Value::Int(1)])
            .unwrap();
        session
            .execute(Query::Insert, &[Value::Int(7), Value::Null])
            .unwrap();
        session
            .execute(Query::Insert, &[Value::Null, Value::Null])
            .unwrap();
        let err = session.commit().unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)), "{err}");

        let rows = manager.snapshot().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].2.as_deref(), Some("value 1"));

        // Ids are not consumed by the failed commit.
        session
            .execute(Query::Insert, &[Value::Int(7), Value::Null])
            .unwrap();
        assert_eq!(manager.snapshot().unwrap().last().unwrap().0, 3);
    }

    #[test]
    fn test_execute_many_is_all_or_nothing() {
        let (manager, mut session) = ready_session();
        let rows = vec![
            vec![Value::Int(1), Value::Null],
            vec![Value::Null, Value::Null],
        ];
        assert!(session.execute_many(Query::Insert, &rows).is_err());
        assert!(manager.snapshot().unwrap().is_empty());
    }

    #[test]
    fn test_missing_table_is_backend_error() {
        let manager = MemoryManager::new();
        let mut session = manager.connect().unwrap();
        assert!(matches!(
            session.execute(Query::Count, &[]),
            Err(StoreError::Backend(_))
        ));
    }

    #[test]
    fn test_null_short_val_violates_constraint() {
        let (_manager, mut session) = ready_session();
        let err = session
            .execute(Query::Insert, &[Value::Null, Value::Null])
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
    }
}
