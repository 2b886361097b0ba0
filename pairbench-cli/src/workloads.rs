//! Store Workloads
//!
//! Turns a catalog entry into the work unit the dispatcher invokes. Every
//! invocation checks out its own pooled session and commits before
//! returning it, for both access styles:
//!
//! | Operation        | Driver                          | Mapper                          |
//! |------------------|---------------------------------|---------------------------------|
//! | ConcurrentSelect | `SelectById` on a random key    | `find` in a unit of work        |
//! | ConcurrentUpdate | `UpdateLongValById`             | `find`, mutate, `update`        |
//! | BatchAdd         | one `execute_many` of all rows  | `add_all`, then `commit`        |
//! | ConcurrentAdd    | one `Insert`                    | `add`, then `commit`            |

use crate::catalog::{Access, BenchmarkEntry, Operation};
use pairbench_core::{
    ConnectionManager, KeyGenerator, NewRecord, OpError, Pool, Query, Session, UnitOfWork, Value,
    WorkUnit,
};
use std::sync::Arc;

/// `long_val` written by the update entries.
pub const UPDATED_LONG_VAL: &str = "New long value";

/// Builds the work unit for a catalog entry.
pub trait UnitFactory {
    /// Work unit performing `entry`'s operation once per invocation.
    fn build(&self, entry: &BenchmarkEntry) -> WorkUnit;
}

/// `short_val` of every row inserted by the concurrent add entries.
const ADDED_SHORT_VAL: i64 = 100;

fn added_long_val() -> String {
    "hello ".repeat(100)
}

/// Rows written by the batch entries: `short_val = i`, a fixed long text.
pub fn batch_records(rows: usize) -> Vec<NewRecord> {
    let long_val = "value ".repeat(100);
    (0..rows as i64)
        .map(|i| NewRecord {
            short_val: i,
            long_val: Some(long_val.clone()),
        })
        .collect()
}

/// Work units that run against a pooled store.
pub struct StoreWorkloads<M: ConnectionManager> {
    pool: Pool<M>,
    keys: Arc<dyn KeyGenerator>,
    batch_rows: usize,
}

impl<M: ConnectionManager> StoreWorkloads<M> {
    /// Workloads drawing sessions from `pool` and keys from `keys`.
    pub fn new(pool: Pool<M>, keys: Arc<dyn KeyGenerator>, batch_rows: usize) -> Self {
        Self {
            pool,
            keys,
            batch_rows,
        }
    }

    fn driver_select(
        &self,
        max_key: i64,
    ) -> impl Fn() -> Result<(), OpError> + Send + Sync + use<M> {
        let pool = self.pool.clone();
        let keys = Arc::clone(&self.keys);
        move || {
            let key = keys.next_key(max_key);
            let mut session = pool.get()?;
            session
                .execute(Query::SelectById, &[Value::Int(key)])?
                .ok_or(OpError::NotFound(key))?;
            Ok(())
        }
    }

    fn mapper_select(
        &self,
        max_key: i64,
    ) -> impl Fn() -> Result<(), OpError> + Send + Sync + use<M> {
        let pool = self.pool.clone();
        let keys = Arc::clone(&self.keys);
        move || {
            let key = keys.next_key(max_key);
            let mut session = pool.get()?;
            let mut uow = UnitOfWork::new(&mut *session);
            uow.find(key)?.ok_or(OpError::NotFound(key))?;
            uow.commit()?;
            Ok(())
        }
    }

    fn driver_update(
        &self,
        max_key: i64,
    ) -> impl Fn() -> Result<(), OpError> + Send + Sync + use<M> {
        let pool = self.pool.clone();
        let keys = Arc::clone(&self.keys);
        move || {
            let key = keys.next_key(max_key);
            let mut session = pool.get()?;
            session.execute(
                Query::UpdateLongValById,
                &[Value::from(UPDATED_LONG_VAL), Value::Int(key)],
            )?;
            Ok(())
        }
    }

    fn mapper_update(
        &self,
        max_key: i64,
    ) -> impl Fn() -> Result<(), OpError> + Send + Sync + use<M> {
        let pool = self.pool.clone();
        let keys = Arc::clone(&self.keys);
        move || {
            let key = keys.next_key(max_key);
            let mut session = pool.get()?;
            let mut uow = UnitOfWork::new(&mut *session);
            let mut record = uow.find(key)?.ok_or(OpError::NotFound(key))?;
            record.long_val = Some(UPDATED_LONG_VAL.to_string());
            uow.update(record);
            uow.commit()?;
            Ok(())
        }
    }

    fn driver_batch_add(&self) -> impl Fn() -> Result<(), OpError> + Send + Sync + use<M> {
        let pool = self.pool.clone();
        let rows = self.batch_rows;
        move || {
            let params: Vec<Vec<Value>> =
                batch_records(rows).iter().map(NewRecord::params).collect();
            let mut session = pool.get()?;
            session.execute_many(Query::Insert, &params)?;
            Ok(())
        }
    }

    fn mapper_batch_add(&self) -> impl Fn() -> Result<(), OpError> + Send + Sync + use<M> {
        let pool = self.pool.clone();
        let rows = self.batch_rows;
        move || {
            let mut session = pool.get()?;
            let mut uow = UnitOfWork::new(&mut *session);
            uow.add_all(batch_records(rows));
            uow.commit()?;
            Ok(())
        }
    }

    fn driver_add(&self) -> impl Fn() -> Result<(), OpError> + Send + Sync + use<M> {
        let pool = self.pool.clone();
        let long_val = added_long_val();
        move || {
            let mut session = pool.get()?;
            session.execute(
                Query::Insert,
                &[Value::Int(ADDED_SHORT_VAL), Value::from(long_val.as_str())],
            )?;
            Ok(())
        }
    }

    fn mapper_add(&self) -> impl Fn() -> Result<(), OpError> + Send + Sync + use<M> {
        let pool = self.pool.clone();
        let long_val = added_long_val();
        move || {
            let mut session = pool.get()?;
            let mut uow = UnitOfWork::new(&mut *session);
            uow.add(NewRecord {
                short_val: ADDED_SHORT_VAL,
                long_val: Some(long_val.clone()),
            });
            uow.commit()?;
            Ok(())
        }
    }
}

impl<M: ConnectionManager> UnitFactory for StoreWorkloads<M> {
    fn build(&self, entry: &BenchmarkEntry) -> WorkUnit {
        let max_key = entry.seed_rows.unwrap_or(1).clamp(1, i64::MAX as u64) as i64;
        let name = entry.name.as_str();
        match (entry.operation, entry.access) {
            (Operation::ConcurrentSelect, Access::Driver) => {
                WorkUnit::new(name, self.driver_select(max_key))
            }
            (Operation::ConcurrentSelect, Access::Mapper) => {
                WorkUnit::new(name, self.mapper_select(max_key))
            }
            (Operation::ConcurrentUpdate, Access::Driver) => {
                WorkUnit::new(name, self.driver_update(max_key))
            }
            (Operation::ConcurrentUpdate, Access::Mapper) => {
                WorkUnit::new(name, self.mapper_update(max_key))
            }
            (Operation::BatchAdd, Access::Driver) => WorkUnit::new(name, self.driver_batch_add()),
            (Operation::BatchAdd, Access::Mapper) => WorkUnit::new(name, self.mapper_batch_add()),
            (Operation::ConcurrentAdd, Access::Driver) => WorkUnit::new(name, self.driver_add()),
            (Operation::ConcurrentAdd, Access::Mapper) => WorkUnit::new(name, self.mapper_add()),
        }
    }
}
