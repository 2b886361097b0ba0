//! Record Mapping Layer
//!
//! The "mapper" side of every benchmark pair goes through this layer instead
//! of issuing statements directly. It mirrors what an object mapper does per
//! request:
//!
//! - rows are loaded into typed [`BenchRecord`]s and kept in an identity map
//! - changes are tracked against the loaded snapshot
//! - new and dirty records are flushed in one transaction on `commit`
//!
//! Lookups run in a read transaction. Flushing runs in its own write
//! transaction, so a unit of work that only reads never takes the store's
//! write lock. A unit of work that is dropped without `commit` rolls back.

use crate::error::StoreError;
use crate::store::{BenchRecord, NewRecord, Query, Session, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transaction {
    None,
    Read,
    Write,
}

/// Change-tracking session over one store connection.
pub struct UnitOfWork<'s, S: Session + ?Sized> {
    session: &'s mut S,
    identity: BTreeMap<i64, BenchRecord>,
    dirty: BTreeMap<i64, BenchRecord>,
    new: Vec<NewRecord>,
    transaction: Transaction,
}

impl<'s, S: Session + ?Sized> UnitOfWork<'s, S> {
    /// Start a unit of work. No transaction is opened until first use.
    pub fn new(session: &'s mut S) -> Self {
        Self {
            session,
            identity: BTreeMap::new(),
            dirty: BTreeMap::new(),
            new: Vec::new(),
            transaction: Transaction::None,
        }
    }

    fn ensure_read(&mut self) -> Result<(), StoreError> {
        if self.transaction == Transaction::None {
            self.session.begin_read()?;
            self.transaction = Transaction::Read;
        }
        Ok(())
    }

    fn ensure_write(&mut self) -> Result<(), StoreError> {
        match self.transaction {
            Transaction::Write => return Ok(()),
            Transaction::Read => {
                self.session.commit()?;
                self.transaction = Transaction::None;
            }
            Transaction::None => {}
        }
        self.session.begin()?;
        self.transaction = Transaction::Write;
        Ok(())
    }

    /// Load a record by primary key. Repeated lookups hit the identity map.
    pub fn find(&mut self, id: i64) -> Result<Option<BenchRecord>, StoreError> {
        if let Some(record) = self.dirty.get(&id).or_else(|| self.identity.get(&id)) {
            return Ok(Some(record.clone()));
        }
        self.ensure_read()?;
        let Some(row) = self.session.execute(Query::SelectById, &[Value::Int(id)])? else {
            return Ok(None);
        };
        let record = BenchRecord::try_from(row)?;
        self.identity.insert(id, record.clone());
        Ok(Some(record))
    }

    /// Stage changes to a previously loaded record. Unchanged records are
    /// not flushed.
    pub fn update(&mut self, record: BenchRecord) {
        if self.identity.get(&record.id) == Some(&record) {
            self.dirty.remove(&record.id);
        } else {
            self.dirty.insert(record.id, record);
        }
    }

    /// Stage a new record for insertion.
    pub fn add(&mut self, record: NewRecord) {
        self.new.push(record);
    }

    /// Stage many new records for insertion.
    pub fn add_all(&mut self, records: impl IntoIterator<Item = NewRecord>) {
        self.new.extend(records);
    }

    /// Number of staged inserts and updates.
    pub fn pending(&self) -> usize {
        self.new.len() + self.dirty.len()
    }

    /// Flush staged changes and commit. Returns the number of rows written.
    pub fn commit(mut self) -> Result<u64, StoreError> {
        if self.pending() == 0 {
            if self.transaction != Transaction::None {
                self.session.commit()?;
                self.transaction = Transaction::None;
            }
            return Ok(0);
        }
        self.ensure_write()?;

        let mut written = 0u64;
        if !self.new.is_empty() {
            let rows: Vec<Vec<Value>> = self.new.iter().map(NewRecord::params).collect();
            written += self.session.execute_many(Query::Insert, &rows)?;
            self.new.clear();
        }
        for record in std::mem::take(&mut self.dirty).into_values() {
            self.session.execute(
                Query::UpdateRecord,
                &[
                    Value::Int(record.short_val),
                    record.long_val.clone().into(),
                    Value::Int(record.id),
                ],
            )?;
            self.identity.insert(record.id, record);
            written += 1;
        }

        self.session.commit()?;
        self.transaction = Transaction::None;
        Ok(written)
    }
}

impl<S: Session + ?Sized> Drop for UnitOfWork<'_, S> {
    fn drop(&mut self) {
        if self.transaction != Transaction::None {
            if let Err(e) = self.session.rollback() {
                tracing::warn!(error = %e, "rollback of abandoned unit of work failed");
            }
        }
    }
}
