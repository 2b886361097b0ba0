//! Schema Reset
//!
//! Brings the store to a known state before each benchmark entry: drop the
//! table, recreate it, then optionally seed it. Seeding is delegated to the
//! store's `bulk_populate` so rows are generated server-side in one
//! statement instead of one round trip per row.
//!
//! Any failure here is reported as `StoreError::Unavailable`; a session that
//! cannot reset must not go on to produce timings.

use crate::error::StoreError;
use crate::pool::Pool;
use crate::store::{ConnectionManager, Ddl, Session};

/// Resets the benchmark table through a pooled session.
pub struct SchemaReset<M: ConnectionManager> {
    pool: Pool<M>,
}

impl<M: ConnectionManager> SchemaReset<M> {
    /// Reset helper over `pool`.
    pub fn new(pool: Pool<M>) -> Self {
        Self { pool }
    }

    /// Drop and recreate the table, then seed `seed_rows` rows if given.
    ///
    /// Returns the number of rows present afterwards. Idempotent: two
    /// consecutive calls with the same argument leave identical contents.
    pub fn reset(&self, seed_rows: Option<u64>) -> Result<u64, StoreError> {
        let mut session = self
            .pool
            .get()
            .map_err(|e| e.into_unavailable("checking out a session for reset"))?;

        let outcome = Self::reset_on(&mut *session, seed_rows);
        if outcome.is_err() {
            // Don't hand a half-reset connection to the next checkout.
            session.discard();
        }
        outcome
    }

    fn reset_on(session: &mut M::Session, seed_rows: Option<u64>) -> Result<u64, StoreError> {
        session
            .execute_ddl(Ddl::DropTable)
            .map_err(|e| e.into_unavailable("dropping bench_storage"))?;
        session
            .execute_ddl(Ddl::CreateTable)
            .map_err(|e| e.into_unavailable("creating bench_storage"))?;

        let rows = match seed_rows {
            Some(n) if n > 0 => {
                let written = session
                    .bulk_populate(n)
                    .map_err(|e| e.into_unavailable("seeding bench_storage"))?;
                tracing::debug!(rows = written, "seeded bench_storage");
                written
            }
            _ => 0,
        };
        Ok(rows)
    }
}
