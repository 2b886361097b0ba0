#![warn(missing_docs)]
//! Pairbench Core - Execution Runtime
//!
//! This crate provides everything the harness needs to drive a backing store:
//! - `WorkUnit` named, repeatable operations against the store
//! - `Dispatcher` bounded-concurrency batch execution on a worker pool
//! - `Pool` a fixed-capacity connection pool with RAII checkouts
//! - `SchemaReset` drop/recreate/seed of the benchmark table
//! - `Timer` monotonic wall-clock measurement
//! - `UnitOfWork` the record-mapping layer used by the "mapper" workloads
//! - `MemoryManager` an in-process store for tests and dry runs

mod dispatcher;
mod error;
mod keys;
mod mapper;
mod measure;
mod memory;
mod pool;
mod reset;
mod store;
mod workunit;

pub use dispatcher::{DispatchError, DispatchSummary, Dispatcher};
pub use error::{OpError, StoreError};
pub use keys::{KeyGenerator, RandomKeys, SeededKeys};
pub use mapper::UnitOfWork;
pub use measure::Timer;
pub use memory::{MemoryManager, MemorySession};
pub use pool::{Pool, PoolStats, PooledSession};
pub use reset::SchemaReset;
pub use store::{
    BenchRecord, ConnectionManager, Ddl, NewRecord, Query, Row, Session, TABLE_NAME, Value,
    seeded_long_val,
};
pub use workunit::WorkUnit;
