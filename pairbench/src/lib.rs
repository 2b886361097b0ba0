#![warn(missing_docs)]
//! # Pairbench
//!
//! Comparative data-access benchmarks: the same logical operation run once
//! through raw parameterized statements ("driver") and once through a thin
//! record-mapping layer ("mapper"), timed under bounded concurrency against
//! a shared store and reported as relative slowness.
//!
//! - **Bounded dispatch**: each batch runs on a worker pool of exactly `C` threads
//! - **Schema lifecycle**: drop, recreate and server-side seeding before every entry
//! - **Pooled sessions**: fixed-capacity pool with RAII checkouts
//! - **Deterministic reporting**: insertion-ordered table with pairwise ratios
//!
//! ## Quick Start
//!
//! ```ignore
//! fn main() -> std::process::ExitCode {
//!     match pairbench::run() {
//!         Ok(pairbench::RunStatus::Completed) => std::process::ExitCode::SUCCESS,
//!         Ok(pairbench::RunStatus::Aborted) => std::process::ExitCode::from(1),
//!         Err(_) => std::process::ExitCode::from(2),
//!     }
//! }
//! ```

// Re-export core types
pub use pairbench_core::{
    BenchRecord, ConnectionManager, DispatchSummary, Dispatcher, KeyGenerator, MemoryManager,
    NewRecord, OpError, Pool, RandomKeys, SchemaReset, SeededKeys, Session, StoreError, Timer,
    UnitOfWork, WorkUnit,
};

// Re-export the SQLite backend
pub use pairbench_sqlite::SqliteManager;

// Re-export report types
pub use pairbench_report::{Measurement, OutputFormat, Report, ResultSet};

// Re-export CLI
pub use pairbench_cli::{
    Catalog, Cli, PairbenchConfig, RunStatus, Runner, StoreWorkloads, run, run_with_cli,
};
