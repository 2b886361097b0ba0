//! Catalog Runner
//!
//! Drives every catalog entry through the same linear pipeline and collects
//! one measurement per entry.
//!
//! ```text
//!            ┌──────────────────────────────────────────────┐
//!            ▼                                              │
//! Idle ─► Resetting ─► Executing ─► Recording ─► (next entry)┘
//!            │                           │
//!            ▼                           ▼
//!         Aborted                       Done
//! ```
//!
//! Only the batch dispatch is timed. Schema reset, work unit construction
//! and worker pool start-up all happen before the timer starts. Failed
//! invocations inside a batch are tolerated and counted; a failed reset
//! aborts the remaining catalog.

use crate::catalog::{BenchmarkEntry, Catalog};
use crate::workloads::UnitFactory;
use indicatif::{ProgressBar, ProgressStyle};
use pairbench_core::{
    ConnectionManager, DispatchError, Dispatcher, Pool, SchemaReset, StoreError, Timer,
};
use pairbench_report::{AbortInfo, Measurement, ResultSet};
use thiserror::Error;

/// Where the runner is in its pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    /// Not started
    Idle,
    /// Resetting the schema for entry `index`
    Resetting {
        /// Catalog position
        index: usize,
    },
    /// Timing the batch of entry `index`
    Executing {
        /// Catalog position
        index: usize,
    },
    /// Recording the measurement of entry `index`
    Recording {
        /// Catalog position
        index: usize,
    },
    /// Every entry ran
    Done,
    /// Entry `index` could not run; later entries were skipped
    Aborted {
        /// Catalog position
        index: usize,
    },
}

/// Reason an entry could not produce a measurement
#[derive(Debug, Error)]
pub enum EntryError {
    /// The schema reset failed
    #[error(transparent)]
    Reset(#[from] StoreError),

    /// The worker pool could not be started
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Result of running the catalog
#[derive(Debug)]
pub struct RunOutcome {
    /// Measurements with slowness filled in
    pub results: ResultSet,
    /// Set when the run stopped early
    pub aborted: Option<AbortInfo>,
}

/// Runs a catalog against one connection pool
pub struct Runner<M: ConnectionManager> {
    catalog: Catalog,
    pool: Pool<M>,
    reset: SchemaReset<M>,
    factory: Box<dyn UnitFactory>,
    state: RunnerState,
    show_progress: bool,
}

impl<M: ConnectionManager> Runner<M> {
    /// Runner over `catalog`, resetting through `pool` and building work
    /// units with `factory`.
    pub fn new(catalog: Catalog, pool: Pool<M>, factory: Box<dyn UnitFactory>) -> Self {
        Self {
            catalog,
            reset: SchemaReset::new(pool.clone()),
            pool,
            factory,
            state: RunnerState::Idle,
            show_progress: true,
        }
    }

    /// Show or hide the progress bar.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Current pipeline state.
    pub fn state(&self) -> RunnerState {
        self.state
    }

    fn transition(&mut self, next: RunnerState) {
        tracing::debug!(from = ?self.state, to = ?next, "runner transition");
        self.state = next;
    }

    fn progress_bar(&self) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(self.catalog.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb
    }

    /// Run every entry in order.
    pub fn run(&mut self) -> RunOutcome {
        self.transition(RunnerState::Idle);
        let pb = self.progress_bar();
        let mut results = ResultSet::new();
        let mut aborted = None;

        let entries = self.catalog.entries().to_vec();
        for (index, entry) in entries.iter().enumerate() {
            pb.set_message(entry.name.clone());
            match self.run_entry(index, entry) {
                Ok(measurement) => results.record_measurement(measurement),
                Err(e) => {
                    tracing::error!(entry = %entry.name, error = %e, "aborting run");
                    self.transition(RunnerState::Aborted { index });
                    aborted = Some(AbortInfo {
                        entry: entry.name.clone(),
                        reason: e.to_string(),
                    });
                    break;
                }
            }
            pb.inc(1);
        }

        results.compute_slowness();
        if aborted.is_none() {
            self.transition(RunnerState::Done);
            pb.finish_with_message("Complete");
        } else {
            pb.abandon_with_message("Aborted");
        }

        RunOutcome { results, aborted }
    }

    fn run_entry(
        &mut self,
        index: usize,
        entry: &BenchmarkEntry,
    ) -> Result<Measurement, EntryError> {
        self.transition(RunnerState::Resetting { index });
        let rows = self.reset.reset(entry.seed_rows)?;
        tracing::info!(entry = %entry.name, seeded_rows = rows, "starting entry");

        let unit = self.factory.build(entry);
        let dispatcher = Dispatcher::new(entry.concurrency)?;
        self.pool.reset_peak();

        self.transition(RunnerState::Executing { index });
        let (summary, elapsed) =
            Timer::time(|| dispatcher.dispatch_repeated(&unit, entry.invocations));
        drop(dispatcher);

        self.transition(RunnerState::Recording { index });
        let stats = self.pool.stats();
        tracing::info!(
            entry = %entry.name,
            seconds = elapsed.as_secs_f64(),
            completed = summary.completed,
            failed = summary.failed,
            peak_in_flight = summary.peak_in_flight,
            peak_connections = stats.peak_checked_out,
            "finished entry"
        );
        if summary.failed > 0 {
            tracing::warn!(
                entry = %entry.name,
                failed = summary.failed,
                submitted = summary.submitted,
                "invocations failed"
            );
        }

        Ok(Measurement::new(entry.name.clone(), elapsed)
            .with_pair(entry.pair_id.clone())
            .with_invocations(
                summary.submitted,
                summary.failed,
                summary.first_error.map(|e| e.to_string()),
            ))
    }
}
