//! Bounded-Concurrency Dispatch
//!
//! Runs a batch of work unit invocations on a dedicated pool of exactly `C`
//! OS threads, so at most `C` invocations are ever in flight. Jobs are
//! submitted in FIFO order through a rayon `scope_fifo`; completion order is
//! whatever the workers produce.
//!
//! ## Failure handling
//!
//! Every invocation runs under `catch_unwind`. An `Err` or a panic is counted
//! as a failed invocation and the rest of the batch continues. Nothing is
//! retried. `dispatch` returns only once every submitted invocation has
//! finished.
//!
//! ## Lifecycle
//!
//! A `Dispatcher` is built for one batch and dropped right after. Dropping
//! it shuts the worker pool down and blocks until every worker thread has
//! run its exit handler, so no thread of one entry outlives it into the
//! next. Connections are owned by the work units themselves (pool
//! checkouts), never by the dispatcher.

use crate::error::OpError;
use crate::workunit::WorkUnit;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use thiserror::Error;

/// Failure to set up the worker pool.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The OS refused to start the worker threads.
    #[error("failed to build worker pool with {threads} threads: {source}")]
    PoolBuild {
        /// Requested thread count
        threads: usize,
        /// Underlying rayon error
        #[source]
        source: rayon::ThreadPoolBuildError,
    },
}

/// Outcome of one dispatched batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Invocations submitted
    pub submitted: usize,
    /// Invocations that returned `Ok`
    pub completed: usize,
    /// Invocations that returned `Err` or panicked
    pub failed: usize,
    /// Highest number of invocations observed running at once
    pub peak_in_flight: usize,
    /// First failure observed, if any
    pub first_error: Option<OpError>,
}

impl DispatchSummary {
    /// Every submitted invocation finished, one way or the other.
    pub fn is_complete(&self) -> bool {
        self.completed + self.failed == self.submitted
    }
}

/// In-flight gauge: current and peak concurrent invocations.
#[derive(Default)]
struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

struct InFlightGuard<'a>(&'a InFlight);

impl InFlight {
    fn enter(&self) -> InFlightGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak.fetch_max(now, Ordering::AcqRel);
        InFlightGuard(self)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::AcqRel);
    }
}

#[derive(Default)]
struct Tally {
    completed: AtomicUsize,
    failed: AtomicUsize,
    first_error: Mutex<Option<OpError>>,
}

impl Tally {
    fn record(&self, unit: &WorkUnit, outcome: Result<(), OpError>) {
        match outcome {
            Ok(()) => {
                self.completed.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                let prior = self.failed.fetch_add(1, Ordering::Relaxed);
                let unit = unit.name();
                if prior == 0 {
                    tracing::warn!(unit, error = %err, "work unit invocation failed");
                } else {
                    tracing::trace!(unit, error = %err, "work unit invocation failed");
                }
                if let Ok(mut slot) = self.first_error.lock() {
                    slot.get_or_insert(err);
                }
            }
        }
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Worker threads that have not yet exited.
struct LiveWorkers {
    remaining: Mutex<usize>,
    all_exited: Condvar,
}

impl LiveWorkers {
    fn new(count: usize) -> Self {
        Self {
            remaining: Mutex::new(count),
            all_exited: Condvar::new(),
        }
    }

    fn exited(&self) {
        if let Ok(mut remaining) = self.remaining.lock() {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                self.all_exited.notify_all();
            }
        }
    }

    fn wait(&self) {
        let Ok(mut remaining) = self.remaining.lock() else {
            return;
        };
        while *remaining > 0 {
            remaining = match self.all_exited.wait(remaining) {
                Ok(guard) => guard,
                Err(_) => return,
            };
        }
    }
}

/// Worker pool that executes batches with a fixed concurrency limit
pub struct Dispatcher {
    concurrency: usize,
    /// `None` only while dropping
    pool: Option<ThreadPool>,
    live: Arc<LiveWorkers>,
}

impl Dispatcher {
    /// Build a pool of `concurrency` worker threads. `0` is treated as `1`.
    pub fn new(concurrency: usize) -> Result<Self, DispatchError> {
        let concurrency = concurrency.max(1);
        let live = Arc::new(LiveWorkers::new(concurrency));
        let on_exit = Arc::clone(&live);
        let pool = ThreadPoolBuilder::new()
            .num_threads(concurrency)
            .thread_name(|i| format!("pairbench-worker-{i}"))
            .exit_handler(move |_| on_exit.exited())
            .build()
            .map_err(|source| DispatchError::PoolBuild {
                threads: concurrency,
                source,
            })?;
        Ok(Self {
            concurrency,
            pool: Some(pool),
            live,
        })
    }

    /// Configured concurrency limit.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Invoke every unit in `units` and wait for all of them.
    pub fn dispatch<'a, I>(&self, units: I) -> DispatchSummary
    where
        I: IntoIterator<Item = &'a WorkUnit>,
        I::IntoIter: Send,
    {
        let Some(pool) = self.pool.as_ref() else {
            return DispatchSummary::default();
        };
        let in_flight = InFlight::default();
        let tally = Tally::default();
        let mut submitted = 0usize;

        {
            let in_flight = &in_flight;
            let tally = &tally;
            let submitted = &mut submitted;
            let units = units.into_iter();

            pool.scope_fifo(move |scope| {
                for unit in units {
                    *submitted += 1;
                    scope.spawn_fifo(move |_| {
                        let _guard = in_flight.enter();
                        let outcome =
                            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                                unit.invoke()
                            }))
                            .unwrap_or_else(|panic| Err(OpError::Panicked(panic_message(panic))));
                        tally.record(unit, outcome);
                    });
                }
            });
        }

        let summary = DispatchSummary {
            submitted,
            completed: tally.completed.load(Ordering::Acquire),
            failed: tally.failed.load(Ordering::Acquire),
            peak_in_flight: in_flight.peak.load(Ordering::Acquire),
            first_error: tally.first_error.into_inner().ok().flatten(),
        };
        tracing::debug!(
            submitted = summary.submitted,
            completed = summary.completed,
            failed = summary.failed,
            peak_in_flight = summary.peak_in_flight,
            concurrency = self.concurrency,
            "batch dispatched"
        );
        summary
    }

    /// Invoke `unit` `invocations` times and wait for all of them.
    pub fn dispatch_repeated(&self, unit: &WorkUnit, invocations: usize) -> DispatchSummary {
        self.dispatch(std::iter::repeat_n(unit, invocations))
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        drop(self.pool.take());
        self.live.wait();
        tracing::trace!(threads = self.concurrency, "worker threads exited");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn sleepy_unit(calls: Arc<AtomicUsize>) -> WorkUnit {
        WorkUnit::new("sleepy", move || {
            calls.fetch_add(1, Ordering::Relaxed);
            std::thread::sleep(Duration::from_millis(1));
            Ok(())
        })
    }

    #[test]
    fn test_concurrency_bound_holds() {
        for concurrency in [1, 2, 4, 16] {
            for batch in [0, 1, 7, 64] {
                let calls = Arc::new(AtomicUsize::new(0));
                let unit = sleepy_unit(Arc::clone(&calls));
                let dispatcher = Dispatcher::new(concurrency).unwrap();
                let summary = dispatcher.dispatch_repeated(&unit, batch);

                assert_eq!(summary.submitted, batch);
                assert_eq!(summary.completed, batch);
                assert_eq!(calls.load(Ordering::Relaxed), batch);
                assert!(
                    summary.peak_in_flight <= concurrency,
                    "peak {} exceeded limit {}",
                    summary.peak_in_flight,
                    concurrency
                );
            }
        }
    }

    #[test]
    fn test_parallelism_is_actually_used() {
        let unit = WorkUnit::new("wait", || {
            std::thread::sleep(Duration::from_millis(20));
            Ok(())
        });
        let dispatcher = Dispatcher::new(4).unwrap();
        let summary = dispatcher.dispatch_repeated(&unit, 16);
        assert!(summary.peak_in_flight > 1);
    }

    #[test]
    fn test_failures_do_not_stop_siblings() {
        let counter = Arc::new(AtomicUsize::new(0));
        let unit = WorkUnit::new("flaky", move || {
            let i = counter.fetch_add(1, Ordering::Relaxed);
            if i % 3 == 0 {
                Err(OpError::NotFound(i as i64))
            } else {
                Ok(())
            }
        });

        let dispatcher = Dispatcher::new(3).unwrap();
        let summary = dispatcher.dispatch_repeated(&unit, 30);

        assert_eq!(summary.submitted, 30);
        assert_eq!(summary.failed, 10);
        assert_eq!(summary.completed, 20);
        assert!(summary.is_complete());
        assert!(matches!(summary.first_error, Some(OpError::NotFound(_))));
    }

    #[test]
    fn test_panics_are_counted_not_propagated() {
        let unit = WorkUnit::new("boom", || panic!("exploded"));
        let ok = WorkUnit::new("ok", || Ok(()));
        let batch = [ok.clone(), unit, ok];

        let dispatcher = Dispatcher::new(2).unwrap();
        let summary = dispatcher.dispatch(batch.iter());

        assert_eq!(summary.completed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(
            summary.first_error,
            Some(OpError::Panicked("exploded".to_string()))
        );
    }

    #[test]
    fn test_drop_waits_for_worker_threads() {
        let dispatcher = Dispatcher::new(8).unwrap();
        let live = Arc::clone(&dispatcher.live);
        let unit = WorkUnit::new("noop", || Ok(()));
        dispatcher.dispatch_repeated(&unit, 32);

        drop(dispatcher);
        assert_eq!(*live.remaining.lock().unwrap(), 0);
    }

    #[test]
    fn test_zero_concurrency_means_one() {
        let dispatcher = Dispatcher::new(0).unwrap();
        assert_eq!(dispatcher.concurrency(), 1);
    }
}
