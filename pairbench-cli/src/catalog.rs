//! Benchmark Catalog
//!
//! The fixed, ordered list of benchmark entries a session runs. Entries come
//! in comparative pairs: a baseline (direct driver access) immediately
//! followed by its candidate (the mapper layer doing the same thing).
//!
//! `Catalog::new` validates the ordering so that explicit `pair_id` pairing
//! and positional pairing (index `2k+1` against `2k`) always agree.

use crate::config::WorkloadConfig;
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// How an entry reaches the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Parameterized statements on a pooled session
    Driver,
    /// Through the record-mapping unit of work
    Mapper,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Driver => write!(f, "driver"),
            Access::Mapper => write!(f, "mapper"),
        }
    }
}

/// The logical operation an entry performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Look up one random seeded row per invocation
    ConcurrentSelect,
    /// Rewrite `long_val` of one random seeded row per invocation
    ConcurrentUpdate,
    /// Insert `batch_rows` rows in a single transaction
    BatchAdd,
    /// Insert one row per invocation
    ConcurrentAdd,
}

/// Position of an entry within its pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairRole {
    /// Reference timing
    Baseline,
    /// Timing compared against the baseline
    Candidate,
}

/// One catalog entry. Immutable once the catalog is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkEntry {
    /// Display name, unique within the catalog
    pub name: String,
    /// Shared by the baseline and candidate of one pair
    pub pair_id: String,
    /// Baseline or candidate
    pub role: PairRole,
    /// Driver or mapper access
    pub access: Access,
    /// What each invocation does
    pub operation: Operation,
    /// Rows seeded by the schema reset; `None` leaves the table empty
    pub seed_rows: Option<u64>,
    /// Times the work unit is invoked
    pub invocations: usize,
    /// Maximum invocations in flight
    pub concurrency: usize,
}

/// Catalog ordering violation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    /// Two entries share a name
    #[error("duplicate entry name '{0}'")]
    DuplicateName(String),

    /// A baseline at an odd index or a candidate at an even one
    #[error("entry '{name}' at index {index} must be a {expected:?}")]
    RoleOutOfOrder {
        /// Offending entry
        name: String,
        /// Its catalog position
        index: usize,
        /// Role required at that position
        expected: PairRole,
    },

    /// A candidate follows a baseline from another pair
    #[error("candidate '{candidate}' does not share pair_id with baseline '{baseline}'")]
    PairMismatch {
        /// Preceding baseline
        baseline: String,
        /// Mismatched candidate
        candidate: String,
    },

    /// Two pairs use the same `pair_id`
    #[error("pair_id '{0}' is used by more than one pair")]
    DuplicatePair(String),
}

/// Validated, ordered benchmark entries
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<BenchmarkEntry>,
}

impl Catalog {
    /// Validate and build a catalog.
    ///
    /// Baselines sit at even indices and their candidate directly after with
    /// the same `pair_id`. Only the last entry may be a lone baseline.
    pub fn new(entries: Vec<BenchmarkEntry>) -> Result<Self, CatalogError> {
        let mut names = HashSet::new();
        let mut pairs = HashSet::new();

        for (index, entry) in entries.iter().enumerate() {
            if !names.insert(entry.name.as_str()) {
                return Err(CatalogError::DuplicateName(entry.name.clone()));
            }

            let expected = if index % 2 == 0 {
                PairRole::Baseline
            } else {
                PairRole::Candidate
            };
            if entry.role != expected {
                return Err(CatalogError::RoleOutOfOrder {
                    name: entry.name.clone(),
                    index,
                    expected,
                });
            }

            match entry.role {
                PairRole::Baseline => {
                    if !pairs.insert(entry.pair_id.as_str()) {
                        return Err(CatalogError::DuplicatePair(entry.pair_id.clone()));
                    }
                    if index + 1 == entries.len() {
                        tracing::debug!(entry = %entry.name, "trailing baseline has no candidate");
                    }
                }
                PairRole::Candidate => {
                    let baseline = &entries[index - 1];
                    if baseline.pair_id != entry.pair_id {
                        return Err(CatalogError::PairMismatch {
                            baseline: baseline.name.clone(),
                            candidate: entry.name.clone(),
                        });
                    }
                }
            }
        }

        Ok(Self { entries })
    }

    /// The standard eight-entry driver-versus-mapper catalog.
    pub fn standard(workload: &WorkloadConfig) -> Self {
        use Access::*;
        use Operation::*;

        let seeded = Some(workload.seed_rows);
        let layout = [
            ("Driver Concurrent Select", "select", Driver, ConcurrentSelect, seeded),
            ("Mapper Concurrent Select", "select", Mapper, ConcurrentSelect, seeded),
            ("Driver Concurrent Update", "update", Driver, ConcurrentUpdate, seeded),
            ("Mapper Concurrent Update", "update", Mapper, ConcurrentUpdate, seeded),
            ("Driver Batch Add", "batch-add", Driver, BatchAdd, None),
            ("Mapper Batch Add", "batch-add", Mapper, BatchAdd, None),
            ("Driver Concurrent Add", "concurrent-add", Driver, ConcurrentAdd, None),
            ("Mapper Concurrent Add", "concurrent-add", Mapper, ConcurrentAdd, None),
        ];

        let entries = layout
            .into_iter()
            .map(|(name, pair, access, operation, seed_rows)| {
                // A single batch insert per entry; the batch itself is the workload.
                let (invocations, concurrency) = match operation {
                    BatchAdd => (1, 1),
                    _ => (workload.invocations, workload.concurrency),
                };
                BenchmarkEntry {
                    name: name.to_string(),
                    pair_id: pair.to_string(),
                    role: match access {
                        Driver => PairRole::Baseline,
                        Mapper => PairRole::Candidate,
                    },
                    access,
                    operation,
                    seed_rows,
                    invocations,
                    concurrency,
                }
            })
            .collect();

        Self { entries }
    }

    /// Entries in execution order.
    pub fn entries(&self) -> &[BenchmarkEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
