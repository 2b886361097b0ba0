//! Report Data Structures

use crate::results::Measurement;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Complete output of one benchmarking session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Session metadata
    pub meta: ReportMeta,
    /// One measurement per entry that ran, in catalog order
    pub measurements: Vec<Measurement>,
    /// Set when a schema reset failed and the remaining catalog was skipped
    pub aborted: Option<AbortInfo>,
}

impl Report {
    /// Whether every catalog entry ran.
    pub fn is_complete(&self) -> bool {
        self.aborted.is_none()
    }

    /// Measurements with at least one failed invocation.
    pub fn with_failures(&self) -> impl Iterator<Item = &Measurement> {
        self.measurements.iter().filter(|m| m.failures > 0)
    }
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMeta {
    /// Pairbench version
    pub version: String,
    /// Session start
    pub timestamp: DateTime<Utc>,
    /// Backing store description, e.g. `sqlite (target/pairbench/bench.db)`
    pub backend: String,
    /// Host the session ran on
    pub system: SystemInfo,
    /// Effective workload settings
    pub config: ReportConfig,
}

/// Workload configuration captured in report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Connection pool capacity
    pub pool_size: usize,
    /// Rows seeded for select and update entries
    pub seed_rows: u64,
    /// Invocations per concurrent entry
    pub invocations: usize,
    /// Worker threads per concurrent entry
    pub concurrency: usize,
    /// Rows written by each batch entry
    pub batch_rows: usize,
    /// Seed for key selection, if reproducible
    pub key_seed: Option<u64>,
}

/// System information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    /// Operating system
    pub os: String,
    /// CPU architecture
    pub arch: String,
    /// Available parallelism
    pub cpu_cores: u32,
}

/// Where and why a session stopped early
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbortInfo {
    /// Name of the entry whose reset failed
    pub entry: String,
    /// Error message
    pub reason: String,
}

impl std::fmt::Display for AbortInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ABORTED at '{}': {}", self.entry, self.reason)
    }
}
