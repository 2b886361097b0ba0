//! System Metadata Collection
//!
//! Collects the run context recorded in report metadata: timestamp, OS,
//! architecture, core count, backend description and workload sizing.

use crate::config::PairbenchConfig;
use chrono::Utc;
use pairbench_report::{ReportConfig, ReportMeta, SystemInfo};

/// Build report metadata for a run against `backend`
pub fn build_report_meta(config: &PairbenchConfig, backend: String) -> ReportMeta {
    let system = SystemInfo {
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        cpu_cores: num_cpus(),
    };

    let workload = &config.workload;
    ReportMeta {
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        backend,
        system,
        config: ReportConfig {
            pool_size: config.store.pool_size,
            seed_rows: workload.seed_rows,
            invocations: workload.invocations,
            concurrency: workload.concurrency,
            batch_rows: workload.batch_rows,
            key_seed: workload.key_seed,
        },
    }
}

/// Get number of available CPU cores
fn num_cpus() -> u32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1)
}
