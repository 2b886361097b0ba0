//! Integration tests for Pairbench
//!
//! These tests run the full catalog end to end against both backends with
//! small workloads.

use pairbench::{
    Catalog, Cli, MemoryManager, Pool, RunStatus, Runner, SeededKeys, SqliteManager,
    StoreWorkloads, run_with_cli,
};
use pairbench_cli::WorkloadConfig;
use pairbench_core::ConnectionManager;
use std::sync::Arc;

fn small_workload() -> WorkloadConfig {
    WorkloadConfig {
        seed_rows: 200,
        invocations: 60,
        concurrency: 8,
        batch_rows: 100,
        key_seed: Some(42),
    }
}

fn run_catalog<M: ConnectionManager>(manager: M) -> pairbench::ResultSet {
    let workload = small_workload();
    let pool = Pool::new(manager, 4);
    let workloads = StoreWorkloads::new(
        pool.clone(),
        Arc::new(SeededKeys::new(42)),
        workload.batch_rows,
    );
    let mut runner = Runner::new(Catalog::standard(&workload), pool, Box::new(workloads))
        .with_progress(false);
    let outcome = runner.run();
    assert!(outcome.aborted.is_none(), "{:?}", outcome.aborted);
    outcome.results
}

fn assert_standard_shape(results: &pairbench::ResultSet) {
    let measurements = results.measurements();
    assert_eq!(measurements.len(), 8);
    for (idx, m) in measurements.iter().enumerate() {
        assert_eq!(m.failures, 0, "{}: {:?}", m.name, m.first_error);
        assert!(m.duration_seconds > 0.0, "{}", m.name);
        if idx % 2 == 0 {
            assert!(m.name.starts_with("Driver"));
            assert_eq!(m.slowness, None);
        } else {
            assert!(m.name.starts_with("Mapper"));
            let slowness = m.slowness.as_deref().unwrap_or_default();
            assert!(slowness.ends_with('x'), "{}: {slowness}", m.name);
        }
    }
    assert_eq!(measurements[4].invocations, 1);
    assert_eq!(measurements[6].invocations, 60);

    let table = results.render();
    assert!(table.contains("| Method"));
    assert!(table.contains("| Mapper Concurrent Add"));
}

/// Full catalog against the in-memory store
#[test]
fn test_full_catalog_memory() {
    let manager = MemoryManager::new();
    let results = run_catalog(manager.clone());
    assert_standard_shape(&results);

    // The last entry leaves one inserted row per invocation behind.
    let rows = manager.snapshot().unwrap();
    assert_eq!(rows.len(), 60);
    assert!(rows.iter().all(|(_, short_val, _)| *short_val == 100));
}

/// Full catalog against a SQLite file
#[test]
fn test_full_catalog_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let manager = SqliteManager::new(dir.path().join("bench.db"));
    let results = run_catalog(manager);
    assert_standard_shape(&results);
}

/// Unreachable database aborts at the first entry
#[test]
fn test_unreachable_sqlite_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let manager = SqliteManager::new(dir.path().join("missing").join("bench.db"));
    let workload = small_workload();
    let pool = Pool::new(manager, 2);
    let workloads = StoreWorkloads::new(pool.clone(), Arc::new(SeededKeys::new(1)), 10);
    let mut runner = Runner::new(Catalog::standard(&workload), pool, Box::new(workloads))
        .with_progress(false);
    let outcome = runner.run();

    assert!(outcome.results.is_empty());
    let aborted = outcome.aborted.unwrap();
    assert_eq!(aborted.entry, "Driver Concurrent Select");
    assert!(aborted.reason.starts_with("store unavailable"));
}

fn write_config(dir: &std::path::Path, extra: &str) -> std::path::PathBuf {
    let path = dir.join("pairbench.toml");
    let body = format!(
        "[store]\nbackend = \"memory\"\npool_size = 2\n\n\
         [workload]\nseed_rows = 50\ninvocations = 10\nconcurrency = 2\nbatch_rows = 20\n\
         key_seed = 1\n\n{extra}"
    );
    std::fs::write(&path, body).unwrap();
    path
}

/// The CLI entry point runs the whole catalog from a configuration file
#[test]
fn test_cli_run_completes() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "[output]\nformat = \"json\"\n");
    let cli = Cli {
        config: Some(config),
        ..Cli::default()
    };
    assert_eq!(run_with_cli(cli).unwrap(), RunStatus::Completed);
}

/// Dry run lists the catalog without touching the store
#[test]
fn test_cli_dry_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "");
    let cli = Cli {
        config: Some(config),
        dry_run: true,
        ..Cli::default()
    };
    assert_eq!(run_with_cli(cli).unwrap(), RunStatus::Completed);
}

/// An unknown output format is a configuration error
#[test]
fn test_cli_rejects_unknown_format() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "");
    let cli = Cli {
        config: Some(config),
        format: Some("xml".to_string()),
        ..Cli::default()
    };
    assert!(run_with_cli(cli).is_err());
}
