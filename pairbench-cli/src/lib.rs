#![warn(missing_docs)]
//! Pairbench CLI Library
//!
//! Wires configuration, the backing store, the benchmark catalog and the
//! reporters into the `pairbench` binary.
//!
//! ```text
//! pairbench.toml ─► PairbenchConfig ─► Pool<M> ─► Runner ─► Report ─► stdout
//!                                          ▲         │
//!                               SchemaReset┘         └► Dispatcher(WorkUnit)
//! ```
//!
//! Logs and the progress bar go to stderr; stdout carries only the report.

mod catalog;
mod config;
mod formatting;
mod metadata;
mod runner;
mod workloads;

pub use catalog::{Access, BenchmarkEntry, Catalog, CatalogError, Operation, PairRole};
pub use config::*;
pub use formatting::format_human_output;
pub use metadata::build_report_meta;
pub use runner::{EntryError, RunOutcome, Runner, RunnerState};
pub use workloads::{StoreWorkloads, UPDATED_LONG_VAL, UnitFactory, batch_records};

use anyhow::Context;
use clap::Parser;
use pairbench_core::{
    ConnectionManager, KeyGenerator, MemoryManager, Pool, RandomKeys, SeededKeys,
};
use pairbench_report::{OutputFormat, Report, generate_json_report};
use pairbench_sqlite::SqliteManager;
use std::path::PathBuf;
use std::sync::Arc;

/// Pairbench CLI arguments
#[derive(Parser, Debug, Default)]
#[command(name = "pairbench")]
#[command(author, version, about = "Pairbench - driver versus mapper data-access benchmarks")]
pub struct Cli {
    /// Configuration file (default: discover pairbench.toml upwards from the current directory)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output format: human, json (overrides the configuration file)
    #[arg(long)]
    pub format: Option<String>,

    /// Dry run - print the catalog without executing
    #[arg(long)]
    pub dry_run: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every catalog entry ran (or the catalog was only listed)
    Completed,
    /// A schema reset failed and the remaining entries were skipped
    Aborted,
}

/// Run the Pairbench CLI with the process arguments.
pub fn run() -> anyhow::Result<RunStatus> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Run the Pairbench CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<RunStatus> {
    // Initialize logging; stdout is reserved for the report
    let filter = if cli.verbose {
        "pairbench=debug"
    } else {
        "pairbench=info"
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let config = load_config(&cli)?;
    let format: OutputFormat = cli
        .format
        .as_deref()
        .unwrap_or(&config.output.format)
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let report = match config.store.backend {
        StoreBackend::Memory => execute(MemoryManager::new(), &cli, &config)?,
        StoreBackend::Sqlite => execute(sqlite_manager(&config)?, &cli, &config)?,
    };

    let Some(report) = report else {
        return Ok(RunStatus::Completed);
    };

    let output = match format {
        OutputFormat::Human => format_human_output(&report),
        OutputFormat::Json => generate_json_report(&report)?,
    };
    println!("{}", output);

    Ok(if report.is_complete() {
        RunStatus::Completed
    } else {
        RunStatus::Aborted
    })
}

/// Explicit `--config` wins; otherwise discover, otherwise defaults.
fn load_config(cli: &Cli) -> anyhow::Result<PairbenchConfig> {
    match &cli.config {
        Some(path) => PairbenchConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(PairbenchConfig::discover()?.unwrap_or_default()),
    }
}

fn sqlite_manager(config: &PairbenchConfig) -> anyhow::Result<SqliteManager> {
    let path = PathBuf::from(&config.store.path);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    Ok(SqliteManager::new(path).with_busy_timeout(config.busy_timeout()?))
}

fn key_generator(config: &PairbenchConfig) -> Arc<dyn KeyGenerator> {
    match config.workload.key_seed {
        Some(seed) => Arc::new(SeededKeys::new(seed)),
        None => Arc::new(RandomKeys),
    }
}

/// Run (or list) the standard catalog against `manager`. Returns `None` for
/// a dry run.
fn execute<M: ConnectionManager>(
    manager: M,
    cli: &Cli,
    config: &PairbenchConfig,
) -> anyhow::Result<Option<Report>> {
    let catalog = Catalog::standard(&config.workload);
    let backend = manager.describe();

    if cli.dry_run {
        list_catalog(&catalog, &backend);
        return Ok(None);
    }

    tracing::info!(
        backend = %backend,
        entries = catalog.len(),
        pool_size = config.store.pool_size,
        "starting session"
    );
    let meta = build_report_meta(config, backend);

    let pool = Pool::new(manager, config.store.pool_size);
    let workloads = StoreWorkloads::new(
        pool.clone(),
        key_generator(config),
        config.workload.batch_rows,
    );
    let mut runner = Runner::new(catalog, pool, Box::new(workloads));
    let outcome = runner.run();

    Ok(Some(Report {
        meta,
        measurements: outcome.results.into_measurements(),
        aborted: outcome.aborted,
    }))
}

fn list_catalog(catalog: &Catalog, backend: &str) {
    println!("Pairbench Plan:");

    let mut current_pair: Option<&str> = None;
    for entry in catalog.entries() {
        if current_pair != Some(entry.pair_id.as_str()) {
            println!("├── pair: {}", entry.pair_id);
            current_pair = Some(entry.pair_id.as_str());
        }
        let seed = entry
            .seed_rows
            .map(|n| format!("seed {}", n))
            .unwrap_or_else(|| "empty table".to_string());
        println!(
            "│   ├── {} ({}, {} invocations at concurrency {}, {})",
            entry.name, entry.access, entry.invocations, entry.concurrency, seed
        );
    }

    println!("{} entries, backend: {}", catalog.len(), backend);
}
