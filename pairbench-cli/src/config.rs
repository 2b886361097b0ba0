//! Configuration loading from pairbench.toml
//!
//! Pairbench configuration can be specified in a `pairbench.toml` file in the project root.
//! The configuration is automatically discovered by walking up from the current directory.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// File name searched for by [`PairbenchConfig::discover`].
pub const CONFIG_FILE: &str = "pairbench.toml";

/// Pairbench configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PairbenchConfig {
    /// Backing store configuration
    #[serde(default)]
    pub store: StoreConfig,
    /// Workload sizing
    #[serde(default)]
    pub workload: WorkloadConfig,
    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,
}

/// Which backing store to benchmark against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StoreBackend {
    /// SQLite database file (default)
    #[default]
    Sqlite,
    /// Process-local store, useful for dry runs and tests
    Memory,
}

/// Backing store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend: "sqlite" or "memory"
    #[serde(default)]
    pub backend: StoreBackend,
    /// Database file for the sqlite backend
    #[serde(default = "default_path")]
    pub path: String,
    /// Connection pool capacity
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// How long a connection waits on a competing writer (e.g., "30s")
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_path(),
            pool_size: default_pool_size(),
            busy_timeout: default_busy_timeout(),
        }
    }
}

fn default_path() -> String {
    "target/pairbench/bench.db".to_string()
}
fn default_pool_size() -> usize {
    25
}
fn default_busy_timeout() -> String {
    "30s".to_string()
}

/// Workload sizing shared by the catalog entries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadConfig {
    /// Rows seeded before select and update entries
    #[serde(default = "default_seed_rows")]
    pub seed_rows: u64,
    /// Invocations per concurrent entry
    #[serde(default = "default_invocations")]
    pub invocations: usize,
    /// Concurrency limit per concurrent entry
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Rows written by the batch entries
    #[serde(default = "default_batch_rows")]
    pub batch_rows: usize,
    /// Seed for reproducible key selection (random when unset)
    #[serde(default)]
    pub key_seed: Option<u64>,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            seed_rows: default_seed_rows(),
            invocations: default_invocations(),
            concurrency: default_concurrency(),
            batch_rows: default_batch_rows(),
            key_seed: None,
        }
    }
}

fn default_seed_rows() -> u64 {
    1_000_000
}
fn default_invocations() -> usize {
    100_000
}
fn default_concurrency() -> usize {
    1000
}
fn default_batch_rows() -> usize {
    100_000
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Default output format: "human" or "json"
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
        }
    }
}

fn default_format() -> String {
    "human".to_string()
}

impl PairbenchConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Try to discover and load configuration by walking up from current directory.
    ///
    /// A file that exists but fails to parse is an error, not a fallback to
    /// defaults.
    pub fn discover() -> anyhow::Result<Option<Self>> {
        let mut dir = std::env::current_dir()?;
        loop {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.exists() {
                tracing::debug!(path = %config_path.display(), "loading configuration");
                return Self::load(&config_path).map(Some);
            }
            if !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    /// Busy timeout as a `Duration`.
    pub fn busy_timeout(&self) -> anyhow::Result<Duration> {
        Self::parse_duration(&self.store.busy_timeout).map(Duration::from_nanos)
    }

    /// Generate a default configuration as TOML string
    pub fn default_toml() -> String {
        r#"# Pairbench Configuration

[store]
# Backing store: "sqlite" or "memory"
backend = "sqlite"
# Database file for the sqlite backend
path = "target/pairbench/bench.db"
# Connection pool capacity
pool_size = 25
# How long a connection waits on a competing writer
busy_timeout = "30s"

[workload]
# Rows seeded before the select and update entries
seed_rows = 1000000
# Invocations per concurrent entry
invocations = 100000
# Concurrency limit per concurrent entry
concurrency = 1000
# Rows written by the batch entries
batch_rows = 100000
# Seed for reproducible key selection (uncomment to enable)
# key_seed = 42

[output]
# Default output format: human, json
format = "human"
"#
        .to_string()
    }

    /// Parse duration string (e.g., "3s", "500ms", "2m") to nanoseconds
    pub fn parse_duration(s: &str) -> anyhow::Result<u64> {
        let s = s.trim();
        if s.is_empty() {
            return Err(anyhow::anyhow!("Empty duration string"));
        }

        let (num_part, unit_part) = s
            .char_indices()
            .find(|(_, c)| c.is_alphabetic())
            .map(|(i, _)| s.split_at(i))
            .unwrap_or((s, "s"));

        let value: f64 = num_part
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid duration number: {}", num_part))?;
        if !value.is_finite() || value < 0.0 {
            return Err(anyhow::anyhow!("Invalid duration: {}", s));
        }

        let multiplier: u64 = match unit_part.to_lowercase().as_str() {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" | "" => 1_000_000_000,
            "m" | "min" => 60_000_000_000,
            _ => return Err(anyhow::anyhow!("Unknown duration unit: {}", unit_part)),
        };

        Ok((value * multiplier as f64) as u64)
    }
}
