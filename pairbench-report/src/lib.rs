#![warn(missing_docs)]
//! Pairbench Report - Results and Output
//!
//! Collects one measurement per benchmark entry and renders them:
//! - fixed-column table (`Method | Duration | Slowness`)
//! - JSON (machine-readable, pretty-printed)
//!
//! Relative slowness is derived after the fact by pairing each candidate
//! measurement with its baseline.

mod json;
mod report;
mod results;
mod table;

pub use json::generate_json_report;
pub use report::{AbortInfo, Report, ReportConfig, ReportMeta, SystemInfo};
pub use results::{Measurement, ResultSet, format_ratio};
pub use table::render_table;

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable terminal output
    #[default]
    Human,
    /// Pretty-printed JSON
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" | "text" => Ok(OutputFormat::Human),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }
}
