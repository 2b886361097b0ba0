//! Output Formatting
//!
//! Human-readable output for a finished (or aborted) session:
//! - run metadata header
//! - the `Method | Duration | Slowness` table
//! - notes on failed invocations and the abort line, when present

use pairbench_report::{Report, render_table};

/// Format a report for human-readable terminal display
pub fn format_human_output(report: &Report) -> String {
    let mut output = String::new();
    let meta = &report.meta;

    output.push('\n');
    output.push_str("Pairbench Results\n");
    output.push_str(&"=".repeat(60));
    output.push('\n');
    output.push_str(&format!("backend:    {}\n", meta.backend));
    output.push_str(&format!(
        "timestamp:  {}\n",
        meta.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    output.push_str(&format!(
        "system:     {} {}, {} cores\n",
        meta.system.os, meta.system.arch, meta.system.cpu_cores
    ));
    output.push_str(&format!(
        "workload:   seed_rows={} invocations={} concurrency={} pool_size={} batch_rows={}\n",
        meta.config.seed_rows,
        meta.config.invocations,
        meta.config.concurrency,
        meta.config.pool_size,
        meta.config.batch_rows
    ));
    output.push('\n');

    output.push_str(&render_table(&report.measurements));
    output.push('\n');

    let failures: Vec<_> = report.with_failures().collect();
    if !failures.is_empty() {
        output.push('\n');
        output.push_str("Notes\n");
        output.push_str(&"-".repeat(60));
        output.push('\n');
        for m in failures {
            output.push_str(&format!(
                "  {}: {} of {} invocations failed",
                m.name, m.failures, m.invocations
            ));
            if let Some(err) = &m.first_error {
                output.push_str(&format!(" (first error: {})", err));
            }
            output.push('\n');
        }
    }

    if let Some(aborted) = &report.aborted {
        output.push('\n');
        output.push_str(&aborted.to_string());
        output.push('\n');
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PairbenchConfig;
    use crate::metadata::build_report_meta;
    use pairbench_report::{AbortInfo, Measurement};
    use std::time::Duration;

    fn report(measurements: Vec<Measurement>, aborted: Option<AbortInfo>) -> Report {
        Report {
            meta: build_report_meta(&PairbenchConfig::default(), "memory".to_string()),
            measurements,
            aborted,
        }
    }

    #[test]
    fn test_clean_run_has_no_notes() {
        let out = format_human_output(&report(
            vec![Measurement::new("A", Duration::from_secs(1))],
            None,
        ));
        assert!(out.contains("Pairbench Results"));
        assert!(out.contains("backend:    memory"));
        assert!(out.contains("| A "));
        assert!(!out.contains("Notes"));
        assert!(!out.contains("ABORTED"));
    }

    #[test]
    fn test_failures_and_abort_are_listed() {
        let out = format_human_output(&report(
            vec![
                Measurement::new("Mapper Concurrent Update", Duration::from_secs(3))
                    .with_invocations(100, 7, Some("row 5 not found".to_string())),
            ],
            Some(AbortInfo {
                entry: "Driver Batch Add".to_string(),
                reason: "store unavailable: disk full".to_string(),
            }),
        ));
        assert!(out.contains(
            "Mapper Concurrent Update: 7 of 100 invocations failed (first error: row 5 not found)"
        ));
        assert!(out.contains("ABORTED at 'Driver Batch Add': store unavailable: disk full"));
    }
}
