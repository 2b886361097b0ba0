//! Measurements and Pairwise Slowness
//!
//! A `ResultSet` keeps measurements in execution order, which is also the
//! display order. Slowness is filled in by a separate pass once every
//! measurement exists:
//!
//! ```text
//! tagged    (pair_id = Some(p)):  candidate / first earlier measurement tagged p
//! untagged  (pair_id = None):     index 2k+1 / index 2k
//! ```
//!
//! Anything without a usable baseline (odd tail, zero or non-finite baseline
//! duration) keeps `slowness = None`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing of one benchmark entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Display name
    pub name: String,
    /// Comparative pair this entry belongs to
    pub pair_id: Option<String>,
    /// Wall-clock seconds for the whole batch
    pub duration_seconds: f64,
    /// Ratio against the pair's baseline, e.g. `"2.5x"`
    pub slowness: Option<String>,
    /// Invocations submitted
    pub invocations: usize,
    /// Invocations that failed
    pub failures: usize,
    /// Message of the first failure
    pub first_error: Option<String>,
}

impl Measurement {
    /// Untagged measurement with no invocation accounting.
    pub fn new(name: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            pair_id: None,
            duration_seconds: duration.as_secs_f64(),
            slowness: None,
            invocations: 0,
            failures: 0,
            first_error: None,
        }
    }

    /// Tag with a comparative pair.
    pub fn with_pair(mut self, pair_id: impl Into<String>) -> Self {
        self.pair_id = Some(pair_id.into());
        self
    }

    /// Attach invocation counts.
    pub fn with_invocations(
        mut self,
        invocations: usize,
        failures: usize,
        first_error: Option<String>,
    ) -> Self {
        self.invocations = invocations;
        self.failures = failures;
        self.first_error = first_error;
        self
    }
}

/// Format a ratio as the report shows it: rounded to two decimals, shortest
/// form with at least one fractional digit (`2.0x`, `2.5x`, `1.42x`).
///
/// Exact halves round to even, so `0.125` prints as `0.12x`.
pub fn format_ratio(ratio: f64) -> String {
    let rounded = (ratio * 100.0).round_ties_even() / 100.0;
    format!("{:?}x", rounded)
}

/// Ordered measurements of one session
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    measurements: Vec<Measurement>,
}

impl ResultSet {
    /// Empty result set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an untagged measurement.
    pub fn record(&mut self, name: impl Into<String>, duration: Duration) {
        self.measurements.push(Measurement::new(name, duration));
    }

    /// Append a fully built measurement.
    pub fn record_measurement(&mut self, measurement: Measurement) {
        self.measurements.push(measurement);
    }

    /// Measurements in insertion order.
    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    /// Consume into the measurement list.
    pub fn into_measurements(self) -> Vec<Measurement> {
        self.measurements
    }

    /// Number of measurements.
    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    /// No measurements yet.
    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    fn baseline_of(&self, idx: usize) -> Option<usize> {
        let candidate = &self.measurements[idx];
        match candidate.pair_id.as_deref() {
            Some(pair) => self.measurements[..idx]
                .iter()
                .position(|m| m.pair_id.as_deref() == Some(pair)),
            None => (idx % 2 == 1 && self.measurements[idx - 1].pair_id.is_none())
                .then(|| idx - 1),
        }
    }

    /// Fill in `slowness` for every candidate. Safe to call repeatedly.
    pub fn compute_slowness(&mut self) {
        for idx in 0..self.measurements.len() {
            let slowness = self.baseline_of(idx).and_then(|base| {
                let baseline = &self.measurements[base];
                let candidate = &self.measurements[idx];
                let ratio = candidate.duration_seconds / baseline.duration_seconds;
                if baseline.duration_seconds > 0.0 && ratio.is_finite() {
                    Some(format_ratio(ratio))
                } else {
                    tracing::warn!(
                        baseline = %baseline.name,
                        candidate = %candidate.name,
                        baseline_seconds = baseline.duration_seconds,
                        "unusable baseline duration, slowness left unset"
                    );
                    None
                }
            });
            self.measurements[idx].slowness = slowness;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    fn slowness(results: &ResultSet) -> Vec<Option<&str>> {
        results
            .measurements()
            .iter()
            .map(|m| m.slowness.as_deref())
            .collect()
    }

    #[test]
    fn test_positional_pairing() {
        let mut results = ResultSet::new();
        for (name, d) in [("a", 2.0), ("b", 4.0), ("c", 1.0), ("d", 3.0)] {
            results.record(name, secs(d));
        }
        results.compute_slowness();
        assert_eq!(slowness(&results), [None, Some("2.0x"), None, Some("3.0x")]);
    }

    #[test]
    fn test_compute_slowness_is_idempotent() {
        let mut results = ResultSet::new();
        for (name, d) in [("a", 1.3), ("b", 1.9), ("c", 0.7)] {
            results.record(name, secs(d));
        }
        results.compute_slowness();
        let first = results.measurements().to_vec();
        results.compute_slowness();
        assert_eq!(results.measurements(), first.as_slice());
    }

    #[test]
    fn test_odd_tail_has_no_slowness() {
        let mut results = ResultSet::new();
        for (name, d) in [("a", 1.0), ("b", 2.0), ("c", 3.0)] {
            results.record(name, secs(d));
        }
        results.compute_slowness();
        assert_eq!(results.measurements()[2].slowness, None);
    }

    #[test]
    fn test_explicit_pairing_ignores_position() {
        let mut results = ResultSet::new();
        results.record_measurement(Measurement::new("solo", secs(5.0)).with_pair("solo"));
        results.record_measurement(Measurement::new("driver", secs(2.0)).with_pair("select"));
        results.record_measurement(Measurement::new("mapper", secs(3.0)).with_pair("select"));
        results.compute_slowness();
        assert_eq!(slowness(&results), [None, None, Some("1.5x")]);
    }

    #[test]
    fn test_zero_baseline_leaves_slowness_unset() {
        let mut results = ResultSet::new();
        results.record("a", Duration::ZERO);
        results.record("b", secs(1.0));
        results.compute_slowness();
        assert_eq!(results.measurements()[1].slowness, None);
    }

    #[test]
    fn test_format_ratio() {
        assert_eq!(format_ratio(2.0), "2.0x");
        assert_eq!(format_ratio(2.5), "2.5x");
        assert_eq!(format_ratio(1.4199), "1.42x");
        assert_eq!(format_ratio(0.333), "0.33x");
        assert_eq!(format_ratio(10.0), "10.0x");
    }

    #[test]
    fn test_format_ratio_halves_round_to_even() {
        assert_eq!(format_ratio(0.125), "0.12x");
        assert_eq!(format_ratio(0.375), "0.38x");
        assert_eq!(format_ratio(1.125), "1.12x");
    }
}
