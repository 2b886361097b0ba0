//! Fixed-Column Table
//!
//! ```text
//! +--------------------------+----------+----------+
//! | Method                   | Duration | Slowness |
//! +--------------------------+----------+----------+
//! | Driver Concurrent Select | 12.41    | -        |
//! | Mapper Concurrent Select | 30.02    | 2.42x    |
//! +--------------------------+----------+----------+
//! ```

use crate::results::{Measurement, ResultSet};

const HEADERS: [&str; 3] = ["Method", "Duration", "Slowness"];

fn border(widths: &[usize; 3]) -> String {
    let mut line = String::from("+");
    for w in widths {
        line.push_str(&"-".repeat(w + 2));
        line.push('+');
    }
    line
}

fn row(cells: &[&str; 3], widths: &[usize; 3]) -> String {
    let mut line = String::from("|");
    for (cell, w) in cells.iter().zip(widths) {
        line.push_str(&format!(" {:<width$} |", cell, width = w));
    }
    line
}

/// Render measurements as a bordered, left-aligned table. Durations are in
/// seconds with two decimals; unset slowness shows as `-`.
pub fn render_table(measurements: &[Measurement]) -> String {
    let cells: Vec<[String; 3]> = measurements
        .iter()
        .map(|m| {
            [
                m.name.clone(),
                format!("{:.2}", m.duration_seconds),
                m.slowness.clone().unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(|h| h.chars().count());
    for cell in &cells {
        for (w, value) in widths.iter_mut().zip(cell) {
            *w = (*w).max(value.chars().count());
        }
    }

    let sep = border(&widths);
    let mut out = Vec::with_capacity(cells.len() + 4);
    out.push(sep.clone());
    out.push(row(&HEADERS, &widths));
    out.push(sep.clone());
    for cell in &cells {
        out.push(row(&[&cell[0], &cell[1], &cell[2]], &widths));
    }
    out.push(sep);
    out.join("\n")
}

impl ResultSet {
    /// Render the table for every measurement in insertion order.
    pub fn render(&self) -> String {
        render_table(self.measurements())
    }
}
