//! Text rendering of the telemetry aggregate.
//!
//! The report has four sections separated by blank lines: run counts, counts
//! per result code, the latency distribution and the memory distribution.
//! Distribution rows stop at the highest bucket that is non-empty in any
//! column, and each table ends with a `max` row.

use std::fmt::Write as _;

use super::accumulator::{MetricSeries, TelemetryState};
use crate::performance::{BYTES_PER_MB, round_bytes_to_mb, round_ms_to_secs};
use crate::result_code::ResultCode;

const COLUMN_GAP: &str = "  ";

/// A column-aligned table. The first column is left-aligned, the rest are
/// right-aligned; every width is the widest cell in that column.
#[derive(Debug, Default)]
struct Table {
    rows: Vec<Vec<String>>,
}

impl Table {
    fn with_header<S: AsRef<str>>(header: &[S]) -> Self {
        let mut table = Self::default();
        table.push(header.iter().map(|h| h.as_ref().to_string()).collect());
        table
    }

    fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    fn write_to(&self, out: &mut String) {
        let columns = self.rows.iter().map(Vec::len).max().unwrap_or(0);
        let widths: Vec<usize> = (0..columns)
            .map(|c| {
                self.rows
                    .iter()
                    .filter_map(|row| row.get(c))
                    .map(|cell| cell.chars().count())
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        for row in &self.rows {
            for (c, cell) in row.iter().enumerate() {
                let width = widths[c];
                if c == 0 {
                    let _ = write!(out, "{cell:<width$}");
                } else {
                    let _ = write!(out, "{COLUMN_GAP}{cell:>width$}");
                }
            }
            out.push('\n');
        }
    }
}

/// Renders the full report.
pub(crate) fn render_state(state: &TelemetryState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Successes: {}", state.success_count);
    let _ = writeln!(out, "Failures: {}", state.failure_count);
    out.push('\n');

    code_table(state).write_to(&mut out);
    out.push('\n');

    distribution_table(
        &["Time (s)", "Total", "Fit", "Sim"],
        &[&state.total_time, &state.fit_time, &state.sim_time],
        |edge| (edge / 1000).to_string(),
        round_ms_to_secs,
    )
    .write_to(&mut out);
    out.push('\n');

    distribution_table(
        &["Memory (MB)", "Fit", "Sim"],
        &[&state.fit_memory, &state.sim_memory],
        |edge| (edge / BYTES_PER_MB).to_string(),
        round_bytes_to_mb,
    )
    .write_to(&mut out);

    out
}

fn code_table(state: &TelemetryState) -> Table {
    let mut table = Table::with_header(&["Result", "Count"]);
    for code in ResultCode::ALL {
        let count = state.per_code_count[code.slot()];
        if count != 0 || code == ResultCode::Success {
            table.push(vec![code.as_str().to_string(), count.to_string()]);
        }
    }
    table
}

fn distribution_table(
    header: &[&str],
    series: &[&MetricSeries],
    edge_label: impl Fn(u64) -> String,
    max_label: impl Fn(u64) -> u64,
) -> Table {
    let mut table = Table::with_header(header);
    let Some(first) = series.first() else {
        return table;
    };
    let edges = first.histogram().edges();

    // Show at least the first bucket so an empty table still has a body.
    let last_row = series
        .iter()
        .filter_map(|s| s.histogram().highest_nonzero())
        .max()
        .unwrap_or(0);

    for row in 0..=last_row {
        let label = edges.get(row).map_or_else(
            || format!(">{}", edges.last().map_or_else(String::new, |e| edge_label(*e))),
            |edge| edge_label(*edge),
        );
        let mut cells = vec![label];
        cells.extend(series.iter().map(|s| s.histogram().counts()[row].to_string()));
        table.push(cells);
    }

    let mut max_row = vec!["max".to_string()];
    max_row.extend(
        series
            .iter()
            .map(|s| s.max().map_or_else(|| "-".to_string(), |m| max_label(m).to_string())),
    );
    table.push(max_row);
    table
}
