//! Plain-text rendering of session output.

use crate::api::{DashboardStats, QueryResult, TableCatalog};
use crate::config::Environment;
use crate::connectivity::ConnectivityState;
use crate::error::ExecutionError;
use crate::session::{ActiveView, ResultDisplay};

/// Widest a grid cell may get before it is truncated.
const MAX_CELL_WIDTH: usize = 40;

/// Columns listed per table in the schema view.
const SCHEMA_PREVIEW_COLUMNS: usize = 5;

const BAR_WIDTH: usize = 30;

pub const NO_RESULTS: &str = "No results to display. Run a query.";

/// Renders the results panel.
pub fn render_display(display: ResultDisplay<'_>) -> String {
    match display {
        ResultDisplay::Error(err) => render_error(err),
        ResultDisplay::Empty => NO_RESULTS.to_string(),
        ResultDisplay::Rows(result) => render_result(result),
    }
}

pub fn render_error(err: &ExecutionError) -> String {
    format!("ERROR: {}", err.message())
}

/// Renders a result as an aligned grid with a summary line.
pub fn render_result(result: &QueryResult) -> String {
    let cells: Vec<Vec<String>> = (0..result.rows.len())
        .map(|i| {
            result
                .columns
                .iter()
                .map(|col| truncate(&result.value(i, col).to_display_string()))
                .collect()
        })
        .collect();

    let headers: Vec<String> = result.columns.iter().map(|c| truncate(c)).collect();
    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(h.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut lines = Vec::with_capacity(cells.len() + 3);
    lines.push(grid_line(&headers, &widths));
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    for row in &cells {
        lines.push(grid_line(row, &widths));
    }
    lines.push(format!(
        "({} rows, {} ms)",
        result.row_count, result.elapsed_ms
    ));
    lines.join("\n")
}

fn grid_line(cells: &[String], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, &w)| format!("{cell:<w$}"))
        .collect::<Vec<_>>()
        .join(" | ")
        .trim_end()
        .to_string()
}

fn truncate(s: &str) -> String {
    if s.chars().count() <= MAX_CELL_WIDTH {
        return s.to_string();
    }
    let mut out: String = s.chars().take(MAX_CELL_WIDTH - 3).collect();
    out.push_str("...");
    out
}

/// Connectivity badge.
pub fn render_badge(state: ConnectivityState) -> String {
    format!("[{}]", state.label())
}

/// Takeover text shown while the backend is offline.
pub fn render_offline_overlay(base_url: &str, environment: Environment) -> String {
    let mut lines = vec![
        "Backend Connection Failed".to_string(),
        format!(
            "Cannot connect to the API server at {base_url}. Please ensure the backend is running."
        ),
    ];
    if environment != Environment::Production {
        lines.push("  uvicorn backend.main:app --reload --port 8000".to_string());
    }
    lines.push("Type /retry to retry the connection.".to_string());
    lines.join("\n")
}

/// Heading for a view.
pub fn render_view_heading(view: ActiveView) -> String {
    format!("== {} ==", view.title())
}

pub fn render_learning() -> String {
    [
        render_view_heading(ActiveView::Learning),
        "Master SQL concepts using real-world CFDI 4.0 data structures.".to_string(),
        "Type a SELECT statement to run it, or /tables to explore the schema.".to_string(),
    ]
    .join("\n")
}

/// Lists tables with their first few columns.
pub fn render_catalog(catalog: &TableCatalog) -> String {
    let mut lines = vec![render_view_heading(ActiveView::Tables)];
    if catalog.is_empty() {
        lines.push("No tables found. Try /seed to generate data.".to_string());
        return lines.join("\n");
    }
    for (table, columns) in catalog {
        lines.push(table.clone());
        for col in columns.iter().take(SCHEMA_PREVIEW_COLUMNS) {
            lines.push(format!("    {} ({})", col.name, col.data_type));
        }
        if columns.len() > SCHEMA_PREVIEW_COLUMNS {
            lines.push(format!(
                "    ... {} more",
                columns.len() - SCHEMA_PREVIEW_COLUMNS
            ));
        }
    }
    lines.join("\n")
}

/// Renders KPIs and a horizontal bar chart of top issuers.
pub fn render_dashboard(stats: &DashboardStats) -> String {
    let kpis = &stats.kpis;
    let mut lines = vec![
        render_view_heading(ActiveView::Dashboard),
        format!(
            "Total Comprobantes: {}",
            compact_number(kpis.total_docs as f64)
        ),
        format!("Monto Facturado:    ${}", compact_number(kpis.total_amount)),
        format!(
            "Vigentes:           {} (of {})",
            compact_number(kpis.vigentes as f64),
            kpis.total_docs
        ),
    ];

    if !stats.top_emisores.is_empty() {
        lines.push(String::new());
        lines.push("Top Emisores".to_string());
        let max = stats
            .top_emisores
            .iter()
            .map(|e| e.value)
            .fold(0.0_f64, f64::max);
        let name_width = stats
            .top_emisores
            .iter()
            .map(|e| e.name.chars().count())
            .max()
            .unwrap_or(0);
        let bar_width = BAR_WIDTH;
        for emisor in &stats.top_emisores {
            let filled = if max > 0.0 {
                ((emisor.value / max) * bar_width as f64).round() as usize
            } else {
                0
            };
            lines.push(format!(
                "  {:<name_width$}  {:<bar_width$}  {}",
                emisor.name,
                "#".repeat(filled),
                compact_number(emisor.value)
            ));
        }
    }
    lines.join("\n")
}

/// Formats a number in short form: `999`, `1.2K`, `3.4M`, `5B`, `1T`.
///
/// At most one fractional digit is kept and trailing zeros are dropped.
pub fn compact_number(value: f64) -> String {
    const UNITS: [(f64, &str); 4] = [(1e3, "K"), (1e6, "M"), (1e9, "B"), (1e12, "T")];

    if !value.is_finite() {
        return value.to_string();
    }
    let sign = if value < 0.0 { "-" } else { "" };
    let abs = value.abs();

    let mut unit_index: Option<usize> = UNITS.iter().rposition(|(div, _)| abs >= *div);
    loop {
        let scaled = match unit_index {
            Some(i) => abs / UNITS[i].0,
            None => abs,
        };
        let rounded = (scaled * 10.0).round() / 10.0;
        let next = unit_index.map_or(0, |i| i + 1);
        if rounded >= 1000.0 && next < UNITS.len() {
            unit_index = Some(next);
            continue;
        }
        let suffix = unit_index.map_or("", |i| UNITS[i].1);
        return format!("{sign}{}{suffix}", trim_fraction(rounded));
    }
}

fn trim_fraction(value: f64) -> String {
    let text = format!("{value:.1}");
    text.strip_suffix(".0").map(str::to_string).unwrap_or(text)
}
