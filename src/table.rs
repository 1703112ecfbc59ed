//! Plain-text table rendering for console output.

use std::{borrow::Cow, fmt::Write as _, iter};

use itertools::Itertools;

use crate::dataset::Dataset;

/// Renders the first `limit` rows of `dataset` as an aligned text table.
///
/// Absent cells are shown blank.
pub fn render_dataset(dataset: &Dataset, limit: usize) -> String {
    let rows = dataset
        .head(limit)
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| cell.as_ref().map(|v| v.as_display()).unwrap_or_default())
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    render_table(dataset.columns(), &rows)
}

/// Lays out `rows` under `headers` in space-separated, left-aligned columns
/// with a dashed rule below the header line.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let widths = column_widths(headers, rows);
    let rule = widths.iter().map(|width| "-".repeat(*width)).collect::<Vec<_>>();

    let mut output = String::new();
    let lines = iter::once(headers)
        .chain(iter::once(rule.as_slice()))
        .chain(rows.iter().map(Vec::as_slice));
    for line in lines {
        let _ = writeln!(output, "{}", format_line(line, &widths));
    }
    output
}

fn column_widths(headers: &[String], rows: &[Vec<String>]) -> Vec<usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, header)| {
            rows.iter()
                .filter_map(|row| row.get(idx))
                .map(|cell| flatten_whitespace(cell).chars().count())
                .fold(header.chars().count(), usize::max)
                .max(3)
        })
        .collect()
}

fn format_line(values: &[String], widths: &[usize]) -> String {
    let line = values
        .iter()
        .zip(widths)
        .map(|(value, &width)| format!("{:<width$}", flatten_whitespace(value)))
        .join("  ");
    line.trim_end().to_string()
}

// Descriptions occasionally carry embedded line breaks.
fn flatten_whitespace(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
