//! Merging persisted rows with a fresh report and resolving duplicate
//! business keys in memory.

use std::collections::HashSet;

use log::debug;
use thiserror::Error;

use crate::{
    data::{Value, present_text},
    dataset::{Dataset, Row},
    schema::{RECORD, SHIPPED},
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("cannot deduplicate without column [{0}]")]
    MissingColumn(&'static str),
}

/// Concatenates `left` and `right` row-wise after renaming each side's
/// primary-key column to `common_key`.
///
/// The result carries every left column followed by the right-only columns.
/// Left rows come first; cells a side does not have are left empty. No row is
/// dropped or altered.
pub fn merge(
    mut left: Dataset,
    left_key: &str,
    mut right: Dataset,
    right_key: &str,
    common_key: &str,
) -> Dataset {
    left.rename_column(left_key, common_key);
    right.rename_column(right_key, common_key);

    let mut columns = left.columns().to_vec();
    for column in right.columns() {
        if !columns.contains(column) {
            columns.push(column.clone());
        }
    }
    let left_map = column_mapping(&columns, &left);
    let right_map = column_mapping(&columns, &right);
    debug!(
        "Merging {} existing row(s) with {} report row(s) across {} column(s)",
        left.len(),
        right.len(),
        columns.len()
    );

    let rows = project(left.into_rows(), &left_map)
        .chain(project(right.into_rows(), &right_map))
        .collect();
    Dataset::from_rows(columns, rows)
}

fn column_mapping(columns: &[String], source: &Dataset) -> Vec<Option<usize>> {
    columns
        .iter()
        .map(|column| source.column_index(column))
        .collect()
}

fn project(rows: Vec<Row>, mapping: &[Option<usize>]) -> impl Iterator<Item = Row> + '_ {
    rows.into_iter().map(move |mut row| {
        mapping
            .iter()
            .map(|idx| idx.and_then(|i| row.get_mut(i).and_then(Option::take)))
            .collect()
    })
}

/// Keeps one row per business key: the one with the greatest shipped quantity.
///
/// Rows are stably sorted by `Shipped` descending (absent quantities last) and
/// every row after the first for a key is removed, so among equal quantities
/// the first-seen row wins. The dataset is left in that sorted order. Returns
/// the number of rows removed.
pub fn deduplicate(dataset: &mut Dataset) -> Result<usize, ReconcileError> {
    let key = dataset
        .column_index(RECORD)
        .ok_or(ReconcileError::MissingColumn(RECORD))?;
    let shipped = dataset
        .column_index(SHIPPED)
        .ok_or(ReconcileError::MissingColumn(SHIPPED))?;

    let before = dataset.len();
    dataset.sort_rows_by(|a, b| quantity(b, shipped).cmp(&quantity(a, shipped)));
    let mut seen = HashSet::new();
    dataset.retain_rows(|row| seen.insert(present_text(row.get(key).and_then(Option::as_ref))));
    let removed = before - dataset.len();
    debug!("Removed {removed} duplicate row(s) from {before}");
    Ok(removed)
}

fn quantity(row: &Row, idx: usize) -> Option<i64> {
    row.get(idx)
        .and_then(Option::as_ref)
        .and_then(Value::as_i64)
}
