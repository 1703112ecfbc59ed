//! Business key ("Record") derivation.

use log::trace;

use crate::{
    data::{Value, present_text},
    dataset::{Dataset, Row},
    schema::{ACCOUNT, INVOICE, ITEM, RECORD, SchemaError},
};

const KEY_SEPARATOR: char = '.';

pub fn business_key(account: &str, invoice: &str, item: &str) -> String {
    format!("{account}{KEY_SEPARATOR}{invoice}{KEY_SEPARATOR}{item}")
}

/// Sets the `Record` column of every row from its account, invoice and item.
///
/// Must run after sanitization so that identifier artifacts are already
/// stripped. The column is inserted first when absent; existing keys are
/// recomputed, so calling this twice yields the same keys.
pub fn assign_business_keys(dataset: &mut Dataset) -> Result<(), SchemaError> {
    let missing = [ACCOUNT, INVOICE, ITEM]
        .into_iter()
        .filter(|name| !dataset.has_column(name))
        .map(str::to_string)
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(SchemaError::MissingColumns { missing });
    }

    if !dataset.has_column(RECORD) {
        dataset.insert_column(0, RECORD);
    }
    let [Some(record), Some(account), Some(invoice), Some(item)] =
        [RECORD, ACCOUNT, INVOICE, ITEM].map(|name| dataset.column_index(name))
    else {
        return Err(SchemaError::MissingColumns {
            missing: vec![RECORD.to_string()],
        });
    };

    trace!("Calculating [{RECORD}] values for {} row(s)", dataset.len());
    for row in dataset.rows_mut() {
        let key = business_key(
            &component(row, account),
            &component(row, invoice),
            &component(row, item),
        );
        row[record] = Some(Value::String(key));
    }
    Ok(())
}

fn component(row: &Row, idx: usize) -> String {
    present_text(row.get(idx).and_then(Option::as_ref)).unwrap_or_default()
}
