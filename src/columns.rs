//! Canonical column listing.
//!
//! Renders the shipment schema's column names, storage types, and meanings as
//! an ASCII table, followed by the export headers each column is read from.

use crate::{report::REPORT_COLUMN_MAP, schema::Schema, table};

pub fn render_columns(schema: &Schema) -> String {
    let rows = schema
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            let source = REPORT_COLUMN_MAP
                .iter()
                .find(|(_, canonical)| *canonical == column.name)
                .map(|(header, _)| header.to_string())
                .unwrap_or_else(|| "(derived)".to_string());
            vec![
                (idx + 1).to_string(),
                column.name.to_string(),
                column.datatype.sql_type(),
                source,
                column.description.to_string(),
            ]
        })
        .collect::<Vec<_>>();

    let headers = ["#", "name", "type", "report header", "description"]
        .map(str::to_string)
        .to_vec();
    table::render_table(&headers, &rows)
}
