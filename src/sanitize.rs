//! Schema validation and per-column type coercion.
//!
//! [`sanitize()`] resolves a dataset's headers against the [`Schema`] and then
//! rewrites every recognized column in place so that it carries its canonical
//! type. Report exports are noisy: amounts arrive as `$1,234.50` or `(12.00)`,
//! quantities as `1,000` or `(5)`, and identifiers that went through a numeric
//! parse as `123.0`. Each rule below strips that noise before parsing.

use std::str::FromStr;

use anyhow::{Context, Result, anyhow, bail, ensure};
use log::{debug, trace, warn};
use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use thiserror::Error;

use crate::{
    data::{Value, parse_naive_date, present_text},
    dataset::Dataset,
    schema::{Coercion, ColumnMeta, ColumnType, HeaderResolution, Schema, SchemaError},
};

const MONEY_SCALE: u32 = 2;

#[derive(Debug, Error, PartialEq)]
#[error("row {row} column [{column}]: cannot convert '{value}' to {expected}: {reason}")]
pub struct CoercionError {
    pub column: String,
    /// 1-based data row number.
    pub row: usize,
    pub value: String,
    pub expected: ColumnType,
    pub reason: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum SanitizeError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Coercion(#[from] CoercionError),
}

/// Validates `dataset` against `schema` and coerces every recognized column.
///
/// Unrecognized columns are left untouched. When the single missing column is
/// the business key and `require_business_key` is false, the key is expected
/// to be derived afterwards with [`crate::record::assign_business_keys`].
pub fn sanitize(
    dataset: &mut Dataset,
    schema: &Schema,
    require_business_key: bool,
) -> Result<(), SanitizeError> {
    debug!("Sanitizing {} row(s)", dataset.len());
    match schema.resolve_headers(dataset.columns(), require_business_key)? {
        HeaderResolution::Complete => {}
        HeaderResolution::KeyDeferred => {
            debug!(
                "Column [{}] will be derived after sanitization",
                schema.business_key()
            );
        }
        HeaderResolution::Rename { from, to } => {
            warn!("Treating unrecognized column [{from}] as missing column [{to}]");
            dataset.rename_column(&from, &to);
        }
    }

    for column in schema.columns() {
        let Some(idx) = dataset.column_index(column.name) else {
            continue;
        };
        trace!("Converting [{}] to {} values", column.name, column.datatype);
        for (row_idx, row) in dataset.rows_mut().iter_mut().enumerate() {
            let Some(cell) = row.get_mut(idx) else {
                continue;
            };
            let coerced = coerce_cell(cell.as_ref(), column).map_err(|err| CoercionError {
                column: column.name.to_string(),
                row: row_idx + 1,
                value: cell.as_ref().map(Value::as_display).unwrap_or_default(),
                expected: column.datatype,
                reason: format!("{err:#}"),
            })?;
            *cell = coerced;
        }
    }
    Ok(())
}

/// Coerces one cell according to its column's rule; `None` passes through.
pub fn coerce_cell(cell: Option<&Value>, column: &ColumnMeta) -> Result<Option<Value>> {
    match column.coercion {
        Coercion::Text => Ok(present_text(cell).map(Value::String)),
        Coercion::Identifier => {
            let Some(text) = present_text(cell) else {
                return Ok(None);
            };
            let identifier = coerce_identifier(&text);
            if let Some(max) = column.datatype.max_len() {
                let len = identifier.chars().count();
                ensure!(len <= max, "{len} characters exceeds the limit of {max}");
            }
            Ok(Some(Value::String(identifier)))
        }
        Coercion::Quantity => match cell {
            Some(Value::Integer(value)) => small_int(*value).map(|v| Some(Value::Integer(v))),
            other => present_text(other)
                .map(|text| coerce_quantity(&text).map(Value::Integer))
                .transpose(),
        },
        Coercion::Money => match cell {
            Some(Value::Float(value)) if value.is_finite() => {
                Ok(Some(Value::Float(round_money(*value)?)))
            }
            other => present_text(other)
                .map(|text| coerce_money(&text).map(Value::Float))
                .transpose(),
        },
        Coercion::Date => match cell {
            Some(Value::Date(date)) => Ok(Some(Value::Date(*date))),
            other => present_text(other)
                .map(|text| parse_naive_date(&text).map(Value::Date))
                .transpose(),
        },
    }
}

/// Drops a trailing fractional artifact such as the `.0` in `123.0`.
pub fn coerce_identifier(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.split_once('.') {
        Some((head, _)) => head.to_string(),
        None => trimmed.to_string(),
    }
}

/// Parses a quantity such as `1,000`, `(5)` or `12.0`, truncating fractions.
pub fn coerce_quantity(raw: &str) -> Result<i64> {
    let cleaned = raw.replace(',', "").replace('(', "-").replace(')', "");
    let integral = cleaned.split('.').next().unwrap_or_default();
    let token = integral
        .split_whitespace()
        .next()
        .ok_or_else(|| anyhow!("no digits found"))?;
    let parsed: i64 = token
        .parse()
        .with_context(|| format!("'{token}' is not an integer"))?;
    small_int(parsed)
}

/// Parses a currency amount such as `$1,234.50` or `(12.00) USD`.
pub fn coerce_money(raw: &str) -> Result<f64> {
    let cleaned = raw
        .replace('$', "")
        .replace('(', "-")
        .replace(')', "")
        .replace(',', "");
    let token = cleaned
        .split_whitespace()
        .next()
        .ok_or_else(|| anyhow!("no digits found"))?;
    let decimal = Decimal::from_str(token)
        .or_else(|_| Decimal::from_scientific(token))
        .with_context(|| format!("'{token}' is not a number"))?;
    decimal
        .round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .ok_or_else(|| anyhow!("'{token}' is out of range"))
}

fn round_money(value: f64) -> Result<f64> {
    let decimal =
        Decimal::from_f64_retain(value).ok_or_else(|| anyhow!("{value} is out of range"))?;
    decimal
        .round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .ok_or_else(|| anyhow!("{value} is out of range"))
}

fn small_int(value: i64) -> Result<i64> {
    if i16::try_from(value).is_err() {
        bail!("{value} is outside the small integer range");
    }
    Ok(value)
}
