//! Weekly report location, loading, and preparation.
//!
//! Reports are exported as `Week Ending <mm-dd-yyyy>.csv` with human-readable
//! headers. [`WeeklyReportSource`] resolves a report date to that file and
//! reads it; [`prepare_report`] renames the headers to the canonical column
//! names, sanitizes the rows, and derives business keys.

use std::{
    io::{BufRead, Write},
    path::PathBuf,
};

use chrono::NaiveDate;
use encoding_rs::{Encoding, UTF_8};
use log::{debug, info, warn};
use thiserror::Error;

use crate::{
    dataset::Dataset,
    io_utils,
    record::assign_business_keys,
    sanitize::{SanitizeError, sanitize},
    schema::{
        ACCOUNT, CUSTOMER, DESCRIPTION, EXT_COST, EXT_PRICE, INVOICE, ITEM, ORDERED, PRODUCT,
        SHIP_DATE, SHIPPED, Schema, UNIT_COST, UNIT_PRICE,
    },
};

pub const REPORT_DATE_FORMAT: &str = "%m-%d-%Y";
const REPORT_PREFIX: &str = "Week Ending";

/// Export header → canonical column name.
pub const REPORT_COLUMN_MAP: &[(&str, &str)] = &[
    ("Invoice #", INVOICE),
    ("Invoice Date", SHIP_DATE),
    ("Store", ACCOUNT),
    ("Customer #", CUSTOMER),
    ("DC Item #", ITEM),
    ("Brand Item #", PRODUCT),
    ("Brand Item Description", DESCRIPTION),
    ("Qty Ordered", ORDERED),
    ("Qty Shipped", SHIPPED),
    ("Average Unit Price", UNIT_PRICE),
    ("Average Unit Cost", UNIT_COST),
    ("Ext Price", EXT_PRICE),
    ("Ext Cost", EXT_COST),
];

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report date '{0}' is not in mm-dd-yyyy form")]
    InvalidDate(String),
    #[error("report file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read report {}: {message}", .path.display())]
    Read { path: PathBuf, message: String },
    #[error("report {} failed sanitization: {source}", .path.display())]
    Sanitize {
        path: PathBuf,
        #[source]
        source: SanitizeError,
    },
    #[error("no report date entered")]
    PromptAborted,
    #[error("failed to read report date from input: {0}")]
    Prompt(#[from] std::io::Error),
}

pub trait ReportSource {
    /// Loads the raw report identified by `identifier`, headers untouched.
    fn load_report(&self, identifier: &str) -> Result<Dataset, ReportError>;

    /// Human-readable location of the report, for log and error messages.
    fn describe(&self, identifier: &str) -> String;
}

#[derive(Debug, Clone)]
pub struct WeeklyReportSource {
    directory: PathBuf,
    delimiter: Option<u8>,
    encoding: &'static Encoding,
}

impl WeeklyReportSource {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            delimiter: None,
            encoding: UTF_8,
        }
    }

    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_delimiter(mut self, delimiter: Option<u8>) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn path_for(&self, date: &str) -> Result<PathBuf, ReportError> {
        let date = date.trim();
        NaiveDate::parse_from_str(date, REPORT_DATE_FORMAT)
            .map_err(|_| ReportError::InvalidDate(date.to_string()))?;
        Ok(self.directory.join(format!("{REPORT_PREFIX} {date}.csv")))
    }

    /// Asks for report dates on `output` until one names an existing file.
    pub fn prompt_for_date<R, W>(&self, input: &mut R, output: &mut W) -> Result<String, ReportError>
    where
        R: BufRead,
        W: Write,
    {
        info!("Waiting for user input");
        loop {
            write!(output, "Please enter the report date as mm-dd-yyyy: ")?;
            output.flush()?;
            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                return Err(ReportError::PromptAborted);
            }
            let date = line.trim();
            match self.path_for(date) {
                Ok(path) if path.exists() => {
                    debug!("Located report file {path:?}");
                    return Ok(date.to_string());
                }
                Ok(path) => warn!("File not found: {path:?}, please try again"),
                Err(err) => warn!("{err}, please try again"),
            }
        }
    }
}

impl ReportSource for WeeklyReportSource {
    fn load_report(&self, identifier: &str) -> Result<Dataset, ReportError> {
        let path = self.path_for(identifier)?;
        if !path.exists() {
            return Err(ReportError::NotFound(path));
        }
        debug!("Loading CSV file {path:?}");
        let delimiter = io_utils::resolve_input_delimiter(&path, self.delimiter);
        io_utils::read_dataset(&path, delimiter, self.encoding).map_err(|err| ReportError::Read {
            path: path.clone(),
            message: format!("{err:#}"),
        })
    }

    fn describe(&self, identifier: &str) -> String {
        self.path_for(identifier)
            .map(|path| path.display().to_string())
            .unwrap_or_else(|_| identifier.to_string())
    }
}

/// Renames export headers to their canonical names.
pub fn rename_report_columns(dataset: &mut Dataset) {
    for (from, to) in REPORT_COLUMN_MAP {
        if dataset.rename_column(from, to) {
            debug!("Renamed column [{from}] to [{to}]");
        }
    }
}

/// Turns a raw report into a sanitized, keyed dataset.
pub fn prepare_report(mut raw: Dataset, schema: &Schema) -> Result<Dataset, SanitizeError> {
    rename_report_columns(&mut raw);
    sanitize(&mut raw, schema, false)?;
    assign_business_keys(&mut raw)?;
    Ok(raw)
}
