use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::load::DEFAULT_CHUNK_SIZE;

#[derive(Debug, Parser)]
#[command(author, version, about = "Reconcile weekly shipment reports into a SQL table", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Load a weekly report into the shipments table
    Load(LoadArgs),
    /// Remove duplicate business keys already stored in the table
    Dedupe,
    /// Sanitize a weekly report and print it without touching the table
    Preview(PreviewArgs),
    /// List the canonical shipment columns and their report headers
    Columns,
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    /// Directory holding `Week Ending <date>.csv` exports (defaults to $SHIPMENTS_REPORTS_DIR or ./Exports)
    #[arg(long = "reports-dir")]
    pub reports_dir: Option<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the report file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct LoadArgs {
    /// Report date as mm-dd-yyyy (prompted for when omitted)
    #[arg(short, long)]
    pub date: Option<String>,
    #[command(flatten)]
    pub report: ReportArgs,
    /// Merge with the existing table contents, clear the table, and reload it
    #[arg(long)]
    pub overwrite: bool,
    /// Rows written per insert batch
    #[arg(long = "chunk-size", default_value_t = DEFAULT_CHUNK_SIZE, value_parser = parse_chunk_size)]
    pub chunk_size: usize,
    /// Commit each statement separately instead of wrapping the load in one transaction
    #[arg(long = "no-transaction")]
    pub no_transaction: bool,
    /// Number of report rows to print before uploading (0 disables)
    #[arg(long = "preview-rows", default_value_t = 5)]
    pub preview_rows: usize,
    /// Print the run summary as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    /// Report date as mm-dd-yyyy
    #[arg(short, long)]
    pub date: String,
    #[command(flatten)]
    pub report: ReportArgs,
    /// Number of rows to display
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

pub fn parse_chunk_size(value: &str) -> Result<usize, String> {
    let parsed: usize = value
        .parse()
        .map_err(|_| format!("'{value}' is not a positive integer"))?;
    if parsed == 0 {
        return Err("Chunk size must be at least 1".to_string());
    }
    Ok(parsed)
}
