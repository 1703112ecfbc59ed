//! Append and overwrite runs of the reconciliation pipeline.
//!
//! Append mode loads the prepared report on its own and relies on the
//! store-side dedup pass to reconcile against rows already in the table.
//! Overwrite mode reads the table first, merges it with the report,
//! deduplicates the union in memory, clears the table, and reloads it.

use log::info;
use serde::Serialize;
use thiserror::Error;

use crate::{
    dataset::Dataset,
    load::{BulkLoader, ChunkProgress, LoadError, LoadOptions, LoadReport},
    queries::{ID_COLUMN, Queries},
    reconcile::{ReconcileError, deduplicate, merge},
    report::{ReportError, ReportSource, prepare_report},
    schema::Schema,
    store::{Store, StoreError},
};

/// Column the surrogate keys of both merge inputs are renamed to.
pub const MERGED_KEY_COLUMN: &str = "index";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Append,
    Overwrite,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Load(#[from] LoadError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub mode: Mode,
    pub report_rows: usize,
    pub existing_rows: Option<usize>,
    pub duplicates_merged: usize,
    pub load: LoadReport,
}

impl RunSummary {
    /// Rows the run added on top of what the table held before.
    pub fn rows_added(&self) -> usize {
        let loaded = self.load.net_rows_added();
        loaded.saturating_sub(self.existing_rows.unwrap_or(0))
    }
}

/// Loads the report named by `identifier` and prepares it for loading.
pub fn load_prepared_report<R: ReportSource + ?Sized>(
    source: &R,
    identifier: &str,
    schema: &Schema,
) -> Result<Dataset, PipelineError> {
    let raw = source.load_report(identifier)?;
    info!(
        "Loaded {} row(s) from {}",
        raw.len(),
        source.describe(identifier)
    );
    prepare_report(raw, schema).map_err(|source_err| {
        PipelineError::Report(ReportError::Sanitize {
            path: source.describe(identifier).into(),
            source: source_err,
        })
    })
}

pub struct Pipeline<'a, S: Store + ?Sized> {
    store: &'a mut S,
    schema: &'a Schema,
    queries: &'a Queries,
    options: LoadOptions,
}

impl<'a, S: Store + ?Sized> Pipeline<'a, S> {
    pub fn new(store: &'a mut S, schema: &'a Schema, queries: &'a Queries) -> Self {
        Self {
            store,
            schema,
            queries,
            options: LoadOptions::default(),
        }
    }

    pub fn with_options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    pub fn run<F>(
        &mut self,
        report: Dataset,
        mode: Mode,
        on_chunk: F,
    ) -> Result<RunSummary, PipelineError>
    where
        F: FnMut(ChunkProgress),
    {
        let report_rows = report.len();
        let (mut dataset, existing_rows) = match mode {
            Mode::Append => (report, None),
            Mode::Overwrite => {
                self.store
                    .execute_statement(&self.queries.create_table(self.schema))?;
                let existing = self.store.read(&self.queries.select_all())?;
                let existing_rows = existing.len();
                info!("Adding report data to {existing_rows} existing row(s)");
                let merged = merge(
                    existing,
                    ID_COLUMN,
                    report,
                    ID_COLUMN,
                    MERGED_KEY_COLUMN,
                );
                (merged, Some(existing_rows))
            }
        };

        let duplicates_merged = deduplicate(&mut dataset)?;
        if duplicates_merged > 0 {
            info!("Dropped {duplicates_merged} duplicate row(s) before upload");
        }

        info!("Preparing to upload {} row(s)", dataset.len());
        let load = BulkLoader::new(&mut *self.store, self.schema, self.queries)
            .with_options(self.options)
            .load_with_progress(&mut dataset, mode == Mode::Overwrite, on_chunk)?;

        let summary = RunSummary {
            mode,
            report_rows,
            existing_rows,
            duplicates_merged,
            load,
        };
        info!("Uploaded {} row(s)", summary.rows_added());
        Ok(summary)
    }
}
