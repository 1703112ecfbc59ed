//! Chunked bulk load with post-load deduplication.
//!
//! [`BulkLoader::load`] sanitizes a dataset with the business key required,
//! optionally clears the target table, appends the rows in fixed-size chunks,
//! asks the store to delete residual duplicate business keys, and commits.
//!
//! In atomic mode (the default) the whole sequence runs inside one store
//! transaction and any failure rolls it back. With atomic mode disabled each
//! statement is committed on its own, so a chunk failure after earlier chunks
//! succeeded leaves the table partially loaded and is reported as
//! [`LoadError::PartialLoad`].

use log::{debug, error, info, warn};
use serde::Serialize;
use thiserror::Error;

use crate::{
    dataset::Dataset,
    queries::Queries,
    sanitize::{SanitizeError, sanitize},
    schema::Schema,
    store::{Chunk, Store, StoreError},
};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Sanitize(#[from] SanitizeError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(
        "table left partially loaded: {chunks_written} chunk(s) with {rows_written} row(s) were written before chunk {failed_chunk} failed: {source}"
    )]
    PartialLoad {
        chunks_written: usize,
        rows_written: usize,
        failed_chunk: usize,
        #[source]
        source: StoreError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    pub chunk_size: usize,
    pub atomic: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            atomic: true,
        }
    }
}

/// Progress after a chunk has been appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkProgress {
    /// 1-based chunk number.
    pub chunk: usize,
    pub chunks: usize,
    pub rows_written: usize,
    pub total_rows: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub rows_written: usize,
    pub chunk_sizes: Vec<usize>,
    pub cleared_rows: Option<usize>,
    pub duplicates_removed: usize,
}

impl LoadReport {
    /// Net change in table rows caused by the write and dedup phases.
    pub fn net_rows_added(&self) -> usize {
        self.rows_written.saturating_sub(self.duplicates_removed)
    }
}

pub struct BulkLoader<'a, S: Store + ?Sized> {
    store: &'a mut S,
    schema: &'a Schema,
    queries: &'a Queries,
    options: LoadOptions,
}

impl<'a, S: Store + ?Sized> BulkLoader<'a, S> {
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

    pub fn load(&mut self, dataset: &mut Dataset, overwrite: bool) -> Result<LoadReport, LoadError> {
        self.load_with_progress(dataset, overwrite, |_| {})
    }

    pub fn load_with_progress<F>(
        &mut self,
        dataset: &mut Dataset,
        overwrite: bool,
        on_chunk: F,
    ) -> Result<LoadReport, LoadError>
    where
        F: FnMut(ChunkProgress),
    {
        sanitize(dataset, self.schema, true)?;

        if !self.options.atomic {
            return self.write(dataset, overwrite, on_chunk);
        }
        self.store.begin()?;
        match self.write(dataset, overwrite, on_chunk) {
            Ok(report) => {
                self.store.commit()?;
                Ok(report)
            }
            Err(err) => {
                error!("Load failed, rolling back: {err}");
                if let Err(rollback) = self.store.rollback() {
                    warn!("Rollback failed: {rollback}");
                }
                Err(err)
            }
        }
    }

    fn write<F>(
        &mut self,
        dataset: &Dataset,
        overwrite: bool,
        mut on_chunk: F,
    ) -> Result<LoadReport, LoadError>
    where
        F: FnMut(ChunkProgress),
    {
        let mut report = LoadReport::default();
        self.store
            .execute_statement(&self.queries.create_table(self.schema))?;
        if overwrite {
            debug!("Preparing to overwrite all data");
            report.cleared_rows = Some(self.store.execute_statement(&self.queries.clear_table())?);
        } else {
            debug!("Preparing to append new data");
        }

        let chunk_size = self.options.chunk_size.max(1);
        let total_rows = dataset.len();
        let chunks = total_rows.div_ceil(chunk_size);
        info!("Writing {total_rows} row(s) in {chunks} chunk(s) of up to {chunk_size}");
        for (idx, rows) in dataset.chunks(chunk_size).enumerate() {
            let chunk = Chunk {
                columns: dataset.columns(),
                rows,
            };
            let written = self
                .store
                .bulk_insert(
                    self.queries.table(),
                    self.queries.schema_name(),
                    chunk,
                    self.schema,
                )
                .map_err(|source| {
                    if self.options.atomic || (idx == 0 && !overwrite) {
                        LoadError::Store(source)
                    } else {
                        LoadError::PartialLoad {
                            chunks_written: idx,
                            rows_written: report.rows_written,
                            failed_chunk: idx + 1,
                            source,
                        }
                    }
                })?;
            report.rows_written += written;
            report.chunk_sizes.push(written);
            let progress = ChunkProgress {
                chunk: idx + 1,
                chunks,
                rows_written: report.rows_written,
                total_rows,
            };
            debug!(
                "Wrote chunk {}/{} ({}/{} rows)",
                progress.chunk, progress.chunks, progress.rows_written, progress.total_rows
            );
            on_chunk(progress);
        }

        info!("Removing duplicate records");
        report.duplicates_removed = self
            .store
            .execute_statement(&self.queries.remove_duplicates())?;
        debug!("Deleted {} duplicate record(s)", report.duplicates_removed);
        Ok(report)
    }
}
