//! Relational store access.
//!
//! The pipeline talks to the table through the [`Store`] trait so that the
//! loader can be exercised without a database. [`SqliteStore`] is the
//! production implementation: the configured schema qualifier names the
//! database the table lives in (`main` for the opened file itself, any other
//! name attaches the file under that alias).

use std::path::Path;

use log::{debug, trace, warn};
use rusqlite::{
    Connection, params_from_iter,
    types::{Value as SqlValue, ValueRef},
};
use thiserror::Error;

use crate::{
    config::StoreConfig,
    data::Value,
    dataset::{Dataset, Row},
    queries::Queries,
    schema::Schema,
};

const MAIN_SCHEMA: &str = "main";
const CHUNK_SAVEPOINT: &str = "bulk_chunk";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open store at {target}: {source}")]
    Connection {
        target: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("statement failed ({statement}): {source}")]
    Statement {
        statement: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("insert into {table} failed at chunk row {row}: {source}")]
    Insert {
        table: String,
        row: usize,
        #[source]
        source: rusqlite::Error,
    },
}

/// A contiguous slice of rows with the column names they are laid out by.
#[derive(Debug, Clone, Copy)]
pub struct Chunk<'a> {
    pub columns: &'a [String],
    pub rows: &'a [Row],
}

impl Chunk<'_> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub trait Store {
    /// Runs a read query and returns every row.
    fn read(&mut self, query: &str) -> Result<Dataset, StoreError>;

    /// Runs a write or DDL statement and returns the number of affected rows.
    fn execute_statement(&mut self, statement: &str) -> Result<usize, StoreError>;

    /// Appends `chunk` to `schema_name.table`, creating the table from the
    /// schema's storage types when it does not exist. Only the schema's
    /// columns are written, in schema order. A chunk is written entirely or
    /// not at all.
    fn bulk_insert(
        &mut self,
        table: &str,
        schema_name: &str,
        chunk: Chunk<'_>,
        schema: &Schema,
    ) -> Result<usize, StoreError>;

    fn begin(&mut self) -> Result<(), StoreError>;

    fn commit(&mut self) -> Result<(), StoreError>;

    fn rollback(&mut self) -> Result<(), StoreError>;
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        debug!("Opening SQLite store {:?}", config.database);
        if config.schema_name == MAIN_SCHEMA {
            let conn = Connection::open(&config.database)
                .map_err(|source| connection_error(&config.database, source))?;
            return Ok(Self { conn });
        }
        let conn = Connection::open_in_memory()
            .map_err(|source| connection_error(&config.database, source))?;
        conn.execute(
            &format!("ATTACH DATABASE ?1 AS \"{}\"", config.schema_name),
            [config.database.to_string_lossy().into_owned()],
        )
        .map_err(|source| connection_error(&config.database, source))?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|source| connection_error(Path::new(":memory:"), source))?;
        Ok(Self { conn })
    }

    fn batch(&mut self, statement: &str) -> Result<(), StoreError> {
        trace!("Executing {statement}");
        self.conn
            .execute_batch(statement)
            .map_err(|source| statement_error(statement, source))
    }

    /// Inserts every chunk row; callers wrap this in a savepoint so that a
    /// failing row leaves none of the chunk behind.
    fn insert_rows(
        &self,
        queries: &Queries,
        chunk: Chunk<'_>,
        schema: &Schema,
    ) -> Result<usize, StoreError> {
        let positions = schema
            .columns()
            .iter()
            .map(|column| chunk.columns.iter().position(|c| c == column.name))
            .collect::<Vec<_>>();
        let insert = queries.import_record(schema);
        let mut stmt = self
            .conn
            .prepare_cached(&insert)
            .map_err(|source| statement_error(&insert, source))?;
        for (row_idx, row) in chunk.rows.iter().enumerate() {
            let values = positions.iter().map(|position| {
                position
                    .and_then(|idx| row.get(idx))
                    .and_then(Option::as_ref)
                    .map_or(SqlValue::Null, to_sql)
            });
            stmt.execute(params_from_iter(values))
                .map_err(|source| StoreError::Insert {
                    table: queries.qualified_table(),
                    row: row_idx + 1,
                    source,
                })?;
        }
        Ok(chunk.len())
    }
}

impl Store for SqliteStore {
    fn read(&mut self, query: &str) -> Result<Dataset, StoreError> {
        debug!("Reading store with {query}");
        let mut stmt = self
            .conn
            .prepare(query)
            .map_err(|source| statement_error(query, source))?;
        let columns = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        let width = columns.len();
        let rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|idx| row.get_ref(idx).map(from_sql))
                    .collect::<Result<Row, _>>()
            })
            .map_err(|source| statement_error(query, source))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| statement_error(query, source))?;
        Ok(Dataset::from_rows(columns, rows))
    }

    fn execute_statement(&mut self, statement: &str) -> Result<usize, StoreError> {
        debug!("Executing {statement}");
        self.conn
            .execute(statement, [])
            .map_err(|source| statement_error(statement, source))
    }

    fn bulk_insert(
        &mut self,
        table: &str,
        schema_name: &str,
        chunk: Chunk<'_>,
        schema: &Schema,
    ) -> Result<usize, StoreError> {
        let queries = Queries::new(schema_name, table);
        self.batch(&queries.create_table(schema))?;

        self.batch(&format!("SAVEPOINT {CHUNK_SAVEPOINT}"))?;
        match self.insert_rows(&queries, chunk, schema) {
            Ok(written) => {
                self.batch(&format!("RELEASE SAVEPOINT {CHUNK_SAVEPOINT}"))?;
                Ok(written)
            }
            Err(err) => {
                let undo = format!(
                    "ROLLBACK TO SAVEPOINT {CHUNK_SAVEPOINT}; RELEASE SAVEPOINT {CHUNK_SAVEPOINT}"
                );
                if let Err(rollback) = self.batch(&undo) {
                    warn!("Failed to undo partial chunk: {rollback}");
                }
                Err(err)
            }
        }
    }

    fn begin(&mut self) -> Result<(), StoreError> {
        self.batch("BEGIN TRANSACTION")
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.batch("COMMIT")
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        self.batch("ROLLBACK")
    }
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(*f),
        Value::Date(d) => SqlValue::Text(d.format("%Y-%m-%d").to_string()),
    }
}

fn from_sql(value: ValueRef<'_>) -> Option<Value> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(Value::Integer(i)),
        ValueRef::Real(f) => Some(Value::Float(f)),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(Value::String(String::from_utf8_lossy(bytes).into_owned()))
        }
    }
}

fn connection_error(target: &Path, source: rusqlite::Error) -> StoreError {
    StoreError::Connection {
        target: target.display().to_string(),
        source,
    }
}

fn statement_error(statement: &str, source: rusqlite::Error) -> StoreError {
    StoreError::Statement {
        statement: statement.to_string(),
        source,
    }
}
