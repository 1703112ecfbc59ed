#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use shipment_ledger::data::Value;
use shipment_ledger::dataset::{Dataset, Row};
use shipment_ledger::record::assign_business_keys;
use shipment_ledger::schema::Schema;
use shipment_ledger::store::{Chunk, Store, StoreError};
use tempfile::{TempDir, tempdir};

pub const REPORT_HEADER: &str = "Invoice #,Invoice Date,Store,Customer #,DC Item #,Brand Item #,Brand Item Description,Qty Ordered,Qty Shipped,Average Unit Price,Average Unit Cost,Ext Price,Ext Cost";

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    /// Writes a weekly export named for `date` under `Exports/`.
    pub fn write_report(&self, date: &str, lines: &[&str]) -> PathBuf {
        let mut contents = String::from(REPORT_HEADER);
        contents.push('\n');
        for line in lines {
            contents.push_str(line);
            contents.push('\n');
        }
        self.write(&format!("Exports/Week Ending {date}.csv"), &contents)
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.path().join("Exports")
    }

    pub fn database(&self) -> PathBuf {
        self.path().join("ledger.db")
    }
}

/// One export line: account, invoice, item, shipped, unit price.
pub fn report_line(account: &str, invoice: &str, item: &str, shipped: &str) -> String {
    format!(
        "{invoice},01/05/2024,{account},C100,{item},B-{item},Widget {item},10,\"{shipped}\",$2.50,$1.25,\"$1,250.00\",($12.00)"
    )
}

fn text(value: &str) -> Option<Value> {
    Some(Value::String(value.to_string()))
}

/// A raw dataset with canonical headers and text cells, as a report reads
/// after its headers are renamed.
pub fn raw_row(account: &str, invoice: &str, item: &str, shipped: &str) -> Row {
    vec![
        text(invoice),
        text("2024-01-05"),
        text(account),
        text("C100"),
        text(item),
        text("B100"),
        text("Widget"),
        text("10"),
        text(shipped),
        text("$2.50"),
        text("$1.25"),
        text("$25.00"),
        text("$12.50"),
    ]
}

pub fn raw_dataset(rows: Vec<Row>) -> Dataset {
    let headers = Schema::shipments().headers().into_iter().skip(1).collect();
    Dataset::from_rows(headers, rows)
}

/// Raw rows with their business keys derived, ready for the loader.
pub fn keyed(rows: Vec<Row>) -> Dataset {
    let mut dataset = raw_dataset(rows);
    assign_business_keys(&mut dataset).expect("key columns present");
    dataset
}

/// Sets the description cell of a raw row, used to tell duplicates apart.
pub fn described(mut row: Row, description: &str) -> Row {
    row[6] = text(description);
    row
}

/// A keyed dataset of `count` distinct shipment rows.
pub fn keyed_dataset(count: usize) -> Dataset {
    let rows = (0..count)
        .map(|n| {
            let mut row = raw_row("S1", &format!("INV{n}"), "P1", "1");
            row.insert(0, text(&format!("S1.INV{n}.P1")));
            row
        })
        .collect();
    Dataset::from_rows(Schema::shipments().headers(), rows)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Read(String),
    Execute(String),
    BulkInsert { table: String, schema: String, rows: usize },
    Begin,
    Commit,
    Rollback,
}

/// Store double that records every call and can fail a chosen insert.
#[derive(Debug, Default)]
pub struct RecordingStore {
    pub calls: Vec<StoreCall>,
    pub fail_on_insert: Option<usize>,
    inserts: usize,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on_insert(n: usize) -> Self {
        Self {
            fail_on_insert: Some(n),
            ..Self::default()
        }
    }

    pub fn insert_sizes(&self) -> Vec<usize> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                StoreCall::BulkInsert { rows, .. } => Some(*rows),
                _ => None,
            })
            .collect()
    }

    pub fn executed(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                StoreCall::Execute(sql) => Some(sql.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Store for RecordingStore {
    fn read(&mut self, query: &str) -> Result<Dataset, StoreError> {
        self.calls.push(StoreCall::Read(query.to_string()));
        Ok(Dataset::new(Schema::shipments().headers()))
    }

    fn execute_statement(&mut self, statement: &str) -> Result<usize, StoreError> {
        self.calls.push(StoreCall::Execute(statement.to_string()));
        Ok(0)
    }

    fn bulk_insert(
        &mut self,
        table: &str,
        schema_name: &str,
        chunk: Chunk<'_>,
        _schema: &Schema,
    ) -> Result<usize, StoreError> {
        self.inserts += 1;
        if self.fail_on_insert == Some(self.inserts) {
            return Err(StoreError::Insert {
                table: table.to_string(),
                row: 1,
                source: rusqlite::Error::InvalidQuery,
            });
        }
        self.calls.push(StoreCall::BulkInsert {
            table: table.to_string(),
            schema: schema_name.to_string(),
            rows: chunk.len(),
        });
        Ok(chunk.len())
    }

    fn begin(&mut self) -> Result<(), StoreError> {
        self.calls.push(StoreCall::Begin);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.calls.push(StoreCall::Commit);
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        self.calls.push(StoreCall::Rollback);
        Ok(())
    }
}
