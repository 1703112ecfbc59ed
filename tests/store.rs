mod common;

use common::{TestWorkspace, described, keyed, raw_row};
use shipment_ledger::config::StoreConfig;
use shipment_ledger::data::Value;
use shipment_ledger::load::BulkLoader;
use shipment_ledger::queries::Queries;
use shipment_ledger::schema::{DESCRIPTION, RECORD, SHIP_DATE, SHIPPED, Schema, UNIT_PRICE};
use shipment_ledger::store::{SqliteStore, Store};

fn load_rows(store: &mut SqliteStore, queries: &Queries, rows: Vec<shipment_ledger::dataset::Row>) {
    let schema = Schema::shipments();
    let mut dataset = keyed(rows);
    BulkLoader::new(store, &schema, queries)
        .load(&mut dataset, false)
        .expect("load succeeds");
}

#[test]
fn read_returns_typed_values() {
    let mut store = SqliteStore::open_in_memory().expect("open store");
    let queries = Queries::new("main", "shipments");
    load_rows(&mut store, &queries, vec![raw_row("S1", "INV1", "P1", "3")]);

    let table = store.read(&queries.select_all()).expect("read table");
    assert_eq!(table.len(), 1);
    assert_eq!(table.columns()[0], "id");
    assert_eq!(table.columns().len(), 15);
    assert_eq!(table.cell(0, "id"), Some(&Value::Integer(1)));
    assert_eq!(table.cell(0, RECORD), Some(&Value::from("S1.INV1.P1")));
    assert_eq!(table.cell(0, SHIP_DATE), Some(&Value::from("2024-01-05")));
    assert_eq!(table.cell(0, SHIPPED), Some(&Value::Integer(3)));
    assert_eq!(table.cell(0, UNIT_PRICE), Some(&Value::Float(2.5)));
}

#[test]
fn store_dedup_keeps_greatest_shipped_and_is_idempotent() {
    let mut store = SqliteStore::open_in_memory().expect("open store");
    let queries = Queries::new("main", "shipments");
    load_rows(&mut store, &queries, vec![raw_row("S1", "I1", "P1", "3")]);
    load_rows(
        &mut store,
        &queries,
        vec![raw_row("S1", "I1", "P1", "7"), raw_row("S2", "I1", "P1", "1")],
    );

    let table = store.read(&queries.select_all()).expect("read table");
    assert_eq!(table.len(), 2);
    let kept = (0..table.len())
        .find(|row| table.cell(*row, RECORD) == Some(&Value::from("S1.I1.P1")))
        .expect("key kept");
    assert_eq!(table.cell(kept, SHIPPED), Some(&Value::Integer(7)));

    let removed = store
        .execute_statement(&queries.remove_duplicates())
        .expect("dedup runs");
    assert_eq!(removed, 0);
}

#[test]
fn store_dedup_tie_keeps_earliest_row() {
    let mut store = SqliteStore::open_in_memory().expect("open store");
    let queries = Queries::new("main", "shipments");
    load_rows(
        &mut store,
        &queries,
        vec![described(raw_row("S1", "I1", "P1", "4"), "first")],
    );
    load_rows(
        &mut store,
        &queries,
        vec![described(raw_row("S1", "I1", "P1", "4"), "second")],
    );

    let table = store.read(&queries.select_all()).expect("read table");
    assert_eq!(table.len(), 1);
    assert_eq!(table.cell(0, DESCRIPTION), Some(&Value::from("first")));
}

#[test]
fn extra_columns_are_not_written() {
    let schema = Schema::shipments();
    let mut store = SqliteStore::open_in_memory().expect("open store");
    let queries = Queries::new("main", "shipments");
    let mut dataset = keyed(vec![raw_row("S1", "I1", "P1", "1")]);
    dataset.insert_column(dataset.columns().len(), "Notes");

    BulkLoader::new(&mut store, &schema, &queries)
        .load(&mut dataset, false)
        .expect("load succeeds");

    let table = store.read(&queries.select_all()).expect("read table");
    assert!(!table.has_column("Notes"));
    assert_eq!(table.len(), 1);
}

#[test]
fn attached_schema_persists_to_file() {
    let workspace = TestWorkspace::new();
    let config = StoreConfig {
        database: workspace.database(),
        schema_name: "ledger".into(),
        table: "shipments".into(),
    };
    let queries = Queries::new(&config.schema_name, &config.table);
    {
        let mut store = SqliteStore::open(&config).expect("open attached store");
        load_rows(&mut store, &queries, vec![raw_row("S1", "I1", "P1", "2")]);
    }

    let direct = StoreConfig {
        schema_name: "main".into(),
        ..config
    };
    let mut store = SqliteStore::open(&direct).expect("open file directly");
    let table = store
        .read(&Queries::new("main", "shipments").select_all())
        .expect("read table");
    assert_eq!(table.len(), 1);
}
