pub mod cli;
pub mod columns;
pub mod config;
pub mod data;
pub mod dataset;
pub mod io_utils;
pub mod load;
pub mod pipeline;
pub mod queries;
pub mod reconcile;
pub mod record;
pub mod report;
pub mod sanitize;
pub mod schema;
pub mod store;
pub mod table;

use std::{
    env,
    io::{self, Write},
    sync::OnceLock,
};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands},
    config::StoreConfig,
    load::{ChunkProgress, LoadOptions},
    pipeline::{Mode, Pipeline},
    queries::Queries,
    report::WeeklyReportSource,
    schema::Schema,
    store::{SqliteStore, Store},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("shipment_ledger", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Load(args) => handle_load(&args),
        Commands::Dedupe => handle_dedupe(),
        Commands::Preview(args) => handle_preview(&args),
        Commands::Columns => {
            print!("{}", columns::render_columns(&Schema::shipments()));
            Ok(())
        }
    }
}

fn handle_load(args: &cli::LoadArgs) -> Result<()> {
    let config = StoreConfig::from_env().context("Loading store configuration")?;
    let mut store = connect(&config)?;
    let queries = Queries::new(&config.schema_name, &config.table);
    let schema = Schema::shipments();

    let source = report_source(&args.report)?;
    let date = match &args.date {
        Some(date) => date.clone(),
        None => source
            .prompt_for_date(&mut io::stdin().lock(), &mut io::stdout())
            .context("Selecting a report")?,
    };
    let report = pipeline::load_prepared_report(&source, &date, &schema)
        .with_context(|| format!("Loading report for {date}"))?;
    if args.preview_rows > 0 && !args.json {
        print!("{}", table::render_dataset(&report, args.preview_rows));
    }

    let mode = if args.overwrite {
        Mode::Overwrite
    } else {
        Mode::Append
    };
    let options = LoadOptions {
        chunk_size: args.chunk_size,
        atomic: !args.no_transaction,
    };
    info!("Writing report {date} to {} in {mode:?} mode", queries.qualified_table());
    let summary = Pipeline::new(&mut store, &schema, &queries)
        .with_options(options)
        .run(report, mode, print_progress)
        .with_context(|| format!("Loading report {date} into {}", queries.qualified_table()))?;
    if !summary.load.chunk_sizes.is_empty() {
        eprintln!();
    }

    if args.json {
        let rendered =
            serde_json::to_string_pretty(&summary).context("Serializing run summary")?;
        println!("{rendered}");
    }
    info!(
        "Wrote {} row(s); {} duplicate(s) removed in memory, {} in store",
        summary.load.rows_written, summary.duplicates_merged, summary.load.duplicates_removed
    );
    Ok(())
}

fn handle_dedupe() -> Result<()> {
    let config = StoreConfig::from_env().context("Loading store configuration")?;
    let mut store = connect(&config)?;
    let queries = Queries::new(&config.schema_name, &config.table);
    let schema = Schema::shipments();

    store.execute_statement(&queries.create_table(&schema))?;
    let removed = store
        .execute_statement(&queries.remove_duplicates())
        .with_context(|| format!("Removing duplicates from {}", queries.qualified_table()))?;
    info!("Removed {removed} duplicate record(s) from {}", queries.qualified_table());
    Ok(())
}

fn handle_preview(args: &cli::PreviewArgs) -> Result<()> {
    let source = report_source(&args.report)?;
    let schema = Schema::shipments();
    let report = pipeline::load_prepared_report(&source, &args.date, &schema)
        .with_context(|| format!("Loading report for {}", args.date))?;
    print!("{}", table::render_dataset(&report, args.rows));
    info!(
        "Displayed {} of {} row(s) from {}",
        args.rows.min(report.len()),
        report.len(),
        args.date
    );
    Ok(())
}

fn connect(config: &StoreConfig) -> Result<SqliteStore> {
    debug!("Attempting to open store for {}", config.table);
    let store = SqliteStore::open(config).context("Connecting to the shipments store")?;
    info!("Connected to {:?}", config.database);
    Ok(store)
}

fn report_source(args: &cli::ReportArgs) -> Result<WeeklyReportSource> {
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let directory = args
        .reports_dir
        .clone()
        .unwrap_or_else(config::reports_dir_from_env);
    Ok(WeeklyReportSource::new(directory)
        .with_encoding(encoding)
        .with_delimiter(args.delimiter))
}

fn print_progress(progress: ChunkProgress) {
    let percent = if progress.total_rows == 0 {
        100.0
    } else {
        progress.rows_written as f64 * 100.0 / progress.total_rows as f64
    };
    let mut stderr = io::stderr().lock();
    let _ = write!(
        stderr,
        "\rWriting rows: {percent:.1}% | {}/{} rows | chunk {}/{}",
        progress.rows_written, progress.total_rows, progress.chunk, progress.chunks
    );
    let _ = stderr.flush();
}
