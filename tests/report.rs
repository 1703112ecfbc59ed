mod common;

use std::io::Cursor;

use chrono::NaiveDate;
use common::{TestWorkspace, report_line};
use shipment_ledger::data::Value;
use shipment_ledger::pipeline::{PipelineError, load_prepared_report};
use shipment_ledger::report::{ReportError, ReportSource, WeeklyReportSource, prepare_report};
use shipment_ledger::schema::{
    ACCOUNT, EXT_COST, EXT_PRICE, INVOICE, RECORD, SHIP_DATE, SHIPPED, Schema,
};

#[test]
fn path_for_builds_week_ending_name() {
    let source = WeeklyReportSource::new("Exports");
    let path = source.path_for("01-05-2024").expect("valid date");
    assert_eq!(path, std::path::Path::new("Exports").join("Week Ending 01-05-2024.csv"));
}

#[test]
fn path_for_rejects_other_date_forms() {
    let source = WeeklyReportSource::new("Exports");
    for bad in ["2024-01-05", "13-01-2024", "soon"] {
        assert!(matches!(
            source.path_for(bad),
            Err(ReportError::InvalidDate(_))
        ));
    }
}

#[test]
fn prompt_repeats_until_report_exists() {
    let workspace = TestWorkspace::new();
    workspace.write_report("01-05-2024", &[]);
    let source = WeeklyReportSource::new(workspace.reports_dir());

    let mut input = Cursor::new("yesterday\n01-01-2024\n01-05-2024\n");
    let mut output = Vec::new();
    let date = source
        .prompt_for_date(&mut input, &mut output)
        .expect("date accepted");

    assert_eq!(date, "01-05-2024");
    let prompts = String::from_utf8(output).expect("utf8 prompt");
    assert_eq!(prompts.matches("mm-dd-yyyy").count(), 3);
}

#[test]
fn prompt_aborts_on_end_of_input() {
    let workspace = TestWorkspace::new();
    let source = WeeklyReportSource::new(workspace.reports_dir());
    let mut input = Cursor::new("01-01-2024\n");
    let err = source
        .prompt_for_date(&mut input, &mut Vec::new())
        .expect_err("input exhausted");
    assert!(matches!(err, ReportError::PromptAborted));
}

#[test]
fn missing_report_is_not_found() {
    let workspace = TestWorkspace::new();
    let source = WeeklyReportSource::new(workspace.reports_dir());
    assert!(matches!(
        source.load_report("01-05-2024"),
        Err(ReportError::NotFound(_))
    ));
}

#[test]
fn prepared_report_is_renamed_typed_and_keyed() {
    let workspace = TestWorkspace::new();
    workspace.write_report(
        "01-05-2024",
        &[
            &report_line("S1", "1001.0", "P1", "1,000"),
            &report_line("S2", "1002", "P9", "(5)"),
        ],
    );
    let source = WeeklyReportSource::new(workspace.reports_dir());
    let raw = source.load_report("01-05-2024").expect("report loads");
    assert!(raw.has_column("Invoice #"));

    let report = prepare_report(raw, &Schema::shipments()).expect("report prepares");
    assert_eq!(report.columns(), Schema::shipments().headers().as_slice());
    assert_eq!(report.cell(0, RECORD), Some(&Value::from("S1.1001.P1")));
    assert_eq!(report.cell(0, INVOICE), Some(&Value::from("1001")));
    assert_eq!(report.cell(1, ACCOUNT), Some(&Value::from("S2")));
    assert_eq!(
        report.cell(0, SHIP_DATE),
        Some(&Value::Date(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()))
    );
    assert_eq!(report.cell(0, SHIPPED), Some(&Value::Integer(1000)));
    assert_eq!(report.cell(1, SHIPPED), Some(&Value::Integer(-5)));
    assert_eq!(report.cell(0, EXT_PRICE), Some(&Value::Float(1250.0)));
    assert_eq!(report.cell(0, EXT_COST), Some(&Value::Float(-12.0)));
}

#[test]
fn sanitization_failure_names_the_report() {
    let workspace = TestWorkspace::new();
    let path = workspace.write_report("01-05-2024", &[&report_line("S1", "1", "P1", "lots")]);
    let source = WeeklyReportSource::new(workspace.reports_dir());

    let err = load_prepared_report(&source, "01-05-2024", &Schema::shipments())
        .expect_err("quantity is not numeric");
    match err {
        PipelineError::Report(ReportError::Sanitize { path: reported, .. }) => {
            assert_eq!(reported, path);
        }
        other => panic!("expected sanitize error, got {other:?}"),
    }
}
