mod common;

use std::fs;

use calamine::DataType;
use common::{Fx, archive, read_back, read_cells, sku_list, workbook};
use sku_filter::load::{load_reference, load_sources};
use sku_filter::{
    ColumnContext, FilterOptions, FilterOutcome, SavedOutcome, SourceInput, ToolError, filter,
    filter_to_path,
};
use tempfile::tempdir;

fn stock_workbook() -> Vec<u8> {
    workbook(&[
        (
            "North",
            vec![
                vec![Fx::S(" SKU Code "), Fx::S("Qty")],
                vec![Fx::S("a1"), Fx::N(5.0)],
                vec![Fx::S("ZZ-9"), Fx::N(1.0)],
                vec![Fx::N(123.0), Fx::N(7.0)],
            ],
        ),
        (
            "South",
            vec![
                vec![Fx::S("SKU Code"), Fx::S("Qty"), Fx::S("Bin")],
                vec![Fx::S("B2 "), Fx::N(2.0), Fx::S("R4")],
                vec![Fx::S("a1"), Fx::N(3.0), Fx::S("R1")],
            ],
        ),
    ])
}

fn expect_workbook(outcome: FilterOutcome) -> (Vec<u8>, sku_filter::FilterReport) {
    match outcome {
        FilterOutcome::Workbook { bytes, report } => (bytes, report),
        FilterOutcome::NoMatches { .. } => panic!("expected matching rows"),
    }
}

#[test]
fn filters_rows_across_sheets_with_provenance() {
    let sources = [SourceInput::from_bytes("stock.xlsx", stock_workbook())];
    let reference = SourceInput::from_bytes("skus.xlsx", sku_list(&["A1", "b2", "123"]));

    let outcome = filter(&sources, &reference, &FilterOptions::default()).expect("filter succeeds");
    let (bytes, report) = expect_workbook(outcome);

    assert_eq!(report.reference_values, 3);
    assert_eq!(report.tables_loaded, 2);
    assert_eq!(report.unified_rows, 5);
    assert_eq!(report.filtered_rows, 4);
    assert_eq!(report.sheet_rows, vec![4]);

    let sheets = read_back(&bytes);
    assert_eq!(sheets.len(), 1);
    let (name, rows) = &sheets[0];
    assert_eq!(name, "Sheet1");
    assert_eq!(rows[0], ["SKU Code", "Qty", "__file__", "__sheet__", "Bin"]);
    assert_eq!(rows[1], ["a1", "5", "stock.xlsx", "North", ""]);
    assert_eq!(rows[2], ["123", "7", "stock.xlsx", "North", ""]);
    assert_eq!(rows[3], ["B2 ", "2", "stock.xlsx", "South", "R4"]);
    assert_eq!(rows[4], ["a1", "3", "stock.xlsx", "South", "R1"]);
}

#[test]
fn reference_values_are_normalized_and_deduplicated() {
    let reference = SourceInput::from_bytes("skus.xlsx", sku_list(&["a1", " A2 ", "a1"]));

    let set = load_reference(&reference, "SKU Code").expect("reference loaded");

    assert_eq!(set.iter().collect::<Vec<_>>(), vec!["A1", "A2"]);
}

#[test]
fn drifting_identifier_headers_are_both_eligible() {
    let data = workbook(&[
        (
            "Jan",
            vec![vec![Fx::S("SKU Code")], vec![Fx::S("A1")], vec![Fx::S("X")]],
        ),
        (
            "Feb",
            vec![vec![Fx::S("sku code ")], vec![Fx::S("a2")]],
        ),
    ]);
    let sources = [SourceInput::from_bytes("data.xlsx", data)];
    let reference = SourceInput::from_bytes("skus.xlsx", sku_list(&["a1", "A2"]));

    let outcome = filter(&sources, &reference, &FilterOptions::default()).expect("filter succeeds");
    let (bytes, report) = expect_workbook(outcome);

    assert_eq!(report.filtered_rows, 2);
    let rows = &read_back(&bytes)[0].1;
    assert_eq!(rows[0], ["SKU Code", "__file__", "__sheet__", "sku code"]);
    assert_eq!(rows[1], ["A1", "data.xlsx", "Jan", ""]);
    assert_eq!(rows[2], ["", "data.xlsx", "Feb", "a2"]);
}

#[test]
fn corrupt_archive_entry_is_skipped() {
    let valid = workbook(&[(
        "Sheet1",
        vec![vec![Fx::S("SKU Code"), Fx::S("Qty")], vec![Fx::S("A1"), Fx::N(4.0)]],
    )]);
    let bundle = archive(&[
        ("exports/broken.xlsx", b"this is not a workbook".to_vec()),
        ("exports/good.xlsx", valid),
        ("exports/readme.txt", b"ignored".to_vec()),
    ]);
    let sources = [SourceInput::from_bytes("batch.zip", bundle)];
    let reference = SourceInput::from_bytes("skus.xlsx", sku_list(&["A1"]));

    let outcome = filter(&sources, &reference, &FilterOptions::default()).expect("filter succeeds");
    let (bytes, report) = expect_workbook(outcome);

    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].archive, "batch.zip");
    assert_eq!(report.skipped[0].entry, "exports/broken.xlsx");
    let rows = &read_back(&bytes)[0].1;
    assert_eq!(rows[1], ["A1", "4", "good.xlsx", "Sheet1"]);
}

#[test]
fn missing_identifier_lists_union_of_columns() {
    let data = workbook(&[
        ("One", vec![vec![Fx::S("Item")], vec![Fx::S("A1")]]),
        ("Two", vec![vec![Fx::S("Barcode")], vec![Fx::S("A1")]]),
    ]);
    let sources = [SourceInput::from_bytes("data.xlsx", data)];
    let reference = SourceInput::from_bytes("skus.xlsx", sku_list(&["A1"]));

    let error = filter(&sources, &reference, &FilterOptions::default()).unwrap_err();

    match error {
        ToolError::MissingColumn {
            context, available, ..
        } => {
            assert_eq!(context, ColumnContext::Data);
            assert_eq!(available, vec!["Item", "__file__", "__sheet__", "Barcode"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_reference_column_reports_found_columns() {
    let reference = workbook(&[("Sheet1", vec![vec![Fx::S("Code")], vec![Fx::S("A1")]])]);
    let reference = SourceInput::from_bytes("skus.xlsx", reference);

    let error = load_reference(&reference, "SKU Code").unwrap_err();

    match error {
        ToolError::MissingColumn {
            context, available, ..
        } => {
            assert_eq!(context, ColumnContext::Reference);
            assert_eq!(available, vec!["Code"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn blank_reference_column_is_rejected() {
    let reference = SourceInput::from_bytes("skus.xlsx", sku_list(&["  ", ""]));

    let error = load_reference(&reference, "SKU Code").unwrap_err();

    assert!(matches!(error, ToolError::EmptyReference { .. }));
}

#[test]
fn archive_reference_is_rejected() {
    let bundle = archive(&[("skus.xlsx", sku_list(&["A1"]))]);
    let reference = SourceInput::from_bytes("skus.zip", bundle);

    let error = load_reference(&reference, "SKU Code").unwrap_err();

    assert!(matches!(error, ToolError::UnsupportedFormat { .. }));
}

#[test]
fn unsupported_source_is_rejected() {
    let sources = [SourceInput::from_bytes("stock.csv", b"SKU Code\nA1\n".to_vec())];
    let reference = SourceInput::from_bytes("skus.xlsx", sku_list(&["A1"]));

    let error = filter(&sources, &reference, &FilterOptions::default()).unwrap_err();

    match error {
        ToolError::UnsupportedFormat { input, .. } => assert_eq!(input, "stock.csv"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn archive_without_workbooks_has_no_data() {
    let bundle = archive(&[("notes.txt", b"nothing here".to_vec())]);

    let error = load_sources(&[SourceInput::from_bytes("batch.zip", bundle)]).unwrap_err();

    assert!(matches!(error, ToolError::NoData));
}

#[test]
fn corrupt_direct_workbook_is_fatal() {
    let sources = [SourceInput::from_bytes("stock.xlsx", b"garbage".to_vec())];

    let error = load_sources(&sources).unwrap_err();

    assert!(matches!(
        error,
        ToolError::UnreadableWorkbook { ref input, .. } if input == "stock.xlsx"
    ));
}

#[test]
fn no_matches_is_a_notice_and_writes_nothing() {
    let sources = [SourceInput::from_bytes("stock.xlsx", stock_workbook())];
    let reference = SourceInput::from_bytes("skus.xlsx", sku_list(&["NOPE"]));
    let temp_dir = tempdir().expect("temporary directory");
    let output = temp_dir.path().join("result.xlsx");

    let outcome = filter_to_path(&sources, &reference, &FilterOptions::default(), &output)
        .expect("filter succeeds");

    match outcome {
        SavedOutcome::NoMatches { report } => {
            assert_eq!(report.filtered_rows, 0);
            assert!(report.sheet_rows.is_empty());
        }
        SavedOutcome::Written { .. } => panic!("nothing should match"),
    }
    assert_eq!(fs::read_dir(temp_dir.path()).expect("dir listed").count(), 0);
}

#[test]
fn output_is_split_across_sheets_in_order() {
    let lines: Vec<String> = (1..=5).map(|line| format!("L{line}")).collect();
    let mut rows = vec![vec![Fx::S("SKU Code"), Fx::S("Line")]];
    for line in &lines {
        rows.push(vec![Fx::S("A1"), Fx::S(line)]);
    }
    let sources = [SourceInput::from_bytes("data.xlsx", workbook(&[("Data", rows)]))];
    let reference = SourceInput::from_bytes("skus.xlsx", sku_list(&["A1"]));
    let options = FilterOptions {
        max_rows_per_sheet: 2,
        ..FilterOptions::default()
    };

    let (bytes, report) =
        expect_workbook(filter(&sources, &reference, &options).expect("filter succeeds"));

    assert_eq!(report.sheet_rows, vec![2, 2, 1]);
    let sheets = read_back(&bytes);
    let names: Vec<&str> = sheets.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["Sheet1", "Sheet2", "Sheet3"]);

    let mut written_lines = Vec::new();
    for (_, rows) in &sheets {
        assert_eq!(rows[0], ["SKU Code", "Line", "__file__", "__sheet__"]);
        assert!(rows.len() - 1 <= 2);
        written_lines.extend(rows[1..].iter().map(|row| row[1].clone()));
    }
    assert_eq!(written_lines, lines);
}

#[test]
fn identical_inputs_give_identical_bytes() {
    let sources = [SourceInput::from_bytes("stock.xlsx", stock_workbook())];
    let reference = SourceInput::from_bytes("skus.xlsx", sku_list(&["A1", "B2"]));
    let options = FilterOptions::default();

    let (first, _) = expect_workbook(filter(&sources, &reference, &options).expect("first run"));
    let (second, _) = expect_workbook(filter(&sources, &reference, &options).expect("second run"));

    assert_eq!(first, second);
}

#[test]
fn writes_result_file_from_paths() {
    let temp_dir = tempdir().expect("temporary directory");
    let data_path = temp_dir.path().join("stock.xlsx");
    let sku_path = temp_dir.path().join("skus.xlsx");
    let output = temp_dir.path().join("out").join("result.xlsx");
    fs::write(&data_path, stock_workbook()).expect("data written");
    fs::write(&sku_path, sku_list(&["ZZ-9"])).expect("skus written");
    fs::create_dir(temp_dir.path().join("out")).expect("output dir");

    let outcome = filter_to_path(
        &[SourceInput::from_path(&data_path)],
        &SourceInput::from_path(&sku_path),
        &FilterOptions::default(),
        &output,
    )
    .expect("filter succeeds");

    assert!(matches!(outcome, SavedOutcome::Written { ref path, .. } if *path == output));
    let written: Vec<_> = fs::read_dir(temp_dir.path().join("out"))
        .expect("dir listed")
        .map(|entry| entry.expect("entry").file_name())
        .collect();
    assert_eq!(written, vec![std::ffi::OsString::from("result.xlsx")]);

    let sheets = read_back(&fs::read(&output).expect("output read"));
    assert_eq!(sheets[0].1[1], ["ZZ-9", "1", "stock.xlsx", "North", ""]);
}

#[test]
fn missing_source_path_is_reported() {
    let reference = SourceInput::from_bytes("skus.xlsx", sku_list(&["A1"]));
    let sources = [SourceInput::from_path("/no/such/stock.xlsx")];

    let error = filter(&sources, &reference, &FilterOptions::default()).unwrap_err();

    assert!(matches!(error, ToolError::MissingInput(_)));
}

#[test]
fn date_identifiers_match_their_rendered_text() {
    // 45296 is the Excel serial for 2024-01-05.
    let data = workbook(&[(
        "Deliveries",
        vec![
            vec![Fx::S("SKU Code"), Fx::S("Qty")],
            vec![Fx::S("A1"), Fx::N(1.0)],
            vec![Fx::D(45296.0), Fx::N(2.0)],
        ],
    )]);
    let sources = [SourceInput::from_bytes("data.xlsx", data)];
    let reference = SourceInput::from_bytes("skus.xlsx", sku_list(&["2024-01-05 00:00:00"]));

    let outcome = filter(&sources, &reference, &FilterOptions::default()).expect("filter succeeds");
    let (bytes, report) = expect_workbook(outcome);

    assert_eq!(report.filtered_rows, 1);
    let rows = &read_cells(&bytes)[0].1;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1][0], DataType::DateTime(45296.0));
    assert_eq!(rows[1][1], DataType::Float(2.0));
}
