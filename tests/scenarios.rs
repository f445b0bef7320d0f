use pretty_assertions::assert_eq;
use sheet_structure::cleaner::column::{ColumnType, Value};
use sheet_structure::cleaner::names::clean_column_names;
use sheet_structure::cleaner::stats::MissingStats;
use sheet_structure::cleaner::DataCleaner;
use sheet_structure::config::Settings;
use sheet_structure::pipeline::{Pipeline, Status};
use sheet_structure::spreadsheet::{Bounds, CellValue, Grid};
use sheet_structure::structure::extract::{extract_from_decision, extract_table, TableData};
use sheet_structure::structure::header::find_header_row;
use sheet_structure::structure::region::find_regions;
use sheet_structure::structure::{StructureDetector, StructureType};
use std::collections::HashSet;

fn sales_sheet() -> Grid {
    Grid::from_text(vec![
        vec![Some("Name"), Some("Revenue")],
        vec![Some("Acme"), Some("100")],
        vec![Some("Beta"), Some("200")],
    ])
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).expect("serializable")
}

#[test]
fn table_extraction() {
    let pipeline = Pipeline::new(Settings::default());
    let sheet = pipeline.process_grid("Sales", &sales_sheet());

    assert_eq!(sheet.status, Status::Success);
    let structure = sheet.structure.as_ref().expect("structure decision");
    assert_eq!(structure.kind, StructureType::Structured);
    assert_eq!(structure.header_row, Some(0));
    assert_eq!(structure.data_start_row, Some(1));

    let raw = extract_from_decision(&sales_sheet(), structure).expect("table bounds present");
    assert_eq!(raw.columns, vec!["Name", "Revenue"]);
    assert_eq!(
        raw.data,
        vec![
            vec![CellValue::from("Acme"), CellValue::from("100")],
            vec![CellValue::from("Beta"), CellValue::from("200")],
        ]
    );

    assert_eq!(sheet.tables.len(), 1);
    let table = &sheet.tables[0].table;
    assert_eq!(table.columns, vec!["Name", "Revenue"]);
    assert_eq!(table.data_type("Name"), Some(ColumnType::Text));
    assert_eq!(table.data_type("Revenue"), Some(ColumnType::Integer));
    assert_eq!(
        table.column_values("Revenue"),
        Some(vec![&Value::Integer(100), &Value::Integer(200)])
    );
    assert!(sheet.documents.is_empty());
}

#[test]
fn key_value_extraction() {
    let grid = Grid::from_text(vec![
        vec![Some("COMPANY OVERVIEW")],
        vec![Some("Name:"), Some("Acme Corp")],
        vec![Some("Founded:"), Some("1999")],
    ]);
    let sheet = Pipeline::new(Settings::default()).process_grid("Overview", &grid);

    assert_eq!(sheet.structure.as_ref().map(|structure| structure.kind), Some(StructureType::Unstructured));
    assert!(sheet.tables.is_empty());
    assert_eq!(sheet.documents.len(), 1);
    let document = &sheet.documents[0];
    assert_eq!(document.bounds, Some(Bounds::new(0, 2, 0, 1)));
    assert_eq!(
        to_json(&document.content),
        r#"{"COMPANY OVERVIEW":{"Name":"Acme Corp","Founded":"1999"}}"#
    );
    assert_eq!((document.total_keys, document.max_depth), (3, 2));
}

#[test]
fn semi_structured_sheet_gives_both_outputs() {
    let grid = Grid::from_text(vec![
        vec![Some("Name"), Some("Revenue")],
        vec![Some("Acme"), Some("100")],
        vec![Some("Beta"), Some("200")],
        vec![],
        vec![Some("Prepared By:"), Some("Jane")],
        vec![Some("Reviewed:"), Some("Bob")],
    ]);
    let sheet = Pipeline::new(Settings::default()).process_grid("Report", &grid);
    let structure = sheet.structure.as_ref().expect("structure decision");

    assert_eq!(structure.kind, StructureType::SemiStructured);
    assert_eq!(structure.confidence, 0.75);
    assert_eq!(sheet.tables.len(), 1);
    assert_eq!(sheet.tables[0].bounds, Some(Bounds::new(0, 2, 0, 1)));
    assert_eq!(sheet.documents.len(), 1);
    assert_eq!(to_json(&sheet.documents[0].content), r#"{"Prepared By":"Jane","Reviewed":"Bob"}"#);

    let json: serde_json::Value = serde_json::to_value(&sheet).expect("serializable");
    assert_eq!(json["structure"]["type"], "semi_structured");
    assert_eq!(json["status"], "success");
}

#[test]
fn empty_sheet() {
    let grid = Grid::from_text(vec![vec![None, Some(" ")], vec![]]);
    let sheet = Pipeline::new(Settings::default()).process_grid("Blank", &grid);
    let structure = sheet.structure.as_ref().expect("structure decision");

    assert_eq!(sheet.status, Status::Empty);
    assert_eq!(structure.kind, StructureType::Empty);
    assert_eq!(structure.confidence, 1.0);
    assert!(structure.regions.is_empty());
    assert!(sheet.tables.is_empty() && sheet.documents.is_empty());
}

#[test]
fn detection_is_idempotent() {
    let settings = Settings::default();
    let grid = sales_sheet();
    let detector = StructureDetector::new(&settings);
    assert_eq!(
        detector.detect(&grid).expect("detection succeeds"),
        detector.detect(&grid).expect("detection succeeds")
    );

    let pipeline = Pipeline::new(settings.clone());
    assert_eq!(pipeline.process_grid("Sales", &grid), pipeline.process_grid("Sales", &grid));
}

#[test]
fn regions_partition_non_empty_cells() {
    let grid = Grid::from_text(vec![
        vec![Some("A"), Some("B"), None, Some("X")],
        vec![Some("C"), None, None, None],
        vec![None, None, Some("D"), Some("E")],
    ]);
    let regions = find_regions(&grid);

    assert_eq!(
        regions.iter().map(|region| region.bounds).collect::<Vec<_>>(),
        vec![Bounds::new(0, 1, 0, 1), Bounds::new(2, 2, 2, 3)]
    );
    let mut seen = HashSet::new();
    for region in &regions {
        assert_eq!(region.area, region.cells.len());
        for &(row, col) in &region.cells {
            assert!(!grid.get(row, col).is_blank());
            assert!(region.bounds.contains(row, col));
            assert!(seen.insert((row, col)), "cell ({row}, {col}) in two regions");
        }
    }
    // Isolated cells never form a region.
    assert!(!seen.contains(&(0, 3)));
}

#[test]
fn text_header_above_numbers_wins() {
    let mut rows = vec![vec![CellValue::from("Name"), CellValue::from("Revenue")]];
    for index in 1..=10i64 {
        rows.push(vec![CellValue::from(format!("Client {index}")), CellValue::Integer(index * 10)]);
    }
    let settings = Settings::default();
    let header = find_header_row(
        &rows,
        settings.max_scan_rows,
        settings.header_confidence_threshold,
        &settings.header_signal_weights,
    );
    assert_eq!(header, Some((0, 0.875)));

    let decision = StructureDetector::new(&settings)
        .detect(&Grid::new(rows))
        .expect("detection succeeds");
    assert_eq!(decision.kind, StructureType::Structured);
    assert_eq!(decision.header_row, Some(0));
    assert_eq!(decision.table_bounds, Some(Bounds::new(0, 10, 0, 1)));
}

#[test]
fn duplicate_column_names() {
    assert_eq!(clean_column_names(&["A", "A", "A"]), vec!["A", "A_1", "A_2"]);
}

#[test]
fn blank_header_cell_named_by_position() {
    let grid = Grid::from_text(vec![
        vec![Some("Name"), None, Some("Revenue")],
        vec![Some("Acme"), Some("North"), Some("100")],
        vec![Some("Beta"), Some("South"), Some("200")],
    ]);
    let raw = extract_table(&grid, &Bounds::new(0, 2, 0, 2), 0, 1);
    let settings = Settings::default();
    let cleaned = DataCleaner::new(&settings).clean(&raw);
    assert_eq!(cleaned.columns, vec!["Name", "Column_2", "Revenue"]);
}

#[test]
fn boolean_wins_over_categorical() {
    let settings = Settings::default();
    let cleaned = DataCleaner::new(&settings).clean(&TableData {
        columns: vec!["Active".to_owned()],
        data: vec![vec!["true".into()], vec!["false".into()], vec!["true".into()]],
        bounds: None,
    });
    assert_eq!(cleaned.data_type("Active"), Some(ColumnType::Boolean));
    assert_eq!(
        cleaned.column_values("Active"),
        Some(vec![&Value::Boolean(true), &Value::Boolean(false), &Value::Boolean(true)])
    );
}

#[test]
fn dates_are_canonicalized() {
    let settings = Settings::default();
    let cleaned = DataCleaner::new(&settings).clean(&TableData {
        columns: vec!["Date".to_owned()],
        data: vec![
            vec!["31/12/2023".into()],
            vec!["2023-12-31".into()],
            vec!["December 31, 2023".into()],
        ],
        bounds: None,
    });
    let canonical = Value::Text("2023-12-31".to_owned());
    assert_eq!(cleaned.data_type("Date"), Some(ColumnType::Date));
    assert_eq!(cleaned.column_values("Date"), Some(vec![&canonical, &canonical, &canonical]));
}

#[test]
fn zero_rows_have_no_missing_share() {
    assert_eq!(MissingStats::of(&[]), MissingStats { count: 0, percentage: 0.0 });

    let settings = Settings::default();
    let cleaned = DataCleaner::new(&settings).clean(&TableData {
        columns: vec!["Name".to_owned()],
        data: vec![],
        bounds: None,
    });
    assert!(cleaned.is_empty());
    assert_eq!(cleaned.row_count, 0);
}
