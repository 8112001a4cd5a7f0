use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use rust_xlsxwriter::Workbook;
use std::io::{Cursor, Write};

use wo_cost_report::aggregate::available_dates;
use wo_cost_report::loader::{load_table, read_table, InputFormat};
use wo_cost_report::output::{breakdown_xlsx_bytes, render_report};
use wo_cost_report::types::Provenance;
use wo_cost_report::{
    AppConfig, CanonicalField, DateSelection, GroupBy, Rate, ReportError, ReportPipeline,
    ReportRequest,
};

enum Cell<'a> {
    T(&'a str),
    N(f64),
}

fn xlsx(headers: &[&str], rows: &[Vec<Cell<'_>>]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (c, h) in headers.iter().enumerate() {
        sheet.write_string(0, c as u16, *h).unwrap();
    }
    for (r, row) in rows.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            let (r, c) = (r as u32 + 1, c as u16);
            match cell {
                Cell::T(s) => sheet.write_string(r, c, *s).unwrap(),
                Cell::N(n) => sheet.write_number(r, c, *n).unwrap(),
            };
        }
    }
    workbook.save_to_buffer().unwrap()
}

fn crew_export() -> Vec<u8> {
    use Cell::*;
    xlsx(
        &["Employee", "WO #", "Total Hours", "WO Type", "Craft", "Prod Date"],
        &[
            vec![T("Ana"), T("1001"), N(5.0), T("1"), T("Elec"), T("2025-03-14")],
            vec![T("Ben"), T("1002"), N(3.0), T("4"), T("Elec"), T("2025-03-14")],
            vec![T("Cy"), T("1003"), N(2.0), T("1"), T("Mech"), T("2025-03-15")],
        ],
    )
}

fn rate(v: f64) -> Rate {
    Rate::new(v).unwrap()
}

#[test]
fn workbook_export_produces_sectioned_breakdown() {
    let table = read_table(&crew_export(), InputFormat::Workbook, 0).unwrap();
    let out = ReportPipeline::default()
        .run(&table, &ReportRequest::new(rate(10.0)))
        .unwrap();
    let payload = &out.payload;

    let keys: Vec<&str> = payload.groups.iter().map(|g| g.key.as_str()).collect();
    assert_eq!(keys, vec!["Elec", "Mech"]);

    let elec = &payload.groups[0];
    let labels: Vec<&str> = elec.aggregate.iter().map(|r| r.label()).collect();
    assert_eq!(labels, vec!["Maintenance Order", "Urgent Corrective"]);
    assert_eq!(elec.aggregate[0].percent_of_group, 62.5);
    assert_eq!(elec.aggregate[1].percent_of_group, 37.5);
    assert_eq!(elec.totals.hours, 8.0);
    assert_eq!(elec.totals.cost, 80.0);

    assert_eq!(payload.summary.total_hours, 10.0);
    assert_eq!(payload.summary.total_cost, 100.0);
    let top = payload.summary.top_type.as_ref().unwrap();
    assert_eq!(top.label, "Maintenance Order");
    assert_eq!(top.percent, 70.0);

    assert_eq!(payload.full_detail.len(), 3);
    assert_eq!(payload.full_detail[2].name, "Cy");
    assert_eq!(payload.full_detail[0].work_order_number, "1001");

    let text = render_report(payload, "$");
    assert!(text.contains("## Craft: Elec"));
    assert!(text.contains("Total: 8.00 hours, $80.00"));
}

#[test]
fn date_listing_and_selection() {
    let table = read_table(&crew_export(), InputFormat::Workbook, 0).unwrap();
    let pipeline = ReportPipeline::default();
    let normalized = pipeline.prepare(&table).unwrap();

    let d14 = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
    let d15 = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();
    assert_eq!(available_dates(&normalized.rows), vec![d14, d15]);

    let mut request = ReportRequest::new(rate(75.0));
    request.dates = DateSelection::only([d14]);
    let payload = pipeline.report(&normalized, &request);
    assert_eq!(payload.groups.len(), 1);
    assert_eq!(payload.summary.total_hours, 8.0);
    assert_eq!(payload.summary.total_cost, 600.0);

    request.dates = DateSelection::only(Vec::new());
    let empty = pipeline.report(&normalized, &request);
    assert!(empty.groups.is_empty());
    assert!(empty.full_detail.is_empty());
    assert_eq!(empty.summary.total_hours, 0.0);
    assert_eq!(empty.summary.top_type, None);
    assert!(render_report(&empty, "$").contains("No rows match"));
}

#[test]
fn cost_center_falls_back_to_fixed_column() {
    use Cell::*;
    let mut headers: Vec<String> = (0..14).map(|i| format!("Extra {}", i)).collect();
    headers[0] = "Name".into();
    headers[1] = "Hours".into();
    headers[13] = "Account".into();
    let header_refs: Vec<&str> = headers.iter().map(String::as_str).collect();

    let mut row: Vec<Cell<'_>> = (0..14).map(|_| T("x")).collect();
    row[0] = T("Ana");
    row[1] = N(4.0);
    row[13] = T("CC-410");
    let bytes = xlsx(&header_refs, &[row]);

    let table = read_table(&bytes, InputFormat::Workbook, 0).unwrap();
    let normalized = ReportPipeline::default().prepare(&table).unwrap();
    assert_eq!(
        normalized.stats.cost_center_source,
        Some(Provenance::Positional)
    );
    let cc = &normalized.rows[0].cost_center;
    assert_eq!(cc.value, "CC-410");
    assert!(!cc.provenance.is_verified());
    assert_eq!(cc.display(), "CC-410 (unverified)");

    let payload = ReportPipeline::default().report(&normalized, &ReportRequest::new(rate(1.0)));
    assert!(!payload.full_detail[0].cost_center_verified);
}

#[test]
fn short_table_has_missing_cost_center() {
    let table = read_table(&crew_export(), InputFormat::Workbook, 0).unwrap();
    let normalized = ReportPipeline::default().prepare(&table).unwrap();
    assert_eq!(normalized.rows[0].cost_center.value, "Missing");
    assert_eq!(normalized.stats.cost_center_source, Some(Provenance::Missing));
}

#[test]
fn csv_file_with_defects_still_reports() {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    writeln!(file, "Name,Hours,Type,Craft").unwrap();
    writeln!(file, "Ana,4,1,Elec").unwrap();
    writeln!(file, "Ben,,1,Elec").unwrap();
    writeln!(file, "Cy,n/a,Z,").unwrap();
    file.flush().unwrap();

    let table = load_table(file.path(), 0).unwrap();
    let out = ReportPipeline::default()
        .run(&table, &ReportRequest::new(rate(50.0)))
        .unwrap();

    assert_eq!(out.normalized.stats.blank_hours, 1);
    assert_eq!(out.normalized.stats.invalid_hours, 1);
    assert_eq!(out.normalized.stats.unmapped_types, 1);

    let keys: Vec<&str> = out.payload.groups.iter().map(|g| g.key.as_str()).collect();
    assert_eq!(keys, vec!["Elec", "Unspecified"]);
    assert_eq!(out.payload.summary.total_hours, 4.0);
    assert_eq!(out.payload.summary.total_cost, 200.0);
}

#[test]
fn exported_workbook_reads_back() {
    let table = read_table(&crew_export(), InputFormat::Workbook, 0).unwrap();
    let payload = ReportPipeline::default()
        .run(&table, &ReportRequest::new(rate(10.0)))
        .unwrap()
        .payload;

    let bytes = breakdown_xlsx_bytes(&payload, "$").unwrap();
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes)).unwrap();
    assert_eq!(workbook.sheet_names(), vec!["Breakdown".to_string(), "Detail".to_string()]);

    let breakdown = workbook.worksheet_range("Breakdown").unwrap();
    let rows: Vec<&[Data]> = breakdown.rows().collect();
    assert_eq!(rows[0][0], Data::String("Craft".into()));
    assert_eq!(rows[1][0], Data::String("Elec".into()));
    assert_eq!(rows[1][1], Data::String("Maintenance Order".into()));
    assert_eq!(rows[1][2], Data::Float(5.0));
    assert_eq!(rows[3][1], Data::String("TOTAL".into()));
    assert_eq!(rows[3][4], Data::Float(80.0));

    let detail = workbook.worksheet_range("Detail").unwrap();
    assert_eq!(detail.get_size().0, 4);
}

#[test]
fn config_drives_grouping_and_strict_fields() {
    let cfg = AppConfig::from_toml_str(
        r#"
group_by = "none"
breakdown_by = "Craft"
"#,
    )
    .unwrap();
    assert_eq!(cfg.group_by, GroupBy::None);

    let table = read_table(&crew_export(), InputFormat::Workbook, 0).unwrap();
    let pipeline = ReportPipeline::from_config(&cfg);
    let mut request = ReportRequest::new(rate(10.0));
    request.group_by = cfg.group_by;
    request.breakdown_by = cfg.breakdown_by;
    let payload = pipeline.run(&table, &request).unwrap().payload;
    assert_eq!(payload.groups.len(), 1);
    assert_eq!(payload.groups[0].key, "All");
    let labels: Vec<&str> = payload.groups[0].aggregate.iter().map(|r| r.label()).collect();
    assert_eq!(labels, vec!["Elec", "Mech"]);
    assert_eq!(payload.groups[0].aggregate[0].percent_of_group, 80.0);

    let strict = AppConfig::from_toml_str("required_fields = [\"CostCenter\"]").unwrap();
    let err = ReportPipeline::from_config(&strict)
        .prepare(&table)
        .unwrap_err();
    assert!(matches!(err, ReportError::MissingFields(ref f) if f == &vec![CanonicalField::CostCenter]));
}

#[test]
fn garbage_bytes_are_structural() {
    let err = read_table(b"not a workbook", InputFormat::Workbook, 0).unwrap_err();
    assert!(matches!(err, ReportError::Structural(_)));
}
