use chrono::NaiveDate;
use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook, Worksheet};
use serde::Serialize;
use std::path::Path;
use tabled::{builder::Builder, settings::Style, Table, Tabled};

use crate::aggregate::date_label;
use crate::error::ReportError;
use crate::normalize::NormalizeStats;
use crate::types::{DetailRow, Provenance, ReportPayload, ALL_DATA, DETAIL_COLUMNS};
use crate::util::{format_currency, format_int, format_number};

/// One aggregate line flattened for CSV export and on-screen tables.
#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct BreakdownRow {
    #[serde(rename = "Group")]
    #[tabled(rename = "Group")]
    pub group: String,
    #[serde(rename = "Key")]
    #[tabled(rename = "Key")]
    pub key: String,
    #[serde(rename = "Hours")]
    #[tabled(rename = "Hours")]
    pub hours: String,
    #[serde(rename = "Percent")]
    #[tabled(rename = "Percent")]
    pub percent: String,
    #[serde(rename = "Cost")]
    #[tabled(rename = "Cost")]
    pub cost: String,
}

pub fn breakdown_rows(payload: &ReportPayload, currency: &str) -> Vec<BreakdownRow> {
    payload
        .all_aggregate_rows()
        .map(|(group, r)| BreakdownRow {
            group: group.to_string(),
            key: r.label().to_string(),
            hours: format_number(r.hours, 2),
            percent: format_number(r.percent_of_group, 2),
            cost: format_currency(r.cost, currency),
        })
        .collect()
}

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), ReportError> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Detail rows in the fixed display column order. The header is written even
/// when there are no rows.
pub fn write_detail_csv(path: &Path, rows: &[DetailRow]) -> Result<(), ReportError> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(DETAIL_COLUMNS)?;
    for r in rows {
        let hours = r.hours.to_string();
        wtr.write_record([
            r.name.as_str(),
            r.work_order_number.as_str(),
            hours.as_str(),
            r.work_type.as_str(),
            r.cost_center.as_str(),
            r.description.as_str(),
            r.problem.as_str(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ReportError> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

fn markdown<T: Tabled>(rows: &[T]) -> String
where
    T: Clone,
{
    if rows.is_empty() {
        return "(no rows)\n".to_string();
    }
    let mut table = Table::new(rows.to_vec());
    table.with(Style::markdown());
    format!("{}\n", table)
}

/// Full console rendering: one section per group, then the summary block.
pub fn render_report(payload: &ReportPayload, currency: &str) -> String {
    let mut out = String::new();
    let heading = payload
        .group_field
        .map(|f| f.name().to_string())
        .unwrap_or_else(|| "Report".to_string());

    if payload.groups.is_empty() {
        out.push_str("No rows match the current selection.\n\n");
    }

    for group in &payload.groups {
        out.push_str(&format!("## {}: {}\n\n", heading, group.key));
        out.push_str(&markdown(&group.detail));
        out.push('\n');

        let mut builder = Builder::default();
        builder.push_record(vec![
            payload.breakdown_field.name().to_string(),
            "Hours".to_string(),
            "Percent".to_string(),
            "Cost".to_string(),
        ]);
        for r in &group.aggregate {
            builder.push_record(vec![
                r.label().to_string(),
                format_number(r.hours, 2),
                format!("{}%", format_number(r.percent_of_group, 2)),
                format_currency(r.cost, currency),
            ]);
        }
        let mut table = builder.build();
        table.with(Style::markdown());
        out.push_str(&format!("{}\n", table));
        out.push_str(&format!(
            "Total: {} hours, {}\n\n",
            format_number(group.totals.hours, 2),
            format_currency(group.totals.cost, currency)
        ));
    }

    out.push_str(&render_summary(payload, currency));
    out
}

pub fn render_summary(payload: &ReportPayload, currency: &str) -> String {
    let s = &payload.summary;
    let mut out = format!(
        "Labor rate: {}/hr\nTotal Hours: {}\nTotal Cost: {}\n",
        format_currency(payload.rate, currency),
        format_number(s.total_hours, 2),
        format_currency(s.total_cost, currency)
    );
    if let Some(top) = &s.top_type {
        out.push_str(&format!(
            "Top Type: {} ({} hours, {}%)\n",
            top.label,
            format_number(top.hours, 2),
            format_number(top.percent, 2)
        ));
    }
    out
}

pub fn render_dates(dates: &[NaiveDate]) -> String {
    if dates.is_empty() {
        return format!("{} (no production dates found)\n", ALL_DATA);
    }
    dates
        .iter()
        .map(|d| format!("{}\n", date_label(*d)))
        .collect()
}

/// Short diagnostics block printed after loading, like a load report.
pub fn render_stats(stats: &NormalizeStats) -> String {
    let mut out = format!(
        "Processing dataset... ({} rows loaded)\n",
        format_int(stats.total_rows)
    );
    if stats.blank_hours + stats.invalid_hours > 0 {
        out.push_str(&format!(
            "Note: {} blank and {} unreadable Hours values counted as 0.\n",
            format_int(stats.blank_hours),
            format_int(stats.invalid_hours)
        ));
    }
    if stats.unknown_dates > 0 {
        out.push_str(&format!(
            "Note: {} rows have no readable production date.\n",
            format_int(stats.unknown_dates)
        ));
    }
    if stats.unmapped_types > 0 {
        out.push_str(&format!(
            "Info: {} Type values are not known codes and were kept as-is.\n",
            format_int(stats.unmapped_types)
        ));
    }
    match stats.cost_center_source {
        Some(Provenance::Positional) => out.push_str(
            "Warning: CostCenter taken from a fixed column position; values are unverified.\n",
        ),
        Some(Provenance::Missing) => {
            out.push_str("Info: no CostCenter column found.\n");
        }
        _ => {}
    }
    out
}

struct XlsxFormats {
    header: Format,
    text: Format,
    number: Format,
    percent: Format,
    currency: Format,
    total: Format,
    total_number: Format,
    total_currency: Format,
}

fn create_formats(currency: &str) -> XlsxFormats {
    let money = format!("\"{}\"#,##0.00", currency);
    XlsxFormats {
        header: Format::new()
            .set_bold()
            .set_border(FormatBorder::Thin)
            .set_align(FormatAlign::Center),
        text: Format::new().set_border(FormatBorder::Thin),
        number: Format::new()
            .set_num_format("#,##0.00")
            .set_border(FormatBorder::Thin),
        percent: Format::new()
            .set_num_format("0.00%")
            .set_border(FormatBorder::Thin),
        currency: Format::new()
            .set_num_format(&money)
            .set_border(FormatBorder::Thin),
        total: Format::new().set_bold().set_border(FormatBorder::Thin),
        total_number: Format::new()
            .set_bold()
            .set_num_format("#,##0.00")
            .set_border(FormatBorder::Thin),
        total_currency: Format::new()
            .set_bold()
            .set_num_format(&money)
            .set_border(FormatBorder::Thin),
    }
}

fn write_headers(sheet: &mut Worksheet, headers: &[&str], fmt: &Format) -> Result<(), ReportError> {
    for (col, h) in headers.iter().enumerate() {
        sheet.write_with_format(0, col as u16, *h, fmt)?;
        sheet.set_column_width(col as u16, 18)?;
    }
    Ok(())
}

fn add_breakdown_sheet(
    workbook: &mut Workbook,
    payload: &ReportPayload,
    formats: &XlsxFormats,
) -> Result<(), ReportError> {
    let sheet = workbook.add_worksheet();
    sheet.set_name("Breakdown")?;
    let group_header = payload
        .group_field
        .map(|f| f.name())
        .unwrap_or("Group");
    write_headers(
        sheet,
        &[
            group_header,
            payload.breakdown_field.name(),
            "Hours",
            "Percent",
            "Cost",
        ],
        &formats.header,
    )?;

    let mut row: u32 = 1;
    for group in &payload.groups {
        for r in &group.aggregate {
            sheet.write_with_format(row, 0, group.key.as_str(), &formats.text)?;
            sheet.write_with_format(row, 1, r.label(), &formats.text)?;
            sheet.write_with_format(row, 2, r.hours, &formats.number)?;
            sheet.write_with_format(row, 3, r.percent_of_group / 100.0, &formats.percent)?;
            sheet.write_with_format(row, 4, r.cost, &formats.currency)?;
            row += 1;
        }
        sheet.write_with_format(row, 0, group.key.as_str(), &formats.total)?;
        sheet.write_with_format(row, 1, "TOTAL", &formats.total)?;
        sheet.write_with_format(row, 2, group.totals.hours, &formats.total_number)?;
        sheet.write_with_format(row, 3, "", &formats.total)?;
        sheet.write_with_format(row, 4, group.totals.cost, &formats.total_currency)?;
        row += 1;
    }
    Ok(())
}

fn add_detail_sheet(
    workbook: &mut Workbook,
    payload: &ReportPayload,
    formats: &XlsxFormats,
) -> Result<(), ReportError> {
    let sheet = workbook.add_worksheet();
    sheet.set_name("Detail")?;
    write_headers(sheet, &DETAIL_COLUMNS, &formats.header)?;
    for (i, d) in payload.full_detail.iter().enumerate() {
        let row = i as u32 + 1;
        sheet.write_with_format(row, 0, d.name.as_str(), &formats.text)?;
        sheet.write_with_format(row, 1, d.work_order_number.as_str(), &formats.text)?;
        sheet.write_with_format(row, 2, d.hours, &formats.number)?;
        sheet.write_with_format(row, 3, d.work_type.as_str(), &formats.text)?;
        sheet.write_with_format(row, 4, d.cost_center.as_str(), &formats.text)?;
        sheet.write_with_format(row, 5, d.description.as_str(), &formats.text)?;
        sheet.write_with_format(row, 6, d.problem.as_str(), &formats.text)?;
    }
    Ok(())
}

fn build_workbook(payload: &ReportPayload, currency: &str) -> Result<Workbook, ReportError> {
    let formats = create_formats(currency);
    let mut workbook = Workbook::new();
    add_breakdown_sheet(&mut workbook, payload, &formats)?;
    add_detail_sheet(&mut workbook, payload, &formats)?;
    Ok(workbook)
}

/// The breakdown workbook as bytes, ready for a download response.
pub fn breakdown_xlsx_bytes(payload: &ReportPayload, currency: &str) -> Result<Vec<u8>, ReportError> {
    let mut workbook = build_workbook(payload, currency)?;
    Ok(workbook.save_to_buffer()?)
}

pub fn write_breakdown_xlsx(path: &Path, payload: &ReportPayload, currency: &str) -> Result<(), ReportError> {
    let mut workbook = build_workbook(payload, currency)?;
    workbook.save(path)?;
    Ok(())
}
