use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::canonical::{normalize_header, HeaderMapping};
use crate::error::ReportError;
use crate::resolve::{ColumnResolver, ColumnSource, ResolveContext, ResolvedColumns};
use crate::tables::TypeCodeTable;
use crate::types::{
    CanonicalField, CanonicalRow, CellValue, CostCenter, ProductionDate, Provenance, RawTable,
    UNSPECIFIED,
};
use crate::util::{excel_serial_to_date, parse_date_permissive, parse_f64_safe};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizeSettings {
    /// Fields that must resolve to a real column; empty means every field
    /// may be defaulted.
    pub required: Vec<CanonicalField>,
    /// Non-canonical headers to carry along on each record.
    pub retain_columns: Vec<String>,
}

/// Cell-level defects are counted here instead of being raised.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizeStats {
    pub total_rows: usize,
    pub blank_hours: usize,
    pub invalid_hours: usize,
    pub unknown_dates: usize,
    pub unmapped_types: usize,
    pub cost_center_source: Option<Provenance>,
}

impl NormalizeStats {
    pub fn defects(&self) -> usize {
        self.blank_hours + self.invalid_hours + self.unknown_dates + self.unmapped_types
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTable {
    pub rows: Vec<CanonicalRow>,
    pub columns: ResolvedColumns,
    pub stats: NormalizeStats,
}

impl NormalizedTable {
    /// False when no date-like column exists; date filtering is then a no-op.
    pub fn has_dates(&self) -> bool {
        self.columns.has(CanonicalField::ProductionDate)
    }
}

/// Turn a raw table into canonical records.
///
/// Never fails on a bad cell. The only error is a strict-mode field that no
/// resolution strategy could place.
pub fn normalize(
    table: &RawTable,
    mapping: &HeaderMapping,
    resolver: &ColumnResolver,
    type_codes: &TypeCodeTable,
    settings: &NormalizeSettings,
) -> Result<NormalizedTable, ReportError> {
    let ctx = ResolveContext { table, mapping };
    let columns = resolver.resolve_all(&ctx);

    let missing_required: Vec<CanonicalField> = settings
        .required
        .iter()
        .copied()
        .filter(|f| !columns.has(*f))
        .collect();
    if !missing_required.is_empty() {
        return Err(ReportError::MissingFields(missing_required));
    }

    let retained: Vec<(String, usize)> = settings
        .retain_columns
        .iter()
        .filter_map(|want| {
            let key = normalize_header(want);
            table
                .headers
                .iter()
                .position(|h| normalize_header(h) == key)
                .map(|idx| (table.headers[idx].clone(), idx))
        })
        .collect();

    let mut stats = NormalizeStats {
        total_rows: table.rows.len(),
        cost_center_source: Some(columns.provenance(CanonicalField::CostCenter)),
        ..Default::default()
    };

    let text_of = |row: usize, field: CanonicalField| -> String {
        columns
            .get(field)
            .map(|src| table.cell(row, src.index).as_text())
            .unwrap_or_default()
    };

    let mut rows = Vec::with_capacity(table.rows.len());
    for r in 0..table.rows.len() {
        let hours = match columns.get(CanonicalField::Hours) {
            Some(src) => coerce_hours(table.cell(r, src.index), &mut stats),
            None => 0.0,
        };

        let raw_type = text_of(r, CanonicalField::Type);
        let work_type = if raw_type.is_empty() {
            UNSPECIFIED.to_string()
        } else {
            match type_codes.resolve(&raw_type) {
                Some(label) => label.to_string(),
                None => {
                    stats.unmapped_types += 1;
                    raw_type
                }
            }
        };

        let production_date = match columns.get(CanonicalField::ProductionDate) {
            Some(src) => {
                let d = coerce_date(table.cell(r, src.index));
                if d == ProductionDate::Unknown {
                    stats.unknown_dates += 1;
                }
                d
            }
            None => ProductionDate::Unknown,
        };

        let cost_center = match columns.get(CanonicalField::CostCenter) {
            Some(src) => cost_center_from(table.cell(r, src.index), src),
            None => CostCenter::missing(),
        };

        let extras: BTreeMap<String, String> = retained
            .iter()
            .map(|(header, idx)| (header.clone(), table.cell(r, *idx).as_text()))
            .collect();

        rows.push(CanonicalRow {
            name: text_of(r, CanonicalField::Name),
            work_order_number: text_of(r, CanonicalField::WorkOrderNumber),
            hours,
            work_type,
            cost_center,
            description: text_of(r, CanonicalField::Description),
            problem: text_of(r, CanonicalField::Problem),
            production_date,
            craft: text_of(r, CanonicalField::Craft),
            extras,
        });
    }

    info!(
        rows = rows.len(),
        missing_fields = ?columns.missing(),
        "records normalized"
    );
    if stats.defects() > 0 {
        warn!(
            blank_hours = stats.blank_hours,
            invalid_hours = stats.invalid_hours,
            unknown_dates = stats.unknown_dates,
            unmapped_types = stats.unmapped_types,
            "cell values replaced with defaults"
        );
    }

    Ok(NormalizedTable {
        rows,
        columns,
        stats,
    })
}

fn coerce_hours(cell: &CellValue, stats: &mut NormalizeStats) -> f64 {
    match cell {
        CellValue::Number(n) if n.is_finite() => *n,
        CellValue::Empty => {
            stats.blank_hours += 1;
            0.0
        }
        CellValue::Text(s) if s.trim().is_empty() => {
            stats.blank_hours += 1;
            0.0
        }
        CellValue::Text(s) => parse_f64_safe(s).unwrap_or_else(|| {
            stats.invalid_hours += 1;
            0.0
        }),
        _ => {
            stats.invalid_hours += 1;
            0.0
        }
    }
}

fn coerce_date(cell: &CellValue) -> ProductionDate {
    let parsed = match cell {
        CellValue::Date(d) => Some(*d),
        CellValue::Number(n) => excel_serial_to_date(*n),
        CellValue::Text(s) => parse_date_permissive(s),
        _ => None,
    };
    parsed.map(ProductionDate::Known).unwrap_or(ProductionDate::Unknown)
}

fn cost_center_from(cell: &CellValue, src: ColumnSource) -> CostCenter {
    let value = cell.as_text();
    if value.is_empty() && src.provenance == Provenance::Positional {
        return CostCenter::missing();
    }
    CostCenter {
        value,
        provenance: src.provenance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::canonicalize;
    use crate::tables::HeaderSynonyms;
    use chrono::NaiveDate;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn run(table: &RawTable, settings: &NormalizeSettings) -> Result<NormalizedTable, ReportError> {
        let mapping = canonicalize(&table.headers, &HeaderSynonyms::default());
        normalize(
            table,
            &mapping,
            &ColumnResolver::default(),
            &TypeCodeTable::default(),
            settings,
        )
    }

    #[test]
    fn bad_hours_become_zero_without_error() {
        let t = RawTable::new(
            vec!["Hours".into(), "Type".into()],
            vec![
                vec![text("N/A"), text("1")],
                vec![CellValue::Empty, text("1")],
                vec![CellValue::Number(2.5), text("1")],
            ],
        );
        let out = run(&t, &NormalizeSettings::default()).unwrap();
        let hours: Vec<f64> = out.rows.iter().map(|r| r.hours).collect();
        assert_eq!(hours, vec![0.0, 0.0, 2.5]);
        assert_eq!(out.stats.invalid_hours, 1);
        assert_eq!(out.stats.blank_hours, 1);
    }

    #[test]
    fn type_codes_resolve_or_pass_through() {
        let t = RawTable::new(
            vec!["Type".into()],
            vec![vec![text("1")], vec![text("Q")], vec![CellValue::Number(4.0)], vec![CellValue::Empty]],
        );
        let out = run(&t, &NormalizeSettings::default()).unwrap();
        let types: Vec<&str> = out.rows.iter().map(|r| r.work_type.as_str()).collect();
        assert_eq!(
            types,
            vec!["Maintenance Order", "Q", "Urgent Corrective", "Unspecified"]
        );
        assert_eq!(out.stats.unmapped_types, 1);
    }

    #[test]
    fn absent_columns_get_documented_defaults() {
        let t = RawTable::new(vec!["Notes".into()], vec![vec![text("hello")]]);
        let out = run(&t, &NormalizeSettings::default()).unwrap();
        let row = &out.rows[0];
        assert_eq!(row.hours, 0.0);
        assert_eq!(row.work_type, "Unspecified");
        assert_eq!(row.production_date, ProductionDate::Unknown);
        assert_eq!(row.name, "");
        assert_eq!(row.work_order_number, "");
        assert_eq!(row.cost_center, CostCenter::missing());
        assert!(!out.has_dates());
        assert!(row.extras.is_empty());
    }

    #[test]
    fn dates_parse_or_become_unknown() {
        let t = RawTable::new(
            vec!["Prod Date".into()],
            vec![
                vec![CellValue::Date(NaiveDate::from_ymd_opt(2025, 3, 14).unwrap())],
                vec![text("03/15/2025")],
                vec![CellValue::Number(45732.0)],
                vec![text("soon")],
            ],
        );
        let out = run(&t, &NormalizeSettings::default()).unwrap();
        let dates: Vec<Option<NaiveDate>> =
            out.rows.iter().map(|r| r.production_date.date()).collect();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2025, 3, 14),
                NaiveDate::from_ymd_opt(2025, 3, 15),
                NaiveDate::from_ymd_opt(2025, 3, 16),
                None,
            ]
        );
        assert_eq!(out.stats.unknown_dates, 1);
        assert!(out.has_dates());
    }

    #[test]
    fn positional_cost_center_is_unverified() {
        let headers: Vec<String> = (0..14).map(|i| format!("Col{}", i)).collect();
        let mut row = vec![CellValue::Empty; 14];
        row[13] = CellValue::Number(4100.0);
        let t = RawTable::new(headers, vec![row, vec![CellValue::Empty; 14]]);
        let out = run(&t, &NormalizeSettings::default()).unwrap();
        assert_eq!(out.rows[0].cost_center.value, "4100");
        assert_eq!(out.rows[0].cost_center.provenance, Provenance::Positional);
        assert_eq!(out.rows[1].cost_center, CostCenter::missing());
        assert_eq!(out.stats.cost_center_source, Some(Provenance::Positional));
    }

    #[test]
    fn strict_mode_names_missing_fields() {
        let t = RawTable::new(vec!["Name".into()], vec![]);
        let settings = NormalizeSettings {
            required: vec![CanonicalField::Hours, CanonicalField::Type],
            ..Default::default()
        };
        match run(&t, &settings) {
            Err(ReportError::MissingFields(f)) => {
                assert_eq!(f, vec![CanonicalField::Hours, CanonicalField::Type])
            }
            other => panic!("expected MissingFields, got {:?}", other),
        }
    }

    #[test]
    fn retained_columns_ride_along() {
        let t = RawTable::new(
            vec!["Hours".into(), "Shift".into()],
            vec![vec![CellValue::Number(1.0), text("Night")]],
        );
        let settings = NormalizeSettings {
            retain_columns: vec!["shift".into()],
            ..Default::default()
        };
        let out = run(&t, &settings).unwrap();
        assert_eq!(out.rows[0].extras.get("Shift").map(String::as_str), Some("Night"));
    }
}
