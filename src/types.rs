use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use tabled::Tabled;

use crate::error::ReportError;
use crate::util::round2;

/// Fallback key for blank grouping values so no row is dropped from a group.
pub const UNSPECIFIED: &str = "Unspecified";
/// Key used when there is no outer grouping field.
pub const ALL_GROUP: &str = "All";
/// Bucket label when the data carries no production dates.
pub const ALL_DATA: &str = "All Data";
/// Value written to `CostCenter` when no strategy found a column.
pub const MISSING_MARKER: &str = "Missing";

/// Column order of every detail table, on screen and in exports.
pub const DETAIL_COLUMNS: [&str; 7] = [
    "Name",
    "WorkOrderNumber",
    "Hours",
    "Type",
    "CostCenter",
    "Description",
    "Problem",
];

/// A single spreadsheet cell as the file parser hands it over.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
}

impl CellValue {
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Render the cell as text. Whole numbers drop their decimals so a
    /// type code stored as `1.0` in a workbook still reads as `"1"`.
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.trim().to_string(),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            CellValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            CellValue::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

static EMPTY_CELL: CellValue = CellValue::Empty;

/// Untyped table: one header row plus body rows, column order preserved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self { headers, rows }
    }

    pub fn width(&self) -> usize {
        self.headers.len()
    }

    /// Ragged rows are common in exports; anything past the end reads as empty.
    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }
}

/// The fixed schema every normalized record exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CanonicalField {
    Name,
    WorkOrderNumber,
    Hours,
    Type,
    CostCenter,
    Description,
    Problem,
    ProductionDate,
    Craft,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 9] = [
        CanonicalField::Name,
        CanonicalField::WorkOrderNumber,
        CanonicalField::Hours,
        CanonicalField::Type,
        CanonicalField::CostCenter,
        CanonicalField::Description,
        CanonicalField::Problem,
        CanonicalField::ProductionDate,
        CanonicalField::Craft,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CanonicalField::Name => "Name",
            CanonicalField::WorkOrderNumber => "WorkOrderNumber",
            CanonicalField::Hours => "Hours",
            CanonicalField::Type => "Type",
            CanonicalField::CostCenter => "CostCenter",
            CanonicalField::Description => "Description",
            CanonicalField::Problem => "Problem",
            CanonicalField::ProductionDate => "ProductionDate",
            CanonicalField::Craft => "Craft",
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CanonicalField {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        CanonicalField::ALL
            .iter()
            .copied()
            .find(|f| f.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ReportError::Config(format!("unknown field '{}'", wanted)))
    }
}

/// Parsed production date, or the explicit unknown marker. Never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum ProductionDate {
    Known(NaiveDate),
    Unknown,
}

impl ProductionDate {
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            ProductionDate::Known(d) => Some(*d),
            ProductionDate::Unknown => None,
        }
    }

    pub fn label(&self) -> String {
        match self {
            ProductionDate::Known(d) => d.format("%Y-%m-%d").to_string(),
            ProductionDate::Unknown => "Unknown".to_string(),
        }
    }
}

/// How a canonical column was located in the source table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Provenance {
    /// Header text equals the canonical field name.
    Header,
    /// Header matched through the synonym table.
    Synonym,
    /// Taken from a fixed column index; the header was never checked.
    Positional,
    /// No column found; value synthesized.
    Missing,
}

impl Provenance {
    pub fn is_verified(&self) -> bool {
        matches!(self, Provenance::Header | Provenance::Synonym)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostCenter {
    pub value: String,
    pub provenance: Provenance,
}

impl CostCenter {
    pub fn missing() -> Self {
        Self {
            value: MISSING_MARKER.to_string(),
            provenance: Provenance::Missing,
        }
    }

    /// Text shown to people; positional values are flagged as unverified.
    pub fn display(&self) -> String {
        match self.provenance {
            Provenance::Positional => format!("{} (unverified)", self.value),
            _ => self.value.clone(),
        }
    }
}

/// One normalized record. Every canonical field is present.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalRow {
    pub name: String,
    pub work_order_number: String,
    pub hours: f64,
    pub work_type: String,
    pub cost_center: CostCenter,
    pub description: String,
    pub problem: String,
    pub production_date: ProductionDate,
    pub craft: String,
    /// Non-canonical columns the caller asked to keep, keyed by source header.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, String>,
}

impl CanonicalRow {
    /// Grouping value for a field. Blank values land in the `Unspecified`
    /// bucket rather than disappearing.
    pub fn key_for(&self, field: CanonicalField) -> String {
        let raw = match field {
            CanonicalField::Name => self.name.clone(),
            CanonicalField::WorkOrderNumber => self.work_order_number.clone(),
            CanonicalField::Hours => format!("{}", self.hours),
            CanonicalField::Type => self.work_type.clone(),
            CanonicalField::CostCenter => self.cost_center.display(),
            CanonicalField::Description => self.description.clone(),
            CanonicalField::Problem => self.problem.clone(),
            CanonicalField::ProductionDate => self.production_date.label(),
            CanonicalField::Craft => self.craft.clone(),
        };
        if raw.trim().is_empty() {
            UNSPECIFIED.to_string()
        } else {
            raw
        }
    }

    pub fn to_detail(&self) -> DetailRow {
        DetailRow {
            name: self.name.clone(),
            work_order_number: self.work_order_number.clone(),
            hours: self.hours,
            work_type: self.work_type.clone(),
            cost_center: self.cost_center.display(),
            description: self.description.clone(),
            problem: self.problem.clone(),
            cost_center_verified: self.cost_center.provenance.is_verified(),
        }
    }
}

/// Non-negative hourly labor rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rate(f64);

impl Rate {
    pub fn new(value: f64) -> Result<Self, ReportError> {
        if !value.is_finite() || value < 0.0 {
            return Err(ReportError::InvalidRate(value));
        }
        Ok(Rate(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn cost_for(&self, hours: f64) -> f64 {
        round2(hours * self.0)
    }
}

/// Which production dates to keep before grouping.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DateSelection {
    #[default]
    All,
    Only(BTreeSet<NaiveDate>),
}

impl DateSelection {
    pub fn only<I: IntoIterator<Item = NaiveDate>>(dates: I) -> Self {
        DateSelection::Only(dates.into_iter().collect())
    }
}

/// Summed hours for one group-by key tuple, before a rate is applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoursRow {
    pub key: Vec<String>,
    pub hours: f64,
    pub percent_of_group: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    pub key: Vec<String>,
    pub hours: f64,
    pub percent_of_group: f64,
    pub cost: f64,
}

impl AggregateRow {
    /// The innermost key component, e.g. the work-order type.
    pub fn label(&self) -> &str {
        self.key.last().map(String::as_str).unwrap_or(ALL_GROUP)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Totals {
    pub hours: f64,
    pub cost: f64,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct DetailRow {
    #[serde(rename = "Name")]
    #[tabled(rename = "Name")]
    pub name: String,
    #[serde(rename = "WorkOrderNumber")]
    #[tabled(rename = "WorkOrderNumber")]
    pub work_order_number: String,
    #[serde(rename = "Hours")]
    #[tabled(rename = "Hours")]
    pub hours: f64,
    #[serde(rename = "Type")]
    #[tabled(rename = "Type")]
    pub work_type: String,
    #[serde(rename = "CostCenter")]
    #[tabled(rename = "CostCenter")]
    pub cost_center: String,
    #[serde(rename = "Description")]
    #[tabled(rename = "Description")]
    pub description: String,
    #[serde(rename = "Problem")]
    #[tabled(rename = "Problem")]
    pub problem: String,
    #[serde(rename = "CostCenterVerified")]
    #[tabled(skip)]
    pub cost_center_verified: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportGroup {
    pub key: String,
    pub detail: Vec<DetailRow>,
    pub aggregate: Vec<AggregateRow>,
    pub totals: Totals,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopEntry {
    pub label: String,
    pub hours: f64,
    pub percent: f64,
}

/// Whole-report figures, computed over the filtered rows grouped by `Type`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SummaryMetrics {
    pub total_hours: f64,
    pub total_cost: f64,
    pub top_type: Option<TopEntry>,
    pub by_type: Vec<AggregateRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportPayload {
    pub group_field: Option<CanonicalField>,
    pub breakdown_field: CanonicalField,
    pub rate: f64,
    pub groups: Vec<ReportGroup>,
    pub full_detail: Vec<DetailRow>,
    pub summary: SummaryMetrics,
}
