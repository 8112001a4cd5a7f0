use thiserror::Error;

use crate::types::CanonicalField;

#[derive(Debug, Error)]
pub enum ReportError {
    /// The input could not be read as a table at all.
    #[error("input is not a readable table: {0}")]
    Structural(String),

    /// Strict mode: required fields with no resolvable column.
    #[error("missing required column(s): {}", join_fields(.0))]
    MissingFields(Vec<CanonicalField>),

    #[error("labor rate must be a non-negative number, got {0}")]
    InvalidRate(f64),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XLSX export error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

fn join_fields(fields: &[CanonicalField]) -> String {
    fields
        .iter()
        .map(|f| f.name())
        .collect::<Vec<_>>()
        .join(", ")
}
