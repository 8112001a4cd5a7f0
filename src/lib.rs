//! Labor-hours-against-work-orders cost breakdown.
//!
//! A spreadsheet export goes through four stages, each producing a new
//! value and never touching the previous one:
//!
//! 1. [`canonical`] maps arbitrary headers onto the fixed schema.
//! 2. [`normalize`] fills defaults and coerces cells into [`types::CanonicalRow`]s.
//! 3. [`aggregate`] sums hours per key and applies the labor rate.
//! 4. [`reports`] sections the rows and assembles a [`types::ReportPayload`].
//!
//! [`pipeline::ReportPipeline`] wires the stages together with injected
//! lookup tables.

pub mod aggregate;
pub mod canonical;
pub mod config;
pub mod error;
pub mod loader;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod reports;
pub mod resolve;
pub mod tables;
pub mod types;
pub mod util;

pub use config::{AppConfig, GroupBy};
pub use error::ReportError;
pub use pipeline::{ReportOutcome, ReportPipeline, ReportRequest};
pub use types::{CanonicalField, DateSelection, Rate, RawTable, ReportPayload};
