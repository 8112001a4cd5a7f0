use tracing::info;

use crate::aggregate::filter_by_dates;
use crate::canonical::canonicalize;
use crate::config::{AppConfig, GroupBy};
use crate::error::ReportError;
use crate::normalize::{normalize, NormalizeSettings, NormalizedTable};
use crate::reports::assemble;
use crate::resolve::ColumnResolver;
use crate::tables::{HeaderSynonyms, TypeCodeTable};
use crate::types::{CanonicalField, DateSelection, Rate, RawTable, ReportPayload};

/// Parameters of one report request.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRequest {
    pub rate: Rate,
    pub dates: DateSelection,
    pub group_by: GroupBy,
    pub breakdown_by: CanonicalField,
}

impl ReportRequest {
    pub fn new(rate: Rate) -> Self {
        Self {
            rate,
            dates: DateSelection::All,
            group_by: GroupBy::Auto,
            breakdown_by: CanonicalField::Type,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportOutcome {
    pub normalized: NormalizedTable,
    pub payload: ReportPayload,
}

/// canonicalize → normalize → filter → assemble, with every lookup table
/// supplied by the caller. Holds no per-request state, so one instance can
/// serve any number of requests.
#[derive(Debug)]
pub struct ReportPipeline {
    synonyms: HeaderSynonyms,
    type_codes: TypeCodeTable,
    resolver: ColumnResolver,
    settings: NormalizeSettings,
}

impl Default for ReportPipeline {
    fn default() -> Self {
        Self::new(
            HeaderSynonyms::default(),
            TypeCodeTable::default(),
            ColumnResolver::default(),
            NormalizeSettings::default(),
        )
    }
}

impl ReportPipeline {
    pub fn new(
        synonyms: HeaderSynonyms,
        type_codes: TypeCodeTable,
        resolver: ColumnResolver,
        settings: NormalizeSettings,
    ) -> Self {
        Self {
            synonyms,
            type_codes,
            resolver,
            settings,
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(
            cfg.header_synonyms(),
            cfg.type_code_table(),
            cfg.column_resolver(),
            cfg.normalize_settings(),
        )
    }

    pub fn prepare(&self, table: &RawTable) -> Result<NormalizedTable, ReportError> {
        let mapping = canonicalize(&table.headers, &self.synonyms);
        normalize(
            table,
            &mapping,
            &self.resolver,
            &self.type_codes,
            &self.settings,
        )
    }

    pub fn report(&self, normalized: &NormalizedTable, request: &ReportRequest) -> ReportPayload {
        let rows = filter_by_dates(&normalized.rows, &request.dates);
        let group_field = match request.group_by {
            GroupBy::Auto => normalized
                .columns
                .has(CanonicalField::Craft)
                .then_some(CanonicalField::Craft),
            GroupBy::None => None,
            GroupBy::Field(f) => Some(f),
        };
        info!(
            selected_rows = rows.len(),
            group_by = ?group_field,
            breakdown_by = %request.breakdown_by,
            "building report"
        );
        assemble(&rows, group_field, request.breakdown_by, request.rate)
    }

    pub fn run(&self, table: &RawTable, request: &ReportRequest) -> Result<ReportOutcome, ReportError> {
        let normalized = self.prepare(table)?;
        let payload = self.report(&normalized, request);
        Ok(ReportOutcome {
            normalized,
            payload,
        })
    }
}
