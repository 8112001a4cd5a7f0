// Column resolution for canonical fields.
//
// Each canonical field is located by walking an ordered list of strategies;
// the first one that names a column wins. When none do, the field is treated
// as missing and the normalizer synthesizes its default. New strategies slot
// into the list without touching the existing ones.
use std::collections::HashMap;
use std::fmt;

use tracing::{debug, warn};

use crate::canonical::HeaderMapping;
use crate::types::{CanonicalField, Provenance, RawTable};

/// Zero-indexed column of the cost center in the one export layout we know.
pub const DEFAULT_COST_CENTER_COLUMN: usize = 13;

pub struct ResolveContext<'a> {
    pub table: &'a RawTable,
    pub mapping: &'a HeaderMapping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSource {
    pub index: usize,
    pub provenance: Provenance,
}

pub trait ColumnStrategy: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;
    fn resolve(&self, field: CanonicalField, ctx: &ResolveContext<'_>) -> Option<ColumnSource>;
}

/// Header spelled exactly like the canonical field (case-insensitive).
#[derive(Debug, Default)]
pub struct ExactHeader;

impl ColumnStrategy for ExactHeader {
    fn name(&self) -> &'static str {
        "exact-header"
    }

    fn resolve(&self, field: CanonicalField, ctx: &ResolveContext<'_>) -> Option<ColumnSource> {
        ctx.mapping
            .columns_for(field)
            .find(|(_, p)| *p == Provenance::Header)
            .map(|(index, provenance)| ColumnSource { index, provenance })
    }
}

/// Header recognized through the synonym table.
#[derive(Debug, Default)]
pub struct SynonymHeader;

impl ColumnStrategy for SynonymHeader {
    fn name(&self) -> &'static str {
        "synonym-header"
    }

    fn resolve(&self, field: CanonicalField, ctx: &ResolveContext<'_>) -> Option<ColumnSource> {
        ctx.mapping
            .columns_for(field)
            .find(|(_, p)| *p == Provenance::Synonym)
            .map(|(index, provenance)| ColumnSource { index, provenance })
    }
}

/// Fixed column index per field. The header is not inspected, so values found
/// this way are marked `Positional` and shown as unverified. A column whose
/// header already maps to a different canonical field is never borrowed.
#[derive(Debug, Default)]
pub struct FixedPosition {
    positions: HashMap<CanonicalField, usize>,
}

impl FixedPosition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: CanonicalField, index: usize) -> Self {
        self.positions.insert(field, index);
        self
    }
}

impl ColumnStrategy for FixedPosition {
    fn name(&self) -> &'static str {
        "fixed-position"
    }

    fn resolve(&self, field: CanonicalField, ctx: &ResolveContext<'_>) -> Option<ColumnSource> {
        let index = *self.positions.get(&field)?;
        if index >= ctx.table.width() {
            return None;
        }
        if let Some(other) = ctx.mapping.field_at(index) {
            if other != field {
                debug!(%field, index, claimed_by = %other, "positional column already claimed");
                return None;
            }
        }
        warn!(
            %field,
            index,
            header = %ctx.table.headers[index],
            "no matching header; using positional column"
        );
        Some(ColumnSource {
            index,
            provenance: Provenance::Positional,
        })
    }
}

#[derive(Debug)]
pub struct ColumnResolver {
    strategies: Vec<Box<dyn ColumnStrategy>>,
}

impl Default for ColumnResolver {
    fn default() -> Self {
        Self::standard(Some(DEFAULT_COST_CENTER_COLUMN))
    }
}

impl ColumnResolver {
    pub fn empty() -> Self {
        Self { strategies: Vec::new() }
    }

    /// exact header → synonym header → fixed position (cost center only).
    pub fn standard(cost_center_column: Option<usize>) -> Self {
        let mut resolver = Self::empty().then(ExactHeader).then(SynonymHeader);
        if let Some(idx) = cost_center_column {
            resolver = resolver.then(FixedPosition::new().with(CanonicalField::CostCenter, idx));
        }
        resolver
    }

    /// Append a strategy at the lowest precedence.
    pub fn then<S: ColumnStrategy + 'static>(mut self, strategy: S) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn resolve(&self, field: CanonicalField, ctx: &ResolveContext<'_>) -> Option<ColumnSource> {
        for strategy in &self.strategies {
            if let Some(src) = strategy.resolve(field, ctx) {
                debug!(%field, strategy = strategy.name(), column = src.index, "column resolved");
                return Some(src);
            }
        }
        None
    }

    pub fn resolve_all(&self, ctx: &ResolveContext<'_>) -> ResolvedColumns {
        let sources = CanonicalField::ALL
            .iter()
            .filter_map(|f| self.resolve(*f, ctx).map(|src| (*f, src)))
            .collect();
        ResolvedColumns { sources }
    }
}

/// Outcome of resolution for the whole schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedColumns {
    sources: HashMap<CanonicalField, ColumnSource>,
}

impl ResolvedColumns {
    pub fn get(&self, field: CanonicalField) -> Option<ColumnSource> {
        self.sources.get(&field).copied()
    }

    pub fn provenance(&self, field: CanonicalField) -> Provenance {
        self.get(field)
            .map(|s| s.provenance)
            .unwrap_or(Provenance::Missing)
    }

    pub fn has(&self, field: CanonicalField) -> bool {
        self.sources.contains_key(&field)
    }

    pub fn missing(&self) -> Vec<CanonicalField> {
        CanonicalField::ALL
            .iter()
            .copied()
            .filter(|f| !self.has(*f))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::canonicalize;
    use crate::tables::HeaderSynonyms;

    fn table(headers: &[&str]) -> RawTable {
        RawTable::new(headers.iter().map(|s| s.to_string()).collect(), vec![])
    }

    fn wide_headers() -> Vec<String> {
        (0..15).map(|i| format!("Col{}", i)).collect()
    }

    #[test]
    fn exact_header_beats_synonym_even_when_later() {
        let t = table(&["Cost Centre", "CostCenter"]);
        let m = canonicalize(&t.headers, &HeaderSynonyms::default());
        let ctx = ResolveContext { table: &t, mapping: &m };
        let src = ColumnResolver::default()
            .resolve(CanonicalField::CostCenter, &ctx)
            .unwrap();
        assert_eq!(src.index, 1);
        assert_eq!(src.provenance, Provenance::Header);
    }

    #[test]
    fn first_synonym_column_wins() {
        let t = table(&["Hrs", "Labor Hours"]);
        let m = canonicalize(&t.headers, &HeaderSynonyms::default());
        let ctx = ResolveContext { table: &t, mapping: &m };
        let src = ColumnResolver::default().resolve(CanonicalField::Hours, &ctx).unwrap();
        assert_eq!(src.index, 0);
    }

    #[test]
    fn cost_center_falls_back_to_column_thirteen() {
        let t = RawTable::new(wide_headers(), vec![]);
        let m = canonicalize(&t.headers, &HeaderSynonyms::default());
        let ctx = ResolveContext { table: &t, mapping: &m };
        let resolved = ColumnResolver::default().resolve_all(&ctx);
        assert_eq!(
            resolved.get(CanonicalField::CostCenter),
            Some(ColumnSource {
                index: 13,
                provenance: Provenance::Positional
            })
        );
        assert_eq!(resolved.provenance(CanonicalField::Hours), Provenance::Missing);
    }

    #[test]
    fn narrow_table_leaves_cost_center_missing() {
        let t = table(&["Name", "Hours"]);
        let m = canonicalize(&t.headers, &HeaderSynonyms::default());
        let ctx = ResolveContext { table: &t, mapping: &m };
        let resolved = ColumnResolver::default().resolve_all(&ctx);
        assert!(!resolved.has(CanonicalField::CostCenter));
        assert!(resolved.missing().contains(&CanonicalField::CostCenter));
    }

    #[test]
    fn positional_fallback_skips_claimed_column() {
        let mut headers = wide_headers();
        headers[13] = "Hours".to_string();
        let t = RawTable::new(headers, vec![]);
        let m = canonicalize(&t.headers, &HeaderSynonyms::default());
        let ctx = ResolveContext { table: &t, mapping: &m };
        let resolved = ColumnResolver::default().resolve_all(&ctx);
        assert!(!resolved.has(CanonicalField::CostCenter));
        assert_eq!(resolved.get(CanonicalField::Hours).map(|s| s.index), Some(13));
    }

    #[test]
    fn disabled_fallback_has_two_strategies() {
        let r = ColumnResolver::standard(None);
        assert_eq!(r.strategy_names(), vec!["exact-header", "synonym-header"]);
    }
}
